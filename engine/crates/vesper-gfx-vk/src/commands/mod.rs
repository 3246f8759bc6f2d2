pub mod barrier;
pub mod fence;
pub mod semaphore;
