//! native 资源的延迟删除
//!
//! 资源的析构不直接调用驱动的 destroy 函数，而是把捕获了 native 句柄的闭包推入队列，
//! 标记为 `counter + DELETION_DELAY`。每帧 `prepare` 推进计数器，执行标记与新计数器相等的任务。
//!
//! 延迟固定为 2 帧，与 swapchain 实际的 image 数量无关；image 数量更多时这里的安全余量会变小。

use std::collections::VecDeque;

/// 资源在析构请求之后多少帧才真正删除
pub const DELETION_DELAY: u32 = 2;
/// 计数器循环的周期
pub const MAX_DELETION_COUNTER: u32 = 1000;

/// 类型擦除的删除任务，参数是持有 native device 的上下文
pub type DeletionTask<C> = Box<dyn FnOnce(&C)>;

pub struct DeletionQueue<C: ?Sized> {
    counter: u32,
    tasks: VecDeque<(u32, DeletionTask<C>)>,
}

impl<C: ?Sized> Default for DeletionQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl<C: ?Sized> DeletionQueue<C> {
    pub fn new() -> Self {
        Self {
            counter: 0,
            tasks: VecDeque::new(),
        }
    }
}

// getters
impl<C: ?Sized> DeletionQueue<C> {
    #[inline]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

// tools
impl<C: ?Sized> DeletionQueue<C> {
    /// 登记一个删除任务，它会在 DELETION_DELAY 帧之后执行
    pub fn push(&mut self, task: impl FnOnce(&C) + 'static) {
        let tag = (self.counter + DELETION_DELAY) % MAX_DELETION_COUNTER;
        self.tasks.push_back((tag, Box::new(task)));
    }

    /// 推进计数器，取出标记与新计数器相等的任务
    ///
    /// 任务由调用方在释放队列的借用之后执行，执行时可能会继续往队列中推入新任务
    pub fn advance(&mut self) -> Vec<DeletionTask<C>> {
        self.counter = (self.counter + 1) % MAX_DELETION_COUNTER;

        let mut ready = Vec::new();
        while self.tasks.front().is_some_and(|(tag, _)| *tag == self.counter) {
            if let Some((_, task)) = self.tasks.pop_front() {
                ready.push(task);
            }
        }
        ready
    }

    /// 取出全部任务，只在 device 销毁之前使用
    pub fn drain_all(&mut self) -> Vec<DeletionTask<C>> {
        self.tasks.drain(..).map(|(_, task)| task).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Log = RefCell<Vec<&'static str>>;

    fn run(tasks: Vec<DeletionTask<Log>>, log: &Log) {
        for task in tasks {
            task(log);
        }
    }

    #[test]
    fn test_deleted_exactly_two_frames_later() {
        let log = Log::default();
        let mut queue = DeletionQueue::<Log>::new();
        queue.push(|log: &Log| log.borrow_mut().push("buffer"));

        // 第一帧：仍可能被 in-flight 的命令使用
        run(queue.advance(), &log);
        assert!(log.borrow().is_empty());
        assert_eq!(queue.len(), 1);

        run(queue.advance(), &log);
        assert_eq!(*log.borrow(), vec!["buffer"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_within_same_frame() {
        let log = Log::default();
        let mut queue = DeletionQueue::<Log>::new();
        queue.push(|log: &Log| log.borrow_mut().push("view"));
        queue.push(|log: &Log| log.borrow_mut().push("image"));
        run(queue.advance(), &log);
        queue.push(|log: &Log| log.borrow_mut().push("late"));

        run(queue.advance(), &log);
        assert_eq!(*log.borrow(), vec!["view", "image"]);
        run(queue.advance(), &log);
        assert_eq!(*log.borrow(), vec!["view", "image", "late"]);
    }

    #[test]
    fn test_counter_wraps() {
        let log = Log::default();
        let mut queue = DeletionQueue::<Log>::new();
        for _ in 0..MAX_DELETION_COUNTER - 1 {
            run(queue.advance(), &log);
        }
        assert_eq!(queue.counter(), MAX_DELETION_COUNTER - 1);

        queue.push(|log: &Log| log.borrow_mut().push("wrapped"));
        run(queue.advance(), &log);
        assert_eq!(queue.counter(), 0);
        assert!(log.borrow().is_empty());

        run(queue.advance(), &log);
        assert_eq!(queue.counter(), 1);
        assert_eq!(*log.borrow(), vec!["wrapped"]);
    }

    #[test]
    fn test_every_start_counter() {
        // 任意 c 下请求的删除都只在计数器到达 (c + 2) % MAX 时执行
        for c in 0..MAX_DELETION_COUNTER {
            let log = Log::default();
            let mut queue = DeletionQueue::<Log> {
                counter: c,
                tasks: VecDeque::new(),
            };
            let executed_at = Rc::new(RefCell::new(None));
            let slot = executed_at.clone();
            queue.push(move |_: &Log| *slot.borrow_mut() = Some(c));

            run(queue.advance(), &log);
            assert_eq!(*executed_at.borrow(), None);

            run(queue.advance(), &log);
            assert_eq!(queue.counter(), (c + DELETION_DELAY) % MAX_DELETION_COUNTER);
            assert_eq!(*executed_at.borrow(), Some(c));
        }
    }

    #[test]
    fn test_drain_all() {
        let log = Log::default();
        let mut queue = DeletionQueue::<Log>::new();
        queue.push(|log: &Log| log.borrow_mut().push("a"));
        run(queue.advance(), &log);
        queue.push(|log: &Log| log.borrow_mut().push("b"));

        run(queue.drain_all(), &log);
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert!(queue.is_empty());
    }
}
