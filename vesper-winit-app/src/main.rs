mod app;
mod platform;
mod renderer;

use vesper_crate_tools::init_log::init_log;
use vesper_crate_tools::resource::VesperPath;
use vesper_graphics::config::GraphicsConfig;
use winit::event_loop::EventLoop;

use crate::app::VesperApp;

fn main() -> anyhow::Result<()> {
    init_log();
    tracy_client::Client::start();

    let config_path = VesperPath::config_path();
    let config = if config_path.exists() {
        GraphicsConfig::load(&config_path)?
    } else {
        log::warn!("{config_path:?} not found, using default config");
        GraphicsConfig::default()
    };
    log::info!("config: {config:?}");

    let event_loop = EventLoop::new()?;
    let mut app = VesperApp::new(config);
    event_loop.run_app(&mut app)?;

    log::info!("end run.");
    Ok(())
}
