pub mod app;
pub mod demo;
pub mod gpu;
pub mod input;
pub mod io;
pub mod lights;
pub mod renderer;
pub mod scene;
pub mod settings;

use app::{App, AppError};
use settings::RenderSettings;
use winit::event_loop::EventLoop;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

pub fn run() -> Result<(), AppError> {
    init_logging();

    log::info!("Starting wgpu scene renderer");

    let settings = RenderSettings::load();
    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings);

    let result = event_loop.run_app(&mut app);

    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }
    if let Some(err) = app.take_startup_error() {
        return Err(err);
    }

    log::info!("Application shutdown complete");

    result.map_err(AppError::from)
}
