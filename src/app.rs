// app.rs
use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

use crate::demo::DemoScene;
use crate::gpu::{Gpu, GpuError, WgpuGpu};
use crate::input::InputState;
use crate::renderer::RenderError;
use crate::scene::{Camera, FrameContext};
use crate::settings::{CameraSettings, RenderSettings};

/// Longest step fed to camera movement, so a stalled frame does not teleport.
const MAX_FRAME_TIME: f32 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<GpuError> for AppError {
    fn from(err: GpuError) -> Self {
        AppError::Render(err.into())
    }
}

pub struct FrameTimer {
    last: Instant,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self {
            last: Instant::now(),
        }
    }
}

impl FrameTimer {
    /// Seconds since the previous tick.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = (now - self.last).as_secs_f32();
        self.last = now;
        delta.min(MAX_FRAME_TIME)
    }
}

/// Per-run state shared by the event handlers.
pub struct AppContext {
    pub camera: Camera,
    pub input: InputState,
    pub timer: FrameTimer,
    camera_settings: CameraSettings,
}

impl AppContext {
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            camera: settings.camera(),
            input: InputState::new(),
            timer: FrameTimer::default(),
            camera_settings: settings.camera.clone(),
        }
    }

    /// Applies gathered input to the camera and returns the frame time.
    pub fn update(&mut self) -> f32 {
        let delta = self.timer.tick();
        self.input.apply(&mut self.camera, delta);
        delta
    }

    pub fn reset_camera(&mut self) {
        self.camera.reset();
        self.camera_settings.apply(&mut self.camera);
        log::info!("Camera reset to {:?}", self.camera.position);
    }
}

struct Graphics {
    window: Arc<Window>,
    gpu: WgpuGpu,
    scene: DemoScene,
}

pub struct App {
    settings: RenderSettings,
    context: AppContext,
    graphics: Option<Graphics>,
    startup_error: Option<AppError>,
}

impl App {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            context: AppContext::new(&settings),
            settings,
            graphics: None,
            startup_error: None,
        }
    }

    /// The error that stopped start-up, if any.
    pub fn take_startup_error(&mut self) -> Option<AppError> {
        self.startup_error.take()
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<Graphics, AppError> {
        let resolution = &self.settings.resolution;
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title("wgpu scene")
                    .with_inner_size(PhysicalSize::new(resolution.width, resolution.height)),
            )?,
        );

        let settings = &self.settings;
        let mut gpu = pollster::block_on(WgpuGpu::new(window.clone(), |available| {
            settings.present_mode(available)
        }))?;
        let scene = DemoScene::build(
            &mut gpu,
            &self.context.camera,
            self.settings.light_capacity,
        )?;

        Ok(Graphics { window, gpu, scene })
    }

    fn set_mouse_look(&mut self, enabled: bool) {
        let Some(graphics) = &self.graphics else {
            return;
        };
        let window = &graphics.window;
        if enabled {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
            if let Err(err) = grabbed {
                log::warn!("Could not grab cursor: {}", err);
            }
        } else if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
            log::warn!("Could not release cursor: {}", err);
        }
        window.set_cursor_visible(!enabled);
        self.context.input.set_mouse_look(enabled);
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        if self.context.input.process_key(event.physical_key, event.state) {
            return;
        }
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }

        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => self.shutdown(event_loop),
            PhysicalKey::Code(KeyCode::KeyR) => self.context.reset_camera(),
            PhysicalKey::Code(KeyCode::Tab) => {
                let enabled = !self.context.input.mouse_look();
                self.set_mouse_look(enabled);
            }
            PhysicalKey::Code(KeyCode::KeyG) => {
                if let Some(graphics) = self.graphics.as_mut() {
                    graphics.scene.toggle_grid();
                }
            }
            PhysicalKey::Code(KeyCode::KeyK) => {
                if let Some(graphics) = self.graphics.as_mut() {
                    graphics.scene.toggle_skybox();
                }
            }
            _ => {}
        }
    }

    fn redraw(&mut self) {
        self.context.update();
        let Some(graphics) = self.graphics.as_mut() else {
            return;
        };

        graphics.scene.update(&self.context.camera);
        let frame = FrameContext::from_camera(&self.context.camera, graphics.gpu.aspect_ratio());

        graphics.gpu.begin_frame(self.settings.clear_color);
        graphics.scene.render(&mut graphics.gpu, &frame);
        graphics.gpu.end_frame();

        for err in graphics.gpu.take_errors() {
            log::error!("GPU error: {}", err);
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut graphics) = self.graphics.take() {
            graphics.scene.shutdown(&mut graphics.gpu);
            for err in graphics.gpu.take_errors() {
                log::warn!("GPU error during shutdown: {}", err);
            }
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.graphics.is_some() {
            return;
        }

        match self.start(event_loop) {
            Ok(graphics) => {
                graphics.window.request_redraw();
                self.graphics = Some(graphics);
                self.set_mouse_look(true);
                self.context.timer = FrameTimer::default();
            }
            Err(err) => {
                log::error!("Start-up failed: {}", err);
                self.startup_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.graphics.as_ref().map(|g| g.window.id()) != Some(id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Some(graphics) = self.graphics.as_mut() {
                    graphics.gpu.resize(size);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(graphics) = self.graphics.as_mut() {
                    let size = graphics.window.inner_size();
                    graphics.gpu.resize(size);
                }
            }
            WindowEvent::Focused(false) => self.context.input.reset(),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, event),
            WindowEvent::MouseWheel { delta, .. } => self.context.input.process_scroll(delta),
            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(graphics) = &self.graphics {
                    graphics.window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.context.input.process_mouse_motion(dx, dy);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut graphics) = self.graphics.take() {
            graphics.scene.shutdown(&mut graphics.gpu);
        }
        log::info!("Event loop exiting");
    }
}
