//! Application shell and event loop.
//!
//! A [`SceneFlow`] describes what is in the scene; the shell owns the window,
//! the device and the [`RenderContext`], translates winit events into
//! [`InputEvent`]s and runs one [`RenderContext::tick`] per redraw.
//!
//! # Lifecycle
//!
//! 1. The built-in shaders are compiled before any window exists, so broken
//!    shader sources fail the run without flashing a window.
//! 2. On `resumed` the window is created hidden, the device and context are
//!    built and [`SceneFlow::on_init`] registers drawables.
//! 3. The window is shown. Every redraw calls [`SceneFlow::on_update`] and
//!    then ticks the pipeline.
//! 4. On exit all GPU resources of the registry are released.

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window, WindowId},
};

use crate::{
    config::Config,
    context::{RenderContext, compile_builtin},
    error::FrameError,
    gpu::{GpuError, device::WgpuDevice},
    pipelines::CompiledProgram,
    render::{InputEvent, InputSnapshot},
};

/// A scene driven by the shell.
pub trait SceneFlow {
    /// Load and register drawables. This is also the place to adjust the
    /// camera or clear colour before the first frame.
    fn on_init(&mut self, ctx: &mut RenderContext<WgpuDevice>) -> anyhow::Result<()>;

    /// Called once per frame before the pipeline runs, e.g. to animate
    /// transforms.
    fn on_update(&mut self, _ctx: &mut RenderContext<WgpuDevice>, _dt: Duration) {}
}

struct App<F: SceneFlow> {
    async_runtime: tokio::runtime::Runtime,
    config: Config,
    // Taken once the context is built.
    programs: Option<(CompiledProgram, CompiledProgram)>,
    flow: F,
    ctx: Option<RenderContext<WgpuDevice>>,
    input: InputSnapshot,
    pending: Vec<InputEvent>,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl<F: SceneFlow> App<F> {
    fn new(
        config: Config,
        programs: (CompiledProgram, CompiledProgram),
        flow: F,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            config,
            programs: Some(programs),
            flow,
            ctx: None,
            input: InputSnapshot::default(),
            pending: Vec::new(),
            last_time: Instant::now(),
            error: None,
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let Some((mesh, line)) = self.programs.take() else {
            return Ok(());
        };
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_visible(false);
        let window = Arc::new(event_loop.create_window(attributes)?);

        let device = self.async_runtime.block_on(WgpuDevice::new(window.clone()))?;
        let mut ctx = RenderContext::with_programs(device, self.config.clone(), mesh, line)?;
        self.flow.on_init(&mut ctx)?;
        log::info!("scene ready with {} drawables", ctx.registry.len());

        // The platform may not have honoured the requested size.
        let size = window.inner_size();
        self.pending.push(InputEvent::Resize(size.width, size.height));

        window.set_visible(true);
        if let Err(e) = window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        {
            log::debug!("cursor grab unavailable: {e}");
        }
        self.last_time = Instant::now();
        window.request_redraw();
        self.ctx = Some(ctx);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();

        self.flow.on_update(ctx, dt);
        let events = std::mem::take(&mut self.pending);
        match ctx.tick(&self.input, events, dt) {
            Ok(report) => {
                if report.quit {
                    event_loop.exit();
                }
                if let Some((x, y)) = report.recenter {
                    let position = PhysicalPosition::new(x, y);
                    if let Err(e) = ctx.gpu.window().set_cursor_position(position) {
                        log::debug!("cannot move the pointer: {e}");
                    }
                    self.input.cursor = Some((x, y));
                }
            }
            // The device has already reconfigured the surface.
            Err(FrameError::Surface(GpuError::SurfaceLost)) => {
                log::warn!("surface lost, reconfigured");
            }
            Err(FrameError::Surface(e)) => log::error!("unable to render: {e}"),
            Err(e) => self.fail(event_loop, e.into()),
        }
    }
}

impl<F: SceneFlow> ApplicationHandler for App<F> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.pending.push(InputEvent::Quit);
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                ctx.gpu.resize(size.width, size.height);
                self.pending
                    .push(InputEvent::Resize(size.width, size.height));
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                let input = match event.state {
                    ElementState::Pressed if event.repeat => return,
                    ElementState::Pressed => InputEvent::KeyDown(code),
                    ElementState::Released => InputEvent::KeyUp(code),
                };
                self.input.apply(&input);
                self.pending.push(input);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.cursor = Some((position.x, position.y));
            }
            WindowEvent::CursorLeft { .. } => {
                self.input.cursor = None;
                ctx.mouse.release();
            }
            WindowEvent::Focused(false) => {
                self.input.pressed.clear();
                ctx.mouse.release();
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.release();
        }
    }
}

/// Open a window and run `flow` until the user quits.
pub fn run<F: SceneFlow>(config: Config, flow: F) -> anyhow::Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    if let Err(e) = env_logger::Builder::from_env(env).try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    }

    let programs = compile_builtin()?;
    log::info!("built-in shaders compiled");

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, programs, flow)?;
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
