use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::{self, SurfaceError};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::config::Configuration;
use crate::error::InitError;
use crate::events::{LoaderEvent, PreparedImage, SurfaceEvent};
use crate::render::reveal::RevealRenderer;
use crate::session::RevealSession;

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    renderer: Option<RevealRenderer>,
    session: RevealSession,
    from_loader: Option<Receiver<LoaderEvent>>,
    // Kept so a re-created renderer can upload them again after a resume.
    images: [Option<PreparedImage>; 2],
    fatal: Option<anyhow::Error>,
    pending_redraw: bool,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        cancel: CancellationToken,
        from_loader: Receiver<LoaderEvent>,
    ) -> Self {
        let session = RevealSession::new(&cfg.reveal, Instant::now());
        Self {
            cfg,
            cancel,
            window: None,
            surface: None,
            surface_config: None,
            device: None,
            queue: None,
            renderer: None,
            session,
            from_loader: Some(from_loader),
            images: [None, None],
            fatal: None,
            pending_redraw: false,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Ok(window.clone());
        }

        let wcfg = &self.cfg.window;
        let mut attrs = WindowAttributes::default()
            .with_title(wcfg.title.clone())
            .with_inner_size(PhysicalSize::new(wcfg.width, wcfg.height));
        if wcfg.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create viewer window")?,
        );
        if wcfg.hide_cursor {
            window.set_cursor_visible(false);
        }
        self.window = Some(window.clone());
        Ok(window)
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<(), InitError> {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window.clone())?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;

        let caps = surface.get_capabilities(&adapter);
        let fallback = *caps.formats.first().ok_or(InitError::NoSurfaceFormat)?;
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .unwrap_or(fallback);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("reveal-device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
        }))?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            backend = ?self.cfg.mask.backend,
            "viewer surface configured",
        );

        let mut renderer = RevealRenderer::new(&device, format, &self.cfg);
        for image in self.images.iter().flatten() {
            renderer.set_image(&device, &queue, image);
        }

        self.surface = Some(surface);
        self.surface_config = Some(config);
        self.renderer = Some(renderer);
        self.device = Some(device);
        self.queue = Some(queue);
        Ok(())
    }

    /// Tear down every GPU resource owned by this instance. Idempotent.
    fn release_gpu(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.release();
        }
        self.surface = None;
        self.surface_config = None;
        self.queue = None;
        self.device = None;
        if self.session.detach() {
            info!("reveal instance released");
        }
    }

    fn poll_loader(&mut self) {
        let Some(rx) = self.from_loader.as_ref() else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(LoaderEvent::Loaded(image)) => {
                    if let (Some(renderer), Some(device), Some(queue)) =
                        (self.renderer.as_mut(), self.device.as_ref(), self.queue.as_ref())
                    {
                        renderer.set_image(device, queue, &image);
                    }
                    let idx = image.slot.index();
                    self.images[idx] = Some(image);
                }
                Ok(LoaderEvent::Failed { slot, error }) => {
                    warn!(slot = slot.as_str(), error = %error, "layer will not be drawn");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("loader finished");
                    self.from_loader = None;
                    break;
                }
            }
        }
    }

    fn reconfigure(&mut self, width: u32, height: u32) {
        let (Some(surface), Some(device), Some(config)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.surface_config.as_mut(),
        ) else {
            return;
        };
        if width == 0 || height == 0 {
            return;
        }
        config.width = width;
        config.height = height;
        surface.configure(device, config);
        debug!(width, height, "viewer surface reconfigured");
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        self.session.push(SurfaceEvent::Resized {
            width: new_size.width,
            height: new_size.height,
        });
        self.request_redraw();
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        self.poll_loader();

        let Some(inputs) = self.session.begin_frame(Instant::now()) else {
            return;
        };
        if inputs.resized {
            self.reconfigure(inputs.surface.0, inputs.surface.1);
        }

        let (Some(surface), Some(device), Some(queue), Some(renderer)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.queue.as_ref(),
            self.renderer.as_mut(),
        ) else {
            return;
        };

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                let (w, h) = inputs.surface;
                self.reconfigure(w, h);
                self.request_redraw();
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                self.request_redraw();
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                let (w, h) = inputs.surface;
                self.reconfigure(w, h);
                self.request_redraw();
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("reveal-encoder"),
        });
        renderer.render(device, queue, &mut encoder, &view, &inputs);
        queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        // The mask keeps decaying without input, so every frame schedules the next.
        self.request_redraw();
    }

    fn request_redraw(&mut self) {
        self.pending_redraw = true;
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let window = match self.ensure_window(event_loop) {
            Ok(window) => window,
            Err(err) => {
                error!(error = ?err, "failed to create viewer window");
                self.fatal = Some(err);
                event_loop.exit();
                return;
            }
        };

        if self.device.is_none() {
            if let Err(err) = self.init_gpu(window.clone()) {
                error!(error = %err, "failed to initialize GPU state");
                self.fatal = Some(anyhow::Error::new(err));
                event_loop.exit();
                return;
            }
        }

        let size = window.inner_size();
        self.session.attach(size.width, size.height, Instant::now());
        self.request_redraw();
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        info!("viewer suspended; releasing GPU resources");
        self.release_gpu();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                self.release_gpu();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.session.push(SurfaceEvent::PointerMoved {
                    x: position.x,
                    y: position.y,
                });
            }
            WindowEvent::CursorLeft { .. } => {
                self.session.push(SurfaceEvent::PointerLeft);
            }
            WindowEvent::RedrawRequested => {
                self.pending_redraw = false;
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.pending_redraw {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                self.release_gpu();
                event_loop.exit();
            }
        }
    }
}

/// Run the reveal window on the calling thread until it closes or `cancel` fires.
pub fn run_windowed(
    cfg: Configuration,
    from_loader: Receiver<LoaderEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, from_loader);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();
    app.release_gpu();

    run_result.context("viewer event loop failed")?;
    match app.fatal.take() {
        Some(err) => Err(err.context("viewer failed to start")),
        None => Ok(()),
    }
}
