use anyhow::{Context, Result};
use cityscape_assets::{CityFile, LoadError};
use cityscape_common::{CameraState, LayerKind, ProjectionMode};
use cityscape_input::{Action, MAX_ZOOM_PERCENT, MIN_ZOOM_PERCENT};
use cityscape_kernel::{CommandQueue, LayerCollection};
use cityscape_render::{RenderContext, Viewport};
use cityscape_render_wgpu::{GpuLayer, WgpuRenderer};
use clap::Parser;
use egui::Context as EguiContext;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

const ROTATE_STEP: f32 = 5.0;
const ZOOM_STEP: f32 = 5.0;

#[derive(Parser)]
#[command(name = "cityscape-desktop", about = "Layered city scene viewer")]
struct Cli {
    /// City JSON files to load at startup
    files: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Initial rotation about Z, in degrees
    #[arg(long, default_value = "60")]
    rotation: f32,

    /// Initial zoom, in percent
    #[arg(long, default_value = "60")]
    zoom: f32,

    /// Initial projection: perspective or orthographic
    #[arg(long, default_value = "perspective")]
    projection: ProjectionMode,
}

/// A finished background file read.
struct LoadResult {
    path: PathBuf,
    result: Result<CityFile, LoadError>,
}

/// Renderer facts shown in the side panel, sampled once per frame.
struct RendererStatus {
    size: Viewport,
    format: wgpu::TextureFormat,
    lit_ready: bool,
    flat_ready: bool,
}

impl RendererStatus {
    fn sample(renderer: &WgpuRenderer) -> Self {
        Self {
            size: renderer.size(),
            format: renderer.surface_format(),
            lit_ready: renderer.is_compiled(LayerKind::Lit),
            flat_ready: renderer.is_compiled(LayerKind::Flat),
        }
    }
}

/// Application state.
struct AppState {
    camera: CameraState,
    layers: LayerCollection<GpuLayer>,
    commands: CommandQueue,
    load_tx: Sender<LoadResult>,
    load_rx: Receiver<LoadResult>,
    loads_in_flight: usize,
    file_path: String,
    error: Option<String>,
    show_panel: bool,
    last_frame: Instant,
}

impl AppState {
    fn new(cli: &Cli) -> Self {
        let (load_tx, load_rx) = channel();
        let mut state = Self {
            camera: CameraState::default(),
            layers: LayerCollection::new(),
            commands: CommandQueue::new(),
            load_tx,
            load_rx,
            loads_in_flight: 0,
            file_path: String::new(),
            error: None,
            show_panel: true,
            last_frame: Instant::now(),
        };

        state.dispatch(Action::SetRotation(cli.rotation));
        state.dispatch(Action::SetZoom(cli.zoom));
        state.dispatch(Action::SetProjection(cli.projection));
        for path in &cli.files {
            state.dispatch(Action::LoadFile(path.clone()));
        }
        if let Some(first) = cli.files.first() {
            state.file_path = first.display().to_string();
        }
        state
    }

    fn dispatch(&mut self, action: Action) {
        if action.apply_to_camera(&mut self.camera) {
            return;
        }
        if let Action::LoadFile(path) = action {
            self.load_file(path);
        } else if let Some(command) = action.scene_command() {
            self.commands.push(command);
        }
    }

    /// Read and parse on a worker thread; the result is picked up between frames.
    fn load_file(&mut self, path: PathBuf) {
        tracing::info!(path = %path.display(), "loading city file");
        let tx = self.load_tx.clone();
        self.loads_in_flight += 1;
        std::thread::spawn(move || {
            let result = CityFile::load(&path);
            let _ = tx.send(LoadResult { path, result });
        });
    }

    fn poll_loads(&mut self) {
        while let Ok(LoadResult { path, result }) = self.load_rx.try_recv() {
            self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
            match result {
                Ok(file) => {
                    tracing::info!(path = %path.display(), layers = file.len(), "queued layers");
                    self.commands.push(file.into_command());
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), "load failed: {e}");
                    self.error = Some(format!(
                        "{} does not follow the city file format:\n{e}",
                        path.display()
                    ));
                }
            }
        }
    }

    fn update(&mut self, dt: f32) {
        self.poll_loads();
        self.camera.advance(dt);
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if !pressed {
            return;
        }

        let action = match key {
            KeyCode::ArrowLeft => Action::SetRotation(self.camera.rotation_degrees - ROTATE_STEP),
            KeyCode::ArrowRight => Action::SetRotation(self.camera.rotation_degrees + ROTATE_STEP),
            KeyCode::ArrowUp => Action::SetZoom(self.camera.zoom_percent - ZOOM_STEP),
            KeyCode::ArrowDown => Action::SetZoom(self.camera.zoom_percent + ZOOM_STEP),
            KeyCode::KeyP => Action::ToggleProjection,
            KeyCode::KeyS => Action::ToggleSpin,
            KeyCode::F1 => {
                self.show_panel = !self.show_panel;
                Action::Noop
            }
            KeyCode::Escape => {
                self.error = None;
                Action::Noop
            }
            _ => Action::Noop,
        };
        self.dispatch(action);
    }

    fn draw_ui(&mut self, ctx: &EguiContext, status: &RendererStatus) {
        let mut actions = Vec::new();

        if let Some(message) = &self.error {
            let mut dismissed = false;
            egui::Window::new("Load failed")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(message);
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            if dismissed {
                self.error = None;
            }
        }

        if !self.show_panel {
            return;
        }

        egui::SidePanel::left("controls")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("City Scene");
                ui.separator();

                let mut rotation = self.camera.rotation_degrees;
                if ui
                    .add(egui::Slider::new(&mut rotation, 0.0..=360.0).text("Rotate"))
                    .changed()
                {
                    actions.push(Action::SetRotation(rotation));
                }

                let mut zoom = self.camera.zoom_percent;
                if ui
                    .add(
                        egui::Slider::new(&mut zoom, MIN_ZOOM_PERCENT..=MAX_ZOOM_PERCENT)
                            .text("Zoom %"),
                    )
                    .changed()
                {
                    actions.push(Action::SetZoom(zoom));
                }

                let mut projection = self.camera.projection;
                egui::ComboBox::from_label("Projection")
                    .selected_text(projection.label())
                    .show_ui(ui, |ui| {
                        for mode in [ProjectionMode::Perspective, ProjectionMode::Orthographic] {
                            ui.selectable_value(&mut projection, mode, mode.label());
                        }
                    });
                if projection != self.camera.projection {
                    actions.push(Action::SetProjection(projection));
                }

                let mut spin = self.camera.auto_spin;
                if ui.checkbox(&mut spin, "Auto spin").changed() {
                    actions.push(Action::ToggleSpin);
                }

                ui.separator();
                ui.heading("File");
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.file_path);
                    if ui.button("Load").clicked() && !self.file_path.trim().is_empty() {
                        actions.push(Action::LoadFile(PathBuf::from(self.file_path.trim())));
                    }
                });
                if self.loads_in_flight > 0 {
                    ui.label(format!("Loading {} file(s)...", self.loads_in_flight));
                }

                ui.separator();
                ui.heading("Layers");
                let c = self.layers.centroid();
                ui.label(format!("Centroid: ({:.1}, {:.1}, {:.1})", c.x, c.y, c.z));
                ui.label(format!(
                    "{} layers, {} vertices",
                    self.layers.len(),
                    self.layers.vertex_count()
                ));
                for layer in self.layers.iter() {
                    let gpu = layer.resources();
                    ui.horizontal(|ui| {
                        ui.label(format!(
                            "{} ({}, {} triangles)",
                            layer.name(),
                            gpu.kind(),
                            gpu.index_count() / 3
                        ));
                        if ui.small_button("Remove").clicked() {
                            actions.push(Action::RemoveLayer(layer.name().to_string()));
                        }
                    });
                }
                if !self.layers.is_empty() && ui.button("Clear all").clicked() {
                    actions.push(Action::ClearLayers);
                }

                ui.separator();
                ui.heading("Renderer");
                ui.label(format!(
                    "{}x{} {:?}",
                    status.size.width, status.size.height, status.format
                ));
                let ready = |compiled: bool| if compiled { "ready" } else { "not compiled" };
                ui.label(format!(
                    "lit program: {}, flat program: {}",
                    ready(status.lit_ready),
                    ready(status.flat_ready)
                ));

                ui.separator();
                ui.small("F1: Panel | Arrows: Rotate/Zoom | P: Projection | S: Spin");
            });

        for action in actions {
            self.dispatch(action);
        }
    }
}

struct GpuApp {
    state: AppState,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    renderer: Option<WgpuRenderer>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
}

impl GpuApp {
    fn new(state: AppState) -> Self {
        Self {
            state,
            window: None,
            surface: None,
            device: None,
            queue: None,
            config: None,
            renderer: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
        }
    }

    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Cityscape")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no compatible GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("cityscape_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let mut renderer = WgpuRenderer::new(&device, surface_format, config.width, config.height);
        if let Err(e) = renderer.warm_up(&device) {
            // Layers of the failed kind will report the error again when they load.
            self.state.error = Some(e.to_string());
        }

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        self.window = Some(window);
        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);
        self.renderer = Some(renderer);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);
        Ok(())
    }

    /// One frame: pick up loads, apply scene commands, draw the scene, draw the UI.
    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
        self.state.last_frame = now;
        self.state.update(dt);

        let Self {
            state,
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_ctx,
            egui_winit,
            egui_renderer,
        } = self;
        let (
            Some(window),
            Some(surface),
            Some(device),
            Some(queue),
            Some(config),
            Some(renderer),
            Some(egui_winit),
            Some(egui_renderer),
        ) = (
            window.as_ref(),
            surface.as_ref(),
            device.as_ref(),
            queue.as_ref(),
            config.as_ref(),
            renderer.as_mut(),
            egui_winit.as_mut(),
            egui_renderer.as_mut(),
        )
        else {
            return;
        };

        if !state.commands.is_empty() {
            let mut backend = renderer.backend(device);
            let reports = state.commands.apply_pending(&mut state.layers, &mut backend);
            if let Some(e) = reports.iter().flat_map(|r| r.failed.iter()).last() {
                state.error = Some(e.to_string());
            }
        }

        let output = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(device, config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let ctx = RenderContext::new(state.camera, Viewport::new(config.width, config.height));
        renderer.render(device, queue, &view, &ctx, &state.layers);

        let status = RendererStatus::sample(renderer);
        let raw_input = egui_winit.take_egui_input(window);
        let full_output = egui_ctx.run(raw_input, |ctx| {
            state.draw_ui(ctx, &status);
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [config.width, config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            egui_renderer.free_texture(id);
        }

        output.present();
        window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_gpu(event_loop) {
            tracing::error!("failed to initialize GPU: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            let response = egui_winit.on_window_event(window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(surface), Some(device), Some(config)) =
                    (&self.surface, &self.device, &mut self.config)
                {
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(device, config);
                    if let Some(renderer) = &mut self.renderer {
                        renderer.resize(device, config.width, config.height);
                    }
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                self.state
                    .handle_key(key, key_state == ElementState::Pressed);
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("cityscape-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(AppState::new(&cli));
    event_loop.run_app(&mut app)?;

    Ok(())
}
