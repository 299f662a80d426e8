//! Flow control and application event loop.
//!
//! A "flow" is a self-contained part of the scene that handles input, updates
//! its state and describes what to draw every frame. The event loop owns the
//! window, the GPU [`Context`] and a tokio runtime for background work.
//!
//! # Lifecycle Flow
//!
//! The event loop follows this pattern each frame:
//! 1. Collect window/device events and forward them to the flows
//! 2. Update the orbit camera and call `on_update` on all flows
//! 3. Collect every flow's [`Render`] and batch it per pipeline
//! 4. Draw lit models, then unlit surfaces, and present the frame
//!
//! Flows are dropped before the event loop exits, so anything they hold
//! (capture timers, load tasks) is released on close.

use std::{iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    config::SceneConfig,
    context::{Context, InitContext},
    data_structures::{model::DrawModel, texture::Texture},
    render::{Flat, Instanced, Render},
};

/// Trait for implementing a part of the rendered scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once after construction; it may adjust the context
/// 2. `on_window_events()` and `on_device_events()` are called for each winit input event
/// 3. `on_update()` is called every frame before rendering
/// 4. `on_render()` is called each frame and specifies how to render `self`
pub trait GraphicsFlow {
    /// Start background work and configure the context (clear colour, camera).
    fn on_init(&mut self, ctx: &mut Context);

    /// Update state every frame with the elapsed time `dt`.
    fn on_update(&mut self, ctx: &Context, dt: Duration);

    /// Handle raw device events (mouse motion, keys).
    fn on_device_events(&mut self, ctx: &Context, event: &DeviceEvent);

    /// Handle window events (mouse buttons, resizing, ...).
    fn on_window_events(&mut self, ctx: &Context, event: &WindowEvent);

    /// Return renderable objects for this flow.
    fn on_render(&self) -> Render<'_>;
}

/// A flow factory. It receives the GPU handles and asynchronously returns the flow.
pub type FlowConstructor =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = anyhow::Result<Box<dyn GraphicsFlow>>>>>>;

/// GPU context plus surface status.
pub struct AppState {
    pub(crate) ctx: Context,
    is_surface_configured: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, scene: SceneConfig, runtime: tokio::runtime::Handle) -> anyhow::Result<Self> {
        let ctx = Context::new(window, scene, runtime).await?;
        Ok(Self {
            ctx,
            is_surface_configured: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.config.width = width;
            self.ctx.config.height = height;
            self.is_surface_configured = true;
            self.ctx.projection.resize(width, height);
            self.ctx.surface.configure(&self.ctx.device, &self.ctx.config);
            self.ctx.depth_texture = Texture::create_depth_texture(
                &self.ctx.device,
                [self.ctx.config.width, self.ctx.config.height],
                "depth_texture",
            );
        }
    }

    fn render(&mut self, graphics_flows: &[Box<dyn GraphicsFlow>]) -> Result<(), wgpu::SurfaceError> {
        // The render loop runs continuously, one redraw request per frame
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut models: Vec<Instanced> = Vec::new();
            let mut surfaces: Vec<Flat> = Vec::new();
            for flow in graphics_flows {
                flow.on_render().set_pipelines(&mut models, &mut surfaces);
            }
            self.draw_models(&mut render_pass, models);
            self.draw_surfaces(&mut render_pass, surfaces);
        }

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl AppState {
    fn draw_models(&self, pass: &mut wgpu::RenderPass<'_>, models: Vec<Instanced>) {
        pass.set_pipeline(&self.ctx.pipelines.model);
        for instanced in models {
            if instanced.amount == 0 || instanced.instance.size() == 0 {
                log::warn!("skipping a model batch without instances");
                continue;
            }
            pass.set_vertex_buffer(1, instanced.instance.slice(..));
            pass.draw_model_instanced(
                instanced.model,
                0..instanced.amount as u32,
                &self.ctx.camera.bind_group,
                &self.ctx.light.bind_group,
            );
        }
    }

    // Surfaces are unlit single quads sharing the camera bind group
    fn draw_surfaces(&self, pass: &mut wgpu::RenderPass<'_>, surfaces: Vec<Flat>) {
        if surfaces.is_empty() {
            return;
        }
        pass.set_pipeline(&self.ctx.pipelines.screen);
        pass.set_bind_group(1, &self.ctx.camera.bind_group, &[]);
        for surface in surfaces {
            pass.set_bind_group(0, surface.group, &[]);
            pass.set_vertex_buffer(0, surface.vertex.slice(..));
            pass.set_vertex_buffer(1, surface.instance.slice(..));
            pass.set_index_buffer(surface.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..surface.amount, 0, 0..1);
        }
    }
}

pub struct App {
    async_runtime: tokio::runtime::Runtime,
    scene: SceneConfig,
    state: Option<AppState>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow>>,
    // Taken on first resume
    constructors: Option<Vec<FlowConstructor>>,
    last_time: Instant,
}

impl App {
    fn new(scene: SceneConfig, constructors: Vec<FlowConstructor>) -> anyhow::Result<Self> {
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            async_runtime,
            scene,
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
        })
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let Some(constructors) = self.constructors.take() else {
            return Ok(());
        };
        let window_attributes = Window::default_attributes().with_title("live-screen");
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let scene = self.scene.clone();
        let handle = self.async_runtime.handle().clone();
        let init_future = async move {
            let app_state = AppState::new(window, scene, handle).await?;
            let flow_futures: Vec<_> = constructors
                .into_iter()
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows = futures::future::join_all(flow_futures)
                .await
                .into_iter()
                .collect::<anyhow::Result<Vec<_>>>()?;
            anyhow::Ok((app_state, flows))
        };

        let (mut app_state, flows) = self.async_runtime.block_on(init_future)?;
        self.graphics_flows = flows;
        self.graphics_flows
            .iter_mut()
            .for_each(|flow| flow.on_init(&mut app_state.ctx));
        let size = app_state.ctx.window.inner_size();
        app_state.resize(size.width, size.height);
        app_state.ctx.window.request_redraw();
        self.state = Some(app_state);
        self.last_time = Instant::now();
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        // Dropping the flows unmounts their capture timers before the window goes away
        self.graphics_flows.clear();
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.init(event_loop) {
            log::error!("App initialization failed: {:#}", e);
            event_loop.exit();
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            state.ctx.camera.controller.handle_mouse(dx, dy);
        }
        self.graphics_flows
            .iter_mut()
            .for_each(|f| f.on_device_events(&state.ctx, &event));
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: winit::window::WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.ctx.camera.controller.handle_window_events(&event);
        self.graphics_flows
            .iter_mut()
            .for_each(|f| f.on_window_events(&state.ctx, &event));

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                state
                    .ctx
                    .camera
                    .controller
                    .set_dragging(button_state == ElementState::Pressed);
            }
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                state
                    .ctx
                    .camera
                    .controller
                    .update(&mut state.ctx.camera.camera);
                state.ctx.write_camera();
                self.graphics_flows
                    .iter_mut()
                    .for_each(|f| f.on_update(&state.ctx, dt));

                match state.render(&self.graphics_flows) {
                    Ok(_) => {}
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("out of GPU memory, exiting");
                        self.shutdown(event_loop);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Opens the window and runs `constructors` until the window is closed.
pub fn run(scene: SceneConfig, constructors: Vec<FlowConstructor>) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(scene, constructors)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
