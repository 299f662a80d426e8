//! The laptop scene: a normalized laptop model next to a live screen surface.
//!
//! Both children share the scene's coordinate space and nothing else. The
//! model arrives once from a background load; the screen texture is replaced
//! by the capture pipeline every interval.

use std::sync::Arc;

use instant::Duration;
use winit::event::{DeviceEvent, WindowEvent};

use crate::{
    bridge::{GpuTextureBridge, SurfaceTextureSlot},
    capture::{
        CaptureHandle, CaptureSettings, CaptureSource, FixturePageSource, HeadlessBrowserSource, SnapshotCapturer,
        Viewport,
    },
    config::{CaptureBackend, CaptureConfig},
    context::{Context, InitContext},
    data_structures::texture::Texture,
    flow::{FlowConstructor, GraphicsFlow},
    normalizer::{GltfLoader, ModelLoad, ModelNormalizer},
    render::Render,
    screen::ScreenSurface,
};

/// Builds the page source selected by `config`.
pub fn capture_source(config: &CaptureConfig) -> Box<dyn CaptureSource> {
    match &config.backend {
        CaptureBackend::HeadlessBrowser { program, timeout } => Box::new(HeadlessBrowserSource::new(
            Viewport::new(config.url.clone(), config.width, config.height),
            program.clone(),
            *timeout,
        )),
        CaptureBackend::Fixture { path } => Box::new(FixturePageSource::new(path.clone(), config.width, config.height)),
    }
}

pub struct LaptopScene {
    capturer: Option<SnapshotCapturer<Box<dyn CaptureSource>, GpuTextureBridge>>,
    capture: Option<CaptureHandle>,
    slot: SurfaceTextureSlot<Texture>,
    screen: ScreenSurface,
    model: ModelLoad,
}

impl LaptopScene {
    /// Creates the screen and starts loading the model. Capturing starts on init.
    pub fn new(init: &InitContext) -> Self {
        let scene = &init.scene;
        let slot = SurfaceTextureSlot::new();
        let capturer = SnapshotCapturer::new(
            capture_source(&scene.capture),
            GpuTextureBridge::new(init.device.clone(), init.queue.clone()),
            slot.clone(),
            CaptureSettings::from(&scene.capture),
        );
        let screen = ScreenSurface::new(&init.device, &init.queue, &scene.screen, &init.texture_layout);
        let model = ModelLoad::spawn(
            &init.runtime,
            Arc::new(GltfLoader::new(init.device.clone(), init.queue.clone())),
            scene.model.path.clone(),
            ModelNormalizer::from(&scene.model),
            scene.model.load_timeout,
        );
        Self {
            capturer: Some(capturer),
            capture: None,
            slot,
            screen,
            model,
        }
    }

    pub fn constructor() -> FlowConstructor {
        Box::new(|init: InitContext| {
            Box::pin(async move {
                let scene: Box<dyn GraphicsFlow> = Box::new(LaptopScene::new(&init));
                Ok(scene)
            })
        })
    }
}

impl GraphicsFlow for LaptopScene {
    fn on_init(&mut self, ctx: &mut Context) {
        ctx.clear_colour = wgpu::Color {
            r: 0.02,
            g: 0.02,
            b: 0.03,
            a: 1.0,
        };
        if let Some(capturer) = self.capturer.take() {
            self.capture = Some(capturer.mount(&ctx.runtime));
        }
    }

    fn on_update(&mut self, ctx: &Context, _dt: Duration) {
        if self.screen.sync(&ctx.device, &self.slot) {
            log::trace!("screen texture replaced");
        }
        if self.model.poll() {
            if let Some(model) = self.model.model_mut() {
                model.update_world_transform_all();
                model.write_to_buffers(&ctx.queue);
            }
        }
    }

    fn on_device_events(&mut self, _ctx: &Context, _event: &DeviceEvent) {}

    fn on_window_events(&mut self, _ctx: &Context, _event: &WindowEvent) {}

    fn on_render(&self) -> Render<'_> {
        let model = match self.model.model() {
            Some(node) => Render::from(node),
            None => Render::None,
        };
        Render::Composed(vec![model, Render::Surface(self.screen.render())])
    }
}
