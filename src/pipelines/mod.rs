//! Render pipelines: lit models, unlit screen surfaces and the light uniform they share.

pub mod basic;
pub mod light;
pub mod screen;

pub struct Pipelines {
    pub model: wgpu::RenderPipeline,
    pub screen: wgpu::RenderPipeline,
}
