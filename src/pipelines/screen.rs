use crate::pipelines::basic::mk_render_pipeline;

/// Unlit pipeline for textured surfaces: texture (group 0), camera (group 1).
///
/// Captured pages are shown as they are, so lighting does not apply.
pub fn mk_screen_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    texture_bind_group_layout: &wgpu::BindGroupLayout,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Screen Pipeline Layout"),
        bind_group_layouts: &[texture_bind_group_layout, camera_bind_group_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Screen Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("screen.wgsl").into()),
    };
    mk_render_pipeline(device, &layout, format, wgpu::BlendState::REPLACE, shader)
}
