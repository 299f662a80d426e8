//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU texture resources,
//! with constructors for the depth buffer, decoded images, raw RGBA bitmaps
//! (the captured screen snapshots) and single-colour fallbacks.

use anyhow::*;
use image::{ImageFormat, RgbaImage, load_from_memory_with_format};

/// A GPU texture with a view and optional sampler.
///
/// Cloning is cheap: the WGPU handles are reference counted, so a clone points
/// at the same GPU allocation. The allocation is released once the last clone
/// is dropped.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Depth attachment matching a surface of `size` pixels (clamped to 1x1).
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let texture = device.create_texture(&texture_2d(
            Some(label),
            extent(size[0].max(1), size[1].max(1)),
            Self::DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        ));
        Self::with_sampler(texture, None)
    }

    /// A 1x1 texture of a single sRGB colour.
    ///
    /// Used for materials that only carry a base colour factor and as the
    /// screen surface's map before the first snapshot arrives.
    pub fn from_color(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4], label: &str) -> Texture {
        let pixel = RgbaImage::from_pixel(1, 1, image::Rgba(rgba));
        Self::from_rgba(device, queue, &pixel, Some(label))
    }

    /// Decode an encoded image (PNG, JPEG, ...) and upload it.
    ///
    /// `format` is a file extension hint such as "png"; without one the format
    /// is guessed from the bytes.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
    ) -> Result<Self> {
        let decoded = match format.and_then(ImageFormat::from_extension) {
            Some(format) => load_from_memory_with_format(bytes, format)?,
            None => image::load_from_memory(bytes)?,
        };
        Ok(Self::from_rgba(device, queue, &decoded.to_rgba8(), Some(label)))
    }

    /// Upload an RGBA bitmap as a fresh sRGB texture.
    ///
    /// The texture keeps `COPY_SRC` so its contents can be read back.
    pub fn from_rgba(device: &wgpu::Device, queue: &wgpu::Queue, rgba: &RgbaImage, label: Option<&str>) -> Self {
        let (width, height) = rgba.dimensions();
        let size = extent(width, height);
        let texture = device.create_texture(&texture_2d(
            label,
            size,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
        ));
        queue.write_texture(
            texture.as_image_copy(),
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let sampler = create_default_sampler(device);
        Self::with_sampler(texture, Some(sampler))
    }

    fn with_sampler(texture: wgpu::Texture, sampler: Option<wgpu::Sampler>) -> Self {
        let view = texture.create_view(&Default::default());
        Self {
            texture,
            view,
            sampler,
        }
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn texture_2d<'a>(
    label: Option<&'a str>,
    size: wgpu::Extent3d,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> wgpu::TextureDescriptor<'a> {
    wgpu::TextureDescriptor {
        label,
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    }
}

/// Linear filtering, clamped at the edges.
pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}
