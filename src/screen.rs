//! The screen surface: a fixed quad showing the latest captured page.

use cgmath::{Euler, Quaternion, Rad, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    bridge::{Published, SurfaceTextureSlot},
    config::ScreenConfig,
    data_structures::{
        instance::{Instance, InstanceRaw},
        model::{ModelVertex, texture_bind_group},
        texture::Texture,
    },
    render::Flat,
};

/// Tracks which published texture a surface has attached.
///
/// Holds at most one texture. A refresh that finds a newer publish replaces
/// it; the old one is dropped on the spot.
pub struct TextureBinding<T> {
    seen: u64,
    current: Option<Published<T>>,
}

impl<T> Default for TextureBinding<T> {
    fn default() -> Self {
        Self {
            seen: 0,
            current: None,
        }
    }
}

impl<T: Clone> TextureBinding<T> {
    /// Attaches the slot's texture if it is newer than the attached one.
    /// Returns whether the attachment changed.
    pub fn refresh(&mut self, slot: &SurfaceTextureSlot<T>) -> bool {
        match slot.read_if_newer(self.seen) {
            Some(published) => {
                self.seen = published.generation;
                self.current = Some(published);
                true
            }
            None => false,
        }
    }
}

impl<T> TextureBinding<T> {
    pub fn current(&self) -> Option<&Published<T>> {
        self.current.as_ref()
    }

    /// Whether a colour map is attached. False until the first capture lands.
    pub fn has_map(&self) -> bool {
        self.current.is_some()
    }
}

/// Vertices and indices of a `width` x `height` plane centred on the origin,
/// facing +Z, with texture coordinate (0, 0) in the top-left corner.
pub fn plane_geometry(width: f32, height: f32) -> (Vec<ModelVertex>, Vec<u32>) {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        ModelVertex {
            position: [-hw, -hh, 0.0],
            tex_coords: [0.0, 1.0],
            normal,
        },
        ModelVertex {
            position: [hw, -hh, 0.0],
            tex_coords: [1.0, 1.0],
            normal,
        },
        ModelVertex {
            position: [hw, hh, 0.0],
            tex_coords: [1.0, 0.0],
            normal,
        },
        ModelVertex {
            position: [-hw, hh, 0.0],
            tex_coords: [0.0, 0.0],
            normal,
        },
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

/// The placement of the screen quad in world space.
pub fn screen_instance(config: &ScreenConfig) -> Instance {
    let rotation: Quaternion<f32> = Euler {
        x: Rad(config.rotation.x),
        y: Rad(config.rotation.y),
        z: Rad(config.rotation.z),
    }
    .into();
    Instance::placed(config.position, rotation, Vector3::new(1.0, 1.0, 1.0))
}

pub struct ScreenSurface {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    num_indices: u32,
    layout: wgpu::BindGroupLayout,
    fallback: wgpu::BindGroup,
    bound: Option<wgpu::BindGroup>,
    binding: TextureBinding<Texture>,
}

impl ScreenSurface {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: &ScreenConfig, layout: &wgpu::BindGroupLayout) -> Self {
        let (vertices, indices) = plane_geometry(config.width, config.height);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Screen Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Screen Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let raw: [InstanceRaw; 1] = [screen_instance(config).to_raw()];
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Screen Instance Buffer"),
            contents: bytemuck::cast_slice(&raw),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let blank = Texture::from_color(device, queue, [255; 4], "blank screen");
        let fallback = texture_bind_group(device, &blank, layout, "blank screen");

        Self {
            vertex_buffer,
            index_buffer,
            instance_buffer,
            num_indices: indices.len() as u32,
            layout: layout.clone(),
            fallback,
            bound: None,
            binding: TextureBinding::default(),
        }
    }

    /// Picks up a newer snapshot texture from `slot`, if there is one.
    pub fn sync(&mut self, device: &wgpu::Device, slot: &SurfaceTextureSlot<Texture>) -> bool {
        if !self.binding.refresh(slot) {
            return false;
        }
        let Some(published) = self.binding.current() else {
            return false;
        };
        let label = format!("screen snapshot #{}", published.cycle);
        self.bound = Some(texture_bind_group(device, &published.texture, &self.layout, &label));
        true
    }

    pub fn has_map(&self) -> bool {
        self.binding.has_map()
    }

    pub fn render(&self) -> Flat<'_> {
        Flat {
            vertex: &self.vertex_buffer,
            index: &self.index_buffer,
            instance: &self.instance_buffer,
            group: self.bound.as_ref().unwrap_or(&self.fallback),
            amount: self.num_indices,
        }
    }
}
