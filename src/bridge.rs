//! Snapshot to texture conversion and the slot that hands textures to the renderer.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{capture::Snapshot, data_structures::texture::Texture};

/// Turns a captured bitmap into something the renderer can sample.
///
/// Every call allocates a fresh texture. Nothing is cached or pooled; the
/// previous texture is released once the slot drops its last reference.
pub trait TextureBridge: Send + Sync + 'static {
    type Texture: Send + 'static;

    fn upload(&self, snapshot: &Snapshot) -> anyhow::Result<Self::Texture>;
}

/// Uploads snapshots as sRGB RGBA8 textures with linear filtering.
#[derive(Clone, Debug)]
pub struct GpuTextureBridge {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuTextureBridge {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

impl TextureBridge for GpuTextureBridge {
    type Texture = Texture;

    fn upload(&self, snapshot: &Snapshot) -> anyhow::Result<Texture> {
        let (width, height) = snapshot.image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("snapshot #{} is empty", snapshot.cycle);
        }
        let label = format!("snapshot #{}", snapshot.cycle);
        Ok(Texture::from_rgba(&self.device, &self.queue, &snapshot.image, Some(&label)))
    }
}

/// A texture published into a [`SurfaceTextureSlot`].
#[derive(Clone, Debug)]
pub struct Published<T> {
    /// Increases by one with every publish, starting at 1.
    pub generation: u64,
    /// The capture cycle the texture was made from.
    pub cycle: u64,
    pub texture: T,
}

struct SlotState<T> {
    generation: u64,
    current: Option<(u64, T)>,
}

/// Single-writer, single-reader cell holding the latest texture.
///
/// The capture pipeline publishes, the render loop reads once per frame.
/// Readers always observe the most recently completed publish.
pub struct SurfaceTextureSlot<T> {
    inner: Arc<Mutex<SlotState<T>>>,
}

impl<T> Clone for SurfaceTextureSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for SurfaceTextureSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SurfaceTextureSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotState {
                generation: 0,
                current: None,
            })),
        }
    }

    /// Replaces the current texture and returns the new generation.
    pub fn publish(&self, cycle: u64, texture: T) -> u64 {
        let (generation, previous) = {
            let mut state = self.inner.lock();
            state.generation += 1;
            let previous = state.current.replace((cycle, texture));
            (state.generation, previous)
        };
        // Release the superseded texture outside the lock
        drop(previous);
        generation
    }

    /// Number of publishes so far. Zero means nothing was ever captured.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().current.is_none()
    }
}

impl<T: Clone> SurfaceTextureSlot<T> {
    pub fn latest(&self) -> Option<Published<T>> {
        self.read_if_newer(0)
    }

    /// The current texture if it was published after generation `seen`.
    pub fn read_if_newer(&self, seen: u64) -> Option<Published<T>> {
        let state = self.inner.lock();
        if state.generation <= seen {
            return None;
        }
        state.current.as_ref().map(|(cycle, texture)| Published {
            generation: state.generation,
            cycle: *cycle,
            texture: texture.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_has_nothing_to_read() {
        let slot: SurfaceTextureSlot<u8> = SurfaceTextureSlot::new();
        assert_eq!(slot.generation(), 0);
        assert!(slot.is_empty());
        assert!(slot.latest().is_none());
    }

    #[test]
    fn publish_supersedes_previous_texture() {
        let slot = SurfaceTextureSlot::new();
        assert_eq!(slot.publish(1, "first"), 1);
        assert_eq!(slot.publish(3, "third"), 2);

        let latest = slot.latest().unwrap();
        assert_eq!(latest.generation, 2);
        assert_eq!(latest.cycle, 3);
        assert_eq!(latest.texture, "third");
    }

    #[test]
    fn read_if_newer_skips_seen_generations() {
        let slot = SurfaceTextureSlot::new();
        let reader = slot.clone();
        slot.publish(1, 10u32);
        assert_eq!(reader.read_if_newer(0).map(|p| p.texture), Some(10));
        assert!(reader.read_if_newer(1).is_none());
        slot.publish(2, 20u32);
        assert_eq!(reader.read_if_newer(1).map(|p| p.texture), Some(20));
    }

    #[test]
    fn superseded_texture_is_released() {
        let slot = SurfaceTextureSlot::new();
        let first = Arc::new(1);
        slot.publish(1, first.clone());
        assert_eq!(Arc::strong_count(&first), 2);
        slot.publish(2, Arc::new(2));
        assert_eq!(Arc::strong_count(&first), 1);
    }
}
