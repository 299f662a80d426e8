//! Uploads snapshots through the real GPU bridge and reads them back.
//!
//! Needs an adapter, so it only runs with `--features integration-tests`.
//! Machines without any adapter skip the checks.

#[cfg(feature = "integration-tests")]
mod gpu {
    use std::time::Duration;

    use image::RgbaImage;
    use live_screen::{
        bridge::{GpuTextureBridge, SurfaceTextureSlot, TextureBridge},
        capture::Snapshot,
        data_structures::texture::Texture,
    };

    async fn device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .ok()
    }

    fn read_back(device: &wgpu::Device, queue: &wgpu::Queue, texture: &Texture) -> RgbaImage {
        let size = texture.texture.size();
        let padded_row = (4 * size.width).div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("read back"),
            size: (padded_row * size.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(size.height),
                },
            },
            size,
        );
        queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(3)),
            })
            .unwrap();
        rx.recv().unwrap().unwrap();

        let data = slice.get_mapped_range();
        let mut image = RgbaImage::new(size.width, size.height);
        for (y, row) in data.chunks(padded_row as usize).enumerate() {
            for x in 0..size.width {
                let i = (4 * x) as usize;
                image.put_pixel(x, y as u32, image::Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]));
            }
        }
        image
    }

    #[tokio::test]
    async fn snapshot_pixels_survive_the_upload() {
        let Some((device, queue)) = device().await else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(2, 1, image::Rgba([0, 0, 255, 255]));

        let bridge = GpuTextureBridge::new(device.clone(), queue.clone());
        let texture = bridge.upload(&Snapshot { cycle: 1, image: image.clone() }).unwrap();

        assert_eq!(texture.texture.format(), wgpu::TextureFormat::Rgba8UnormSrgb);
        assert_eq!(read_back(&device, &queue, &texture), image);
    }

    #[tokio::test]
    async fn every_upload_is_a_fresh_texture() {
        let Some((device, queue)) = device().await else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let bridge = GpuTextureBridge::new(device.clone(), queue.clone());
        let slot = SurfaceTextureSlot::new();
        for (cycle, value) in [(1, 10u8), (2, 20u8)] {
            let image = RgbaImage::from_pixel(2, 2, image::Rgba([value, value, value, 255]));
            let texture = bridge.upload(&Snapshot { cycle, image }).unwrap();
            slot.publish(cycle, texture);
        }

        let latest = slot.latest().unwrap();
        assert_eq!(latest.cycle, 2);
        let pixels = read_back(&device, &queue, &latest.texture);
        assert_eq!(pixels.get_pixel(1, 1), &image::Rgba([20, 20, 20, 255]));
    }

    #[tokio::test]
    async fn empty_snapshot_is_rejected() {
        let Some((device, queue)) = device().await else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let bridge = GpuTextureBridge::new(device, queue);
        let result = bridge.upload(&Snapshot {
            cycle: 1,
            image: RgbaImage::new(0, 0),
        });
        assert!(result.is_err());
    }
}
