use std::{sync::Arc, time::Duration};

use cgmath::{InnerSpace, Vector3};
use live_screen::{
    bridge::SurfaceTextureSlot,
    capture::{CaptureSettings, OverlapPolicy, SnapshotCapturer},
    config::ScreenConfig,
    screen::{TextureBinding, plane_geometry, screen_instance},
};
use tokio::{runtime::Handle, time::sleep};

use crate::common::test_utils::{FakeTexture, PixelBridge, ScriptedSource, Step};

mod common;

#[test]
fn binding_starts_without_a_map() {
    let slot: SurfaceTextureSlot<u32> = SurfaceTextureSlot::new();
    let mut binding = TextureBinding::default();
    assert!(!binding.refresh(&slot));
    assert!(!binding.has_map());
    assert!(binding.current().is_none());
}

#[test]
fn binding_attaches_only_the_latest_texture() {
    let slot = SurfaceTextureSlot::new();
    let mut binding = TextureBinding::default();

    slot.publish(1, "one");
    slot.publish(2, "two");
    assert!(binding.refresh(&slot));
    let current = binding.current().unwrap();
    assert_eq!(current.texture, "two");
    assert_eq!(current.generation, 2);

    // Nothing new, nothing changes
    assert!(!binding.refresh(&slot));
    assert_eq!(binding.current().unwrap().texture, "two");
}

#[test]
fn replaced_texture_is_released_by_the_binding() {
    let slot = SurfaceTextureSlot::new();
    let mut binding = TextureBinding::default();
    let first = Arc::new(1u8);

    slot.publish(1, first.clone());
    binding.refresh(&slot);
    assert_eq!(Arc::strong_count(&first), 3);

    slot.publish(2, Arc::new(2u8));
    binding.refresh(&slot);
    assert_eq!(Arc::strong_count(&first), 1);
}

#[tokio::test(start_paused = true)]
async fn surface_shows_the_first_capture_after_one_interval() {
    let slot = SurfaceTextureSlot::new();
    let settings = CaptureSettings {
        interval: Duration::from_millis(1000),
        overlap: OverlapPolicy::SkipWhileInFlight,
    };
    let _handle = SnapshotCapturer::new(
        ScriptedSource::new(vec![Step::ok(1), Step::ok(2)]),
        PixelBridge,
        slot.clone(),
        settings,
    )
    .mount(&Handle::current());
    let mut binding = TextureBinding::default();

    sleep(Duration::from_millis(500)).await;
    assert!(!binding.refresh(&slot));
    assert!(!binding.has_map());

    sleep(Duration::from_millis(1000)).await;
    assert!(binding.refresh(&slot));
    assert_eq!(binding.current().unwrap().texture, FakeTexture { pixel: 1, cycle: 1 });

    sleep(Duration::from_millis(1000)).await;
    assert!(binding.refresh(&slot));
    assert_eq!(binding.current().unwrap().texture, FakeTexture { pixel: 2, cycle: 2 });
}

#[test]
fn plane_faces_forward_with_top_left_origin() {
    let (vertices, indices) = plane_geometry(0.8, 0.5);
    assert_eq!(vertices.len(), 4);
    assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);

    let xs = vertices.iter().map(|v| v.position[0]);
    let ys = vertices.iter().map(|v| v.position[1]);
    assert!((xs.clone().fold(f32::MIN, f32::max) - xs.fold(f32::MAX, f32::min) - 0.8).abs() < 1e-6);
    assert!((ys.clone().fold(f32::MIN, f32::max) - ys.fold(f32::MAX, f32::min) - 0.5).abs() < 1e-6);

    let top_left = vertices
        .iter()
        .find(|v| v.position[0] < 0.0 && v.position[1] > 0.0)
        .unwrap();
    assert_eq!(top_left.tex_coords, [0.0, 0.0]);

    for triangle in indices.chunks(3) {
        let [a, b, c] = [0, 1, 2].map(|i| Vector3::from(vertices[triangle[i] as usize].position));
        // Counter-clockwise when seen from +Z
        assert!((b - a).cross(c - a).z > 0.0);
    }
}

#[test]
fn screen_is_placed_and_tilted_back() {
    let config = ScreenConfig::default();
    let instance = screen_instance(&config);
    assert_eq!(instance.position, Vector3::new(0.4, 0.8, -0.3));

    let up = instance.rotation * Vector3::unit_y();
    assert!((up.y - 0.2_f32.cos()).abs() < 1e-5);
    assert!((up.z + 0.2_f32.sin()).abs() < 1e-5);
    assert!((up.magnitude() - 1.0).abs() < 1e-5);
}
