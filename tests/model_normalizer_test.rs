use std::{sync::Arc, time::Duration};

use cgmath::{Deg, EuclideanSpace, Point3, Quaternion, Rotation3, Vector3};
use live_screen::{
    data_structures::{bounds::Aabb, instance::Instance, scene_graph::SceneNode},
    normalizer::{ModelLoad, ModelNormalizer},
};
use tokio::{runtime::Handle, time::sleep};

use crate::common::test_utils::{BoxLoader, BoxNode, FailingLoader, StalledLoader};

mod common;

fn laptop_normalizer() -> ModelNormalizer {
    ModelNormalizer::new(5.0, Vector3::new(0.4, 0.3, -0.5))
}

fn cube(min: f32, max: f32) -> Aabb {
    Aabb::new(Point3::new(min, min, min), Point3::new(max, max, max))
}

#[test]
fn placement_cancels_the_centroid_and_adds_the_offset() {
    let placed = laptop_normalizer().placement(&Instance::new(), Some(cube(0.0, 2.0)));
    // Centre (1, 1, 1) scaled by 5 is cancelled, then the offset applies
    assert_vec3_eq!(placed.position, Vector3::new(-4.6, -4.7, -5.5));
    assert_vec3_eq!(placed.scale, Vector3::new(5.0, 5.0, 5.0));
}

#[test]
fn placement_ignores_the_original_position_and_scale() {
    let normalizer = laptop_normalizer();
    let bounds = Some(cube(-1.0, 3.0));
    let a = normalizer.placement(&Instance::new(), bounds);
    let b = normalizer.placement(
        &Instance::placed(
            Vector3::new(10.0, -3.0, 7.0),
            Quaternion::new(1.0, 0.0, 0.0, 0.0),
            Vector3::new(0.3, 0.3, 0.3),
        ),
        bounds,
    );
    assert_eq!(a, b);
}

#[test]
fn placement_keeps_the_original_rotation() {
    let rotation = Quaternion::from_angle_y(Deg(90.0));
    let original = Instance::placed(Vector3::new(1.0, 2.0, 3.0), rotation, Vector3::new(2.0, 2.0, 2.0));
    let bounds = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 4.0));

    let placed = laptop_normalizer().placement(&original, Some(bounds));

    assert_eq!(placed.rotation, rotation);
    // Rotated about Y the box spans x in [0, 4] and z in [-2, 0]; its scaled centre is (10, 2.5, -5)
    assert_vec3_eq!(placed.position, Vector3::new(-9.6, -2.2, 4.5));
}

#[test]
fn placed_bounds_are_centred_on_the_offset() {
    let mut node = BoxNode::new(Some(Aabb::new(Point3::new(-3.0, 0.5, 2.0), Point3::new(1.0, 0.7, 2.2))))
        .with_transform(Instance::placed(
            Vector3::new(4.0, 4.0, 4.0),
            Quaternion::from_angle_z(Deg(30.0)),
            Vector3::new(0.1, 0.1, 0.1),
        ));
    let normalizer = laptop_normalizer();
    normalizer.apply(&mut node);

    let local = node.get_local_transform(0).unwrap();
    let world_bounds = node.local_bounds().unwrap().transformed(&local);
    assert_vec3_eq!(world_bounds.center().to_vec(), normalizer.offset);
    assert_vec3_eq!(local.scale, Vector3::new(5.0, 5.0, 5.0));
}

#[test]
fn model_without_geometry_sits_at_the_offset() {
    let mut node = BoxNode::new(None).with_transform(Instance::placed(
        Vector3::new(9.0, 9.0, 9.0),
        Quaternion::new(1.0, 0.0, 0.0, 0.0),
        Vector3::new(1.0, 1.0, 1.0),
    ));
    laptop_normalizer().apply(&mut node);
    assert_vec3_eq!(node.get_local_transform(0).unwrap().position, Vector3::new(0.4, 0.3, -0.5));
}

#[test]
fn child_bounds_follow_the_child_transform() {
    let child = BoxNode::new(Some(cube(0.0, 1.0))).with_transform(Instance::from(Vector3::new(3.0, 0.0, 0.0)));
    let mut root = BoxNode::new(None);
    root.add_child(Box::new(child));

    let bounds = root.local_bounds().unwrap();
    assert_eq!(bounds, Aabb::new(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0)));

    laptop_normalizer().apply(&mut root);
    // Centre (3.5, 0.5, 0.5) scaled by 5
    assert_vec3_eq!(
        root.get_local_transform(0).unwrap().position,
        Vector3::new(0.4 - 17.5, 0.3 - 2.5, -0.5 - 2.5)
    );
}

#[test]
fn transformed_box_encloses_the_rotated_corners() {
    let rotated = cube(-1.0, 1.0).transformed(&Instance::placed(
        Vector3::new(0.0, 0.0, 0.0),
        Quaternion::from_angle_z(Deg(45.0)),
        Vector3::new(1.0, 1.0, 1.0),
    ));
    let half_diagonal = 2.0_f32.sqrt();
    assert!((rotated.max.x - half_diagonal).abs() < 1e-4);
    assert!((rotated.min.y + half_diagonal).abs() < 1e-4);
    assert!((rotated.max.z - 1.0).abs() < 1e-4);
}

#[tokio::test(start_paused = true)]
async fn stalled_load_stays_pending_without_timeout() {
    let mut load = ModelLoad::spawn(
        &Handle::current(),
        Arc::new(StalledLoader),
        "model/laptop.glb",
        laptop_normalizer(),
        None,
    );

    sleep(Duration::from_secs(600)).await;
    assert!(!load.poll());
    assert!(load.state().is_pending());
    assert!(load.model().is_none());
}

#[tokio::test(start_paused = true)]
async fn stalled_load_fails_after_the_timeout() {
    let mut load = ModelLoad::spawn(
        &Handle::current(),
        Arc::new(StalledLoader),
        "model/laptop.glb",
        laptop_normalizer(),
        Some(Duration::from_secs(30)),
    );

    sleep(Duration::from_secs(29)).await;
    assert!(!load.poll());
    assert!(load.state().is_pending());

    sleep(Duration::from_secs(2)).await;
    assert!(!load.poll());
    assert!(load.state().is_failed());
    assert!(format!("{:?}", load.state()).contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn loaded_model_is_normalized_once_ready() {
    let loader = BoxLoader {
        bounds: cube(0.0, 2.0),
        original: Instance::from(Vector3::new(100.0, 0.0, 0.0)),
        delay: Duration::from_millis(250),
    };
    let mut load = ModelLoad::spawn(
        &Handle::current(),
        Arc::new(loader),
        "model/laptop.glb",
        laptop_normalizer(),
        Some(Duration::from_secs(30)),
    );

    sleep(Duration::from_millis(100)).await;
    assert!(!load.poll());

    sleep(Duration::from_millis(200)).await;
    assert!(load.poll());
    assert!(load.state().is_ready());
    // Readiness is reported once
    assert!(!load.poll());

    let placed = load.model().unwrap().get_local_transform(0).unwrap();
    assert_vec3_eq!(placed.position, Vector3::new(-4.6, -4.7, -5.5));
    assert_vec3_eq!(placed.scale, Vector3::new(5.0, 5.0, 5.0));
}

#[tokio::test]
async fn failed_load_is_reported() {
    let mut load = ModelLoad::spawn(
        &Handle::current(),
        Arc::new(FailingLoader("malformed asset")),
        "model/broken.glb",
        laptop_normalizer(),
        None,
    );

    for _ in 0..100 {
        if load.poll() || !load.state().is_pending() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(load.state().is_failed());
    assert!(load.model().is_none());
    assert!(format!("{:?}", load.state()).contains("malformed asset"));
}
