//! Model placement and the one-shot model load.
//!
//! A loaded model is scaled uniformly, recentred on the centre of its
//! bounding box and then moved by a fixed offset. Loading runs on the tokio
//! runtime and its outcome is tracked explicitly in a [`ModelSlot`].

use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use cgmath::{EuclideanSpace, Vector3};
use futures::{FutureExt, future::BoxFuture};
use tokio::{
    runtime::Handle,
    sync::oneshot::{self, error::TryRecvError},
    task::JoinHandle,
};

use crate::{
    config::ModelConfig,
    data_structures::{bounds::Aabb, instance::Instance, scene_graph::SceneNode},
    resources,
};

/// Produces scene graph nodes from model files.
pub trait AssetLoader: Send + Sync + 'static {
    fn load(&self, path: &str) -> BoxFuture<'static, anyhow::Result<Box<dyn SceneNode>>>;
}

/// Loads glTF / GLB files from the asset directory onto the GPU.
#[derive(Clone, Debug)]
pub struct GltfLoader {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GltfLoader {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }
}

impl AssetLoader for GltfLoader {
    fn load(&self, path: &str) -> BoxFuture<'static, anyhow::Result<Box<dyn SceneNode>>> {
        let path = path.to_string();
        let device = self.device.clone();
        let queue = self.queue.clone();
        async move { resources::load_model_gltf(&path, &device, &queue).await }.boxed()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelNormalizer {
    pub scale: f32,
    pub offset: Vector3<f32>,
}

impl From<&ModelConfig> for ModelNormalizer {
    fn from(config: &ModelConfig) -> Self {
        Self {
            scale: config.scale,
            offset: config.offset,
        }
    }
}

impl ModelNormalizer {
    pub fn new(scale: f32, offset: Vector3<f32>) -> Self {
        Self { scale, offset }
    }

    /// The root transform that places a model with local bounds `bounds`.
    ///
    /// Only the rotation of `original` survives: its position and scale are
    /// replaced, so the result does not depend on where the asset put itself.
    /// Without bounds the model is treated as centred already.
    pub fn placement(&self, original: &Instance, bounds: Option<Aabb>) -> Instance {
        let mut placed = Instance::placed(
            Vector3::new(0.0, 0.0, 0.0),
            original.rotation,
            Vector3::new(self.scale, self.scale, self.scale),
        );
        let center = bounds
            .map(|aabb| aabb.transformed(&placed).center().to_vec())
            .unwrap_or_else(|| Vector3::new(0.0, 0.0, 0.0));
        placed.position = self.offset - center;
        placed
    }

    /// Places `node` once. Applying it again is harmless but never needed.
    pub fn apply(&self, node: &mut dyn SceneNode) {
        let original = node.get_local_transform(0).unwrap_or_default();
        let placement = self.placement(&original, node.local_bounds());
        log::debug!(
            "model placed at ({:.3}, {:.3}, {:.3}) with scale {}",
            placement.position.x,
            placement.position.y,
            placement.position.z,
            self.scale
        );
        node.set_local_transform(0, placement);
    }
}

/// Outcome of the model load.
pub enum ModelSlot {
    Pending,
    Ready(Box<dyn SceneNode>),
    Failed(String),
}

impl ModelSlot {
    pub fn is_pending(&self) -> bool {
        matches!(self, ModelSlot::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelSlot::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ModelSlot::Failed(_))
    }
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSlot::Pending => f.write_str("Pending"),
            ModelSlot::Ready(_) => f.write_str("Ready(..)"),
            ModelSlot::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

type LoadResult = anyhow::Result<Box<dyn SceneNode>>;

/// A model load running in the background.
///
/// The render loop calls [`ModelLoad::poll`] every frame; the slot stays
/// [`ModelSlot::Pending`] until the loader answers or the timeout expires.
pub struct ModelLoad {
    path: String,
    slot: ModelSlot,
    receiver: Option<oneshot::Receiver<LoadResult>>,
    task: JoinHandle<()>,
}

impl ModelLoad {
    pub fn spawn<L: AssetLoader>(
        runtime: &Handle,
        loader: Arc<L>,
        path: impl Into<String>,
        normalizer: ModelNormalizer,
        timeout: Option<Duration>,
    ) -> Self {
        let path = path.into();
        let (tx, rx) = oneshot::channel();
        let load = loader.load(&path);
        log::info!("loading model {}", path);

        let task = runtime.spawn(async move {
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, load)
                    .await
                    .unwrap_or_else(|_| Err(anyhow!("model load timed out after {:?}", limit))),
                None => load.await,
            };
            let result = result.map(|mut node| {
                normalizer.apply(node.as_mut());
                node
            });
            // The receiver is gone when the scene was torn down first
            let _ = tx.send(result);
        });

        Self {
            path,
            slot: ModelSlot::Pending,
            receiver: Some(rx),
            task,
        }
    }

    /// Collects the load result if it arrived. Returns `true` exactly once,
    /// on the call that made the model ready.
    pub fn poll(&mut self) -> bool {
        let Some(receiver) = self.receiver.as_mut() else {
            return false;
        };
        let outcome = match receiver.try_recv() {
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Closed) => Err(anyhow!("the loader task ended without a result")),
            Ok(result) => result,
        };
        self.receiver = None;
        match outcome {
            Ok(node) => {
                log::info!("model {} is ready", self.path);
                self.slot = ModelSlot::Ready(node);
                true
            }
            Err(e) => {
                log::error!("could not load model {}: {:#}", self.path, e);
                self.slot = ModelSlot::Failed(format!("{:#}", e));
                false
            }
        }
    }

    pub fn state(&self) -> &ModelSlot {
        &self.slot
    }

    pub fn model(&self) -> Option<&dyn SceneNode> {
        match &self.slot {
            ModelSlot::Ready(node) => Some(node.as_ref()),
            _ => None,
        }
    }

    pub fn model_mut(&mut self) -> Option<&mut (dyn SceneNode + 'static)> {
        match &mut self.slot {
            ModelSlot::Ready(node) => Some(node.as_mut()),
            _ => None,
        }
    }
}

impl Drop for ModelLoad {
    fn drop(&mut self) {
        self.task.abort();
    }
}
