//! Render composition and pipeline batching.
//!
//! Flows describe what they want drawn with a [`Render`] tree. The event loop
//! flattens the tree into one batch per pipeline (lit models, unlit surfaces)
//! so each pipeline is bound once per frame.
//!
//! # Key types
//!
//! - [`Render<'a>`] is the enum describing render operations
//! - [`Instanced<'a>`] is a model plus its per-instance transform buffer
//! - [`Flat<'a>`] is a single textured quad-like mesh drawn unlit
//!

use crate::data_structures::{model::Model, scene_graph::SceneNode};

/// Data for instanced object rendering: a model and its instance buffer.
#[derive(Clone)]
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
}

/// Data for unlit, single-texture rendering: geometry, transform and the
/// bind group of the texture currently attached to it.
#[derive(Clone)]
pub struct Flat<'a> {
    pub vertex: &'a wgpu::Buffer,
    pub index: &'a wgpu::Buffer,
    pub instance: &'a wgpu::Buffer,
    pub group: &'a wgpu::BindGroup,
    pub amount: u32,
}

/// Specifies how a scene object should be rendered.
///
/// # Variants
///
/// - `None` renders nothing (e.g. a model that has not finished loading)
/// - `Defaults(Vec<Instanced>)` renders a batch of lit instanced objects
/// - `Surface(Flat)` renders an unlit textured surface
/// - `Composed(Vec<Render>)` recursively renders a composition of renders
///
pub enum Render<'a> {
    None,
    Defaults(Vec<Instanced<'a>>),
    Surface(Flat<'a>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(self, models: &mut Vec<Instanced<'a>>, surfaces: &mut Vec<Flat<'a>>) {
        match self {
            Render::Defaults(mut vec) => models.append(&mut vec),
            Render::Surface(flat) => surfaces.push(flat),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(models, surfaces)),
            Render::None => (),
        }
    }
}

impl<'a> From<&'a dyn SceneNode> for Render<'a> {
    fn from(sn: &'a dyn SceneNode) -> Self {
        Render::Defaults(sn.get_render())
    }
}
