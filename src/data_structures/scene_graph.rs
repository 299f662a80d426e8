//! Scene graph and hierarchical scene organization.
//!
//! A loaded asset becomes a tree of [`SceneNode`]s: [`ModelNode`]s own GPU
//! geometry, [`ContainerNode`]s only group children. Every node keeps a local
//! transform (relative to its parent) and a world transform that is
//! recomputed top-down by [`SceneNode::update_world_transform_all`].

use std::ops::Range;

use log::warn;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        bounds::{self, Aabb},
        instance::{Instance, InstanceRaw},
        model,
    },
    render::Instanced,
};

/// Converts a glTF node (and, recursively, its children) into scene nodes.
///
/// `materials` holds every material of the document followed by one default
/// material, which is used by primitives that do not reference any.
pub fn to_scene_node(
    node: gltf::scene::Node,
    buffers: &[Vec<u8>],
    device: &wgpu::Device,
    materials: &[model::Material],
) -> Box<dyn SceneNode> {
    let mut scene_node: Box<dyn SceneNode> = match node.mesh() {
        Some(mesh) => {
            let name = mesh.name().unwrap_or("unknown_mesh");
            let meshes = mesh
                .primitives()
                .filter_map(|primitive| read_primitive(&primitive, name, buffers, device, materials.len()))
                .collect();
            // TODO: share materials between nodes instead of cloning the handles per mesh node
            let model = model::Model {
                meshes,
                materials: materials.to_vec(),
            };
            Box::new(ModelNode::from_model(1, device, model))
        }
        None => Box::new(ContainerNode::new(1)),
    };

    let (translation, rotation, scale) = node.transform().decomposed();
    scene_node.set_local_transform(0, Instance::placed(translation.into(), rotation.into(), scale.into()));
    for child in node.children() {
        scene_node.add_child(to_scene_node(child, buffers, device, materials));
    }
    scene_node
}

fn read_primitive(
    primitive: &gltf::Primitive,
    mesh_name: &str,
    buffers: &[Vec<u8>],
    device: &wgpu::Device,
    material_count: usize,
) -> Option<model::Mesh> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let Some(positions) = reader.read_positions() else {
        warn!("primitive {} of mesh {} has no positions", primitive.index(), mesh_name);
        return None;
    };
    let mut vertices: Vec<model::ModelVertex> = positions
        .map(|position| model::ModelVertex {
            position,
            ..Default::default()
        })
        .collect();
    for (vertex, normal) in vertices.iter_mut().zip(reader.read_normals().into_iter().flatten()) {
        vertex.normal = normal;
    }
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        for (vertex, uv) in vertices.iter_mut().zip(tex_coords.into_f32()) {
            vertex.tex_coords = uv;
        }
    }
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{} vertices", mesh_name)),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{} indices", mesh_name)),
        contents: bytemuck::cast_slice(&indices),
        usage: wgpu::BufferUsages::INDEX,
    });

    Some(model::Mesh {
        name: mesh_name.to_string(),
        vertex_buffer,
        index_buffer,
        num_elements: indices.len() as u32,
        // The default material sits behind the document's own
        material: primitive
            .material()
            .index()
            .unwrap_or(material_count.saturating_sub(1)),
        bounds: Aabb::from_points(vertices.iter().map(|v| v.position.into())),
    })
}

/// Local/world transform pairs and children, common to every node kind.
#[derive(Default)]
pub struct NodeTransforms {
    pub instances: Vec<(Instance, Instance)>,
    pub children: Vec<Box<dyn SceneNode>>,
}

impl NodeTransforms {
    pub fn new(amount: usize) -> Self {
        Self {
            instances: vec![(Instance::default(), Instance::default()); amount],
            children: vec![],
        }
    }

    fn propagate(&mut self, range: Range<usize>, parents_world_transform: &[Instance]) {
        if parents_world_transform.len() > self.instances.len() {
            warn!(
                "got {} parent transforms for {} instances",
                parents_world_transform.len(),
                self.instances.len()
            );
            return;
        }
        let len = self.instances.len();
        let Some(selected) = self.instances.get_mut(range.clone()) else {
            warn!("transform range {:?} is out of bounds for {} instances", range, len);
            return;
        };
        let worlds: Vec<Instance> = selected
            .iter_mut()
            .zip(parents_world_transform)
            .map(|((local, world), parent)| {
                *world = parent * &*local;
                world.clone()
            })
            .collect();
        for child in &mut self.children {
            child.update_world_transforms(range.clone(), &worlds);
        }
    }
}

pub trait SceneNode: Send {
    fn transforms(&self) -> &NodeTransforms;

    fn transforms_mut(&mut self) -> &mut NodeTransforms;

    /// Bounds of the geometry this node owns itself, in its local space.
    fn own_bounds(&self) -> Option<Aabb>;

    /// Upload world transforms of this subtree to the GPU.
    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        for child in &mut self.transforms_mut().children {
            child.write_to_buffers(queue);
        }
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.children().iter().flat_map(|child| child.get_render()).collect()
    }

    fn get_local_transform(&self, idx: usize) -> Option<Instance> {
        self.transforms().instances.get(idx).map(|(local, _)| local.clone())
    }

    fn set_local_transform(&mut self, idx: usize, instance: Instance) {
        if let Some((local, _)) = self.transforms_mut().instances.get_mut(idx) {
            *local = instance;
        }
    }

    fn children(&self) -> &[Box<dyn SceneNode>] {
        &self.transforms().children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.transforms_mut().children.push(child);
    }

    /// Recompute the world transforms of the instances in `range` from the
    /// matching `parents_world_transform`, then pass them down to the children.
    fn update_world_transforms(&mut self, range: Range<usize>, parents_world_transform: &[Instance]) {
        self.transforms_mut().propagate(range, parents_world_transform);
    }

    /// Recompute every world transform with this node as the root.
    fn update_world_transform_all(&mut self) {
        let roots = vec![Instance::default(); self.transforms().instances.len()];
        self.update_world_transforms(0..roots.len(), &roots);
    }

    /// Bounds of this node's subtree in its local space (its own transform excluded).
    ///
    /// Child bounds are carried through the child's first local transform.
    fn local_bounds(&self) -> Option<Aabb> {
        let children = self.children().iter().map(|child| {
            let aabb = child.local_bounds()?;
            let local = child.get_local_transform(0).unwrap_or_default();
            Some(aabb.transformed(&local))
        });
        bounds::merge(std::iter::once(self.own_bounds()).chain(children))
    }
}

/// Groups children without owning geometry (glTF nodes without a mesh).
pub struct ContainerNode {
    transforms: NodeTransforms,
}

impl ContainerNode {
    pub fn new(amount: usize) -> Self {
        Self {
            transforms: NodeTransforms::new(amount),
        }
    }
}

impl SceneNode for ContainerNode {
    fn transforms(&self) -> &NodeTransforms {
        &self.transforms
    }

    fn transforms_mut(&mut self) -> &mut NodeTransforms {
        &mut self.transforms
    }

    fn own_bounds(&self) -> Option<Aabb> {
        None
    }
}

/// A node with GPU geometry and a per-instance transform buffer.
pub struct ModelNode {
    transforms: NodeTransforms,
    instance_buffer: wgpu::Buffer,
    model: model::Model,
}

impl ModelNode {
    pub fn from_model(amount: usize, device: &wgpu::Device, model: model::Model) -> Self {
        let transforms = NodeTransforms::new(amount);
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Buffer"),
            contents: bytemuck::cast_slice(&raw_worlds(&transforms)),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            transforms,
            instance_buffer,
            model,
        }
    }
}

fn raw_worlds(transforms: &NodeTransforms) -> Vec<InstanceRaw> {
    transforms.instances.iter().map(|(_, world)| world.to_raw()).collect()
}

impl SceneNode for ModelNode {
    fn transforms(&self) -> &NodeTransforms {
        &self.transforms
    }

    fn transforms_mut(&mut self) -> &mut NodeTransforms {
        &mut self.transforms
    }

    fn own_bounds(&self) -> Option<Aabb> {
        self.model.bounds()
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw_worlds(&self.transforms)));
        for child in &mut self.transforms.children {
            child.write_to_buffers(queue);
        }
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        let own = Instanced {
            instance: &self.instance_buffer,
            model: &self.model,
            amount: self.transforms.instances.len(),
        };
        self.children()
            .iter()
            .flat_map(|child| child.get_render())
            .chain([own])
            .collect()
    }
}
