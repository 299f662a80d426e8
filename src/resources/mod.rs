use std::{
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::data_structures::{
    model,
    scene_graph::{ContainerNode, SceneNode, to_scene_node},
    texture::Texture,
};

/**
 * This module contains all logic for loading meshes and textures from external files.
 */
pub mod texture;

pub use texture::{load_texture, texture_layout};

/// Environment variable that overrides the asset directory (`./assets` by default).
pub const ASSETS_ENV: &str = "LIVE_SCREEN_ASSETS";

/// Resolves `file_name` against the asset directory.
///
/// Absolute paths to existing files are returned unchanged.
pub fn asset_path(file_name: &str) -> PathBuf {
    let path = Path::new(file_name);
    if path.is_absolute() && path.exists() {
        return path.to_path_buf();
    }
    let root = std::env::var_os(ASSETS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./assets"));
    // Web-style root paths ("/model/laptop.glb") are relative to the asset directory
    root.join(file_name.trim_start_matches('/'))
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = asset_path(file_name);
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("could not read asset {}", path.display()))
}

/// Loads a glTF / GLB document into a scene graph.
///
/// Materials resolve their base colour texture when one exists and fall back
/// to a 1x1 texture of the base colour factor otherwise. A default white
/// material is appended for primitives that do not reference any.
pub async fn load_model_gltf(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Box<dyn SceneNode>> {
    let gltf_bytes = load_binary(file_name).await?;
    let gltf_reader = BufReader::new(Cursor::new(gltf_bytes));
    let gltf = gltf::Gltf::from_reader(gltf_reader)
        .with_context(|| format!("{} is not a valid glTF document", file_name))?;

    // Load buffers
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{} references a missing binary chunk", file_name))?;
                buffer_data.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(load_binary(uri).await?);
            }
        }
    }

    // Load materials
    let layout = texture_layout(device);
    let mut materials = Vec::new();
    for material in gltf.materials() {
        let name = material.name().unwrap_or("material");
        let pbr = material.pbr_metallic_roughness();
        let diffuse_texture = match pbr.base_color_texture() {
            Some(info) => match info.texture().source().source() {
                gltf::image::Source::View { view, mime_type } => {
                    let start = view.offset();
                    let end = start + view.length();
                    let bytes = buffer_data
                        .get(view.buffer().index())
                        .and_then(|data| data.get(start..end))
                        .with_context(|| format!("image view of {} is out of bounds", name))?;
                    Texture::from_bytes(device, queue, bytes, name, mime_type.split('/').last())?
                }
                gltf::image::Source::Uri { uri, mime_type } => {
                    let format = mime_type.and_then(|mt| mt.split('/').last());
                    load_texture(uri, device, queue, format).await?
                }
            },
            None => {
                let rgba = pbr.base_color_factor().map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
                Texture::from_color(device, queue, rgba, name)
            }
        };
        materials.push(model::Material::new(device, name, diffuse_texture, &layout));
    }
    let white = Texture::from_color(device, queue, [255; 4], "default material");
    materials.push(model::Material::new(device, "default material", white, &layout));

    let mut models = Vec::new();
    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{} contains no scene", file_name))?;
    for node in scene.nodes() {
        models.push(to_scene_node(node, &buffer_data, device, &materials));
    }

    let root_node: Box<dyn SceneNode> = if models.len() == 1 {
        models.remove(0)
    } else {
        let mut root_node = ContainerNode::new(1);
        models.into_iter().for_each(|model| root_node.add_child(model));
        Box::new(root_node)
    };

    log::info!("loaded model {}", file_name);
    Ok(root_node)
}
