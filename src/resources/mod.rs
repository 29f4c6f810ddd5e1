//! Loading models and textures from external files.
//!
//! Paths are relative to the `assets/` directory: read from disk on native
//! targets and fetched from `<origin>/assets/` in the browser.

use std::io::{BufReader, Cursor};

use anyhow::{Context as _, bail};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::Instance,
        model::{self, Material},
        scene_graph::{ContainerNode, ModelNode, SceneNode},
        texture::Texture,
    },
    resources::texture::{load_binary, load_texture, material_layout, resolve_relative},
};

pub mod texture;

/// Load a `.gltf` or `.glb` file into a scene node tree.
///
/// Only the file's default scene is loaded, or its first scene when none is
/// marked as default. Nodes keep their
/// TRS transforms; meshes keep positions, normals, the first UV set and their
/// material's base colour (texture times factor).
pub async fn load_model_gltf(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> anyhow::Result<Box<dyn SceneNode>> {
    let gltf_bytes = load_binary(file_name).await?;
    let gltf_reader = BufReader::new(Cursor::new(gltf_bytes));
    let gltf = gltf::Gltf::from_reader(gltf_reader)
        .with_context(|| format!("parsing glTF {file_name}"))?;

    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{file_name} references a missing BIN chunk"))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                bail!("{file_name}: embedded data URIs are not supported");
            }
            gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(load_binary(&resolve_relative(file_name, uri)).await?);
            }
        }
    }

    let layout = material_layout(device);
    let mut materials = Vec::new();
    for material in gltf.materials() {
        let name = material.name().unwrap_or("material").to_string();
        let pbr = material.pbr_metallic_roughness();
        let diffuse_texture = match pbr.base_color_texture() {
            Some(info) => match info.texture().source().source() {
                gltf::image::Source::View { view, mime_type } => {
                    let bytes = buffer_data
                        .get(view.buffer().index())
                        .and_then(|data| data.get(view.offset()..view.offset() + view.length()))
                        .with_context(|| format!("image of {name} is out of bounds"))?;
                    Texture::from_bytes(device, queue, bytes, &name, mime_type.split('/').last())?
                }
                gltf::image::Source::Uri { uri, mime_type } => {
                    load_texture(
                        &resolve_relative(file_name, uri),
                        device,
                        queue,
                        mime_type.and_then(|mt| mt.split('/').last()),
                    )
                    .await?
                }
            },
            None => Texture::create_solid(device, queue, [255; 4], &name),
        };
        materials.push(Material::new(
            device,
            &name,
            diffuse_texture,
            pbr.base_color_factor(),
            &layout,
        )?);
    }
    // primitives without a material use glTF's default: plain white
    let default_material = materials.len();
    materials.push(Material::new(
        device,
        "default",
        Texture::create_solid(device, queue, [255; 4], "default"),
        [1.0; 4],
        &layout,
    )?);

    let mut models = Vec::new();
    for node in root_nodes(&gltf) {
        models.push(to_scene_node(
            node,
            &buffer_data,
            device,
            &materials,
            default_material,
        )?);
    }
    log::info!("Loaded {file_name} with {} root nodes", models.len());

    let root_node: Box<dyn SceneNode> = match models.len() {
        1 => models.remove(0),
        _ => {
            let mut root_node = ContainerNode::new();
            root_node.children = models;
            Box::new(root_node)
        }
    };

    Ok(root_node)
}

/// Root nodes of the scene to display.
fn root_nodes(document: &gltf::Document) -> Vec<gltf::Node<'_>> {
    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => {
            log::warn!("glTF file has no scenes");
            Vec::new()
        }
    }
}

fn to_scene_node(
    node: gltf::scene::Node,
    buffers: &[Vec<u8>],
    device: &wgpu::Device,
    materials: &[Material],
    default_material: usize,
) -> anyhow::Result<Box<dyn SceneNode>> {
    let mut scene_node: Box<dyn SceneNode> = match node.mesh() {
        Some(mesh) => {
            let mesh_name = mesh.name().unwrap_or("unknown_mesh").to_string();
            let mut meshes = Vec::new();
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!("Skipping non-triangle primitive of {mesh_name}");
                    continue;
                }
                let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

                let Some(positions) = reader.read_positions() else {
                    log::warn!("Skipping primitive of {mesh_name} without positions");
                    continue;
                };
                let mut vertices: Vec<model::ModelVertex> = positions
                    .map(|position| model::ModelVertex {
                        position,
                        ..Default::default()
                    })
                    .collect();
                if let Some(normals) = reader.read_normals() {
                    vertices
                        .iter_mut()
                        .zip(normals)
                        .for_each(|(vertex, normal)| vertex.normal = normal);
                } else {
                    log::warn!("{mesh_name} has no normals and will only receive ambient light");
                }
                if let Some(tex_coords) = reader.read_tex_coords(0).map(|v| v.into_f32()) {
                    vertices
                        .iter_mut()
                        .zip(tex_coords)
                        .for_each(|(vertex, uv)| vertex.tex_coords = uv);
                }

                let indices: Vec<u32> = match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..vertices.len() as u32).collect(),
                };

                let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{mesh_name} Vertex Buffer")),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{mesh_name} Index Buffer")),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                });

                meshes.push(model::Mesh {
                    name: mesh_name.clone(),
                    vertex_buffer,
                    index_buffer,
                    num_elements: indices.len() as u32,
                    material: primitive.material().index().unwrap_or(default_material),
                });
            }
            let model = model::Model {
                meshes,
                materials: materials.to_vec(),
            };
            Box::new(ModelNode::from_model(device, model))
        }
        None => Box::new(ContainerNode::new()),
    };

    let (position, rotation, scale) = node.transform().decomposed();
    scene_node.set_local_transform(Instance {
        position: position.into(),
        rotation: rotation.into(),
        scale: scale.into(),
    });
    for child in node.children() {
        scene_node.add_child(to_scene_node(
            child,
            buffers,
            device,
            materials,
            default_material,
        )?);
    }

    Ok(scene_node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots(json: &str) -> Vec<usize> {
        let gltf = gltf::Gltf::from_slice(json.as_bytes()).unwrap();
        root_nodes(&gltf).iter().map(|node| node.index()).collect()
    }

    #[test]
    fn only_the_default_scene_is_shown() {
        let json = r#"{
            "asset": {"version": "2.0"},
            "scene": 1,
            "scenes": [{"nodes": [0]}, {"nodes": [1, 2]}],
            "nodes": [{}, {}, {}]
        }"#;
        assert_eq!(roots(json), vec![1, 2]);
    }

    #[test]
    fn first_scene_stands_in_for_a_missing_default() {
        let json = r#"{
            "asset": {"version": "2.0"},
            "scenes": [{"nodes": [2]}, {"nodes": [0, 1]}],
            "nodes": [{}, {}, {}]
        }"#;
        assert_eq!(roots(json), vec![2]);
    }

    #[test]
    fn files_without_scenes_have_no_roots() {
        assert!(roots(r#"{"asset": {"version": "2.0"}}"#).is_empty());
    }
}
