//! Native stand-in for the video element.
//!
//! Without a DOM there is nothing to embed, so a dark quad of the element's
//! size marks where the video would play. It goes through the regular scene
//! pipeline and therefore also casts and receives shadows.

use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        model::{Material, Mesh, Model, ModelVertex},
        scene_graph::{ModelNode, SceneNode},
        texture::Texture,
    },
    overlay::CssObject,
    resources::texture::material_layout,
};

const SCREEN_COLOUR: [u8; 4] = [17, 17, 17, 255];

/// Two triangles spanning the element in CSS pixels, centred on the origin
/// and facing +z.
pub fn quad_vertices(width: u32, height: u32) -> ([ModelVertex; 4], [u32; 6]) {
    let (x, y) = (width as f32 / 2.0, height as f32 / 2.0);
    let normal = [0.0, 0.0, 1.0];
    let vertices = [
        ModelVertex { position: [-x, -y, 0.0], tex_coords: [0.0, 1.0], normal },
        ModelVertex { position: [x, -y, 0.0], tex_coords: [1.0, 1.0], normal },
        ModelVertex { position: [x, y, 0.0], tex_coords: [1.0, 0.0], normal },
        ModelVertex { position: [-x, y, 0.0], tex_coords: [0.0, 0.0], normal },
    ];
    (vertices, [0, 1, 2, 0, 2, 3])
}

pub fn screen_model(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
) -> anyhow::Result<Model> {
    let (vertices, indices) = quad_vertices(width, height);
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

    let texture = Texture::create_solid(device, queue, SCREEN_COLOUR, "screen");
    let material = Material::new(
        device,
        "screen",
        texture,
        [1.0, 1.0, 1.0, 1.0],
        &material_layout(device),
    )?;

    Ok(Model {
        meshes: vec![Mesh {
            name: "screen".to_string(),
            vertex_buffer,
            index_buffer,
            num_elements: indices.len() as u32,
            material: 0,
        }],
        materials: vec![material],
    })
}

/// A scene node standing where `object` would be composited.
pub fn screen_node(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    object: &CssObject,
) -> anyhow::Result<Box<dyn SceneNode>> {
    let model = screen_model(device, queue, object.element.width, object.element.height)?;
    let mut node = ModelNode::from_model(device, model);
    node.set_local_transform(object.transform);
    node.set_shadows(true, true);
    Ok(Box::new(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_covers_the_element() {
        let (vertices, indices) = quad_vertices(1280, 720);
        let xs: Vec<f32> = vertices.iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = vertices.iter().map(|v| v.position[1]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 640.0);
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -640.0);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 360.0);
        assert!(vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn triangles_wind_counter_clockwise_towards_the_viewer() {
        let (vertices, indices) = quad_vertices(2, 2);
        for triangle in indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| vertices[triangle[i] as usize].position);
            let cross_z = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
            assert!(cross_z > 0.0);
        }
    }
}
