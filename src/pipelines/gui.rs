use crate::{
    data_structures::{model::Vertex, texture},
    render::Flat,
};

/// A pre-transformed, coloured vertex. Positions are in clip space.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GuiVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex for GuiVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<GuiVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Axis-aligned rectangle in logical pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// CPU-side list of quads, rebuilt whenever the GUI changes.
#[derive(Debug, Default, Clone)]
pub struct QuadBatch {
    pub vertices: Vec<GuiVertex>,
    pub indices: Vec<u16>,
}

impl QuadBatch {
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Add `rect` for a viewport of `size` logical pixels. `color` is linear RGBA.
    pub fn push(&mut self, rect: Rect, color: [f32; 4], size: (f32, f32)) {
        let (width, height) = (size.0.max(1.0), size.1.max(1.0));
        let to_clip = |x: f32, y: f32| [x / width * 2.0 - 1.0, 1.0 - y / height * 2.0];
        let base = self.vertices.len() as u16;
        for (x, y) in [
            (rect.x, rect.y),
            (rect.x, rect.y + rect.height),
            (rect.x + rect.width, rect.y + rect.height),
            (rect.x + rect.width, rect.y),
        ] {
            self.vertices.push(GuiVertex {
                position: to_clip(x, y),
                color,
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

/// GPU buffers backing a [`QuadBatch`]. They grow when the batch outgrows them.
#[derive(Debug)]
pub struct GuiBuffers {
    label: String,
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    amount: usize,
}

impl GuiBuffers {
    const INITIAL_QUADS: usize = 16;

    pub fn new(device: &wgpu::Device, label: &str) -> Self {
        Self {
            label: label.to_string(),
            vertex: mk_buffer(
                device,
                label,
                Self::vertex_bytes(Self::INITIAL_QUADS),
                wgpu::BufferUsages::VERTEX,
            ),
            index: mk_buffer(
                device,
                label,
                Self::index_bytes(Self::INITIAL_QUADS),
                wgpu::BufferUsages::INDEX,
            ),
            amount: 0,
        }
    }

    fn vertex_bytes(quads: usize) -> u64 {
        (quads * 4 * std::mem::size_of::<GuiVertex>()) as u64
    }

    fn index_bytes(quads: usize) -> u64 {
        (quads * 6 * std::mem::size_of::<u16>()) as u64
    }

    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, batch: &QuadBatch) {
        let quads = batch.vertices.len() / 4;
        if Self::vertex_bytes(quads) > self.vertex.size() {
            self.vertex = mk_buffer(
                device,
                &self.label,
                Self::vertex_bytes(quads.next_power_of_two()),
                wgpu::BufferUsages::VERTEX,
            );
            self.index = mk_buffer(
                device,
                &self.label,
                Self::index_bytes(quads.next_power_of_two()),
                wgpu::BufferUsages::INDEX,
            );
        }
        if !batch.is_empty() {
            queue.write_buffer(&self.vertex, 0, bytemuck::cast_slice(&batch.vertices));
            queue.write_buffer(&self.index, 0, bytemuck::cast_slice(&batch.indices));
        }
        self.amount = batch.indices.len();
    }

    pub fn as_flat(&self) -> Option<Flat<'_>> {
        (self.amount > 0).then_some(Flat {
            vertex: &self.vertex,
            index: &self.index,
            amount: self.amount,
        })
    }
}

fn mk_buffer(device: &wgpu::Device, label: &str, size: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn mk_pipeline_layout(device: &wgpu::Device) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("GUI Render Pipeline Layout"),
        bind_group_layouts: &[],
        immediate_size: 0,
    })
}

fn mk_render_pipeline(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    render_pipeline_layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("GUI Render Pipeline"),
        layout: Some(render_pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[GuiVertex::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: config.format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        // drawn last, over whatever the models left in the depth buffer
        depth_stencil: Some(wgpu::DepthStencilState {
            format: texture::Texture::DEPTH_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
        cache: None,
    })
}

pub fn mk_gui_pipeline(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("GUI Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("gui.wgsl").into()),
    });
    let render_pipeline_layout = mk_pipeline_layout(device);
    mk_render_pipeline(device, config, &render_pipeline_layout, &shader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quads_map_pixels_to_clip_space() {
        let mut batch = QuadBatch::default();
        batch.push(Rect::new(0.0, 0.0, 400.0, 300.0), [1.0; 4], (800.0, 600.0));
        assert_eq!(batch.vertices[0].position, [-1.0, 1.0]);
        assert_eq!(batch.vertices[2].position, [0.0, 0.0]);
        assert_eq!(batch.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn second_quad_indexes_its_own_vertices() {
        let mut batch = QuadBatch::default();
        batch.push(Rect::new(0.0, 0.0, 1.0, 1.0), [1.0; 4], (10.0, 10.0));
        batch.push(Rect::new(5.0, 5.0, 1.0, 1.0), [1.0; 4], (10.0, 10.0));
        assert_eq!(&batch.indices[6..], &[4, 5, 6, 4, 6, 7]);
        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    fn rect_contains_its_edges() {
        let rect = Rect::new(10.0, 10.0, 20.0, 5.0);
        assert!(rect.contains(10.0, 10.0));
        assert!(rect.contains(30.0, 15.0));
        assert!(!rect.contains(31.0, 12.0));
    }
}
