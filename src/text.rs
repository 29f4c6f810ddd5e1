//! Text rendering for GUI labels (feature `ui`).

use glyphon::{
    Attrs, Buffer, Cache, Color, Family, FontSystem, Metrics, Resolution, Shaping, SwashCache,
    TextArea, TextAtlas, TextBounds, TextRenderer, Viewport,
};

use crate::render::Label;

pub(crate) struct TextResources {
    font_system: FontSystem,
    swash_cache: SwashCache,
    viewport: Viewport,
    atlas: TextAtlas,
    renderer: TextRenderer,
    buffers: Vec<Buffer>,
}

impl std::fmt::Debug for TextResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextResources")
            .field("buffers", &self.buffers.len())
            .finish()
    }
}

impl TextResources {
    pub(crate) fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
    ) -> Self {
        let cache = Cache::new(device);
        let viewport = Viewport::new(device, &cache);
        let mut atlas = TextAtlas::new(device, queue, &cache, format);
        let renderer = TextRenderer::new(
            &mut atlas,
            device,
            wgpu::MultisampleState::default(),
            Some(wgpu::DepthStencilState {
                format: crate::data_structures::texture::Texture::DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        );
        Self {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
            viewport,
            atlas,
            renderer,
            buffers: Vec::new(),
        }
    }

    /// Shape `labels` and upload their glyphs. `scale` is the device pixel ratio.
    pub(crate) fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        size: [u32; 2],
        scale: f32,
        labels: &[Label],
    ) {
        self.viewport.update(
            queue,
            Resolution {
                width: size[0],
                height: size[1],
            },
        );
        self.buffers = labels
            .iter()
            .map(|label| {
                let mut buffer = Buffer::new(
                    &mut self.font_system,
                    Metrics::new(label.size, label.size * 1.25),
                );
                buffer.set_size(&mut self.font_system, Some(label.width), None);
                buffer.set_text(
                    &mut self.font_system,
                    &label.text,
                    &Attrs::new().family(Family::SansSerif),
                    Shaping::Advanced,
                    None,
                );
                buffer.shape_until_scroll(&mut self.font_system, false);
                buffer
            })
            .collect();

        let areas = labels.iter().zip(&self.buffers).map(|(label, buffer)| {
            let [r, g, b, a] = label.color;
            TextArea {
                buffer,
                left: label.x * scale,
                top: label.y * scale,
                scale,
                bounds: TextBounds {
                    left: 0,
                    top: 0,
                    right: size[0] as i32,
                    bottom: size[1] as i32,
                },
                default_color: Color::rgba(r, g, b, a),
                custom_glyphs: &[],
            }
        });
        if let Err(err) = self.renderer.prepare(
            device,
            queue,
            &mut self.font_system,
            &mut self.atlas,
            &self.viewport,
            areas,
            &mut self.swash_cache,
        ) {
            log::warn!("Could not prepare GUI text: {err}");
        }
    }

    pub(crate) fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Err(err) = self.renderer.render(&self.atlas, &self.viewport, pass) {
            log::warn!("Could not render GUI text: {err}");
        }
    }

    /// Drop glyphs that were not used this frame.
    pub(crate) fn trim(&mut self) {
        self.atlas.trim();
    }
}
