//! Render composition and pipeline batching.
//!
//! This module defines the [`Render`] enum, which flows use to describe what they
//! want drawn this frame. The engine sorts the description into batches for the
//! shadow pass, the lit model pass and the flat GUI pass.
//!
//! # Key types
//!
//! - [`Render<'a>`] is the primary enum describing render operations
//! - [`Instanced<'a>`] contains data for model rendering (model + instance buffer)
//! - [`Flat<'a>`] contains data for flat 2D rendering (vertex + index buffers)
//! - [`Label`] is a line of GUI text, drawn only with the `ui` feature
//!

use crate::data_structures::model::Model;

/// Data for model rendering: a model, its instance buffer and shadow flags.
#[derive(Clone)]
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub model: &'a Model,
    pub amount: usize,
    pub cast_shadow: bool,
}

/// Data for flat (2D / GUI) rendering: pre-transformed coloured vertices
/// with `u16` indices.
#[derive(Clone)]
pub struct Flat<'a> {
    pub vertex: &'a wgpu::Buffer,
    pub index: &'a wgpu::Buffer,
    pub amount: usize,
}

/// GUI text in logical pixels, top-left anchored.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub size: f32,
    pub color: [u8; 4],
}

/// Specifies how a flow's objects should be rendered.
///
/// # Variants
///
/// - `None` renders nothing
/// - `Default(Instanced)` renders a single lit model
/// - `Defaults(Vec<Instanced>)` renders a batch of lit models
/// - `GUI(Flat)` renders 2D elements on top of the scene
/// - `Text(Vec<Label>)` renders labels on top of the GUI
/// - `Composed(Vec<Render>)` recursively renders composition of multiple renders
///
pub enum Render<'a> {
    None,
    Default(Instanced<'a>),
    Defaults(Vec<Instanced<'a>>),
    GUI(Flat<'a>),
    Text(Vec<Label>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn set_pipelines(
        self,
        models: &mut Vec<Instanced<'a>>,
        guis: &mut Vec<Flat<'a>>,
        labels: &mut Vec<Label>,
    ) {
        match self {
            Render::Default(instanced) => models.push(instanced),
            Render::Defaults(mut vec) => models.append(&mut vec),
            Render::GUI(flat) => guis.push(flat),
            Render::Text(mut vec) => labels.append(&mut vec),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.set_pipelines(models, guis, labels)),
            Render::None => (),
        }
    }
}

impl<'a> Default for Render<'a> {
    fn default() -> Self {
        Render::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(text: &str) -> Label {
        Label {
            text: text.to_string(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            size: 13.0,
            color: [255; 4],
        }
    }

    #[test]
    fn nested_compositions_keep_label_order() {
        let render = Render::Composed(vec![
            Render::Text(vec![label("ambient")]),
            Render::None,
            Render::Composed(vec![Render::Text(vec![label("directional")])]),
        ]);
        let (mut models, mut guis, mut labels) = (Vec::new(), Vec::new(), Vec::new());
        render.set_pipelines(&mut models, &mut guis, &mut labels);

        assert!(models.is_empty() && guis.is_empty());
        let texts: Vec<_> = labels.iter().map(|label| label.text.as_str()).collect();
        assert_eq!(texts, ["ambient", "directional"]);
    }
}
