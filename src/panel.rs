//! The debug panel: a floating pane of sliders bound to light intensities.
//!
//! [`Pane`] is the pure part (layout, hit-testing, dragging) and can be tested
//! without a GPU. [`DebugPanel`] is the flow that draws the pane with the GUI
//! pipeline and writes slider changes into the [`LightRig`].

use std::marker::PhantomData;

use instant::Duration;
use winit::event::{ElementState, MouseButton, WindowEvent};

use crate::{
    config::{SliderConfig, ViewerConfig},
    context::Context,
    controls::OrbitControls,
    flow::{GraphicsFlow, Out},
    lights::LightRig,
    pipelines::gui::{GuiBuffers, QuadBatch, Rect},
    render::{Label, Render},
};

/// A value of the scene a slider can edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    AmbientIntensity,
    DirectionalIntensity,
}

impl Param {
    pub fn get(self, rig: &LightRig) -> f32 {
        match self {
            Param::AmbientIntensity => rig.ambient.intensity,
            Param::DirectionalIntensity => rig.directional.intensity,
        }
    }

    pub fn apply(self, value: f32, rig: &mut LightRig) {
        match self {
            Param::AmbientIntensity => rig.ambient.intensity = value,
            Param::DirectionalIntensity => rig.directional.intensity = value,
        }
    }
}

/// A labelled slider bound to one [`Param`].
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub label: String,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub value: f32,
    pub target: Param,
}

impl Binding {
    pub fn new(config: &SliderConfig, target: Param, value: f32) -> Self {
        let mut binding = Self {
            label: config.label.clone(),
            min: config.min,
            max: config.max,
            step: config.step,
            value: config.min,
            target,
        };
        binding.set(value);
        binding
    }

    /// Clamp `value` to the slider range and snap it to the step grid starting
    /// at `min`. Returns the stored value.
    pub fn set(&mut self, value: f32) -> f32 {
        let clamped = value.clamp(self.min, self.max);
        if self.step <= 0.0 {
            self.value = clamped;
            return clamped;
        }
        let step = f64::from(self.step);
        let steps = ((f64::from(clamped) - f64::from(self.min)) / step).round();
        // round away the binary noise of steps like 0.001
        let scale = 10f64.powi(self.decimals() as i32);
        let snapped = ((f64::from(self.min) + steps * step) * scale).round() / scale;
        self.value = (snapped as f32).min(self.max);
        self.value
    }

    /// Number of decimals needed to write the step exactly.
    fn decimals(&self) -> usize {
        let step = f64::from(self.step);
        (0..=6usize)
            .find(|digits| {
                let scaled = step * 10f64.powi(*digits as i32);
                (scaled - scaled.round()).abs() < 1e-4
            })
            .unwrap_or(6)
    }

    /// Set from a position along the track, `0.0` at `min` and `1.0` at `max`.
    pub fn set_from_fraction(&mut self, fraction: f32) -> f32 {
        let fraction = fraction.clamp(0.0, 1.0);
        self.set(self.min + fraction * (self.max - self.min))
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= self.min {
            return 0.0;
        }
        (self.value - self.min) / (self.max - self.min)
    }

    /// Text shown next to the slider, with as many decimals as the step has.
    pub fn display_value(&self) -> String {
        format!("{:.*}", self.decimals(), self.value)
    }
}

/// What the pane did with a pointer event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaneResponse {
    /// The event did not concern the pane.
    Ignored,
    /// The pane owns the pointer but nothing changed.
    Captured,
    Changed(Param, f32),
}

/// Pane geometry in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaneStyle {
    pub width: f32,
    pub margin: f32,
    pub padding: f32,
    pub row_height: f32,
    pub label_height: f32,
    pub track_height: f32,
    pub handle_width: f32,
    pub font_size: f32,
}

impl Default for PaneStyle {
    fn default() -> Self {
        Self {
            width: 280.0,
            margin: 8.0,
            padding: 10.0,
            row_height: 46.0,
            label_height: 18.0,
            track_height: 8.0,
            handle_width: 10.0,
            font_size: 13.0,
        }
    }
}

/// A floating pane anchored to the top-right corner of the viewport.
#[derive(Debug, Clone)]
pub struct Pane {
    pub bindings: Vec<Binding>,
    pub style: PaneStyle,
    viewport_width: f32,
    cursor: Option<(f32, f32)>,
    dragging: Option<usize>,
    /// The primary button went down on the pane and is still held.
    pressed: bool,
}

impl Pane {
    pub fn new(bindings: Vec<Binding>, viewport_width: f32) -> Self {
        Self {
            bindings,
            style: PaneStyle::default(),
            viewport_width,
            cursor: None,
            dragging: None,
            pressed: false,
        }
    }

    pub fn set_viewport_width(&mut self, width: f32) {
        self.viewport_width = width;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    pub fn bounds(&self) -> Rect {
        let style = &self.style;
        let height = style.padding * 2.0 + style.row_height * self.bindings.len() as f32;
        Rect::new(
            (self.viewport_width - style.width - style.margin).max(0.0),
            style.margin,
            style.width,
            height,
        )
    }

    /// The grabbable area of the slider in `row`.
    pub fn track(&self, row: usize) -> Rect {
        let style = &self.style;
        let bounds = self.bounds();
        let top = bounds.y + style.padding + row as f32 * style.row_height + style.label_height;
        // the hit area is taller than the drawn track
        Rect::new(
            bounds.x + style.padding,
            top,
            bounds.width - style.padding * 2.0,
            style.row_height - style.label_height - 4.0,
        )
    }

    fn drawn_track(&self, row: usize) -> Rect {
        let hit = self.track(row);
        Rect::new(
            hit.x,
            hit.y + (hit.height - self.style.track_height) / 2.0,
            hit.width,
            self.style.track_height,
        )
    }

    fn drag_to(&mut self, row: usize, x: f32) -> PaneResponse {
        let track = self.track(row);
        let binding = &mut self.bindings[row];
        let before = binding.value;
        let value = binding.set_from_fraction((x - track.x) / track.width.max(1.0));
        if value == before {
            PaneResponse::Captured
        } else {
            PaneResponse::Changed(binding.target, value)
        }
    }

    /// Pointer moved to `(x, y)` logical pixels.
    pub fn pointer_moved(&mut self, x: f32, y: f32) -> PaneResponse {
        self.cursor = Some((x, y));
        match self.dragging {
            Some(row) => self.drag_to(row, x),
            None => PaneResponse::Ignored,
        }
    }

    /// Primary button pressed at the last known pointer position.
    pub fn pointer_pressed(&mut self) -> PaneResponse {
        let Some((x, y)) = self.cursor else {
            return PaneResponse::Ignored;
        };
        if let Some(row) = (0..self.bindings.len()).find(|row| self.track(*row).contains(x, y)) {
            self.pressed = true;
            self.dragging = Some(row);
            return self.drag_to(row, x);
        }
        if self.bounds().contains(x, y) {
            self.pressed = true;
            PaneResponse::Captured
        } else {
            PaneResponse::Ignored
        }
    }

    pub fn pointer_released(&mut self) -> PaneResponse {
        let pressed = std::mem::take(&mut self.pressed);
        match self.dragging.take() {
            Some(_) => PaneResponse::Captured,
            None if pressed => PaneResponse::Captured,
            None => PaneResponse::Ignored,
        }
    }

    pub fn pointer_left(&mut self) {
        self.cursor = None;
        self.dragging = None;
        self.pressed = false;
    }

    /// Whether the pane owns the pointer: only while a press that started on
    /// it is held. Hovering alone leaves the pointer to the orbit controls.
    pub fn wants_pointer(&self) -> bool {
        self.pressed || self.dragging.is_some()
    }

    /// Background, tracks, fills and handles for a viewport of `size` logical px.
    pub fn layout(&self, batch: &mut QuadBatch, size: (f32, f32)) {
        const BACKGROUND: [f32; 4] = [0.02, 0.02, 0.025, 0.85];
        const TRACK: [f32; 4] = [0.08, 0.08, 0.09, 1.0];
        const FILL: [f32; 4] = [0.35, 0.42, 0.55, 1.0];
        const HANDLE: [f32; 4] = [0.8, 0.82, 0.86, 1.0];

        batch.clear();
        batch.push(self.bounds(), BACKGROUND, size);
        for (row, binding) in self.bindings.iter().enumerate() {
            let track = self.drawn_track(row);
            batch.push(track, TRACK, size);
            let filled = track.width * binding.fraction();
            batch.push(Rect::new(track.x, track.y, filled, track.height), FILL, size);
            let handle = self.style.handle_width;
            batch.push(
                Rect::new(
                    track.x + filled - handle / 2.0,
                    track.y - 3.0,
                    handle,
                    track.height + 6.0,
                ),
                HANDLE,
                size,
            );
        }
    }

    pub fn labels(&self) -> Vec<Label> {
        let style = &self.style;
        let bounds = self.bounds();
        self.bindings
            .iter()
            .enumerate()
            .map(|(row, binding)| Label {
                text: format!("{}  {}", binding.label, binding.display_value()),
                x: bounds.x + style.padding,
                y: bounds.y + style.padding + row as f32 * style.row_height,
                width: bounds.width - style.padding * 2.0,
                size: style.font_size,
                color: [220, 222, 226, 255],
            })
            .collect()
    }
}

/// Flow drawing the [`Pane`] and forwarding slider edits to the light rig.
pub struct DebugPanel<S, E> {
    pane: Pane,
    batch: QuadBatch,
    buffers: GuiBuffers,
    captured: bool,
    dirty: bool,
    _marker: PhantomData<fn(S, E)>,
}

impl<S, E> DebugPanel<S, E> {
    pub fn new(device: &wgpu::Device, config: &ViewerConfig, viewport_width: f32) -> Self {
        let rig = LightRig::new(config);
        let bindings = vec![
            Binding::new(
                &config.ambient_slider,
                Param::AmbientIntensity,
                Param::AmbientIntensity.get(&rig),
            ),
            Binding::new(
                &config.directional_slider,
                Param::DirectionalIntensity,
                Param::DirectionalIntensity.get(&rig),
            ),
        ];
        Self {
            pane: Pane::new(bindings, viewport_width),
            batch: QuadBatch::default(),
            buffers: GuiBuffers::new(device, "debug panel"),
            captured: false,
            dirty: true,
            _marker: PhantomData,
        }
    }

    fn configure(&mut self, response: PaneResponse) -> Out<S, E> {
        let captured = self.pane.wants_pointer();
        let changed = matches!(response, PaneResponse::Changed(..));
        if changed {
            self.dirty = true;
        }
        if !changed && captured == self.captured {
            return Out::Empty;
        }
        self.captured = captured;
        Out::Configure(Box::new(move |ctx: &mut Context| {
            apply_response(response, captured, &mut ctx.controls, &mut ctx.light.rig);
        }))
    }
}

/// Route a pane response into the engine state: the orbit controls are
/// disabled while the pane owns the pointer and slider changes land in the
/// light rig.
pub fn apply_response(
    response: PaneResponse,
    captured: bool,
    controls: &mut OrbitControls,
    rig: &mut LightRig,
) {
    controls.enabled = !captured;
    if let PaneResponse::Changed(param, value) = response {
        log::debug!("{param:?} set to {value}");
        param.apply(value, rig);
    }
}

impl<S, E> GraphicsFlow<S, E> for DebugPanel<S, E> {
    fn on_init(&mut self, ctx: &mut Context, _: &mut S) -> Out<S, E> {
        // the rig may have been configured before the panel was created
        for binding in self.pane.bindings.iter_mut() {
            binding.set(binding.target.get(&ctx.light.rig));
        }
        self.pane.set_viewport_width(ctx.viewport.width as f32);
        self.dirty = true;
        Out::Empty
    }

    fn on_update(&mut self, ctx: &Context, _: &mut S, _: Duration) -> Out<S, E> {
        if self.dirty {
            let size = (ctx.viewport.width as f32, ctx.viewport.height as f32);
            self.pane.layout(&mut self.batch, size);
            self.buffers.upload(&ctx.device, &ctx.queue, &self.batch);
            self.dirty = false;
        }
        Out::Empty
    }

    fn on_window_events(&mut self, ctx: &Context, _: &mut S, event: &WindowEvent) -> Out<S, E> {
        let response = match event {
            WindowEvent::Resized(size) => {
                let logical = size.to_logical::<f32>(ctx.window().scale_factor());
                self.pane.set_viewport_width(logical.width);
                self.dirty = true;
                PaneResponse::Ignored
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = ctx.viewport.to_logical(*position);
                self.pane.pointer_moved(x as f32, y as f32)
            }
            WindowEvent::CursorLeft { .. } => {
                self.pane.pointer_left();
                PaneResponse::Ignored
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.pane.pointer_pressed(),
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => self.pane.pointer_released(),
            _ => return Out::Empty,
        };
        self.configure(response)
    }

    fn on_custom_events(&mut self, _: &Context, _: &mut S, event: E) -> Option<E> {
        Some(event)
    }

    fn on_render(&self) -> Render<'_> {
        let Some(flat) = self.buffers.as_flat() else {
            return Render::None;
        };
        Render::Composed(vec![Render::GUI(flat), Render::Text(self.pane.labels())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane() -> Pane {
        let config = ViewerConfig::default();
        Pane::new(
            vec![
                Binding::new(&config.ambient_slider, Param::AmbientIntensity, 2.4),
                Binding::new(&config.directional_slider, Param::DirectionalIntensity, 1.8),
            ],
            1280.0,
        )
    }

    fn centre(rect: Rect) -> (f32, f32) {
        (rect.x + rect.width / 2.0, rect.y + rect.height / 2.0)
    }

    #[test]
    fn binding_clamps_to_range() {
        let mut binding = pane().bindings[0].clone();
        assert_eq!(binding.set(12.0), 10.0);
        assert_eq!(binding.set(-1.0), 0.0);
    }

    #[test]
    fn binding_snaps_to_step() {
        let mut binding = Binding::new(
            &SliderConfig {
                label: "x".to_string(),
                min: 1.0,
                max: 2.0,
                step: 0.25,
            },
            Param::AmbientIntensity,
            1.0,
        );
        assert_eq!(binding.set(1.3), 1.25);
        assert_eq!(binding.set(1.9), 2.0);
        assert_eq!(binding.set_from_fraction(0.5), 1.5);
    }

    #[test]
    fn fine_steps_keep_three_decimals() {
        let mut binding = pane().bindings[0].clone();
        let value = binding.set(3.14159);
        assert!((value - 3.142).abs() < 1e-4);
        assert_eq!(binding.display_value(), "3.142");
    }

    #[test]
    fn params_write_into_the_rig() {
        let mut rig = LightRig::new(&ViewerConfig::default());
        Param::AmbientIntensity.apply(5.0, &mut rig);
        Param::DirectionalIntensity.apply(0.25, &mut rig);
        assert_eq!(rig.ambient.intensity, 5.0);
        assert_eq!(rig.directional.intensity, 0.25);
        assert_eq!(Param::DirectionalIntensity.get(&rig), 0.25);
    }

    #[test]
    fn pane_sits_in_the_top_right_corner() {
        let pane = pane();
        let bounds = pane.bounds();
        assert_eq!(bounds.x + bounds.width + pane.style.margin, 1280.0);
        assert_eq!(bounds.y, pane.style.margin);
    }

    #[test]
    fn clicks_outside_are_ignored() {
        let mut pane = pane();
        assert_eq!(pane.pointer_moved(10.0, 400.0), PaneResponse::Ignored);
        assert_eq!(pane.pointer_pressed(), PaneResponse::Ignored);
        assert!(!pane.wants_pointer());
    }

    #[test]
    fn pressing_a_track_sets_the_value_under_the_pointer() {
        let mut pane = pane();
        let (x, y) = centre(pane.track(0));
        pane.pointer_moved(x, y);
        assert_eq!(
            pane.pointer_pressed(),
            PaneResponse::Changed(Param::AmbientIntensity, 5.0)
        );
        assert!(pane.is_dragging());
    }

    #[test]
    fn dragging_follows_the_pointer_beyond_the_pane() {
        let mut pane = pane();
        let track = pane.track(1);
        let (x, y) = centre(track);
        pane.pointer_moved(x, y);
        pane.pointer_pressed();

        // way past the right end, and below the pane
        let response = pane.pointer_moved(track.x + track.width * 3.0, 900.0);
        assert_eq!(response, PaneResponse::Changed(Param::DirectionalIntensity, 10.0));
        assert!(pane.wants_pointer());

        assert_eq!(pane.pointer_released(), PaneResponse::Captured);
        assert!(!pane.wants_pointer());
        assert_eq!(pane.bindings[1].value, 10.0);
    }

    #[test]
    fn clicks_on_the_background_capture_without_changes() {
        let mut pane = pane();
        let bounds = pane.bounds();
        pane.pointer_moved(bounds.x + 2.0, bounds.y + 2.0);
        assert_eq!(pane.pointer_pressed(), PaneResponse::Captured);
        assert!(!pane.is_dragging());
        assert!(pane.wants_pointer());
        assert_eq!(pane.pointer_released(), PaneResponse::Captured);
        assert!(!pane.wants_pointer());
    }

    #[test]
    fn hovering_leaves_the_pointer_to_the_camera() {
        let mut pane = pane();
        let (x, y) = centre(pane.track(0));
        assert_eq!(pane.pointer_moved(x, y), PaneResponse::Ignored);
        assert!(!pane.wants_pointer());
    }

    #[test]
    fn presses_that_start_elsewhere_never_capture() {
        let mut pane = pane();
        pane.pointer_moved(100.0, 400.0);
        assert_eq!(pane.pointer_pressed(), PaneResponse::Ignored);

        // an orbit drag sweeping over a slider
        let (x, y) = centre(pane.track(1));
        assert_eq!(pane.pointer_moved(x, y), PaneResponse::Ignored);
        assert!(!pane.wants_pointer());
        assert_eq!(pane.pointer_released(), PaneResponse::Ignored);
        assert_eq!(pane.bindings[1].value, 1.8);
    }

    #[test]
    fn leaving_the_window_drops_the_capture() {
        let mut pane = pane();
        let (x, y) = centre(pane.track(0));
        pane.pointer_moved(x, y);
        pane.pointer_pressed();
        pane.pointer_left();
        assert!(!pane.wants_pointer());
        assert_eq!(pane.pointer_released(), PaneResponse::Ignored);
    }

    #[test]
    fn responses_toggle_the_controls_and_write_the_rig() {
        let config = ViewerConfig::default();
        let mut controls = OrbitControls::new(&config.controls, 720.0);
        let mut rig = LightRig::new(&config);

        apply_response(
            PaneResponse::Changed(Param::AmbientIntensity, 7.5),
            true,
            &mut controls,
            &mut rig,
        );
        assert!(!controls.enabled);
        assert_eq!(rig.ambient.intensity, 7.5);
        assert_eq!(rig.directional.intensity, 1.8);

        apply_response(PaneResponse::Captured, false, &mut controls, &mut rig);
        assert!(controls.enabled);
        assert_eq!(rig.ambient.intensity, 7.5);
    }

    #[test]
    fn layout_draws_background_and_three_quads_per_slider() {
        let pane = pane();
        let mut batch = QuadBatch::default();
        pane.layout(&mut batch, (1280.0, 720.0));
        assert_eq!(batch.vertices.len(), 4 * (1 + 3 * 2));
    }

    #[test]
    fn default_build_draws_labels() {
        assert!(cfg!(feature = "ui"), "slider labels need the ui feature");
    }

    #[test]
    fn labels_show_current_values() {
        let labels = pane().labels();
        assert_eq!(labels[0].text, "Ambient Light Intensity  2.400");
        assert_eq!(labels[1].text, "Directional Light Intensity  1.800");
    }
}
