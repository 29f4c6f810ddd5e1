use scene_viewer::{
    camera::PerspectiveCamera,
    config::ViewerConfig,
    controls::OrbitControls,
    lights::LightRig,
    panel::{Binding, Pane, PaneResponse, Param, apply_response},
};

struct Harness {
    pane: Pane,
    rig: LightRig,
    controls: OrbitControls,
    camera: PerspectiveCamera,
}

impl Harness {
    fn new() -> Self {
        let config = ViewerConfig::default();
        let rig = LightRig::new(&config);
        let bindings = vec![
            Binding::new(
                &config.ambient_slider,
                Param::AmbientIntensity,
                rig.ambient.intensity,
            ),
            Binding::new(
                &config.directional_slider,
                Param::DirectionalIntensity,
                rig.directional.intensity,
            ),
        ];
        let mut harness = Self {
            pane: Pane::new(bindings, 1280.0),
            rig,
            controls: OrbitControls::new(&config.controls, 720.0),
            camera: PerspectiveCamera::new(&config.camera, 1280.0 / 720.0),
        };
        harness.controls.update(&mut harness.camera);
        harness
    }

    /// Hand a pane response to the engine the way the panel flow does.
    fn route(&mut self, response: PaneResponse) {
        let captured = self.pane.wants_pointer();
        apply_response(response, captured, &mut self.controls, &mut self.rig);
    }

    fn move_to(&mut self, x: f32, y: f32) {
        let response = self.pane.pointer_moved(x, y);
        self.route(response);
    }

    fn press(&mut self) {
        let response = self.pane.pointer_pressed();
        self.route(response);
    }

    fn release(&mut self) {
        let response = self.pane.pointer_released();
        self.route(response);
    }
}

#[test]
fn dragging_a_slider_relights_the_scene_without_orbiting() {
    let mut h = Harness::new();
    let track = h.pane.track(1);
    let y = track.y + track.height / 2.0;

    h.move_to(track.x, y);
    assert!(h.controls.enabled);

    h.press();
    assert!(!h.controls.enabled);
    h.move_to(track.x + track.width, y);
    // the same movement reaching the controls must not turn the camera
    h.controls.rotate_by_pixels(track.width, 0.0);
    assert!(!h.controls.update(&mut h.camera));

    h.release();
    assert!(h.controls.enabled);
    assert_eq!(h.rig.directional.intensity, 10.0);
    assert_eq!(h.rig.to_uniform().color[..3], [10.0, 10.0, 10.0]);
    assert_eq!(h.rig.ambient.intensity, 2.4);
}

#[test]
fn orbit_drag_crossing_the_pane_keeps_turning() {
    let mut h = Harness::new();
    h.move_to(100.0, 400.0);
    h.press();
    assert!(h.controls.enabled);

    let track = h.pane.track(0);
    let (x, y) = (track.x + track.width / 2.0, track.y + track.height / 2.0);
    h.move_to(x, y);
    assert!(h.controls.enabled);
    h.controls.rotate_by_pixels(x - 100.0, y - 400.0);
    assert!(h.controls.update(&mut h.camera));

    h.release();
    assert_eq!(h.rig.ambient.intensity, 2.4);
}

#[test]
fn pointer_outside_the_pane_keeps_orbiting() {
    let mut h = Harness::new();
    h.move_to(100.0, 400.0);
    assert_eq!(h.pane.pointer_pressed(), PaneResponse::Ignored);
    h.route(PaneResponse::Ignored);
    h.controls.rotate_by_pixels(50.0, 0.0);
    assert!(h.controls.update(&mut h.camera));
}

#[test]
fn slider_values_are_snapped_to_the_step() {
    let mut h = Harness::new();
    let binding = &mut h.pane.bindings[0];
    assert_eq!(binding.set(3.14159), 3.142);
    assert_eq!(binding.display_value(), "3.142");
    assert_eq!(binding.set(-1.0), 0.0);
    assert_eq!(binding.set(12.0), 10.0);
}
