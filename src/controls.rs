//! Orbit controls for rotating the camera around a target point.
//!
//! Dragging with the left mouse button orbits, the right button pans and the
//! wheel zooms. With damping enabled, input accumulates into a delta that is
//! only partially applied every frame, which gives the camera inertia.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Point3, Vector2, Vector3, Zero};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
};

use crate::{camera::PerspectiveCamera, config::ControlsConfig};

const EPS: f32 = 0.000_001;

/// Spherical coordinates around the target, polar angle measured from +y.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Rotate,
    Pan,
}

#[derive(Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub enabled: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    /// Height of the input surface in the same unit as cursor positions.
    pub client_height: f32,
    spherical_delta: Spherical,
    pan_offset: Vector3<f32>,
    pending_pan: Vector2<f32>,
    scale: f32,
    drag: Option<Drag>,
    cursor: Option<PhysicalPosition<f64>>,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig, client_height: f32) -> Self {
        Self {
            target: config.target,
            enabled: true,
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            client_height: client_height.max(1.0),
            spherical_delta: Spherical::default(),
            pan_offset: Vector3::zero(),
            pending_pan: Vector2::zero(),
            scale: 1.0,
            drag: None,
            cursor: None,
        }
    }

    /// Orbit by a cursor movement in pixels. A drag across the full height
    /// turns the camera once around the target.
    pub fn rotate_by_pixels(&mut self, dx: f32, dy: f32) {
        if !self.enabled {
            return;
        }
        let full_turn = 2.0 * PI / self.client_height;
        self.spherical_delta.theta -= full_turn * dx * self.rotate_speed;
        self.spherical_delta.phi -= full_turn * dy * self.rotate_speed;
    }

    /// Pan by a cursor movement in pixels. Converted to world units on the
    /// next [`update`](Self::update), where the camera is known.
    pub fn pan_by_pixels(&mut self, dx: f32, dy: f32) {
        if !self.enabled {
            return;
        }
        self.pending_pan += Vector2::new(dx, dy) * self.pan_speed;
    }

    /// Positive steps move the camera closer to the target.
    pub fn zoom_by(&mut self, steps: f32) {
        if !self.enabled || steps == 0.0 {
            return;
        }
        let zoom_scale = 0.95_f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= zoom_scale;
        } else {
            self.scale /= zoom_scale;
        }
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => self.client_height = (size.height as f32).max(1.0),
            WindowEvent::MouseInput { state, button, .. } => {
                self.drag = match (state, button) {
                    (ElementState::Pressed, MouseButton::Left) if self.enabled => Some(Drag::Rotate),
                    (ElementState::Pressed, MouseButton::Right) if self.enabled => Some(Drag::Pan),
                    (ElementState::Released, _) => None,
                    _ => self.drag,
                };
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (Some(drag), Some(last)) = (self.drag, self.cursor) {
                    let dx = (position.x - last.x) as f32;
                    let dy = (position.y - last.y) as f32;
                    match drag {
                        Drag::Rotate => self.rotate_by_pixels(dx, dy),
                        Drag::Pan => self.pan_by_pixels(dx, dy),
                    }
                }
                self.cursor = Some(*position);
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.drag = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => (position.y / 100.0) as f32,
                };
                self.zoom_by(steps);
            }
            _ => (),
        }
    }

    fn apply_pending_pan(&mut self, camera: &PerspectiveCamera) {
        if self.pending_pan.is_zero() {
            return;
        }
        let offset = camera.position - self.target;
        // half the vertical fov spans from the centre to the top of the screen
        let target_distance = offset.magnitude() * (camera.fovy.0 / 2.0).tan();
        let forward = (self.target - camera.position).normalize();
        let right = forward.cross(camera.up).normalize();
        let up = right.cross(forward);
        let left = -right * (2.0 * self.pending_pan.x * target_distance / self.client_height);
        let upward = up * (2.0 * self.pending_pan.y * target_distance / self.client_height);
        self.pan_offset += left + upward;
        self.pending_pan = Vector2::zero();
    }

    /// Move `camera` according to the accumulated input.
    ///
    /// Returns whether the camera changed.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        self.apply_pending_pan(camera);

        let previous_position = camera.position;
        let previous_target = camera.target;
        let mut spherical = Spherical::from_offset(camera.position - self.target);

        if self.enable_damping {
            spherical.theta += self.spherical_delta.theta * self.damping_factor;
            spherical.phi += self.spherical_delta.phi * self.damping_factor;
        } else {
            spherical.theta += self.spherical_delta.theta;
            spherical.phi += self.spherical_delta.phi;
        }

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPS, PI - EPS);
        spherical.radius =
            (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        if self.enable_damping {
            self.target += self.pan_offset * self.damping_factor;
        } else {
            self.target += self.pan_offset;
        }

        camera.position = self.target + spherical.to_offset();
        camera.target = self.target;

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.spherical_delta.theta *= decay;
            self.spherical_delta.phi *= decay;
            self.pan_offset *= decay;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vector3::zero();
        }
        self.scale = 1.0;

        (camera.position - previous_position).magnitude2() > EPS
            || (camera.target - previous_target).magnitude2() > EPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewerConfig;

    fn setup(damping: bool) -> (OrbitControls, PerspectiveCamera) {
        let config = ViewerConfig::default();
        let mut controls_config = config.controls.clone();
        controls_config.enable_damping = damping;
        let controls = OrbitControls::new(&controls_config, 800.0);
        let camera = PerspectiveCamera::new(&config.camera, 1.0);
        (controls, camera)
    }

    fn azimuth(controls: &OrbitControls, camera: &PerspectiveCamera) -> f32 {
        Spherical::from_offset(camera.position - controls.target).theta
    }

    #[test]
    fn first_update_looks_at_target_without_moving() {
        let (mut controls, mut camera) = setup(true);
        let before = camera.position;
        controls.update(&mut camera);
        assert_eq!(camera.target, controls.target);
        assert!((camera.position - before).magnitude() < 1e-4);
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn undamped_rotation_applies_at_once() {
        let (mut controls, mut camera) = setup(false);
        controls.update(&mut camera);
        let start = azimuth(&controls, &camera);

        // a quarter of the client height is a quarter turn
        controls.rotate_by_pixels(-200.0, 0.0);
        assert!(controls.update(&mut camera));
        let turned = azimuth(&controls, &camera) - start;
        assert!((turned - PI / 2.0).abs() < 1e-4);
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn damped_rotation_eases_in_and_settles() {
        let (mut controls, mut camera) = setup(true);
        controls.update(&mut camera);
        let start = azimuth(&controls, &camera);

        controls.rotate_by_pixels(-50.0, 0.0);
        let total = 2.0 * PI * 50.0 / 800.0;
        controls.update(&mut camera);
        let first = azimuth(&controls, &camera) - start;
        assert!((first - total * 0.05).abs() < 1e-4);

        for _ in 0..400 {
            controls.update(&mut camera);
        }
        let settled = azimuth(&controls, &camera) - start;
        assert!((settled - total).abs() < 1e-3);
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let (mut controls, mut camera) = setup(false);
        controls.rotate_by_pixels(0.0, 10_000.0);
        controls.update(&mut camera);
        let offset = camera.position - controls.target;
        // parked right above the target, still on the upper hemisphere
        assert!(offset.y > 0.0);
        assert!(Vector2::new(offset.x, offset.z).magnitude() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped_to_distance_limits() {
        let (mut controls, mut camera) = setup(false);
        controls.min_distance = 2.0;
        controls.max_distance = 5.0;
        for _ in 0..200 {
            controls.zoom_by(1.0);
        }
        controls.update(&mut camera);
        assert!(((camera.position - controls.target).magnitude() - 2.0).abs() < 1e-4);

        for _ in 0..200 {
            controls.zoom_by(-1.0);
        }
        controls.update(&mut camera);
        assert!(((camera.position - controls.target).magnitude() - 5.0).abs() < 1e-4);
    }

    #[test]
    fn panning_moves_target_and_camera_together() {
        let (mut controls, mut camera) = setup(false);
        controls.update(&mut camera);
        let offset_before = camera.position - controls.target;
        let target_before = controls.target;

        controls.pan_by_pixels(100.0, 0.0);
        controls.update(&mut camera);

        assert!((controls.target - target_before).magnitude() > 0.01);
        let offset_after = camera.position - controls.target;
        assert!((offset_after - offset_before).magnitude() < 1e-4);
    }

    #[test]
    fn disabled_controls_ignore_input() {
        let (mut controls, mut camera) = setup(false);
        controls.update(&mut camera);
        controls.enabled = false;
        controls.rotate_by_pixels(300.0, 0.0);
        controls.pan_by_pixels(300.0, 0.0);
        controls.zoom_by(3.0);
        assert!(!controls.update(&mut camera));
    }
}
