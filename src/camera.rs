//! Perspective camera and the GPU resources that carry it to the shaders.

use cgmath::{EuclideanSpace, Matrix4, Point3, Rad, Vector3, perspective};

use crate::{config::CameraConfig, viewport::Viewport};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fovy: Rad<f32>,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl PerspectiveCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: config.position,
            target: Point3::origin(),
            up: Vector3::unit_y(),
            fovy: config.fovy.into(),
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    /// Keep the projection in step with the viewport.
    pub fn resize(&mut self, viewport: &Viewport) {
        if viewport.is_empty() {
            return;
        }
        self.aspect = viewport.aspect();
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    /// Right-handed projection with OpenGL depth range, as used by the DOM
    /// overlay. The GPU passes go through [`Self::view_proj`].
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        perspective(self.fovy, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.projection_matrix() * self.view_matrix()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: cgmath::Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &PerspectiveCamera) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = camera.view_proj().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub camera: PerspectiveCamera,
    pub uniform: CameraUniform,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Transform};

    use super::*;
    use crate::config::ViewerConfig;

    #[test]
    fn resize_updates_aspect() {
        let mut camera = PerspectiveCamera::new(&ViewerConfig::default().camera, 1.0);
        camera.resize(&Viewport::new(1280.0, 720.0, 1.0, 2.0));
        assert!((camera.aspect - 1280.0 / 720.0).abs() < 1e-6);
    }

    #[test]
    fn resize_ignores_minimised_windows() {
        let mut camera = PerspectiveCamera::new(&ViewerConfig::default().camera, 1.5);
        camera.resize(&Viewport::new(0.0, 0.0, 1.0, 2.0));
        assert_eq!(camera.aspect, 1.5);
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let config = CameraConfig {
            fovy: Deg(75.0),
            near: 0.1,
            far: 100.0,
            position: Point3::new(1.0, 2.0, 4.0),
        };
        let mut camera = PerspectiveCamera::new(&config, 16.0 / 9.0);
        camera.target = Point3::new(0.0, 1.0, 0.0);

        let clip = camera.view_proj().transform_point(camera.target);
        assert!(clip.x.abs() < 1e-5);
        assert!(clip.y.abs() < 1e-5);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }
}
