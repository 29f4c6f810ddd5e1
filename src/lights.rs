//! The light rig: one ambient light and one shadow-casting directional light.
//!
//! Intensities are plain fields so the debug panel can edit them; the rig is
//! converted into a [`LightUniform`] every frame, which is how an edit shows up
//! on the next rendered frame.

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    config::{Rgb, ViewerConfig},
};

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientLight {
    pub color: Rgb,
    pub intensity: f32,
}

/// Bounds of the orthographic camera the shadow map is rendered with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl OrthographicBounds {
    pub fn projection(&self) -> Matrix4<f32> {
        cgmath::ortho(
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightShadow {
    pub map_size: u32,
    pub camera: OrthographicBounds,
    /// Added to the fragment's light-space depth before comparing.
    pub bias: f32,
    /// World-space offset along the surface normal before projecting.
    pub normal_bias: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalLight {
    pub color: Rgb,
    pub intensity: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub cast_shadow: bool,
    pub shadow: LightShadow,
}

impl DirectionalLight {
    /// Unit vector from the lit surface towards the light.
    pub fn direction(&self) -> Vector3<f32> {
        (self.position - self.target).normalize()
    }

    /// Light-space view-projection in wgpu clip space.
    pub fn view_proj(&self) -> Matrix4<f32> {
        let direction = self.direction();
        // look_at degenerates when the light sits straight above its target
        let up = if direction.y.abs() > 0.999 {
            Vector3::unit_z()
        } else {
            Vector3::unit_y()
        };
        let view = Matrix4::look_at_rh(self.position, self.target, up);
        OPENGL_TO_WGPU_MATRIX * self.shadow.camera.projection() * view
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightRig {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
}

impl LightRig {
    pub fn new(config: &ViewerConfig) -> Self {
        let extent = config.shadow_extent;
        Self {
            ambient: AmbientLight {
                color: config.ambient_color,
                intensity: config.ambient_intensity,
            },
            directional: DirectionalLight {
                color: config.directional_color,
                intensity: config.directional_intensity,
                position: config.directional_position,
                target: Point3::origin(),
                cast_shadow: true,
                shadow: LightShadow {
                    map_size: config.shadow_map_size,
                    camera: OrthographicBounds {
                        left: -extent,
                        right: extent,
                        bottom: -extent,
                        top: extent,
                        near: config.shadow_near,
                        far: config.shadow_far,
                    },
                    bias: config.shadow_bias,
                    normal_bias: config.shadow_normal_bias,
                },
            },
        }
    }

    pub fn to_uniform(&self) -> LightUniform {
        let directional = &self.directional;
        let ambient = self.ambient.color.scaled(self.ambient.intensity);
        let color = directional.color.scaled(directional.intensity);
        let direction = directional.direction();
        let shadow = &directional.shadow;
        LightUniform {
            view_proj: directional.view_proj().into(),
            ambient: [ambient[0], ambient[1], ambient[2], 0.0],
            direction: [direction.x, direction.y, direction.z, 0.0],
            color: [color[0], color[1], color[2], 0.0],
            shadow: [
                shadow.bias,
                shadow.normal_bias,
                1.0 / shadow.map_size.max(1) as f32,
                if directional.cast_shadow { 1.0 } else { 0.0 },
            ],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub view_proj: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub direction: [f32; 4],
    pub color: [f32; 4],
    /// bias, normal bias, texel size, shadows enabled
    pub shadow: [f32; 4],
}

#[cfg(test)]
mod tests {
    use cgmath::Transform;

    use super::*;

    #[test]
    fn intensity_edits_reach_the_uniform() {
        let mut rig = LightRig::new(&ViewerConfig::default());
        assert_eq!(rig.to_uniform().ambient[0], 2.4);

        rig.ambient.intensity = 7.25;
        rig.directional.intensity = 0.5;
        let uniform = rig.to_uniform();
        assert_eq!(uniform.ambient[..3], [7.25, 7.25, 7.25]);
        assert_eq!(uniform.color[..3], [0.5, 0.5, 0.5]);
    }

    #[test]
    fn shadow_settings_are_packed() {
        let uniform = LightRig::new(&ViewerConfig::default()).to_uniform();
        assert_eq!(uniform.shadow, [-0.004, 0.027, 1.0 / 1024.0, 1.0]);
    }

    #[test]
    fn direction_points_at_the_light() {
        let rig = LightRig::new(&ViewerConfig::default());
        let direction = rig.directional.direction();
        let expected = 1.0 / 3.0_f32.sqrt();
        assert!((direction.x - expected).abs() < 1e-6);
        assert!((direction.y - expected).abs() < 1e-6);
        assert!((direction.z - expected).abs() < 1e-6);
    }

    #[test]
    fn shadow_frustum_covers_the_origin() {
        let rig = LightRig::new(&ViewerConfig::default());
        let clip = rig.directional.view_proj().transform_point(Point3::origin());
        assert!(clip.x.abs() < 1e-5 && clip.y.abs() < 1e-5);
        // the origin is ~8.66 units away inside a 0.5..15 depth range
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }

    #[test]
    fn overhead_light_still_has_a_frustum() {
        let mut rig = LightRig::new(&ViewerConfig::default());
        rig.directional.position = Point3::new(0.0, 10.0, 0.0);
        let clip = rig.directional.view_proj().transform_point(Point3::origin());
        assert!(clip.x.is_finite() && clip.y.is_finite() && clip.z.is_finite());
    }
}
