//! A CSS 3D layer on top of the GPU canvas.
//!
//! HTML elements are placed in the scene like any other object: each has a
//! world transform and the [`CssRenderer`] turns it, together with the camera,
//! into `matrix3d(...)` strings. Composed after the GPU frame, the element
//! stays glued to the 3D scene while the camera orbits.
//!
//! The math is platform independent; applying it to the DOM lives in
//! [`dom`] and only exists in the browser. Native builds draw a stand-in quad
//! instead, see [`screen`].

use cgmath::Matrix4;

use crate::{
    camera::PerspectiveCamera, config::ScreenConfig, data_structures::instance::Instance,
    viewport::Viewport,
};

#[cfg(target_arch = "wasm32")]
pub mod dom;
#[cfg(not(target_arch = "wasm32"))]
pub mod screen;

/// The HTML element of a CSS object. Sizes are CSS pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSpec {
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub border: u32,
}

impl ElementSpec {
    pub fn iframe(config: &ScreenConfig) -> Self {
        Self {
            src: config.video.url(),
            width: config.width,
            height: config.height,
            border: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CssObject {
    pub element: ElementSpec,
    /// World transform. The scale maps CSS pixels to scene units.
    pub transform: Instance,
}

#[derive(Debug, Default, Clone)]
pub struct CssScene {
    objects: Vec<CssObject>,
}

impl CssScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: CssObject) {
        self.objects.push(object);
    }

    pub fn objects(&self) -> &[CssObject] {
        &self.objects
    }
}

/// Styles for one composited frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CssFrame {
    pub width: f64,
    pub height: f64,
    /// Distance of the CSS viewer to the screen, in CSS pixels.
    pub perspective_px: f32,
    pub camera_transform: String,
    /// One transform per object of the [`CssScene`], in the same order.
    pub object_transforms: Vec<String>,
}

impl CssFrame {
    pub fn perspective(&self) -> String {
        format!("{}px", self.perspective_px)
    }
}

/// Computes [`CssFrame`]s for a viewport of logical (CSS) pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct CssRenderer {
    width: f64,
    height: f64,
}

impl CssRenderer {
    pub fn new(viewport: &Viewport) -> Self {
        let mut renderer = Self {
            width: 0.0,
            height: 0.0,
        };
        renderer.set_size(viewport);
        renderer
    }

    pub fn set_size(&mut self, viewport: &Viewport) {
        self.width = viewport.width;
        self.height = viewport.height;
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn compose(&self, scene: &CssScene, camera: &PerspectiveCamera) -> CssFrame {
        let width_half = self.width / 2.0;
        let height_half = self.height / 2.0;
        // projection[1][1] * half height
        let perspective_px = epsilon(height_half as f32 / (camera.fovy.0 / 2.0).tan());

        let camera_transform = format!(
            "translateZ({}px){}translate({}px,{}px)",
            perspective_px,
            camera_css_matrix(&camera.view_matrix()),
            width_half,
            height_half,
        );
        let object_transforms = scene
            .objects()
            .iter()
            .map(|object| {
                format!(
                    "translate(-50%,-50%){}",
                    object_css_matrix(&object.transform.to_matrix())
                )
            })
            .collect();

        CssFrame {
            width: self.width,
            height: self.height,
            perspective_px,
            camera_transform,
            object_transforms,
        }
    }
}

fn epsilon(value: f32) -> f32 {
    if value.abs() < 1e-10 { 0.0 } else { value }
}

/// Format a column-major matrix as a CSS `matrix3d(...)` function.
pub fn css_matrix3d(matrix: &Matrix4<f32>) -> String {
    let elements: &[f32; 16] = matrix.as_ref();
    let values: Vec<String> = elements
        .iter()
        .map(|value| epsilon(*value).to_string())
        .collect();
    format!("matrix3d({})", values.join(","))
}

/// CSS has y pointing down, so the view matrix's second row is mirrored.
fn camera_css_matrix(view: &Matrix4<f32>) -> String {
    let mut flipped = *view;
    flipped.x.y = -flipped.x.y;
    flipped.y.y = -flipped.y.y;
    flipped.z.y = -flipped.z.y;
    flipped.w.y = -flipped.w.y;
    css_matrix3d(&flipped)
}

/// Objects mirror their local y axis so the element is not upside down.
fn object_css_matrix(world: &Matrix4<f32>) -> String {
    let mut flipped = *world;
    flipped.y = -flipped.y;
    css_matrix3d(&flipped)
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, InnerSpace, Point3, SquareMatrix, Vector3};

    use super::*;
    use crate::config::{CameraConfig, ViewerConfig};

    fn camera_at(position: Point3<f32>, fovy: f32) -> PerspectiveCamera {
        let config = CameraConfig {
            fovy: Deg(fovy),
            near: 0.1,
            far: 100.0,
            position,
        };
        PerspectiveCamera::new(&config, 16.0 / 9.0)
    }

    fn numbers(style: &str) -> Vec<f32> {
        let start = style.find("matrix3d(").map(|i| i + 9).unwrap_or(0);
        let end = style[start..].find(')').unwrap() + start;
        style[start..end]
            .split(',')
            .map(|value| value.parse().unwrap())
            .collect()
    }

    #[test]
    fn identity_has_no_negative_zeros() {
        assert_eq!(
            css_matrix3d(&Matrix4::identity()),
            "matrix3d(1,0,0,0,0,1,0,0,0,0,1,0,0,0,0,1)"
        );
        let mut tiny = Matrix4::identity();
        tiny.w.x = 1e-12;
        tiny.w.y = -0.0;
        assert_eq!(css_matrix3d(&tiny), css_matrix3d(&Matrix4::identity()));
    }

    #[test]
    fn perspective_matches_the_vertical_fov() {
        let renderer = CssRenderer::new(&Viewport::new(1280.0, 720.0, 1.0, 2.0));
        let frame = renderer.compose(&CssScene::new(), &camera_at(Point3::new(0.0, 0.0, 5.0), 90.0));
        // tan(45deg) = 1, so the viewer sits half a screen height away
        assert!((frame.perspective_px - 360.0).abs() < 1e-3);
        assert!(frame.camera_transform.starts_with("translateZ(3"));
        assert!(frame.camera_transform.ends_with("translate(640px,360px)"));
        assert!(frame.object_transforms.is_empty());
    }

    #[test]
    fn camera_matrix_mirrors_y() {
        let camera = camera_at(Point3::new(0.0, 0.0, 5.0), 75.0);
        let renderer = CssRenderer::new(&Viewport::new(800.0, 600.0, 1.0, 2.0));
        let frame = renderer.compose(&CssScene::new(), &camera);
        let values = numbers(&frame.camera_transform);
        // looking down -z from (0,0,5): view is a translation by -5 along z
        assert_eq!(
            values,
            vec![1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -5.0, 1.0]
        );
    }

    #[test]
    fn objects_are_centred_and_mirrored() {
        let config = ViewerConfig::default().screen;
        let mut scene = CssScene::new();
        scene.add(CssObject {
            element: ElementSpec::iframe(&config),
            transform: config.transform,
        });

        let renderer = CssRenderer::new(&Viewport::new(800.0, 600.0, 1.0, 2.0));
        let frame = renderer.compose(&scene, &camera_at(Point3::new(4.0, 5.0, 6.0), 75.0));
        assert_eq!(frame.object_transforms.len(), 1);

        let style = &frame.object_transforms[0];
        assert!(style.starts_with("translate(-50%,-50%)matrix3d("));
        let values = numbers(style);
        let scale = config.transform.scale.x;
        assert!((values[0] - scale).abs() < 1e-7);
        assert!((values[5] + scale).abs() < 1e-7);
        assert!((values[10] - scale).abs() < 1e-7);
        let position = Vector3::new(values[12], values[13], values[14]);
        assert!((position - config.transform.position).magnitude2() < 1e-10);
    }

    #[test]
    fn resizing_moves_the_css_origin() {
        let camera = camera_at(Point3::new(0.0, 0.0, 5.0), 75.0);
        let mut renderer = CssRenderer::new(&Viewport::new(800.0, 600.0, 1.0, 2.0));
        renderer.set_size(&Viewport::new(1024.0, 768.0, 2.0, 2.0));
        let frame = renderer.compose(&CssScene::new(), &camera);
        assert_eq!((frame.width, frame.height), (1024.0, 768.0));
        assert!(frame.camera_transform.ends_with("translate(512px,384px)"));
    }
}
