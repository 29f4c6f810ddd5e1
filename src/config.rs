//! Viewer configuration.
//!
//! Every tunable of the viewer lives in [`ViewerConfig`]. The defaults describe
//! the well scene: a mint background, a soft ambient light, a shadow-casting
//! sun in the upper corner and a camera slightly above the model.

use anyhow::{Context as _, bail};
use cgmath::{Deg, Point3, Quaternion, Rotation3, Vector3};

use crate::data_structures::instance::Instance;

/// An sRGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> anyhow::Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            bail!("expected six hex digits, got {hex:?}");
        }
        let channel = |range: std::ops::Range<usize>| -> anyhow::Result<f32> {
            let value = u8::from_str_radix(&digits[range], 16)
                .with_context(|| format!("invalid hex colour {hex:?}"))?;
            Ok(f32::from(value) / 255.0)
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Convert from the sRGB transfer curve to linear light.
    pub fn to_linear(self) -> Self {
        fn channel(c: f32) -> f32 {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        Self::new(channel(self.r), channel(self.g), channel(self.b))
    }

    /// Linear clear colour for an sRGB surface.
    pub fn to_wgpu_color(self) -> wgpu::Color {
        let linear = self.to_linear();
        wgpu::Color {
            r: f64::from(linear.r),
            g: f64::from(linear.g),
            b: f64::from(linear.b),
            a: 1.0,
        }
    }

    pub fn scaled(self, intensity: f32) -> [f32; 3] {
        let linear = self.to_linear();
        [
            linear.r * intensity,
            linear.g * intensity,
            linear.b * intensity,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraConfig {
    pub fovy: Deg<f32>,
    pub near: f32,
    pub far: f32,
    pub position: Point3<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlsConfig {
    pub target: Point3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliderConfig {
    pub label: String,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

/// A YouTube embed, rendered as an iframe on the screen overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEmbed {
    pub base_url: String,
    pub video_id: String,
    pub autoplay: bool,
    pub modest_branding: bool,
    pub related_videos: bool,
    pub start_seconds: u32,
}

impl VideoEmbed {
    pub fn url(&self) -> String {
        format!(
            "{}/{}?autoplay={}&modestbranding={}&rel={}&start={}",
            self.base_url.trim_end_matches('/'),
            self.video_id,
            u8::from(self.autoplay),
            u8::from(self.modest_branding),
            u8::from(self.related_videos),
            self.start_seconds,
        )
    }
}

impl Default for VideoEmbed {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com/embed".to_string(),
            video_id: "aqz-KE-bpKQ".to_string(),
            autoplay: true,
            modest_branding: true,
            related_videos: false,
            start_seconds: 120,
        }
    }
}

/// Where and how big the video screen is.
///
/// `width`/`height` are the iframe's CSS pixels; `transform` places the element
/// in world units, so its scale converts CSS pixels into scene units.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenConfig {
    pub overlay_selector: String,
    pub video: VideoEmbed,
    pub width: u32,
    pub height: u32,
    pub transform: Instance,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            overlay_selector: "div.css3d".to_string(),
            video: VideoEmbed::default(),
            width: 1280,
            height: 720,
            transform: Instance {
                position: Vector3::new(0.0, 2.2, -1.5),
                rotation: Quaternion::from_angle_y(Deg(0.0)),
                scale: Vector3::new(0.0015, 0.0015, 0.0015),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub model_path: String,
    pub background: Rgb,
    pub canvas_selector: String,
    pub ambient_color: Rgb,
    pub ambient_intensity: f32,
    pub directional_color: Rgb,
    pub directional_intensity: f32,
    pub directional_position: Point3<f32>,
    pub shadow_map_size: u32,
    /// Half extent of the square orthographic shadow camera.
    pub shadow_extent: f32,
    pub shadow_near: f32,
    pub shadow_far: f32,
    pub shadow_bias: f32,
    pub shadow_normal_bias: f32,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub ambient_slider: SliderConfig,
    pub directional_slider: SliderConfig,
    pub max_pixel_ratio: f64,
    pub screen: ScreenConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            model_path: "models/well.glb".to_string(),
            background: Rgb::new(220.0 / 255.0, 1.0, 229.0 / 255.0),
            canvas_selector: "canvas.webgl".to_string(),
            ambient_color: Rgb::WHITE,
            ambient_intensity: 2.4,
            directional_color: Rgb::WHITE,
            directional_intensity: 1.8,
            directional_position: Point3::new(5.0, 5.0, 5.0),
            shadow_map_size: 1024,
            shadow_extent: 7.0,
            shadow_near: 0.5,
            shadow_far: 15.0,
            shadow_bias: -0.004,
            shadow_normal_bias: 0.027,
            camera: CameraConfig {
                fovy: Deg(75.0),
                near: 0.1,
                far: 100.0,
                position: Point3::new(1.0, 2.0, 4.0),
            },
            controls: ControlsConfig {
                target: Point3::new(0.0, 1.0, 0.0),
                enable_damping: true,
                damping_factor: 0.05,
            },
            ambient_slider: SliderConfig {
                label: "Ambient Light Intensity".to_string(),
                min: 0.0,
                max: 10.0,
                step: 0.001,
            },
            directional_slider: SliderConfig {
                label: "Directional Light Intensity".to_string(),
                min: 0.0,
                max: 10.0,
                step: 0.001,
            },
            max_pixel_ratio: 2.0,
            screen: ScreenConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_background_hex() {
        let colour = Rgb::from_hex("#dcffe5").unwrap();
        assert_eq!(colour, ViewerConfig::default().background);
        assert_eq!(Rgb::from_hex("dcffe5").unwrap(), colour);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(Rgb::from_hex("#dcff").is_err());
        assert!(Rgb::from_hex("#gg0000").is_err());
        assert!(Rgb::from_hex("#dcffé").is_err());
    }

    #[test]
    fn linearisation_keeps_black_and_white() {
        assert_eq!(Rgb::new(0.0, 0.0, 0.0).to_linear(), Rgb::new(0.0, 0.0, 0.0));
        let white = Rgb::WHITE.to_linear();
        assert!((white.r - 1.0).abs() < 1e-6);
        let mid = Rgb::new(0.5, 0.5, 0.5).to_linear();
        assert!((mid.g - 0.214).abs() < 1e-3);
    }

    #[test]
    fn light_colour_is_scaled_by_intensity() {
        assert_eq!(Rgb::WHITE.scaled(2.4), [2.4, 2.4, 2.4]);
    }

    #[test]
    fn video_url_carries_player_flags() {
        let video = VideoEmbed {
            video_id: "abc".to_string(),
            start_seconds: 42,
            ..Default::default()
        };
        assert_eq!(
            video.url(),
            "https://www.youtube.com/embed/abc?autoplay=1&modestbranding=1&rel=0&start=42"
        );
    }

    #[test]
    fn defaults_match_the_scene() {
        let config = ViewerConfig::default();
        assert_eq!(config.model_path, "models/well.glb");
        assert_eq!(config.shadow_map_size, 1024);
        assert_eq!(config.camera.fovy, Deg(75.0));
        assert_eq!(config.controls.target, Point3::new(0.0, 1.0, 0.0));
        assert_eq!(config.ambient_slider.max, 10.0);
    }
}
