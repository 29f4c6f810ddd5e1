//! The current size of the drawable area.

use winit::dpi::PhysicalSize;

/// Logical viewport size plus the device pixel ratio.
///
/// The renderer draws at `pixel_ratio()` device pixels per logical pixel,
/// which is the platform scale factor capped at `max_pixel_ratio` so that very
/// dense displays don't multiply the fragment work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale_factor: f64,
    pub max_pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, scale_factor: f64, max_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            scale_factor,
            max_pixel_ratio,
        }
    }

    pub fn from_physical(size: PhysicalSize<u32>, scale_factor: f64, max_pixel_ratio: f64) -> Self {
        let logical = size.to_logical::<f64>(scale_factor);
        Self::new(logical.width, logical.height, scale_factor, max_pixel_ratio)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn aspect(&self) -> f32 {
        if self.height <= 0.0 {
            return 1.0;
        }
        (self.width / self.height) as f32
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.scale_factor.min(self.max_pixel_ratio)
    }

    /// Size of the render target in device pixels.
    pub fn surface_size(&self) -> [u32; 2] {
        let ratio = self.pixel_ratio();
        [
            ((self.width * ratio).round() as u32).max(1),
            ((self.height * ratio).round() as u32).max(1),
        ]
    }

    /// Convert a physical cursor position into this viewport's logical pixels.
    pub fn to_logical(&self, position: winit::dpi::PhysicalPosition<f64>) -> (f64, f64) {
        (position.x / self.scale_factor, position.y / self.scale_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_ratio_is_capped() {
        let viewport = Viewport::new(800.0, 600.0, 3.0, 2.0);
        assert_eq!(viewport.pixel_ratio(), 2.0);
        assert_eq!(viewport.surface_size(), [1600, 1200]);
    }

    #[test]
    fn low_density_displays_keep_their_ratio() {
        let viewport = Viewport::new(800.0, 600.0, 1.25, 2.0);
        assert_eq!(viewport.surface_size(), [1000, 750]);
    }

    #[test]
    fn physical_sizes_are_converted_to_logical() {
        let viewport = Viewport::from_physical(PhysicalSize::new(1920, 1080), 2.0, 2.0);
        assert_eq!(viewport.width, 960.0);
        assert_eq!(viewport.height, 540.0);
        assert!((viewport.aspect() - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn zero_height_is_empty() {
        let viewport = Viewport::new(800.0, 0.0, 1.0, 2.0);
        assert!(viewport.is_empty());
        assert_eq!(viewport.aspect(), 1.0);
        assert_eq!(viewport.surface_size(), [800, 1]);
    }
}
