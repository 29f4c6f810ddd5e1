#[cfg(feature = "integration-tests")]
use scene_viewer::{
    context::Context,
    flow::{GraphicsFlow, ImageTestResult, Out},
    render::Render,
};

#[derive(Default)]
pub(crate) struct FrameCounter(pub(crate) u32);

impl FrameCounter {
    pub(crate) fn frame(&self) -> u32 {
        self.0
    }

    pub(crate) fn progress(&mut self) {
        self.0 += 1;
    }
}

/// Convert a linear clear colour channel into the byte an sRGB target stores.
pub(crate) fn srgb_byte(linear: f64) -> u8 {
    let encoded = if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    };
    (encoded.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Compare two pixels allowing for rounding in the colour conversion.
pub(crate) fn close_to(actual: &image::Rgba<u8>, expected: &image::Rgba<u8>) -> bool {
    actual
        .0
        .iter()
        .zip(expected.0.iter())
        .all(|(a, e)| a.abs_diff(*e) <= 1)
}

/// Reorder a pixel read back from a BGRA target.
#[cfg(feature = "integration-tests")]
pub(crate) fn as_rgba(pixel: &image::Rgba<u8>, format: wgpu::TextureFormat) -> image::Rgba<u8> {
    match format {
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => {
            let [b, g, r, a] = pixel.0;
            image::Rgba([r, g, b, a])
        }
        _ => *pixel,
    }
}

#[cfg(feature = "integration-tests")]
pub(crate) type Validate = Box<
    dyn Fn(
        &Context,
        &mut FrameCounter,
        &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error>,
>;

/// A flow that configures the context once and checks every rendered frame.
#[cfg(feature = "integration-tests")]
pub(crate) struct TestRender {
    pub(crate) setup: Box<dyn Fn(&mut Context)>,
    pub(crate) validate: Validate,
}

#[cfg(feature = "integration-tests")]
impl GraphicsFlow<FrameCounter, ()> for TestRender {
    fn on_init(&mut self, ctx: &mut Context, _: &mut FrameCounter) -> Out<FrameCounter, ()> {
        (self.setup)(ctx);
        Out::Empty
    }

    fn on_update(
        &mut self,
        _: &Context,
        state: &mut FrameCounter,
        _: std::time::Duration,
    ) -> Out<FrameCounter, ()> {
        state.progress();
        Out::Empty
    }

    fn on_window_events(
        &mut self,
        _: &Context,
        _: &mut FrameCounter,
        _: &scene_viewer::WindowEvent,
    ) -> Out<FrameCounter, ()> {
        Out::Empty
    }

    fn on_custom_events(&mut self, _: &Context, _: &mut FrameCounter, event: ()) -> Option<()> {
        Some(event)
    }

    fn on_render(&self) -> Render<'_> {
        Render::None
    }

    fn render_to_texture(
        &self,
        ctx: &Context,
        state: &mut FrameCounter,
        texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error> {
        (self.validate)(ctx, state, texture)
    }
}

#[macro_export]
macro_rules! golden_image_test {
    ($graphics_elem:expr) => {{
        use crate::common::test_utils::FrameCounter;
        use scene_viewer::config::ViewerConfig;
        use scene_viewer::flow::{FlowConsturctor, GraphicsFlow};
        let constructor: FlowConsturctor<FrameCounter, ()> = Box::new(|_| {
            Box::pin(async move {
                let g_flow: Box<dyn GraphicsFlow<FrameCounter, ()>> = Box::new($graphics_elem);
                g_flow
            })
        });

        scene_viewer::flow::run(ViewerConfig::default(), vec![constructor])
            .expect("Failed to run flow for integration test.");
    }};
}
