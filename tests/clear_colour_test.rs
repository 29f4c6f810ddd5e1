#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_background_without_a_model() {
    use common::test_utils::{TestRender, as_rgba, close_to, srgb_byte};
    use common::test_utils::FrameCounter;
    use scene_viewer::{config::ViewerConfig, context::Context, flow::ImageTestResult};

    let background = ViewerConfig::default().background.to_wgpu_color();
    golden_image_test!(TestRender {
        setup: Box::new(move |ctx: &mut Context| ctx.clear_colour = background),
        validate: Box::new(
            move |ctx: &Context,
                  state: &mut FrameCounter,
                  texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>| {
            if state.frame() == 0 {
                return Ok(ImageTestResult::Waiting);
            }
            let expected = if ctx.config.format.is_srgb() {
                image::Rgba([
                    srgb_byte(background.r),
                    srgb_byte(background.g),
                    srgb_byte(background.b),
                    255,
                ])
            } else {
                let byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                image::Rgba([byte(background.r), byte(background.g), byte(background.b), 255])
            };
            for pixel in texture.pixels() {
                let pixel = as_rgba(pixel, ctx.config.format);
                if !close_to(&pixel, &expected) {
                    anyhow::bail!("expected {expected:?}, got {pixel:?}");
                }
            }
            Ok(ImageTestResult::Passed)
        },
        ),
    });
}
