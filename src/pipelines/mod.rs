//! Render pipelines.
//!
//! - `basic` is the lit, shadow-receiving pipeline every model is drawn with
//! - `shadow` renders the depth of shadow casters from the directional light
//! - `light` owns the light uniform, the shadow map and their bind groups
//! - `gui` draws flat coloured quads over the scene

pub mod basic;
pub mod gui;
pub mod light;
pub mod shadow;

/// The pipelines the frame is drawn with, created once per surface format.
#[derive(Debug)]
pub struct Pipelines {
    pub basic: wgpu::RenderPipeline,
    pub shadow: wgpu::RenderPipeline,
    pub gui: wgpu::RenderPipeline,
}

impl Pipelines {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
        light: &light::LightResources,
    ) -> Self {
        Self {
            basic: basic::mk_basic_pipeline(
                device,
                config,
                &light.bind_group_layout,
                camera_bind_group_layout,
            ),
            shadow: shadow::mk_shadow_pipeline(device, &light.shadow_bind_group_layout),
            gui: gui::mk_gui_pipeline(device, config),
        }
    }
}
