//! The GPU context shared by every flow.
//!
//! [`Context`] owns the surface, device and queue together with the state the
//! render loop needs every frame: the camera and its orbit controls, the
//! light rig and shadow map, the pipelines and the current [`Viewport`].

use std::sync::Arc;

use anyhow::Context as _;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    camera::{CameraResources, CameraUniform, PerspectiveCamera},
    config::ViewerConfig,
    controls::OrbitControls,
    data_structures::texture,
    lights::LightRig,
    pipelines::{Pipelines, light::LightResources},
    viewport::Viewport,
};

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub viewport: Viewport,
    pub camera: CameraResources,
    pub controls: OrbitControls,
    pub light: LightResources,
    pub pipelines: Pipelines,
    pub clear_colour: wgpu::Color,
    #[cfg(feature = "ui")]
    pub(crate) text: crate::text::TextResources,
}

impl Context {
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let viewport = Viewport::from_physical(
            window.inner_size(),
            window.scale_factor(),
            viewer.max_pixel_ratio,
        );
        let [width, height] = viewport.surface_size();

        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("creating the window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no graphics adapter is compatible with the surface")?;
        log::info!("Requesting device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("requesting a device")?;

        // Shaders write linear colour and rely on an sRGB surface to encode it.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface reports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera = mk_camera(&device, PerspectiveCamera::new(&viewer.camera, viewport.aspect()));
        // cursor positions arrive in physical pixels
        let controls = OrbitControls::new(&viewer.controls, window.inner_size().height as f32);
        let light = LightResources::new(&device, LightRig::new(viewer));
        let pipelines = Pipelines::new(&device, &config, &camera.bind_group_layout, &light);

        let depth_texture =
            texture::Texture::create_depth_texture(&device, [width, height], "depth_texture");

        #[cfg(feature = "ui")]
        let text = crate::text::TextResources::new(&device, &queue, config.format);

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            viewport,
            camera,
            controls,
            light,
            pipelines,
            clear_colour: viewer.background.to_wgpu_color(),
            #[cfg(feature = "ui")]
            text,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Advance the orbit controls and upload the camera and light uniforms.
    pub(crate) fn update_uniforms(&mut self) {
        self.controls.update(&mut self.camera.camera);
        self.camera.uniform.update_view_proj(&self.camera.camera);
        self.queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
        self.light.write(&self.device, &self.queue);
    }
}

fn mk_camera(device: &wgpu::Device, camera: PerspectiveCamera) -> CameraResources {
    let mut uniform = CameraUniform::new();
    uniform.update_view_proj(&camera);

    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Camera Buffer"),
        contents: bytemuck::cast_slice(&[uniform]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout: &bind_group_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some("camera_bind_group"),
    });

    CameraResources {
        camera,
        uniform,
        buffer,
        bind_group,
        bind_group_layout,
    }
}

/// The part of the [`Context`] a flow constructor gets to load its resources.
///
/// `Device` and `Queue` are reference counted, so cloning them is cheap.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub viewport: Viewport,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
            config: ctx.config.clone(),
            viewport: ctx.viewport,
        }
    }
}
