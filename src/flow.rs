//! Flow control and the application event loop.
//!
//! A "flow" is a self-contained part of the viewer (the model scene, the debug
//! panel, the video screen) that handles input, updates its state and tells
//! the engine what to draw each frame. The engine owns the window, the GPU
//! [`Context`] and the render loop, and fans events out to every flow.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S, E>`] is the trait every flow implements
//! - [`Out<S, E>`] is the output type for async work and context configuration
//!
//! # Frame
//!
//! Every `RedrawRequested` the engine:
//! 1. advances the orbit controls and uploads the camera and light uniforms
//! 2. calls `on_update` on all flows
//! 3. collects `on_render` from all flows
//! 4. renders shadow casters into the shadow map
//! 5. renders models, then GUI quads, then GUI text into the surface
//! 6. presents the frame
//! 7. calls `on_composite` on all flows (for renderers outside the GPU)
//! 8. requests the next frame

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};

#[cfg(feature = "integration-tests")]
use tokio::runtime::Runtime;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    config::ViewerConfig,
    context::{Context, InitContext},
    data_structures::{
        model::{DrawModel, DrawShadow},
        texture::Texture,
    },
    render::{Flat, Instanced, Label, Render},
    viewport::Viewport,
};

///
/// This is the Output Type for every lifecycle hook where a flow can pass async work that is
/// handled according to the platform it runs on.
///
/// `Out::FutEvent` resolves futures of events that are put in the event queue once resolved.
/// They reach the flows through `on_custom_events`.
///
/// `Out::FutFn` resolves futures of state mutations that are applied without further action.
///
/// `Out::Configure` modifies the [`Context`] at runtime, for instance a light intensity or
/// whether the orbit controls react to the pointer.
///
/// `Empty` is the default output used when nothing has to be handled.
///
pub enum Out<S, E> {
    FutEvent(Vec<Box<dyn Future<Output = E>>>),
    FutFn(Vec<Box<dyn Future<Output = Box<dyn FnOnce(&mut S)>>>>),
    Configure(Box<dyn FnOnce(&mut Context)>),
    Empty,
}

impl<S, E> Default for Out<S, E> {
    fn default() -> Self {
        Self::Empty
    }
}

#[cfg(feature = "integration-tests")]
pub enum ImageTestResult {
    Passed,
    Waiting,
    Failed,
}

/// Trait for implementing one part of the viewer.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once when the flow is created; configure the context here
/// 2. `on_window_events()` is called for each winit window event, before the orbit
///    controls see it
/// 3. `on_update()` is called every frame
/// 4. `on_custom_events()` is called for events produced by `Out::FutEvent`
/// 5. `on_render()` is called each frame and specifies how to render `self`
/// 6. `on_composite()` is called after the frame has been presented
///
pub trait GraphicsFlow<S, E> {
    /// Initialize the flow and configure the context.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out<S, E>;

    /// Update state every frame with the elapsed time `dt`.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out<S, E>;

    /// Handle window events (pointer, wheel, resizing, etc.).
    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out<S, E>;

    /// Handle custom application events.
    ///
    /// Returns the event if it was not consumed, allowing it to be passed to
    /// the next flow. Returning `None` means the event was consumed.
    fn on_custom_events(&mut self, ctx: &Context, state: &mut S, event: E) -> Option<E>;

    /// Return renderable objects for this flow.
    fn on_render(&self) -> Render<'_>;

    /// Draw anything that is composited over the presented GPU frame.
    fn on_composite(&mut self, _ctx: &Context, _state: &mut S) {}

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(
        &self,
        _ctx: &Context,
        _state: &mut S,
        _texture: &mut image::ImageBuffer<image::Rgba<u8>, wgpu::BufferView>,
    ) -> Result<ImageTestResult, anyhow::Error> {
        Ok(ImageTestResult::Passed)
    }
}

// Dummy impl to make wasm work
impl<State, Event> Debug for dyn GraphicsFlow<State, Event> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Type alias for a flow constructor (factory function).
///
/// A flow constructor takes an `InitContext` and asynchronously returns a
/// boxed `GraphicsFlow`.
pub type FlowConsturctor<S, E> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow<S, E>>>>>>;

/// Application state bundle: GPU context, app state, and surface status.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
}

impl<State: 'static + Default> AppState<State> {
    async fn new(window: Arc<Window>, config: &ViewerConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;
        Ok(Self {
            ctx,
            state: State::default(),
            is_surface_configured: false,
        })
    }
}

impl<State: 'static> AppState<State> {
    fn resize(&mut self, size: PhysicalSize<u32>, scale_factor: f64) {
        let viewport =
            Viewport::from_physical(size, scale_factor, self.ctx.viewport.max_pixel_ratio);
        if viewport.is_empty() {
            return;
        }
        let [width, height] = viewport.surface_size();
        log::debug!(
            "Resizing to {}x{} logical px at pixel ratio {}",
            viewport.width,
            viewport.height,
            viewport.pixel_ratio()
        );
        self.ctx.viewport = viewport;
        self.ctx.camera.camera.resize(&viewport);
        self.ctx.config.width = width;
        self.ctx.config.height = height;
        self.ctx
            .surface
            .configure(&self.ctx.device, &self.ctx.config);
        self.ctx.depth_texture =
            Texture::create_depth_texture(&self.ctx.device, [width, height], "depth_texture");
        self.is_surface_configured = true;
    }

    #[cfg(feature = "integration-tests")]
    fn get_test_texture(&self, extent3d: wgpu::Extent3d) -> wgpu::Texture {
        self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Golden Image Test Output Texture"),
            size: extent3d,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.ctx.config.format,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    /// Rows of a texture copy must be 256 byte aligned, so the test target is
    /// padded to a width of a multiple of 64 RGBA pixels.
    #[cfg(feature = "integration-tests")]
    fn get_test_3d_extent(&self) -> wgpu::Extent3d {
        let width = self.ctx.config.width.div_ceil(64) * 64;
        wgpu::Extent3d {
            width,
            height: self.ctx.config.height,
            depth_or_array_layers: 1,
        }
    }

    fn render<Event>(
        &mut self,
        graphics_flows: &[Box<dyn GraphicsFlow<State, Event>>],
        #[cfg(feature = "integration-tests")] async_runtime: &Runtime,
        #[cfg(feature = "integration-tests")] event_loop: &winit::event_loop::EventLoopProxy<
            FlowEvent<State, Event>,
        >,
    ) -> Result<(), wgpu::SurfaceError> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        #[cfg(not(feature = "integration-tests"))]
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        #[cfg(feature = "integration-tests")]
        let (tex, view, depth) = {
            let extent3d = self.get_test_3d_extent();
            let tex = self.get_test_texture(extent3d);
            let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
            let depth = Texture::create_depth_texture(
                &self.ctx.device,
                [extent3d.width, extent3d.height],
                "test depth texture",
            );
            (tex, view, depth)
        };
        #[cfg(not(feature = "integration-tests"))]
        let depth_view = &self.ctx.depth_texture.view;
        #[cfg(feature = "integration-tests")]
        let depth_view = &depth.view;

        let mut models: Vec<Instanced> = Vec::new();
        let mut guis: Vec<Flat> = Vec::new();
        let mut labels: Vec<Label> = Vec::new();
        graphics_flows.iter().for_each(|flow| {
            flow.on_render()
                .set_pipelines(&mut models, &mut guis, &mut labels);
        });
        models.retain(|instanced| {
            let drawable = instanced.amount > 0 && instanced.instance.size() > 0;
            if !drawable {
                log::warn!("you attempted to render something with zero instances");
            }
            drawable
        });

        #[cfg(feature = "ui")]
        self.ctx.text.prepare(
            &self.ctx.device,
            &self.ctx.queue,
            [self.ctx.config.width, self.ctx.config.height],
            self.ctx.viewport.pixel_ratio() as f32,
            &labels,
        );
        #[cfg(not(feature = "ui"))]
        if !labels.is_empty() {
            log::trace!("{} labels skipped, text needs the `ui` feature", labels.len());
        }

        let mut encoder: wgpu::CommandEncoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Render Encoder"),
                });
        {
            let mut shadow_pass: wgpu::RenderPass<'_> =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Shadow Pass"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.ctx.light.shadow_map.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                    multiview_mask: None,
                });

            if self.ctx.light.rig.directional.cast_shadow {
                shadow_pass.set_pipeline(&self.ctx.pipelines.shadow);
                for instanced in models.iter().filter(|instanced| instanced.cast_shadow) {
                    shadow_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                    shadow_pass.draw_model_depth(
                        instanced.model,
                        0..instanced.amount as u32,
                        &self.ctx.light.shadow_bind_group,
                    );
                }
            }
        }
        {
            let mut render_pass: wgpu::RenderPass<'_> =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                    multiview_mask: None,
                });

            render_pass.set_pipeline(&self.ctx.pipelines.basic);
            for instanced in &models {
                render_pass.set_vertex_buffer(1, instanced.instance.slice(..));
                render_pass.draw_model_instanced(
                    instanced.model,
                    0..instanced.amount as u32,
                    &self.ctx.camera.bind_group,
                    &self.ctx.light.bind_group,
                );
            }

            render_pass.set_pipeline(&self.ctx.pipelines.gui);
            for flat in guis {
                render_pass.set_vertex_buffer(0, flat.vertex.slice(..));
                render_pass.set_index_buffer(flat.index.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..flat.amount as u32, 0, 0..1);
            }

            #[cfg(feature = "ui")]
            self.ctx.text.render(&mut render_pass);
        }

        #[cfg(feature = "integration-tests")]
        let output_buffer = {
            let u32_size = std::mem::size_of::<u32>() as u32;
            let extent3d = self.get_test_3d_extent();
            let output_buffer_size =
                (u32_size * extent3d.width * extent3d.height) as wgpu::BufferAddress;
            let output_buffer = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
                size: output_buffer_size,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                label: None,
                mapped_at_creation: false,
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &tex,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &output_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(u32_size * extent3d.width),
                        rows_per_image: Some(extent3d.height),
                    },
                },
                extent3d,
            );
            output_buffer
        };

        self.ctx.queue.submit(iter::once(encoder.finish()));

        #[cfg(feature = "integration-tests")]
        self.check_test_image(graphics_flows, async_runtime, event_loop, &output_buffer);

        output.present();
        #[cfg(feature = "ui")]
        self.ctx.text.trim();
        Ok(())
    }

    #[cfg(feature = "integration-tests")]
    fn check_test_image<Event>(
        &mut self,
        graphics_flows: &[Box<dyn GraphicsFlow<State, Event>>],
        async_runtime: &Runtime,
        event_loop: &winit::event_loop::EventLoopProxy<FlowEvent<State, Event>>,
        output_buffer: &wgpu::Buffer,
    ) {
        let extent3d = self.get_test_3d_extent();
        let buffer_slice = output_buffer.slice(..);
        let mapped = async_runtime.block_on(async {
            let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
            buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
                tx.send(result).ok();
            });
            self.ctx
                .device
                .poll(wgpu::PollType::Wait {
                    submission_index: None,
                    timeout: Some(Duration::from_secs(3)),
                })
                .map_err(|err| anyhow::anyhow!("polling the device failed: {err}"))?;
            rx.receive()
                .await
                .ok_or_else(|| anyhow::anyhow!("the map callback was dropped"))??;
            anyhow::Ok(())
        });
        if let Err(err) = mapped {
            panic!("Could not read back the test image: {err}");
        }

        let data = buffer_slice.get_mapped_range();
        let Some(mut img) = image::ImageBuffer::<image::Rgba<u8>, _>::from_raw(
            extent3d.width,
            extent3d.height,
            data,
        ) else {
            panic!("The test image buffer is smaller than its extent");
        };
        let state = &mut self.state;
        let all_passed = graphics_flows
            .iter()
            .map(|flow| flow.render_to_texture(&self.ctx, state, &mut img))
            .map(|res| match res {
                Err(e) => panic!("{}", e),
                Ok(ImageTestResult::Passed) => true,
                Ok(ImageTestResult::Failed) => panic!("Assertion failed"),
                Ok(ImageTestResult::Waiting) => false,
            })
            .fold(true, |all, passed| all && passed);
        drop(img);
        output_buffer.unmap();
        if all_passed && event_loop.send_event(FlowEvent::Exit).is_err() {
            log::error!("All assertions passed but the event loop is already closed");
        }
    }
}

pub struct App<State: 'static, Event: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: winit::event_loop::EventLoopProxy<FlowEvent<State, Event>>,
    state: Option<AppState<State>>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    // Taken on the first `resumed`.
    setup: Option<(ViewerConfig, Vec<FlowConsturctor<State, Event>>)>,
    last_time: Instant,
}

impl<State, Event> App<State, Event>
where
    State: 'static,
    Event: 'static,
{
    fn new(
        event_loop: &EventLoop<FlowEvent<State, Event>>,
        config: ViewerConfig,
        constructors: Vec<FlowConsturctor<State, Event>>,
    ) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            state: None,
            graphics_flows: Vec::new(),
            setup: Some((config, constructors)),
            last_time: Instant::now(),
        })
    }

    /// Run `on_init` of every flow and size the surface for the first time.
    fn start(&mut self, mut app_state: AppState<State>, flows: Vec<Box<dyn GraphicsFlow<State, Event>>>) {
        self.graphics_flows = flows;
        let size = app_state.ctx.window.inner_size();
        let scale_factor = app_state.ctx.window.scale_factor();
        app_state.resize(size, scale_factor);
        self.graphics_flows.iter_mut().for_each(|flow| {
            let events = flow.on_init(&mut app_state.ctx, &mut app_state.state);
            let proxy = self.proxy.clone();
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut app_state.state,
                &mut app_state.ctx,
                proxy,
                events,
            );
        });
        app_state.ctx.window.request_redraw();
        self.state = Some(app_state);
    }

    fn frame(&mut self) {
        let Some(state) = &mut self.state else {
            return;
        };
        let dt = self.last_time.elapsed();
        self.last_time = Instant::now();

        state.ctx.update_uniforms();
        self.graphics_flows.iter_mut().for_each(|f| {
            let events = f.on_update(&state.ctx, &mut state.state, dt);
            let proxy = self.proxy.clone();
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut state.state,
                &mut state.ctx,
                proxy,
                events,
            );
        });

        match state.render(
            &self.graphics_flows,
            #[cfg(feature = "integration-tests")]
            &self.async_runtime,
            #[cfg(feature = "integration-tests")]
            &self.proxy,
        ) {
            Ok(()) => self
                .graphics_flows
                .iter_mut()
                .for_each(|f| f.on_composite(&state.ctx, &mut state.state)),
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = state.ctx.window.inner_size();
                let scale_factor = state.ctx.window.scale_factor();
                state.resize(size, scale_factor);
            }
            Err(e) => {
                log::error!("Unable to render {}", e);
            }
        }

        // invoke main render loop
        state.ctx.window.request_redraw();
    }
}

pub(crate) enum FlowEvent<State: 'static, Event: 'static> {
    #[allow(dead_code)]
    Initialized {
        state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State, Event>>>,
    },
    #[allow(dead_code)]
    Mut(Box<dyn FnOnce(&mut State)>),
    Custom(Event),
    #[allow(dead_code)]
    Exit,
}

impl<State, Event> Debug for FlowEvent<State, Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { state: _, flows } => {
                f.debug_struct("Initialized").field("flows", flows).finish()
            }
            Self::Mut(_) => f.write_str("Mut(|&mut State| -> {...})"),
            Self::Custom(_) => f.write_str("Custom(E)"),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn canvas_attributes(selector: &str) -> anyhow::Result<winit::window::WindowAttributes> {
    use anyhow::Context as _;
    use wasm_bindgen::JsCast;
    use winit::platform::web::WindowAttributesExtWebSys;

    let window = web_sys::window().context("no window available")?;
    let document = window.document().context("no document available")?;
    let canvas = document
        .query_selector(selector)
        .map_err(|err| anyhow::anyhow!("invalid canvas selector {selector:?}: {err:?}"))?
        .with_context(|| format!("no element matches {selector:?}"))?
        .dyn_into::<web_sys::HtmlCanvasElement>()
        .map_err(|_| anyhow::anyhow!("{selector:?} is not a canvas"))?;
    let dimension = |value: Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>| {
        value.ok().and_then(|value| value.as_f64()).unwrap_or(1.0)
    };
    // start at the page size; the stylesheet keeps the canvas there afterwards
    let size = winit::dpi::LogicalSize::new(
        dimension(window.inner_width()),
        dimension(window.inner_height()),
    );
    Ok(Window::default_attributes()
        .with_canvas(Some(canvas))
        .with_inner_size(size))
}

impl<State: 'static + Default, Event: 'static> ApplicationHandler<FlowEvent<State, Event>>
    for App<State, Event>
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some((config, constructors)) = self.setup.take() else {
            return;
        };

        #[cfg(not(target_arch = "wasm32"))]
        let window_attributes = Window::default_attributes().with_title("Well");
        #[cfg(target_arch = "wasm32")]
        let window_attributes = match canvas_attributes(&config.canvas_selector) {
            Ok(attributes) => attributes,
            Err(err) => {
                log::error!("Cannot attach to the canvas: {err:#}");
                event_loop.exit();
                return;
            }
        };

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Cannot create a window: {err}");
                event_loop.exit();
                return;
            }
        };

        let init_future = async move {
            let app_state = AppState::new(window, &config).await?;
            let flow_futures: Vec<_> = constructors
                .into_iter()
                // Device and Queue are reference counted, so this only clones handles
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows: Vec<_> = futures::future::join_all(flow_futures).await;
            anyhow::Ok((app_state, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        match self.async_runtime.block_on(init_future) {
            Ok((app_state, flows)) => self.start(app_state, flows),
            Err(err) => {
                log::error!("App initialization failed: {err:#}");
                event_loop.exit();
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok((state, flows)) => FlowEvent::Initialized { state, flows },
                    Err(err) => {
                        log::error!("App initialization failed: {err:#}");
                        FlowEvent::Exit
                    }
                };
                if proxy.send_event(event).is_err() {
                    log::error!("The event loop closed during initialization");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent<State, Event>) {
        match event {
            FlowEvent::Initialized { state, flows } => self.start(state, flows),
            FlowEvent::Custom(custom_event) => {
                if let Some(state) = &mut self.state {
                    let result = self
                        .graphics_flows
                        .iter_mut()
                        .fold(Some(custom_event), |event, flow| {
                            flow.on_custom_events(&state.ctx, &mut state.state, event?)
                        });
                    if result.is_some() {
                        log::warn!("Warning! Custom event was not consumed this cycle");
                    }
                }
            }
            FlowEvent::Mut(fn_once) => {
                if let Some(state) = &mut self.state {
                    fn_once(&mut state.state);
                }
            }
            FlowEvent::Exit => {
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        // flows first, so the GUI can capture the pointer before the controls react
        self.graphics_flows.iter_mut().for_each(|f| {
            let events = f.on_window_events(&state.ctx, &mut state.state, &event);
            let proxy = self.proxy.clone();
            handle_flow_output(
                #[cfg(not(target_arch = "wasm32"))]
                &self.async_runtime,
                &mut state.state,
                &mut state.ctx,
                proxy,
                events,
            );
        });
        state.ctx.controls.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                let scale_factor = state.ctx.window.scale_factor();
                state.resize(size, scale_factor);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = state.ctx.window.inner_size();
                state.resize(size, scale_factor);
            }
            WindowEvent::RedrawRequested => self.frame(),
            _ => {}
        }
    }
}

fn handle_flow_output<State, Event>(
    #[cfg(not(target_arch = "wasm32"))] async_runtime: &tokio::runtime::Runtime,
    state: &mut State,
    ctx: &mut Context,
    proxy: winit::event_loop::EventLoopProxy<FlowEvent<State, Event>>,
    out: Out<State, Event>,
) {
    match out {
        // Send the events passed by the flow to winit
        Out::FutEvent(futures) => {
            let fut =
                async move { futures::future::join_all(futures.into_iter().map(Pin::from)).await };
            #[cfg(not(target_arch = "wasm32"))]
            {
                let resolved = async_runtime.block_on(fut);
                for event in resolved {
                    if let Err(err) = proxy.send_event(FlowEvent::Custom(event)) {
                        log::error!("Event loop was closed before all events could be processed: {err}");
                        break;
                    }
                }
            }

            #[cfg(target_arch = "wasm32")]
            {
                wasm_bindgen_futures::spawn_local(async move {
                    let resolved = fut.await;
                    for event in resolved {
                        if proxy.send_event(FlowEvent::Custom(event)).is_err() {
                            log::error!("Event loop was closed before all events could be processed");
                            break;
                        }
                    }
                });
            }
        }
        // Mutate the state if the arch supports blocking, create an event otherwise
        Out::FutFn(futures) => {
            let events: Vec<Pin<Box<dyn Future<Output = Box<dyn FnOnce(&mut State)>>>>> =
                futures.into_iter().map(Pin::from).collect();
            let fut = async move { futures::future::join_all(events.into_iter()).await };
            #[cfg(not(target_arch = "wasm32"))]
            {
                let resolved: Vec<Box<dyn FnOnce(&mut State)>> = async_runtime.block_on(fut);
                resolved.into_iter().for_each(|mutation| {
                    mutation(state);
                });
            }

            #[cfg(target_arch = "wasm32")]
            {
                let _ = state;
                wasm_bindgen_futures::spawn_local(async move {
                    let resolved = fut.await;
                    for mutation in resolved {
                        if proxy.send_event(FlowEvent::Mut(mutation)).is_err() {
                            log::error!("Event loop was closed before all mutations could be applied");
                            break;
                        }
                    }
                });
            }
        }
        Out::Configure(f) => f(ctx),
        Out::Empty => (),
    }
}

/// Open the viewer window (or attach to the canvas) and run `constructors`
/// until the window is closed.
pub fn run<State: 'static + Default, Event: 'static>(
    config: ViewerConfig,
    constructors: Vec<FlowConsturctor<State, Event>>,
) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)
            .map_err(|err| anyhow::anyhow!("could not initialize the console logger: {err}"))?;
    }

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(not(all(
        feature = "integration-tests",
        any(target_os = "linux", target_os = "windows")
    )))]
    let event_loop: EventLoop<FlowEvent<State, Event>> = EventLoop::with_user_event().build()?;

    let mut app: App<State, Event> = App::new(&event_loop, config, constructors)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
