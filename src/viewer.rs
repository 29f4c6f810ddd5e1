//! The well viewer: the flows that make up the application and its entry
//! points.
//!
//! [`run_viewer`] shows the model with the debug panel. [`run_screen_viewer`]
//! adds a video screen that floats in the scene.

use instant::Duration;
use winit::event::WindowEvent;

use crate::{
    config::{ScreenConfig, ViewerConfig},
    context::{Context, InitContext},
    data_structures::scene_graph::{Scene, SceneNode, enable_shadows},
    flow::{self, FlowConsturctor, GraphicsFlow, Out},
    overlay::{CssObject, CssRenderer, CssScene, ElementSpec},
    panel::DebugPanel,
    render::Render,
    resources::load_model_gltf,
    viewport::Viewport,
};

#[derive(Debug, Default)]
pub struct ViewerState {
    pub models_loaded: usize,
}

pub enum ViewerEvent {
    ModelLoaded(Box<dyn SceneNode>),
    ModelFailed(String),
}

impl std::fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelLoaded(_) => f.write_str("ModelLoaded"),
            Self::ModelFailed(message) => f.debug_tuple("ModelFailed").field(message).finish(),
        }
    }
}

/// Loads the model and draws the scene it ends up in.
pub struct WellScene {
    scene: Scene,
    model_path: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WellScene {
    pub fn new(init: InitContext, config: &ViewerConfig) -> Self {
        Self {
            scene: Scene::new(config.background),
            model_path: config.model_path.clone(),
            device: init.device,
            queue: init.queue,
        }
    }

    /// Flag every mesh as a shadow caster and receiver, then add it.
    fn attach(&mut self, mut node: Box<dyn SceneNode>, queue: &wgpu::Queue) {
        let meshes = enable_shadows(node.as_mut());
        log::info!("Loaded {} with {meshes} meshes", self.model_path);
        self.scene.add(node);
        self.scene.write_to_buffers(queue);
    }
}

impl GraphicsFlow<ViewerState, ViewerEvent> for WellScene {
    fn on_init(&mut self, ctx: &mut Context, _: &mut ViewerState) -> Out<ViewerState, ViewerEvent> {
        ctx.clear_colour = self.scene.background.to_wgpu_color();
        let path = self.model_path.clone();
        let device = self.device.clone();
        let queue = self.queue.clone();
        Out::FutEvent(vec![Box::new(async move {
            match load_model_gltf(&path, &device, &queue).await {
                Ok(node) => ViewerEvent::ModelLoaded(node),
                Err(err) => ViewerEvent::ModelFailed(format!("{path}: {err:#}")),
            }
        })])
    }

    fn on_update(&mut self, _: &Context, _: &mut ViewerState, _: Duration) -> Out<ViewerState, ViewerEvent> {
        Out::Empty
    }

    fn on_window_events(
        &mut self,
        _: &Context,
        _: &mut ViewerState,
        _: &WindowEvent,
    ) -> Out<ViewerState, ViewerEvent> {
        Out::Empty
    }

    fn on_custom_events(
        &mut self,
        ctx: &Context,
        state: &mut ViewerState,
        event: ViewerEvent,
    ) -> Option<ViewerEvent> {
        match event {
            ViewerEvent::ModelLoaded(node) => {
                self.attach(node, &ctx.queue);
                state.models_loaded += 1;
            }
            // the scene stays empty, lights and controls keep working
            ViewerEvent::ModelFailed(message) => log::error!("Could not load model {message}"),
        }
        None
    }

    fn on_render(&self) -> Render<'_> {
        self.scene.get_render()
    }
}

/// A video element placed in the scene.
///
/// In the browser the element is an iframe composed by the [`CssRenderer`]
/// after every GPU frame. Native builds draw a dark quad in its place.
pub struct VideoScreen {
    config: ScreenConfig,
    renderer: CssRenderer,
    css_scene: CssScene,
    #[cfg(target_arch = "wasm32")]
    dom: Option<crate::overlay::dom::DomOverlay>,
    #[cfg(not(target_arch = "wasm32"))]
    stand_in: Scene,
    #[cfg(not(target_arch = "wasm32"))]
    device: wgpu::Device,
}

impl VideoScreen {
    pub fn new(init: InitContext, config: &ViewerConfig) -> Self {
        let mut css_scene = CssScene::new();
        css_scene.add(CssObject {
            element: ElementSpec::iframe(&config.screen),
            transform: config.screen.transform,
        });
        Self {
            config: config.screen.clone(),
            renderer: CssRenderer::new(&init.viewport),
            css_scene,
            #[cfg(target_arch = "wasm32")]
            dom: None,
            #[cfg(not(target_arch = "wasm32"))]
            stand_in: Scene::new(config.background),
            #[cfg(not(target_arch = "wasm32"))]
            device: init.device,
        }
    }
}

impl<S, E> GraphicsFlow<S, E> for VideoScreen {
    fn on_init(&mut self, ctx: &mut Context, _: &mut S) -> Out<S, E> {
        self.renderer.set_size(&ctx.viewport);

        #[cfg(target_arch = "wasm32")]
        match crate::overlay::dom::DomOverlay::new(&self.config.overlay_selector, &self.css_scene) {
            Ok(dom) => self.dom = Some(dom),
            Err(err) => log::error!("Video screen disabled: {err:#}"),
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            log::info!(
                "No DOM available, drawing a placeholder for {}",
                self.config.video.url()
            );
            for object in self.css_scene.objects() {
                match crate::overlay::screen::screen_node(&self.device, &ctx.queue, object) {
                    Ok(node) => self.stand_in.add(node),
                    Err(err) => log::error!("Video screen placeholder failed: {err:#}"),
                }
            }
            self.stand_in.write_to_buffers(&ctx.queue);
        }
        Out::Empty
    }

    fn on_update(&mut self, _: &Context, _: &mut S, _: Duration) -> Out<S, E> {
        Out::Empty
    }

    fn on_window_events(&mut self, ctx: &Context, _: &mut S, event: &WindowEvent) -> Out<S, E> {
        // runs before the engine resizes, so the viewport is derived here
        if let WindowEvent::Resized(size) = event {
            let viewport = Viewport::from_physical(
                *size,
                ctx.window().scale_factor(),
                ctx.viewport.max_pixel_ratio,
            );
            if !viewport.is_empty() {
                self.renderer.set_size(&viewport);
            }
        }
        Out::Empty
    }

    fn on_custom_events(&mut self, _: &Context, _: &mut S, event: E) -> Option<E> {
        Some(event)
    }

    fn on_render(&self) -> Render<'_> {
        #[cfg(not(target_arch = "wasm32"))]
        return self.stand_in.get_render();
        #[cfg(target_arch = "wasm32")]
        Render::None
    }

    fn on_composite(&mut self, ctx: &Context, _: &mut S) {
        let frame = self.renderer.compose(&self.css_scene, &ctx.camera.camera);
        #[cfg(target_arch = "wasm32")]
        if let Some(dom) = &self.dom {
            if let Err(err) = dom.apply(&frame) {
                log::error!("Could not update the video screen: {err:#}");
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        log::trace!("screen at {}", frame.object_transforms.join(" "));
    }
}

fn scene_constructor(config: &ViewerConfig) -> FlowConsturctor<ViewerState, ViewerEvent> {
    let config = config.clone();
    Box::new(move |init: InitContext| {
        Box::pin(async move {
            Box::new(WellScene::new(init, &config)) as Box<dyn GraphicsFlow<_, _>>
        })
    })
}

fn panel_constructor(config: &ViewerConfig) -> FlowConsturctor<ViewerState, ViewerEvent> {
    let config = config.clone();
    Box::new(move |init: InitContext| {
        Box::pin(async move {
            let width = init.viewport.width as f32;
            Box::new(DebugPanel::new(&init.device, &config, width)) as Box<dyn GraphicsFlow<_, _>>
        })
    })
}

fn screen_constructor(config: &ViewerConfig) -> FlowConsturctor<ViewerState, ViewerEvent> {
    let config = config.clone();
    Box::new(move |init: InitContext| {
        Box::pin(async move {
            Box::new(VideoScreen::new(init, &config)) as Box<dyn GraphicsFlow<_, _>>
        })
    })
}

/// The model, two lights, orbit controls and the debug panel.
pub fn run_viewer(config: ViewerConfig) -> anyhow::Result<()> {
    let constructors = vec![scene_constructor(&config), panel_constructor(&config)];
    flow::run(config, constructors)
}

/// [`run_viewer`] plus the video screen.
pub fn run_screen_viewer(config: ViewerConfig) -> anyhow::Result<()> {
    let constructors = vec![
        scene_constructor(&config),
        screen_constructor(&config),
        panel_constructor(&config),
    ];
    flow::run(config, constructors)
}

#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::prelude::*;

    use crate::config::ViewerConfig;

    fn to_js(err: anyhow::Error) -> JsValue {
        JsValue::from_str(&format!("{err:#}"))
    }

    #[wasm_bindgen]
    pub fn start_viewer() -> Result<(), JsValue> {
        super::run_viewer(ViewerConfig::default()).map_err(to_js)
    }

    #[wasm_bindgen]
    pub fn start_screen_viewer() -> Result<(), JsValue> {
        super::run_screen_viewer(ViewerConfig::default()).map_err(to_js)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_debug_without_nodes() {
        let event = ViewerEvent::ModelFailed("models/well.glb: not found".to_string());
        assert_eq!(
            format!("{event:?}"),
            "ModelFailed(\"models/well.glb: not found\")"
        );
    }

    #[test]
    fn screen_is_placed_from_the_config() {
        let config = ViewerConfig::default();
        let mut scene = CssScene::new();
        scene.add(CssObject {
            element: ElementSpec::iframe(&config.screen),
            transform: config.screen.transform,
        });
        let element = &scene.objects()[0].element;
        assert_eq!((element.width, element.height), (1280, 720));
        assert!(element.src.contains("aqz-KE-bpKQ"));
        assert!(element.src.contains("start=120"));
    }

    fn css_rule<'a>(page: &'a str, selector: &str) -> &'a str {
        let start = page.find(&format!("{selector} {{")).unwrap();
        let end = page[start..].find('}').unwrap() + start;
        &page[start..end]
    }

    #[test]
    fn page_layers_fill_the_window() {
        let page = include_str!("../web/index.html");
        for selector in [".webgl", ".css3d"] {
            let rule = css_rule(page, selector);
            assert!(rule.contains("width: 100vw"), "{rule}");
            assert!(rule.contains("height: 100vh"), "{rule}");
            assert!(rule.contains("position: fixed"), "{rule}");
        }
        assert!(css_rule(page, ".css3d").contains("pointer-events: none"));
    }
}
