//! Applying [`CssFrame`]s to real DOM elements.
//!
//! Layout inside the overlay host (`div.css3d` by default):
//!
//! ```text
//! host
//! └── view      overflow hidden, perspective
//!     └── camera    preserve-3d, camera transform
//!         └── iframe    one per CssObject, object transform
//! ```

use anyhow::Context as _;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, HtmlElement, HtmlIFrameElement};

use crate::overlay::{CssFrame, CssScene, ElementSpec};

fn js_err(context: &str, err: JsValue) -> anyhow::Error {
    anyhow::anyhow!("{context}: {err:?}")
}

fn set_styles(element: &HtmlElement, styles: &[(&str, &str)]) -> anyhow::Result<()> {
    let style = element.style();
    for (property, value) in styles {
        style
            .set_property(property, value)
            .map_err(|err| js_err(property, err))?;
    }
    Ok(())
}

fn create_div(document: &Document) -> anyhow::Result<HtmlElement> {
    document
        .create_element("div")
        .map_err(|err| js_err("create div", err))?
        .dyn_into::<HtmlElement>()
        .map_err(|_| anyhow::anyhow!("div is not an HtmlElement"))
}

fn create_iframe(document: &Document, spec: &ElementSpec) -> anyhow::Result<HtmlIFrameElement> {
    let iframe = document
        .create_element("iframe")
        .map_err(|err| js_err("create iframe", err))?
        .dyn_into::<HtmlIFrameElement>()
        .map_err(|_| anyhow::anyhow!("iframe is not an HtmlIFrameElement"))?;
    iframe.set_src(&spec.src);
    iframe
        .set_attribute("allow", "autoplay; encrypted-media")
        .map_err(|err| js_err("iframe allow", err))?;
    set_styles(
        &iframe,
        &[
            ("position", "absolute"),
            ("width", &format!("{}px", spec.width)),
            ("height", &format!("{}px", spec.height)),
            ("border", &format!("{}px", spec.border)),
            ("pointer-events", "auto"),
        ],
    )?;
    Ok(iframe)
}

/// The overlay's elements, created once and restyled every frame.
#[derive(Debug)]
pub struct DomOverlay {
    view: HtmlElement,
    camera: HtmlElement,
    objects: Vec<HtmlIFrameElement>,
}

impl DomOverlay {
    pub fn new(selector: &str, scene: &CssScene) -> anyhow::Result<Self> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .context("no document available")?;
        let host = document
            .query_selector(selector)
            .map_err(|err| js_err(selector, err))?
            .with_context(|| format!("no element matches {selector:?}"))?;

        let view = create_div(&document)?;
        set_styles(
            &view,
            &[
                ("overflow", "hidden"),
                ("position", "absolute"),
                ("top", "0"),
                ("left", "0"),
                ("pointer-events", "none"),
            ],
        )?;
        let camera = create_div(&document)?;
        set_styles(
            &camera,
            &[("transform-style", "preserve-3d"), ("pointer-events", "none")],
        )?;

        let mut objects = Vec::with_capacity(scene.objects().len());
        for object in scene.objects() {
            let iframe = create_iframe(&document, &object.element)?;
            camera
                .append_child(&iframe)
                .map_err(|err| js_err("append iframe", err))?;
            objects.push(iframe);
        }
        view.append_child(&camera)
            .map_err(|err| js_err("append camera", err))?;
        host.append_child(&view)
            .map_err(|err| js_err("append overlay", err))?;

        Ok(Self {
            view,
            camera,
            objects,
        })
    }

    pub fn apply(&self, frame: &CssFrame) -> anyhow::Result<()> {
        let width = format!("{}px", frame.width);
        let height = format!("{}px", frame.height);
        set_styles(
            &self.view,
            &[
                ("width", &width),
                ("height", &height),
                ("perspective", &frame.perspective()),
            ],
        )?;
        set_styles(
            &self.camera,
            &[
                ("width", &width),
                ("height", &height),
                ("transform", &frame.camera_transform),
            ],
        )?;
        for (element, transform) in self.objects.iter().zip(&frame.object_transforms) {
            set_styles(element, &[("transform", transform)])?;
        }
        Ok(())
    }
}
