//! scene-viewer
//!
//! A small cross-platform glTF viewer built on wgpu and winit. It loads a
//! model, lights it with an ambient and a shadow-casting directional light and
//! lets the user orbit around it. A debug panel edits the light intensities
//! live, and an optional video screen is composited into the scene through
//! CSS 3D transforms when running in the browser.
//!
//! High-level modules
//! - `camera`: perspective camera and its uniform
//! - `config`: every tunable of the viewer with its default
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `controls`: damped orbit controls
//! - `data_structures`: meshes, instances, textures and the scene graph
//! - `flow`: flows and the event loop that drives them
//! - `lights`: the ambient and directional light rig
//! - `overlay`: CSS 3D transforms for HTML elements placed in the scene
//! - `panel`: the light intensity debug panel
//! - `pipelines`: scene, shadow and GUI render pipelines
//! - `render`: render composition for efficient pipeline reuse
//! - `resources`: loading glTF models and textures
//! - `viewer`: the viewer's flows and entry points
//! - `viewport`: logical size and pixel ratio of the drawable area
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod controls;
pub mod data_structures;
pub mod flow;
pub mod lights;
pub mod overlay;
pub mod panel;
pub mod pipelines;
pub mod render;
pub mod resources;
#[cfg(feature = "ui")]
mod text;
pub mod viewer;
pub mod viewport;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use winit::dpi::PhysicalPosition;
pub use winit::event::WindowEvent;
