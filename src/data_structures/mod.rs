//! Scene data: models, textures, instances and the scene graph.
//!
//! - `model` contains mesh and material definitions and the draw helpers
//! - `texture` wraps GPU textures: base colour maps, depth and shadow maps
//! - `instance` holds a node's transform and its packed GPU form
//! - `scene_graph` organizes loaded nodes hierarchically

pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
