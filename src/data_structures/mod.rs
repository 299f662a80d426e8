//! Engine data structures: models, textures, scene graphs, and instances.
//!
//! - `model` contains mesh and material definitions, GPU resources for 3D models
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `instance` holds per-node transformation data
//! - `bounds` holds axis-aligned bounding boxes used to centre models
//! - `scene_graph` enables hierarchical scene organization

pub mod bounds;
pub mod instance;
pub mod model;
pub mod scene_graph;
pub mod texture;
