//! live-screen
//!
//! A small 3D scene: a laptop model next to a screen surface that shows a
//! live snapshot of a web page. The page is rasterized off-screen on a fixed
//! interval, uploaded as a texture and mapped onto the screen quad, while the
//! scene keeps rendering continuously with orbit controls.
//!
//! High-level modules
//! - `capture`: page sources and the interval-driven snapshot capturer
//! - `bridge`: snapshot to texture upload and the slot the renderer reads from
//! - `screen`: the screen surface and its texture binding
//! - `normalizer`: model loading, scaling and centring
//! - `scene`: the laptop scene flow wiring the pieces together
//! - `camera`: orbit camera, projection and uniforms
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `flow`: flows and the application event loop
//! - `config`: scene configuration and environment overrides
//! - `data_structures`, `resources`, `pipelines`, `render`: engine plumbing
//!

pub mod bridge;
pub mod camera;
pub mod capture;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod normalizer;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod screen;
