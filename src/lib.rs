//! Retained-mode layer renderer core.
//!
//! The crate turns a scene graph into sorted draw lists: per layer it updates
//! transforms, fits the camera, culls against the view frustum, derives a
//! [`MaterialShaderKey`] per renderable and resolves it to a compiled program
//! through the [`ShaderCache`]. The graphics API sits behind the
//! [`RenderDevice`] trait, so the whole pipeline runs (and is tested) against
//! a headless device.

pub mod backend;
pub mod errors;
pub mod render;
pub mod resources;
pub mod scene;
pub mod tasks;
pub mod utils;

pub use backend::{DrawMode, ProgramHandle, RenderDevice};
pub use errors::{Result, StrataError};
pub use render::cache::ShaderCache;
pub use render::frame::FrameContext;
pub use render::frustum::ClipFrustum;
pub use render::key::MaterialShaderKey;
pub use render::layer_prep::LayerRenderPreparationData;
pub use render::settings::RenderSettings;
pub use resources::{Bounds3, Material, Mesh};
pub use scene::{Camera, Layer, Light, Node, Scene};
pub use utils::interner;
