pub mod camera;
pub mod layer;
pub mod light;
pub mod model;
pub mod node;
pub mod scene;
pub mod transform;
pub mod transform_system;

pub use camera::{Camera, ProjectionMode, ScaleAnchor, ScaleMode, Viewport};
pub use layer::{AaMode, AoSettings, Effect, Layer, LayerBackground};
pub use light::{Light, LightKind};
pub use model::Model;
pub use node::{Node, NodeKind};
pub use scene::Scene;
pub use transform::Transform;

slotmap::new_key_type! {
    /// Handle to a node in the scene graph.
    pub struct NodeHandle;
    /// Key into the scene's camera component pool.
    pub struct CameraKey;
    /// Key into the scene's layer component pool.
    pub struct LayerKey;
    /// Key into the scene's light component pool.
    pub struct LightKey;
    /// Key into the scene's model component pool.
    pub struct ModelKey;
}
