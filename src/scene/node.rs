use glam::Affine3A;

use crate::scene::transform::Transform;
use crate::scene::{CameraKey, LayerKey, LightKey, ModelKey, NodeHandle};

/// Closed set of node specializations.
///
/// Downcasting is by component lookup: a node tagged `NodeKind::Camera`
/// carries a `CameraKey` into the scene's camera pool, and so on. There is
/// no open-ended virtual dispatch anywhere in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    #[default]
    Node,
    Layer,
    Camera,
    Light,
    Model,
}

/// A scene-graph node.
///
/// Hot data only: hierarchy links, the transform, and the render state that
/// the per-frame walk reads (visibility, opacity). Typed payloads live in the
/// scene's component pools and are reached through the key fields.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,

    pub transform: Transform,
    pub visible: bool,
    /// Local opacity; multiplied down the tree during the prepare walk.
    pub opacity: f32,

    pub kind: NodeKind,
    pub(crate) camera: Option<CameraKey>,
    pub(crate) layer: Option<LayerKey>,
    pub(crate) light: Option<LightKey>,
    pub(crate) model: Option<ModelKey>,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visible: true,
            opacity: 1.0,
            kind: NodeKind::Node,
            camera: None,
            layer: None,
            light: None,
            model: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn camera(&self) -> Option<CameraKey> {
        self.camera
    }

    #[inline]
    #[must_use]
    pub fn layer(&self) -> Option<LayerKey> {
        self.layer
    }

    #[inline]
    #[must_use]
    pub fn light(&self) -> Option<LightKey> {
        self.light
    }

    #[inline]
    #[must_use]
    pub fn model(&self) -> Option<ModelKey> {
        self.model
    }

    /// World transform computed by the last hierarchy update.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }
}
