//! Scene graph container.
//!
//! Pure data: the node arena, the typed component pools, and the shared
//! resource pools (meshes, images). The renderer reads it; edits come from
//! whatever authoring/property system sits above — the graph only needs the
//! resulting property values, dirtiness is detected by the transforms
//! themselves.

use slotmap::SlotMap;

use crate::resources::{Image, ImageKey, Mesh, MeshKey};
use crate::scene::camera::Camera;
use crate::scene::layer::Layer;
use crate::scene::light::Light;
use crate::scene::model::Model;
use crate::scene::node::{Node, NodeKind};
use crate::scene::{CameraKey, LayerKey, LightKey, ModelKey, NodeHandle};

#[derive(Default)]
pub struct Scene {
    pub nodes: SlotMap<NodeHandle, Node>,
    pub roots: Vec<NodeHandle>,

    // ==== Component pools ====
    pub cameras: SlotMap<CameraKey, Camera>,
    pub layers: SlotMap<LayerKey, Layer>,
    pub lights: SlotMap<LightKey, Light>,
    pub models: SlotMap<ModelKey, Model>,

    // ==== Shared resources ====
    pub meshes: SlotMap<MeshKey, Mesh>,
    pub images: SlotMap<ImageKey, Image>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Node management ──────────────────────────────────────────────────────

    /// Add a node as a root.
    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = self.nodes.insert(node);
        self.roots.push(handle);
        handle
    }

    /// Add a node under `parent`.
    pub fn add_child(&mut self, parent: NodeHandle, mut node: Node) -> NodeHandle {
        node.parent = Some(parent);
        let handle = self.nodes.insert(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(handle);
        }
        handle
    }

    /// Re-parent `child` under `parent`, detaching it from its old position.
    pub fn attach(&mut self, child: NodeHandle, parent: NodeHandle) {
        if child == parent {
            log::warn!("Cannot attach a node to itself");
            return;
        }

        // Detach from old parent or the root list.
        let old_parent = self.nodes.get(child).and_then(|n| n.parent);
        if let Some(p) = old_parent {
            if let Some(n) = self.nodes.get_mut(p) {
                if let Some(i) = n.children.iter().position(|&x| x == child) {
                    n.children.remove(i);
                }
            }
        } else if let Some(i) = self.roots.iter().position(|&x| x == child) {
            self.roots.remove(i);
        }

        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            // The world matrix is stale in the new space.
            c.transform.mark_dirty();
        }
    }

    /// Remove a node and its whole subtree, including attached components.
    pub fn remove_node(&mut self, handle: NodeHandle) {
        let children = match self.nodes.get(handle) {
            Some(node) => node.children.clone(),
            None => return,
        };

        for child in children {
            self.remove_node(child);
        }

        let parent = self.nodes.get(handle).and_then(|n| n.parent);
        if let Some(p) = parent {
            if let Some(n) = self.nodes.get_mut(p) {
                if let Some(i) = n.children.iter().position(|&x| x == handle) {
                    n.children.remove(i);
                }
            }
        } else if let Some(i) = self.roots.iter().position(|&x| x == handle) {
            self.roots.remove(i);
        }

        if let Some(node) = self.nodes.get(handle) {
            if let Some(k) = node.camera {
                self.cameras.remove(k);
            }
            if let Some(k) = node.layer {
                self.layers.remove(k);
            }
            if let Some(k) = node.light {
                self.lights.remove(k);
            }
            if let Some(k) = node.model {
                self.models.remove(k);
            }
        }

        self.nodes.remove(handle);
    }

    // ── Typed spawn helpers ──────────────────────────────────────────────────

    /// Add a layer node at the root. Layers anchor a render target, so they
    /// live at the top of the graph.
    pub fn add_layer(&mut self, layer: Layer) -> NodeHandle {
        let key = self.layers.insert(layer);
        let mut node = Node::new();
        node.kind = NodeKind::Layer;
        node.layer = Some(key);
        self.add_node(node)
    }

    pub fn add_camera(&mut self, parent: NodeHandle, camera: Camera) -> NodeHandle {
        let key = self.cameras.insert(camera);
        let mut node = Node::new();
        node.kind = NodeKind::Camera;
        node.camera = Some(key);
        self.add_child(parent, node)
    }

    pub fn add_light(&mut self, parent: NodeHandle, light: Light) -> NodeHandle {
        let key = self.lights.insert(light);
        let mut node = Node::new();
        node.kind = NodeKind::Light;
        node.light = Some(key);
        self.add_child(parent, node)
    }

    pub fn add_model(&mut self, parent: NodeHandle, model: Model) -> NodeHandle {
        let key = self.models.insert(model);
        let mut node = Node::new();
        node.kind = NodeKind::Model;
        node.model = Some(key);
        self.add_child(parent, node)
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    pub fn add_image(&mut self, image: Image) -> ImageKey {
        self.images.insert(image)
    }

    // ── Lookups ──────────────────────────────────────────────────────────────

    /// Layer component of a node, when the node is a layer.
    #[must_use]
    pub fn layer_of(&self, node: NodeHandle) -> Option<LayerKey> {
        self.nodes.get(node).and_then(Node::layer)
    }
}
