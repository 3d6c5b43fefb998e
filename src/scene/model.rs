//! Model component.
//!
//! A model pairs a shared mesh with the materials drawn per subset. Materials
//! are owned here; renderables reference them by subset index during the
//! prepare walk. When a mesh has more subsets than the model has materials,
//! the last material repeats — the loader convention for single-material
//! multi-subset meshes.

use crate::resources::{Material, MeshKey};

#[derive(Debug, Clone)]
pub struct Model {
    pub mesh: MeshKey,
    pub materials: Vec<Material>,
}

impl Model {
    #[must_use]
    pub fn new(mesh: MeshKey, material: Material) -> Self {
        Self {
            mesh,
            materials: vec![material],
        }
    }

    /// Material drawn for `subset_index`, repeating the last entry when the
    /// mesh has more subsets than materials.
    #[must_use]
    pub fn material_for_subset(&self, subset_index: usize) -> Option<&Material> {
        if self.materials.is_empty() {
            return None;
        }
        self.materials
            .get(subset_index.min(self.materials.len() - 1))
    }
}
