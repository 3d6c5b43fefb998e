//! Meshes and subsets.
//!
//! A [`Mesh`] is a pair of device buffers plus one or more [`MeshSubset`]s —
//! index ranges with their own local bounds and draw mode. Subsets are the
//! unit of rendering: culling, material assignment and draw submission all
//! happen per subset, never per mesh.
//!
//! Vertex/index *parsing* is out of scope here; an asset loader hands the
//! core buffers it has already uploaded plus the subset table it computed.

use glam::Vec3;

use crate::backend::{BufferHandle, DrawMode};
use crate::resources::bounds::Bounds3;

/// A drawable index range within a mesh.
#[derive(Debug, Clone)]
pub struct MeshSubset {
    /// First index (or first vertex for non-indexed meshes).
    pub offset: u32,
    /// Number of indices/vertices to draw.
    pub count: u32,
    /// Bounds in mesh-local space, as computed by the loader.
    pub bounds: Bounds3,
    pub draw_mode: DrawMode,
}

/// Geometry shared by any number of models.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
    pub subsets: Vec<MeshSubset>,
}

impl Mesh {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-subset mesh with the given local bounds and index count.
    #[must_use]
    pub fn with_subset(bounds: Bounds3, count: u32) -> Self {
        Self {
            vertex_buffer: None,
            index_buffer: None,
            subsets: vec![MeshSubset {
                offset: 0,
                count,
                bounds,
                draw_mode: DrawMode::Triangles,
            }],
        }
    }

    /// Unit cube centered at the origin (36 indices).
    #[must_use]
    pub fn unit_cube() -> Self {
        Self::with_subset(Bounds3::from_half_extent(0.5), 36)
    }

    /// Unit rectangle in the XY plane (6 indices).
    #[must_use]
    pub fn unit_rect() -> Self {
        Self::with_subset(
            Bounds3::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, 0.5, 0.0)),
            6,
        )
    }
}
