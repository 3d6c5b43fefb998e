pub mod bounds;
pub mod image;
pub mod material;
pub mod mesh;

pub use bounds::Bounds3;
pub use image::{Image, ImageLoadState};
pub use material::{
    BlendMode, CustomMaterial, DefaultMaterial, ImageChannel, LightingModel, Material,
    SpecularModel, TessellationMode,
};
pub use mesh::{Mesh, MeshSubset};

slotmap::new_key_type! {
    /// Key into the scene's mesh pool.
    pub struct MeshKey;
    /// Key into the scene's image cache.
    pub struct ImageKey;
}
