//! Global render settings.

use glam::Vec2;

/// Settings that hold for every layer of a presentation.
///
/// Anything in here that affects generated shader code must also be folded
/// into the material shader key, so keys stay a pure function of
/// (material, light counts, settings).
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// The authored resolution that camera scale modes fit into the actual
    /// viewport.
    pub design_resolution: Vec2,
    /// Emit `light_<i>_<field>` uniforms instead of `lights[<i>].<field>`
    /// blocks. Chosen when the backend lacks array-of-struct uniform support.
    pub packed_light_uniforms: bool,
    pub fog_enabled: bool,
    /// Image-based lighting available for lit materials.
    pub ibl_enabled: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            design_resolution: Vec2::new(800.0, 600.0),
            packed_light_uniforms: false,
            fog_enabled: false,
            ibl_enabled: false,
        }
    }
}
