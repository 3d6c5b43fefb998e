//! Layer component.
//!
//! A layer is the boundary between 3D scene space and a 2D render target:
//! its subtree renders with an identity root transform into the layer's
//! portion of the presentation. It owns the per-target policy — antialiasing,
//! background, the active camera, the post-effect chain and the ambient
//! occlusion / light-probe parameters.

use std::borrow::Cow;

use glam::Vec4;

use crate::resources::ImageKey;
use crate::scene::NodeHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AaMode {
    #[default]
    None,
    Ssaa,
    Msaa,
    /// Accumulates over frames while the layer is clean; any dirtiness
    /// resets the accumulation.
    ProgressiveAa,
    TemporalAa,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LayerBackground {
    /// Clear to transparent black.
    Transparent,
    /// Leave the target untouched.
    #[default]
    Unspecified,
    SolidColor(Vec4),
}

/// Screen-space ambient occlusion parameters. A zero `strength` disables the
/// SSAO pass entirely.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AoSettings {
    pub strength: f32,
    pub distance: f32,
    pub softness: f32,
}

/// One entry of a layer's post-effect chain, applied in order after the
/// transparent pass.
#[derive(Debug, Clone)]
pub struct Effect {
    pub name: Cow<'static, str>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub aa_mode: AaMode,
    pub background: LayerBackground,
    /// The camera node this layer renders through. Without one the layer
    /// prepares nothing.
    pub camera: Option<NodeHandle>,
    pub effects: Vec<Effect>,
    pub shadow_bias: f32,
    pub ao: AoSettings,
    /// Image-based-lighting probe for lit materials in this layer.
    pub light_probe: Option<ImageKey>,

    /// Frames accumulated since the layer was last dirty.
    pub(crate) progressive_aa_frame: u32,
}

impl Layer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the layer's AO settings call for an SSAO pre-pass.
    #[inline]
    #[must_use]
    pub fn ssao_enabled(&self) -> bool {
        self.ao.strength > 0.0
    }

    #[inline]
    #[must_use]
    pub fn progressive_aa_frame(&self) -> u32 {
        self.progressive_aa_frame
    }
}
