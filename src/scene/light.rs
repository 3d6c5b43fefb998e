//! Light component.

use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    #[default]
    Directional,
    Point,
    Area,
}

#[derive(Debug, Clone)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub brightness: f32,
    /// Registers a shadow-map pass for this light during layer preparation.
    pub cast_shadow: bool,
    pub shadow_bias: f32,
    pub shadow_map_resolution: u32,
}

impl Light {
    #[must_use]
    pub fn directional() -> Self {
        Self {
            kind: LightKind::Directional,
            color: Vec3::ONE,
            brightness: 100.0,
            cast_shadow: false,
            shadow_bias: 0.0,
            shadow_map_resolution: 512,
        }
    }

    #[must_use]
    pub fn point() -> Self {
        Self {
            kind: LightKind::Point,
            ..Self::directional()
        }
    }

    #[must_use]
    pub fn with_shadow(mut self) -> Self {
        self.cast_shadow = true;
        self
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::directional()
    }
}
