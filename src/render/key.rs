//! Material Shader Key
//!
//! A fixed-width bitfield-of-bitfields describing every material/lighting
//! feature toggle that affects generated shader code. Two renderables with
//! equal keys (and equal feature sets) are interchangeable users of one
//! compiled program; the key is the program-cache lookup key.
//!
//! The key must be a *pure function* of material state, clamped light/shadow
//! counts and global render settings. Per-frame data (camera position, model
//! matrices) are uniforms, never key bits.

use std::fmt;

/// Hard limit on lights the generated lighting loop unrolls.
pub const MAX_NUM_LIGHTS: u32 = 16;
/// Hard limit on shadow-casting lights per layer.
pub const MAX_NUM_SHADOWS: u32 = 8;

/// A named bit range inside [`MaterialShaderKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyField {
    pub name: &'static str,
    pub offset: u32,
    pub width: u32,
}

impl KeyField {
    const fn new(name: &'static str, offset: u32, width: u32) -> Self {
        Self { name, offset, width }
    }

    #[inline]
    #[must_use]
    pub const fn mask(&self) -> u64 {
        ((1u64 << self.width) - 1) << self.offset
    }

    #[inline]
    #[must_use]
    pub const fn max_value(&self) -> u64 {
        (1u64 << self.width) - 1
    }
}

/// Field table. Offsets are stable; the packed layout fits in 33 bits.
pub mod fields {
    use super::KeyField;

    pub const HAS_LIGHTING: KeyField = KeyField::new("has_lighting", 0, 1);
    pub const HAS_IBL: KeyField = KeyField::new("has_ibl", 1, 1);
    pub const LIGHT_COUNT: KeyField = KeyField::new("light_count", 2, 5);
    pub const SHADOW_COUNT: KeyField = KeyField::new("shadow_count", 7, 4);
    pub const SPECULAR_ENABLED: KeyField = KeyField::new("specular_enabled", 11, 1);
    pub const SPECULAR_MODEL: KeyField = KeyField::new("specular_model", 12, 2);
    pub const FRESNEL_ENABLED: KeyField = KeyField::new("fresnel_enabled", 14, 1);
    pub const VERTEX_COLORS: KeyField = KeyField::new("vertex_colors", 15, 1);
    pub const FOG_ENABLED: KeyField = KeyField::new("fog_enabled", 16, 1);
    pub const TESSELLATION_MODE: KeyField = KeyField::new("tessellation_mode", 17, 2);
    pub const BLEND_MODE: KeyField = KeyField::new("blend_mode", 19, 3);
    pub const HAS_TRANSPARENCY: KeyField = KeyField::new("has_transparency", 22, 1);
    /// One bit per material image channel, indexed by `ImageChannel`.
    pub const IMAGE_CHANNELS: KeyField = KeyField::new("image_channels", 23, 10);

    pub const ALL: [KeyField; 13] = [
        HAS_LIGHTING,
        HAS_IBL,
        LIGHT_COUNT,
        SHADOW_COUNT,
        SPECULAR_ENABLED,
        SPECULAR_MODEL,
        FRESNEL_ENABLED,
        VERTEX_COLORS,
        FOG_ENABLED,
        TESSELLATION_MODE,
        BLEND_MODE,
        HAS_TRANSPARENCY,
        IMAGE_CHANNELS,
    ];
}

/// Bit-packed shader feature descriptor.
///
/// Equality and hashing are over the raw bit pattern, which makes the key
/// directly usable in the program cache maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MaterialShaderKey {
    bits: u64,
}

impl MaterialShaderKey {
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self { bits }
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.bits
    }

    /// Store `value` into `field`.
    ///
    /// Values wider than the field are a contract violation upstream
    /// (callers clamp light counts before setting them).
    #[inline]
    pub fn set(&mut self, field: KeyField, value: u64) {
        debug_assert!(
            value <= field.max_value(),
            "value {value} overflows key field '{}' ({} bits)",
            field.name,
            field.width
        );
        self.bits = (self.bits & !field.mask()) | ((value << field.offset) & field.mask());
    }

    #[inline]
    #[must_use]
    pub fn get(self, field: KeyField) -> u64 {
        (self.bits & field.mask()) >> field.offset
    }

    #[inline]
    pub fn set_flag(&mut self, field: KeyField, value: bool) {
        self.set(field, u64::from(value));
    }

    #[inline]
    #[must_use]
    pub fn flag(self, field: KeyField) -> bool {
        self.get(field) != 0
    }

    /// Set a single bit inside a multi-bit field (the image-channel block).
    #[inline]
    pub fn set_bit_at(&mut self, field: KeyField, index: u32, value: bool) {
        debug_assert!(index < field.width, "bit index {index} outside '{}'", field.name);
        let bit = 1u64 << (field.offset + index);
        if value {
            self.bits |= bit;
        } else {
            self.bits &= !bit;
        }
    }

    #[inline]
    #[must_use]
    pub fn bit_at(self, field: KeyField, index: u32) -> bool {
        debug_assert!(index < field.width);
        self.bits & (1u64 << (field.offset + index)) != 0
    }
}

impl fmt::Display for MaterialShaderKey {
    /// Field-by-field dump, for diagnostics when a cache behaves unexpectedly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in fields::ALL.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={:#x}", field.name, self.get(*field))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_do_not_overlap() {
        let mut seen = 0u64;
        for field in fields::ALL {
            assert_eq!(seen & field.mask(), 0, "field '{}' overlaps", field.name);
            seen |= field.mask();
        }
    }

    #[test]
    fn set_get_roundtrip() {
        let mut key = MaterialShaderKey::default();
        key.set(fields::LIGHT_COUNT, 7);
        key.set_flag(fields::HAS_LIGHTING, true);
        key.set(fields::BLEND_MODE, 3);

        assert_eq!(key.get(fields::LIGHT_COUNT), 7);
        assert!(key.flag(fields::HAS_LIGHTING));
        assert_eq!(key.get(fields::BLEND_MODE), 3);
        // Neighbouring fields untouched.
        assert_eq!(key.get(fields::SHADOW_COUNT), 0);
    }

    #[test]
    fn channel_bits_are_independent() {
        let mut key = MaterialShaderKey::default();
        key.set_bit_at(fields::IMAGE_CHANNELS, 0, true);
        key.set_bit_at(fields::IMAGE_CHANNELS, 9, true);

        assert!(key.bit_at(fields::IMAGE_CHANNELS, 0));
        assert!(!key.bit_at(fields::IMAGE_CHANNELS, 1));
        assert!(key.bit_at(fields::IMAGE_CHANNELS, 9));
    }

    #[test]
    fn equal_bits_equal_keys() {
        let mut a = MaterialShaderKey::default();
        let mut b = MaterialShaderKey::default();
        a.set(fields::LIGHT_COUNT, 2);
        b.set(fields::LIGHT_COUNT, 2);
        assert_eq!(a, b);
        b.set_flag(fields::FOG_ENABLED, true);
        assert_ne!(a, b);
    }
}
