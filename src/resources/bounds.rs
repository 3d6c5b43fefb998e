//! Axis-aligned bounding boxes.

use glam::{Affine3A, Vec3};

/// Axis-aligned box, `min`/`max` corners.
///
/// An empty box has `min > max` on every axis; [`Bounds3::EMPTY`] is the
/// identity for [`Bounds3::union`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds3 {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Cube of the given half-extent centered on the origin.
    #[must_use]
    pub fn from_half_extent(half: f32) -> Self {
        Self {
            min: Vec3::splat(-half),
            max: Vec3::splat(half),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    #[must_use]
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Corner selected by the low three bits of `index`
    /// (bit 0 → x-max, bit 1 → y-max, bit 2 → z-max).
    #[inline]
    #[must_use]
    pub fn corner(&self, index: u8) -> Vec3 {
        Vec3::new(
            if index & 1 != 0 { self.max.x } else { self.min.x },
            if index & 2 != 0 { self.max.y } else { self.min.y },
            if index & 4 != 0 { self.max.z } else { self.min.z },
        )
    }

    #[inline]
    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Transform into another space, returning the AABB of the transformed box.
    ///
    /// Center/extent form: the new extent is `abs(M) * extent`, avoiding the
    /// eight-corner loop.
    #[must_use]
    pub fn transformed(&self, transform: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }

        let center = transform.transform_point3(self.center());
        let extents = self.extents();

        let m = transform.matrix3;
        let new_extents = Vec3::new(
            m.x_axis.x.abs() * extents.x + m.y_axis.x.abs() * extents.y + m.z_axis.x.abs() * extents.z,
            m.x_axis.y.abs() * extents.x + m.y_axis.y.abs() * extents.y + m.z_axis.y.abs() * extents.z,
            m.x_axis.z.abs() * extents.x + m.y_axis.z.abs() * extents.y + m.z_axis.z.abs() * extents.z,
        );

        Self {
            min: center - new_extents,
            max: center + new_extents,
        }
    }
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_with_empty_is_identity() {
        let b = Bounds3::from_half_extent(1.0);
        assert_eq!(Bounds3::EMPTY.union(&b), b);
        assert_eq!(b.union(&Bounds3::EMPTY), b);
    }

    #[test]
    fn transformed_translation_shifts_corners() {
        let b = Bounds3::from_half_extent(0.5);
        let t = Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let moved = b.transformed(&t);
        assert!((moved.min.x - 9.5).abs() < 1e-6);
        assert!((moved.max.x - 10.5).abs() < 1e-6);
    }

    #[test]
    fn transformed_rotation_stays_conservative() {
        let b = Bounds3::from_half_extent(0.5);
        let r = Affine3A::from_rotation_z(std::f32::consts::FRAC_PI_4);
        let rotated = b.transformed(&r);
        // A 45° rotated unit cube needs a sqrt(2)-wide AABB in x/y.
        let half = std::f32::consts::SQRT_2 * 0.5;
        assert!((rotated.max.x - half).abs() < 1e-5);
        assert!((rotated.max.y - half).abs() < 1e-5);
    }
}
