//! Transform component.
//!
//! Position, Euler rotation (configurable order), scale and pivot, plus the
//! cached local/world matrices and the dirty check. Properties are plain
//! public fields; dirtiness is detected by comparing against a shadow copy
//! when [`Transform::update_local_matrix`] runs, so callers never have to
//! remember to flag anything.

use glam::{Affine3A, EulerRot, Mat4, Quat, Vec3};

#[derive(Debug, Clone)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles in radians, applied in `rotation_order`.
    pub rotation: Vec3,
    pub rotation_order: EulerRot,
    pub scale: Vec3,
    /// Rotation/scale center, in local units. Folded into the local matrix
    /// as a pre-translation.
    pub pivot: Vec3,

    pub(crate) local_matrix: Affine3A,
    pub(crate) world_matrix: Affine3A,

    // Shadow state for the dirty check.
    last_position: Vec3,
    last_rotation: Vec3,
    last_order: EulerRot,
    last_scale: Vec3,
    last_pivot: Vec3,
    force_update: bool,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            rotation_order: EulerRot::YXZ,
            scale: Vec3::ONE,
            pivot: Vec3::ZERO,

            local_matrix: Affine3A::IDENTITY,
            world_matrix: Affine3A::IDENTITY,

            last_position: Vec3::ZERO,
            last_rotation: Vec3::ZERO,
            last_order: EulerRot::YXZ,
            last_scale: Vec3::ONE,
            last_pivot: Vec3::ZERO,
            force_update: true,
        }
    }

    /// Recompute the local matrix if any property changed since the last
    /// call. Returns whether a recompute happened.
    ///
    /// `local = T(position) * R(rotation) * S(scale) * T(-pivot)`
    pub fn update_local_matrix(&mut self) -> bool {
        let changed = self.position != self.last_position
            || self.rotation != self.last_rotation
            || self.rotation_order != self.last_order
            || self.scale != self.last_scale
            || self.pivot != self.last_pivot
            || self.force_update;

        if changed {
            let rotation = self.rotation_quat();
            self.local_matrix = Affine3A::from_translation(self.position)
                * Affine3A::from_quat(rotation)
                * Affine3A::from_scale(self.scale)
                * Affine3A::from_translation(-self.pivot);

            self.last_position = self.position;
            self.last_rotation = self.rotation;
            self.last_order = self.rotation_order;
            self.last_scale = self.scale;
            self.last_pivot = self.pivot;
            self.force_update = false;
        }

        changed
    }

    #[inline]
    #[must_use]
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(
            self.rotation_order,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    /// World matrix as `Mat4`, for uniform upload.
    #[inline]
    #[must_use]
    pub fn world_matrix_as_mat4(&self) -> Mat4 {
        Mat4::from(self.world_matrix)
    }

    pub(crate) fn set_world_matrix(&mut self, mat: Affine3A) {
        self.world_matrix = mat;
    }

    /// Force a recompute on the next update, e.g. after direct matrix edits.
    pub fn mark_dirty(&mut self) {
        self.force_update = true;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
