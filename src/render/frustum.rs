//! View-frustum extraction and bounds testing.
//!
//! Planes are pulled straight from a combined view-projection matrix
//! (Gribb/Hartmann) and stored pointing *inward*, so a point is inside when
//! its signed distance to every plane is non-negative. Box testing is
//! conservative: a box is only rejected when its positive vertex is behind
//! some plane, so rare false-inside results are possible but false culls are
//! not.

use glam::{Mat4, Vec3};

use crate::resources::Bounds3;

/// One clip plane in the form `dot(normal, p) + d >= 0` for inside points.
#[derive(Debug, Clone, Copy)]
pub struct FrustumPlane {
    pub normal: Vec3,
    pub d: f32,
    /// Bit `i` set when `normal[i] >= 0`. Selects the box corner farthest
    /// along the normal (the "p-vertex") without branching per axis.
    sign_mask: u8,
}

impl FrustumPlane {
    fn new(unnormalized: Vec3, d: f32) -> Self {
        let len = unnormalized.length();
        let (normal, d) = if len > f32::EPSILON {
            (unnormalized / len, d / len)
        } else {
            (Vec3::Z, d)
        };

        let mut sign_mask = 0u8;
        if normal.x >= 0.0 {
            sign_mask |= 1;
        }
        if normal.y >= 0.0 {
            sign_mask |= 2;
        }
        if normal.z >= 0.0 {
            sign_mask |= 4;
        }

        Self { normal, d, sign_mask }
    }

    /// Signed distance from the plane to a point; positive is inside.
    #[inline]
    #[must_use]
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// The box corner farthest along this plane's normal.
    #[inline]
    fn positive_vertex(&self, bounds: &Bounds3) -> Vec3 {
        bounds.corner(self.sign_mask)
    }
}

/// The six planes of a camera frustum, ordered left, right, bottom, top,
/// near, far.
#[derive(Debug, Clone, Copy)]
pub struct ClipFrustum {
    planes: [FrustumPlane; 6],
}

impl ClipFrustum {
    /// Extract planes from `projection * view`.
    ///
    /// `near_override` replaces the extracted near plane distance, used by
    /// shadow passes that want a tighter caster volume than the camera's.
    #[must_use]
    pub fn from_view_projection(view_projection: Mat4, near_override: Option<f32>) -> Self {
        let m = view_projection.transpose();
        let r0 = m.x_axis;
        let r1 = m.y_axis;
        let r2 = m.z_axis;
        let r3 = m.w_axis;

        let left = r3 + r0;
        let right = r3 - r0;
        let bottom = r3 + r1;
        let top = r3 - r1;
        // Zero-to-one depth range: near is row 2 directly.
        let near = r2;
        let far = r3 - r2;

        let mut planes = [
            FrustumPlane::new(left.truncate(), left.w),
            FrustumPlane::new(right.truncate(), right.w),
            FrustumPlane::new(bottom.truncate(), bottom.w),
            FrustumPlane::new(top.truncate(), top.w),
            FrustumPlane::new(near.truncate(), near.w),
            FrustumPlane::new(far.truncate(), far.w),
        ];

        if let Some(near_d) = near_override {
            planes[4].d = near_d;
        }

        Self { planes }
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[FrustumPlane; 6] {
        &self.planes
    }

    /// Whether an axis-aligned box touches the frustum. Empty bounds never do.
    #[must_use]
    pub fn intersects_bounds(&self, bounds: &Bounds3) -> bool {
        if bounds.is_empty() {
            return false;
        }
        for plane in &self.planes {
            if plane.distance(plane.positive_vertex(bounds)) < 0.0 {
                return false;
            }
        }
        true
    }

    /// Whether a sphere touches the frustum.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance(center) >= -radius)
    }
}
