//! Camera component.
//!
//! Owns the projection properties plus the scale-mode/anchor policy that fits
//! a fixed design resolution into an arbitrary viewport. The projection is
//! cached against the exact (viewport, properties) pair that produced it, so
//! repeated prepare passes with an unchanged camera pay nothing.
//!
//! # Scale modes
//!
//! | Mode | Behavior |
//! |---|---|
//! | `Fit` | uniform scale to fit both dimensions; leftover space on exactly one axis, placed by anchor |
//! | `SameSize` | no scaling; viewport offset only, anchored |
//! | `FitHorizontal` / `FitVertical` | uniform scale fit to one axis only |
//!
//! Anchors use screen conventions: `North` is the top edge, `West` the left.
//! The `Fit` branch is mutually exclusive on the design-vs-viewport aspect
//! comparison, so the anchored offset is never applied to both axes at once.

use glam::{Affine3A, Mat4, Vec2};

/// A render-target rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[must_use]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMode {
    #[default]
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    #[default]
    Fit,
    SameSize,
    FitHorizontal,
    FitVertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleAnchor {
    #[default]
    Center,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl ScaleAnchor {
    /// Fraction of the leftover space placed before the fitted rect,
    /// `(x, y)` with y growing downward.
    #[must_use]
    pub fn factors(self) -> Vec2 {
        match self {
            ScaleAnchor::Center => Vec2::new(0.5, 0.5),
            ScaleAnchor::North => Vec2::new(0.5, 0.0),
            ScaleAnchor::NorthEast => Vec2::new(1.0, 0.0),
            ScaleAnchor::East => Vec2::new(1.0, 0.5),
            ScaleAnchor::SouthEast => Vec2::new(1.0, 1.0),
            ScaleAnchor::South => Vec2::new(0.5, 1.0),
            ScaleAnchor::SouthWest => Vec2::new(0.0, 1.0),
            ScaleAnchor::West => Vec2::new(0.0, 0.5),
            ScaleAnchor::NorthWest => Vec2::new(0.0, 0.0),
        }
    }
}

/// Fit a design resolution into `outer` under the given mode/anchor.
///
/// Pure function of its inputs; the per-anchor tests pin each entry of the
/// scale-mode table.
#[must_use]
pub fn fit_viewport(design: Vec2, outer: Viewport, mode: ScaleMode, anchor: ScaleAnchor) -> Viewport {
    let design_aspect = design.x / design.y;

    let (width, height) = match mode {
        ScaleMode::SameSize => (design.x, design.y),
        ScaleMode::Fit => {
            if design_aspect >= outer.aspect() {
                // Width-limited: leftover space is vertical only.
                (outer.width, outer.width / design_aspect)
            } else {
                // Height-limited: leftover space is horizontal only.
                (outer.height * design_aspect, outer.height)
            }
        }
        ScaleMode::FitHorizontal => (outer.width, design.y * (outer.width / design.x)),
        ScaleMode::FitVertical => (design.x * (outer.height / design.y), outer.height),
    };

    let leftover = Vec2::new(outer.width - width, outer.height - height);
    let f = anchor.factors();

    Viewport {
        x: outer.x + leftover.x * f.x,
        y: outer.y + leftover.y * f.y,
        width,
        height,
    }
}

// ─── Camera ──────────────────────────────────────────────────────────────────

/// Projection-affecting properties, snapshotted into the cache tag.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraProps {
    mode: ProjectionMode,
    fov_degrees: f32,
    near: f32,
    far: f32,
    scale_mode: ScaleMode,
    scale_anchor: ScaleAnchor,
}

/// The fitted viewport and projection for one (camera, viewport) request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFit {
    /// Sub-rectangle of the layer viewport the camera actually renders into.
    pub viewport: Viewport,
    pub projection: Mat4,
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub projection_mode: ProjectionMode,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub scale_mode: ScaleMode,
    pub scale_anchor: ScaleAnchor,

    cached: Option<(Viewport, Vec2, CameraProps, CameraFit)>,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            projection_mode: ProjectionMode::Perspective,
            fov_degrees,
            near,
            far,
            scale_mode: ScaleMode::Fit,
            scale_anchor: ScaleAnchor::Center,
            cached: None,
        }
    }

    #[must_use]
    pub fn new_orthographic(near: f32, far: f32) -> Self {
        Self {
            projection_mode: ProjectionMode::Orthographic,
            fov_degrees: 0.0,
            near,
            far,
            scale_mode: ScaleMode::Fit,
            scale_anchor: ScaleAnchor::Center,
            cached: None,
        }
    }

    fn props(&self) -> CameraProps {
        CameraProps {
            mode: self.projection_mode,
            fov_degrees: self.fov_degrees,
            near: self.near,
            far: self.far,
            scale_mode: self.scale_mode,
            scale_anchor: self.scale_anchor,
        }
    }

    /// Fitted viewport + projection for rendering into `viewport` with the
    /// given design resolution.
    ///
    /// Recomputed only when the (viewport, design, properties) triple differs
    /// from the one that produced the cached value.
    pub fn calculate_fit(&mut self, viewport: Viewport, design: Vec2) -> CameraFit {
        let props = self.props();
        if let Some((cached_vp, cached_design, cached_props, fit)) = self.cached {
            if cached_vp == viewport && cached_design == design && cached_props == props {
                return fit;
            }
        }

        let fitted = fit_viewport(design, viewport, self.scale_mode, self.scale_anchor);
        let projection = match self.projection_mode {
            ProjectionMode::Perspective => Mat4::perspective_rh(
                self.fov_degrees.to_radians(),
                fitted.aspect(),
                self.near,
                self.far,
            ),
            ProjectionMode::Orthographic => {
                let half = fitted.size() * 0.5;
                Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, self.near, self.far)
            }
        };

        let fit = CameraFit { viewport: fitted, projection };
        self.cached = Some((viewport, design, props, fit));
        fit
    }

    /// View matrix for a camera node's world transform.
    #[inline]
    #[must_use]
    pub fn view_matrix(world: &Affine3A) -> Mat4 {
        Mat4::from(*world).inverse()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new_perspective(60.0, 0.1, 5000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hits_on_identical_request() {
        let mut cam = Camera::default();
        let vp = Viewport::from_size(1024.0, 768.0);
        let design = Vec2::new(800.0, 600.0);

        let a = cam.calculate_fit(vp, design);
        let b = cam.calculate_fit(vp, design);
        assert_eq!(a, b);
    }

    #[test]
    fn cache_invalidates_on_property_change() {
        let mut cam = Camera::default();
        let vp = Viewport::from_size(1024.0, 768.0);
        let design = Vec2::new(800.0, 600.0);

        let a = cam.calculate_fit(vp, design);
        cam.fov_degrees = 90.0;
        let b = cam.calculate_fit(vp, design);
        assert_ne!(a.projection, b.projection);
    }
}
