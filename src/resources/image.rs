//! Image cache entries.
//!
//! Decoded pixel data arrives from the asset pipeline (out of scope); the
//! core only tracks the device texture and the facts that affect rendering:
//! whether the alpha channel carries transparency and whether the upload has
//! completed. A renderable referencing an image that is still loading keeps
//! drawing with a placeholder rather than stalling the frame.

use crate::backend::{TextureFormat, TextureHandle};

/// Upload state of an image cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLoadState {
    /// Decode/upload still pending on the loader pool.
    Loading,
    Ready,
    /// Decode failed; the placeholder persists and a content warning is due.
    Failed,
}

/// One entry in the scene's image cache. Referenced (non-owning) by material
/// texture channels.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub texture: Option<TextureHandle>,
    /// True when the image's alpha channel contains values below 1.0.
    pub has_transparency: bool,
    pub state: ImageLoadState,
}

impl Image {
    /// A ready, opaque RGBA image bound to `texture`.
    #[must_use]
    pub fn ready(width: u32, height: u32, texture: TextureHandle) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba8,
            texture: Some(texture),
            has_transparency: false,
            state: ImageLoadState::Ready,
        }
    }

    /// Placeholder entry for an in-flight load.
    #[must_use]
    pub fn loading() -> Self {
        Self {
            width: 0,
            height: 0,
            format: TextureFormat::Rgba8,
            texture: None,
            has_transparency: false,
            state: ImageLoadState::Loading,
        }
    }

    /// Usable for sampling this frame.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ImageLoadState::Ready && self.texture.is_some()
    }
}
