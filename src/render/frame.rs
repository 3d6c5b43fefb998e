//! Per-frame context.
//!
//! Everything that used to be ambient state during a frame — the deferred
//! task list, the texture-unit allocator, the frame counter — travels in one
//! [`FrameContext`] passed explicitly down the preparation and render calls.

use crate::render::render_list::RenderList;

/// Hands out texture units in binding order, reset each frame.
#[derive(Debug, Default)]
pub struct TextureUnitAllocator {
    next: u32,
}

impl TextureUnitAllocator {
    #[inline]
    pub fn next_unit(&mut self) -> u32 {
        let unit = self.next;
        self.next += 1;
        unit
    }

    #[inline]
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[derive(Default)]
pub struct FrameContext {
    pub frame_index: u64,
    pub render_list: RenderList,
    pub texture_units: TextureUnitAllocator,
}

impl FrameContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new frame.
    ///
    /// A non-empty task list here means a prepared layer was never rendered;
    /// the tasks are dropped so stale dependencies cannot leak into this
    /// frame.
    pub fn begin_frame(&mut self) {
        if !self.render_list.is_empty() {
            log::warn!(
                "Dropping {} unrun render tasks from the previous frame",
                self.render_list.len()
            );
            self.render_list.clear();
        }
        self.texture_units.reset();
        self.frame_index += 1;
    }
}
