//! Deferred render-task list.
//!
//! Dependency passes (shadow maps, AO, sub-scene pre-renders) are queued
//! here during preparation and executed before the main layer passes. Tasks
//! run in *reverse* registration order: producers register before their
//! consumers walk, and draining from the back runs the most recently
//! registered dependency first.

use crate::backend::RenderDevice;

/// Identifier for a queued task, used to discard it before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTaskId(u64);

/// A unit of deferred render work.
pub trait RenderTask {
    fn run(&mut self, device: &mut dyn RenderDevice);
}

#[derive(Default)]
pub struct RenderList {
    tasks: Vec<(RenderTaskId, Box<dyn RenderTask>)>,
    next_id: u64,
}

impl RenderList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task, returning its id.
    pub fn add_render_task(&mut self, task: Box<dyn RenderTask>) -> RenderTaskId {
        self.next_id += 1;
        let id = RenderTaskId(self.next_id);
        self.tasks.push((id, task));
        id
    }

    /// Remove a not-yet-run task. Returns whether it was found.
    ///
    /// Used when a dependency turns out to be unnecessary mid-preparation,
    /// e.g. every renderable that needed it was culled.
    pub fn discard_render_task(&mut self, id: RenderTaskId) -> bool {
        match self.tasks.iter().position(|(tid, _)| *tid == id) {
            Some(idx) => {
                self.tasks.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drain and run every queued task, newest first.
    pub fn run_render_tasks(&mut self, device: &mut dyn RenderDevice) {
        while let Some((_, mut task)) = self.tasks.pop() {
            task.run(device);
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
