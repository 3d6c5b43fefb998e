//! Render-list ordering and discard semantics.

use std::sync::Arc;

use parking_lot::Mutex;
use strata::backend::{HeadlessDevice, RenderDevice};
use strata::render::{RenderList, RenderTask};

/// Task that records its tag into a shared log when run.
struct TaggedTask {
    tag: u32,
    log: Arc<Mutex<Vec<u32>>>,
}

impl RenderTask for TaggedTask {
    fn run(&mut self, _device: &mut dyn RenderDevice) {
        self.log.lock().push(self.tag);
    }
}

fn tagged(tag: u32, log: &Arc<Mutex<Vec<u32>>>) -> Box<TaggedTask> {
    Box::new(TaggedTask {
        tag,
        log: Arc::clone(log),
    })
}

#[test]
fn tasks_run_in_reverse_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut list = RenderList::new();
    let mut device = HeadlessDevice::new();

    list.add_render_task(tagged(1, &log));
    list.add_render_task(tagged(2, &log));
    list.add_render_task(tagged(3, &log));

    list.run_render_tasks(&mut device);

    assert_eq!(*log.lock(), vec![3, 2, 1]);
    assert!(list.is_empty());
}

#[test]
fn discarded_task_never_runs() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut list = RenderList::new();
    let mut device = HeadlessDevice::new();

    list.add_render_task(tagged(1, &log));
    let middle = list.add_render_task(tagged(2, &log));
    list.add_render_task(tagged(3, &log));

    assert!(list.discard_render_task(middle));
    list.run_render_tasks(&mut device);

    assert_eq!(*log.lock(), vec![3, 1]);
}

#[test]
fn discard_of_unknown_id_reports_false() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut list = RenderList::new();
    let mut device = HeadlessDevice::new();

    let id = list.add_render_task(tagged(1, &log));
    list.run_render_tasks(&mut device);

    // Already ran; nothing left to discard.
    assert!(!list.discard_render_task(id));
}

#[test]
fn tasks_added_during_one_frame_drain_completely() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut list = RenderList::new();
    let mut device = HeadlessDevice::new();

    for i in 0..16 {
        list.add_render_task(tagged(i, &log));
    }
    list.run_render_tasks(&mut device);

    assert_eq!(log.lock().len(), 16);
    assert_eq!(list.len(), 0);
}
