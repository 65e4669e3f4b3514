//! Single-threaded FIFO task queue standing in for a host event loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Cloned handles share one queue.
#[derive(Clone, Default)]
pub struct EventLoop {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` after everything already queued.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run one task; returns false when the queue was empty.
    pub fn tick(&self) -> bool {
        // pop before running so tasks can defer more work
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks, including ones scheduled along the way, until none are left.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.tick() {
            ran += 1;
        }
        ran
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop").field("pending", &self.pending()).finish()
    }
}
