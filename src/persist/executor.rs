//! Deferred-execution capabilities the host environment provides.
//!
//! The scheduler never touches an event loop directly. It hands one-shot
//! tasks to a [`DeferredExecutor`]; the host decides when they run.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

pub type Task = Box<dyn FnOnce()>;

pub trait DeferredExecutor {
    /// Register a task to run once, later
    fn defer(&self, task: Task);
}

// ============================================================================
// Microtask queue
// ============================================================================

/// FIFO queue drained by the host once the current synchronous work is done.
#[derive(Default)]
pub struct MicrotaskQueue {
    queue: RefCell<VecDeque<Task>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Run queued tasks until the queue is empty, including tasks queued by
    /// the tasks themselves. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl DeferredExecutor for MicrotaskQueue {
    fn defer(&self, task: Task) {
        self.queue.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue").field("len", &self.len()).finish()
    }
}

// ============================================================================
// Unload signal
// ============================================================================

/// One-shot "about to terminate" lifecycle event.
///
/// Each registered task fires at most once: [`UnloadSignal::fire`] runs and
/// forgets everything registered so far. Tasks registered afterwards wait
/// for the next `fire`.
#[derive(Default)]
pub struct UnloadSignal {
    hooks: RefCell<Vec<Task>>,
}

impl UnloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self) -> usize {
        self.hooks.borrow().len()
    }

    pub fn fire(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
        let fired = hooks.len();
        for hook in hooks {
            hook();
        }
        fired
    }
}

impl DeferredExecutor for UnloadSignal {
    fn defer(&self, task: Task) {
        self.hooks.borrow_mut().push(task);
    }
}

impl fmt::Debug for UnloadSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnloadSignal")
            .field("registered", &self.registered())
            .finish()
    }
}

// ============================================================================
// Host
// ============================================================================

/// The deferred-execution primitives of a client-side host.
#[derive(Clone)]
pub struct Host {
    pub microtasks: Rc<dyn DeferredExecutor>,
    pub unload: Rc<dyn DeferredExecutor>,
}

impl Host {
    pub fn new(microtasks: Rc<dyn DeferredExecutor>, unload: Rc<dyn DeferredExecutor>) -> Self {
        Self { microtasks, unload }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Host")
    }
}
