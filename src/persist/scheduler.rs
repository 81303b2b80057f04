//! Flush scheduling and write coalescing.
//!
//! Each `(policy, coalescing key)` slot is either idle or pending. Scheduling
//! into an idle slot stores the job and registers exactly one deferred
//! callback; scheduling into a pending slot only replaces the stored job.
//! When the callback fires it takes the latest job, returns the slot to
//! idle, then runs the job.

use super::config::FlushPolicy;
use super::executor::{DeferredExecutor, Host};
use crate::core::{ErrorReporter, Result};
use crate::storage::StorageHandle;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identity used to coalesce writes: one backend, one storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoalescingKey {
    storage: usize,
    key: String,
}

impl CoalescingKey {
    pub fn new(storage: &StorageHandle, key: &str) -> Self {
        Self {
            storage: storage.id(),
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CoalescingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key, self.storage)
    }
}

/// A deferred unit of work: serialize and store one snapshot.
pub struct WriteJob {
    run: Box<dyn FnOnce() -> Result<()>>,
}

impl WriteJob {
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce() -> Result<()> + 'static,
    {
        Self { run: Box::new(run) }
    }

    pub fn execute(self) -> Result<()> {
        (self.run)()
    }
}

impl fmt::Debug for WriteJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WriteJob")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Slot {
    policy: FlushPolicy,
    key: CoalescingKey,
}

struct SchedulerState {
    host: Option<Host>,
    pending: RefCell<HashMap<Slot, WriteJob>>,
    reporter: RefCell<ErrorReporter>,
}

impl SchedulerState {
    fn flush(&self, slot: &Slot) {
        // Idle again before the job runs: a failing job cannot wedge the slot
        // and a job that schedules the same key starts a fresh pending period.
        let job = self.pending.borrow_mut().remove(slot);
        if let Some(job) = job {
            self.run(job);
        }
    }

    fn run(&self, job: WriteJob) {
        if let Err(err) = job.execute() {
            // Cloned out so a hook may swap the reporter while it runs.
            let reporter = self.reporter.borrow().clone();
            reporter.report(err);
        }
    }
}

/// Decides when write jobs execute.
///
/// Cheap to clone; clones share the pending-job table. A scheduler built
/// with [`FlushScheduler::headless`] has no host primitives and drops every
/// job without running it.
#[derive(Clone)]
pub struct FlushScheduler {
    state: Rc<SchedulerState>,
}

impl FlushScheduler {
    pub fn new(host: Host, reporter: ErrorReporter) -> Self {
        Self::build(Some(host), reporter)
    }

    /// Scheduler for server-side contexts: every `schedule` is a no-op
    pub fn headless() -> Self {
        Self::headless_with_reporter(ErrorReporter::new())
    }

    /// Headless scheduler whose reporter still sees hydration failures
    pub fn headless_with_reporter(reporter: ErrorReporter) -> Self {
        Self::build(None, reporter)
    }

    fn build(host: Option<Host>, reporter: ErrorReporter) -> Self {
        Self {
            state: Rc::new(SchedulerState {
                host,
                pending: RefCell::new(HashMap::new()),
                reporter: RefCell::new(reporter),
            }),
        }
    }

    pub fn is_headless(&self) -> bool {
        self.state.host.is_none()
    }

    pub fn reporter(&self) -> ErrorReporter {
        self.state.reporter.borrow().clone()
    }

    /// Replace the reporter for every clone of this scheduler
    pub fn set_reporter(&self, reporter: ErrorReporter) {
        *self.state.reporter.borrow_mut() = reporter;
    }

    pub fn schedule(&self, key: CoalescingKey, policy: FlushPolicy, job: WriteJob) {
        let Some(host) = &self.state.host else {
            debug!("persist: no host primitives, dropping write for '{}'", key);
            return;
        };

        let executor: Rc<dyn DeferredExecutor> = match policy {
            FlushPolicy::Immediate => {
                self.state.run(job);
                return;
            }
            FlushPolicy::DeferredMicrotask => host.microtasks.clone(),
            FlushPolicy::DeferredUntilUnload => host.unload.clone(),
        };

        let slot = Slot { policy, key };
        let superseded = self.state.pending.borrow_mut().insert(slot.clone(), job);
        if superseded.is_some() {
            debug!("persist: coalesced pending {:?} write for '{}'", policy, slot.key);
            return;
        }

        let state = self.state.clone();
        executor.defer(Box::new(move || state.flush(&slot)));
    }

    /// Number of slots currently waiting for their trigger
    pub fn pending_count(&self) -> usize {
        self.state.pending.borrow().len()
    }

    pub fn is_pending(&self, key: &CoalescingKey, policy: FlushPolicy) -> bool {
        let slot = Slot {
            policy,
            key: key.clone(),
        };
        self.state.pending.borrow().contains_key(&slot)
    }
}

impl fmt::Debug for FlushScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlushScheduler")
            .field("headless", &self.is_headless())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PersistError, StorageError};
    use crate::persist::executor::{MicrotaskQueue, UnloadSignal};
    use crate::storage::MemoryBackend;
    use std::cell::Cell;

    struct Harness {
        scheduler: FlushScheduler,
        microtasks: Rc<MicrotaskQueue>,
        unload: Rc<UnloadSignal>,
        errors: Rc<Cell<usize>>,
    }

    fn harness() -> Harness {
        let microtasks = Rc::new(MicrotaskQueue::new());
        let unload = Rc::new(UnloadSignal::new());
        let errors = Rc::new(Cell::new(0));
        let counter = errors.clone();
        let scheduler = FlushScheduler::new(
            Host::new(microtasks.clone(), unload.clone()),
            ErrorReporter::with_hook(move |_| counter.set(counter.get() + 1)),
        );
        Harness {
            scheduler,
            microtasks,
            unload,
            errors,
        }
    }

    fn key(name: &str) -> CoalescingKey {
        thread_local! {
            static STORAGE: StorageHandle = StorageHandle::new(MemoryBackend::new());
        }
        STORAGE.with(|storage| CoalescingKey::new(storage, name))
    }

    fn recording_job(log: &Rc<RefCell<Vec<u32>>>, value: u32) -> WriteJob {
        let log = log.clone();
        WriteJob::new(move || {
            log.borrow_mut().push(value);
            Ok(())
        })
    }

    #[test]
    fn test_immediate_runs_before_schedule_returns() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));

        h.scheduler.schedule(key("a"), FlushPolicy::Immediate, recording_job(&log, 1));

        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(h.scheduler.pending_count(), 0);
        assert!(h.microtasks.is_empty());
    }

    #[test]
    fn test_microtask_coalesces_to_last_job() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));

        for value in 1..=5 {
            h.scheduler
                .schedule(key("a"), FlushPolicy::DeferredMicrotask, recording_job(&log, value));
        }

        assert!(log.borrow().is_empty());
        assert!(h.scheduler.is_pending(&key("a"), FlushPolicy::DeferredMicrotask));
        assert_eq!(h.microtasks.len(), 1);

        h.microtasks.drain();
        assert_eq!(*log.borrow(), vec![5]);
        assert_eq!(h.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_new_pending_period_after_flush() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));

        h.scheduler
            .schedule(key("a"), FlushPolicy::DeferredMicrotask, recording_job(&log, 1));
        h.microtasks.drain();
        h.scheduler
            .schedule(key("a"), FlushPolicy::DeferredMicrotask, recording_job(&log, 2));
        h.microtasks.drain();

        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_distinct_keys_flush_independently() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));

        h.scheduler
            .schedule(key("a"), FlushPolicy::DeferredMicrotask, recording_job(&log, 1));
        h.scheduler
            .schedule(key("b"), FlushPolicy::DeferredMicrotask, recording_job(&log, 2));
        h.scheduler
            .schedule(key("a"), FlushPolicy::DeferredMicrotask, recording_job(&log, 3));

        assert_eq!(h.scheduler.pending_count(), 2);
        assert_eq!(h.microtasks.drain(), 2);

        let mut flushed = log.borrow().clone();
        flushed.sort();
        assert_eq!(flushed, vec![2, 3]);
    }

    #[test]
    fn test_same_key_on_different_backends_does_not_coalesce() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = StorageHandle::new(MemoryBackend::new());
        let second = StorageHandle::new(MemoryBackend::new());

        h.scheduler.schedule(
            CoalescingKey::new(&first, "k"),
            FlushPolicy::DeferredMicrotask,
            recording_job(&log, 1),
        );
        h.scheduler.schedule(
            CoalescingKey::new(&second, "k"),
            FlushPolicy::DeferredMicrotask,
            recording_job(&log, 2),
        );

        assert_eq!(h.microtasks.drain(), 2);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_unload_waits_for_signal() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));

        for value in 1..=3 {
            h.scheduler
                .schedule(key("a"), FlushPolicy::DeferredUntilUnload, recording_job(&log, value));
        }
        h.microtasks.drain();
        assert!(log.borrow().is_empty());

        assert_eq!(h.unload.fire(), 1);
        assert_eq!(*log.borrow(), vec![3]);
        assert_eq!(h.unload.fire(), 0);
        assert_eq!(*log.borrow(), vec![3]);
    }

    #[test]
    fn test_policies_use_separate_slots() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));

        h.scheduler
            .schedule(key("a"), FlushPolicy::DeferredMicrotask, recording_job(&log, 1));
        h.scheduler
            .schedule(key("a"), FlushPolicy::DeferredUntilUnload, recording_job(&log, 2));

        assert_eq!(h.scheduler.pending_count(), 2);
        h.microtasks.drain();
        assert_eq!(*log.borrow(), vec![1]);
        h.unload.fire();
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_failed_job_is_reported_and_does_not_wedge() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));

        h.scheduler.schedule(
            key("a"),
            FlushPolicy::DeferredMicrotask,
            WriteJob::new(|| Err(PersistError::write("a", StorageError::Backend("full".into())))),
        );
        h.microtasks.drain();
        assert_eq!(h.errors.get(), 1);
        assert_eq!(h.scheduler.pending_count(), 0);

        h.scheduler
            .schedule(key("a"), FlushPolicy::DeferredMicrotask, recording_job(&log, 7));
        h.microtasks.drain();
        assert_eq!(*log.borrow(), vec![7]);
    }

    #[test]
    fn test_immediate_failure_is_reported() {
        let h = harness();
        h.scheduler.schedule(
            key("a"),
            FlushPolicy::Immediate,
            WriteJob::new(|| Err(PersistError::write("a", StorageError::Backend("full".into())))),
        );
        assert_eq!(h.errors.get(), 1);
    }

    #[test]
    fn test_reentrant_schedule_creates_fresh_entry() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));

        let scheduler = h.scheduler.clone();
        let inner_log = log.clone();
        h.scheduler.schedule(
            key("a"),
            FlushPolicy::DeferredMicrotask,
            WriteJob::new(move || {
                inner_log.borrow_mut().push(1);
                scheduler.schedule(
                    key("a"),
                    FlushPolicy::DeferredMicrotask,
                    recording_job(&inner_log, 2),
                );
                Ok(())
            }),
        );

        assert_eq!(h.microtasks.drain(), 2);
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert_eq!(h.scheduler.pending_count(), 0);
    }

    #[test]
    fn test_headless_never_runs_jobs() {
        let scheduler = FlushScheduler::headless();
        let log = Rc::new(RefCell::new(Vec::new()));

        scheduler.schedule(key("a"), FlushPolicy::Immediate, recording_job(&log, 1));
        scheduler.schedule(key("a"), FlushPolicy::DeferredMicrotask, recording_job(&log, 2));
        scheduler.schedule(key("a"), FlushPolicy::DeferredUntilUnload, recording_job(&log, 3));

        assert!(scheduler.is_headless());
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_handles_over_one_backend_share_a_slot() {
        let h = harness();
        let log = Rc::new(RefCell::new(Vec::new()));
        let backend: Rc<dyn crate::storage::StorageBackend> = Rc::new(MemoryBackend::new());
        let first = CoalescingKey::new(&StorageHandle::from_rc(backend.clone()), "shared");
        let second = CoalescingKey::new(&StorageHandle::from_rc(backend), "shared");

        h.scheduler
            .schedule(first.clone(), FlushPolicy::DeferredMicrotask, recording_job(&log, 1));
        h.scheduler
            .schedule(second, FlushPolicy::DeferredMicrotask, recording_job(&log, 2));

        assert_eq!(h.scheduler.pending_count(), 1);
        h.microtasks.drain();
        assert_eq!(*log.borrow(), vec![2]);
    }

    #[test]
    fn test_set_reporter_applies_to_clones() {
        let h = harness();
        let replaced = Rc::new(Cell::new(0));
        let counter = replaced.clone();
        h.scheduler.clone().set_reporter(ErrorReporter::with_hook(move |_| {
            counter.set(counter.get() + 1)
        }));

        h.scheduler.schedule(
            key("a"),
            FlushPolicy::Immediate,
            WriteJob::new(|| {
                Err(PersistError::write(
                    "a",
                    StorageError::Backend("full".to_string()),
                ))
            }),
        );

        assert_eq!(replaced.get(), 1);
        assert_eq!(h.errors.get(), 0);
    }
}
