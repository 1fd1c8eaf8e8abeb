#![forbid(unsafe_code)]

//! Batched change delivery.
//!
//! An [`Observable`] buffers [`ChangeRecord`]s and delivers everything that
//! accumulated since the last delivery in one flush, scheduled on an injected
//! [`Scheduler`].
//!
//! # Invariants
//!
//! 1. At most one flush is scheduled at a time.
//! 2. A flush snapshots and clears the buffer before any observer runs, then
//!    invokes every observer registered at flush start exactly once, in
//!    registration order, with the whole batch.
//! 3. Records notified while a flush is running (for example by an observer
//!    mutating the collection) land in a fresh buffer and are delivered on
//!    the next flush, never re-entrantly.
//! 4. Records are delivered in production order; batches from several
//!    `notify` calls are concatenated, never merged.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Observer returns `Err` | Remaining observers still run; error goes to the error sink |
//! | Observer panics | Panic is caught; treated like `Err(ObserverError::Panicked)` |
//! | No error sink installed | Error is logged with `tracing::error!` |
//! | `clear_changes` with nothing pending | No-op |

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use std::time::Duration;

use web_time::Instant;

use super::change::ChangeRecord;
use crate::scheduler::{Scheduler, TaskId};

/// Identifier of one observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Opaque context an observer is registered with; `unobserve` matches on it.
pub type ContextId = u64;

/// Error reported by an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    /// The observer returned an error.
    Failed(String),
    /// The observer panicked.
    Panicked(String),
}

impl ObserverError {
    /// Build a [`ObserverError::Failed`] from anything displayable.
    pub fn failed(msg: impl fmt::Display) -> Self {
        Self::Failed(msg.to_string())
    }
}

impl fmt::Display for ObserverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "observer failed: {msg}"),
            Self::Panicked(msg) => write!(f, "observer panicked: {msg}"),
        }
    }
}

impl std::error::Error for ObserverError {}

/// Result type returned by observers.
pub type ObserverResult = Result<(), ObserverError>;

/// Shared observer callback.
pub type ObserverFn<T> = Rc<dyn Fn(&[ChangeRecord<T>]) -> ObserverResult>;

/// An observer failure surfaced to the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushError {
    pub observer: ObserverId,
    pub source: Rc<str>,
    pub error: ObserverError,
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (observer {} of '{}')",
            self.error,
            self.observer.id(),
            self.source
        )
    }
}

impl std::error::Error for FlushError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Receives observer failures.
pub type ErrorSink = Rc<dyn Fn(&FlushError)>;

/// Outcome of one flush.
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    /// Records delivered.
    pub delivered: usize,
    /// Observers invoked.
    pub observers: usize,
    /// Observer failures, in observer order.
    pub errors: Vec<FlushError>,
    pub elapsed: Duration,
}

struct ObserverEntry<T> {
    id: ObserverId,
    callback: ObserverFn<T>,
    ctx: Option<ContextId>,
}

struct ObservableState<T> {
    pending: Vec<ChangeRecord<T>>,
    scheduled: Option<TaskId>,
    observers: Vec<ObserverEntry<T>>,
    next_observer: u64,
    error_sink: Option<ErrorSink>,
    flushes: u64,
}

/// Buffers change records and delivers them in scheduled batches.
///
/// Cloning shares the buffer and the observer list.
pub struct Observable<T> {
    state: Rc<RefCell<ObservableState<T>>>,
    scheduler: Rc<dyn Scheduler>,
    source: Rc<str>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            scheduler: Rc::clone(&self.scheduler),
            source: Rc::clone(&self.source),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Observable")
            .field("source", &self.source)
            .field("pending", &state.pending.len())
            .field("scheduled", &state.scheduled.is_some())
            .field("observers", &state.observers.len())
            .finish()
    }
}

impl<T: 'static> Observable<T> {
    /// Create an observable labelled `source`, flushing on `scheduler`.
    pub fn new(source: &str, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ObservableState {
                pending: Vec::new(),
                scheduled: None,
                observers: Vec::new(),
                next_observer: 1,
                error_sink: None,
                flushes: 0,
            })),
            scheduler,
            source: Rc::from(source),
        }
    }

    /// Label stamped on every record this observable's collection produces.
    #[must_use]
    pub fn source(&self) -> &Rc<str> {
        &self.source
    }

    /// Register an observer without a context.
    pub fn observe(
        &self,
        callback: impl Fn(&[ChangeRecord<T>]) -> ObserverResult + 'static,
    ) -> ObserverId {
        self.observe_with(Rc::new(callback), None)
    }

    /// Register a shared observer callback with an optional context.
    pub fn observe_with(&self, callback: ObserverFn<T>, ctx: Option<ContextId>) -> ObserverId {
        let mut state = self.state.borrow_mut();
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push(ObserverEntry { id, callback, ctx });
        id
    }

    /// Remove observers.
    ///
    /// `None` removes every observer. `Some((callback, ctx))` removes only the
    /// registrations whose callback is the same `Rc` and whose context equals
    /// `ctx`. Returns the number removed.
    pub fn unobserve(&self, matching: Option<(&ObserverFn<T>, Option<ContextId>)>) -> usize {
        let mut state = self.state.borrow_mut();
        let before = state.observers.len();
        match matching {
            None => state.observers.clear(),
            Some((callback, ctx)) => state
                .observers
                .retain(|entry| !(Rc::ptr_eq(&entry.callback, callback) && entry.ctx == ctx)),
        }
        before - state.observers.len()
    }

    /// Remove one registration by id.
    pub fn unobserve_id(&self, id: ObserverId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.observers.len();
        state.observers.retain(|entry| entry.id != id);
        before != state.observers.len()
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Install the sink that receives observer failures.
    pub fn set_error_sink(&self, sink: impl Fn(&FlushError) + 'static) {
        self.state.borrow_mut().error_sink = Some(Rc::new(sink));
    }

    /// Buffer `changes` and schedule a flush if none is pending.
    pub fn notify(&self, changes: impl IntoIterator<Item = ChangeRecord<T>>) {
        let needs_flush = {
            let mut state = self.state.borrow_mut();
            let before = state.pending.len();
            state.pending.extend(changes);
            state.pending.len() > before && state.scheduled.is_none()
        };
        if !needs_flush {
            return;
        }
        let weak = Rc::downgrade(&self.state);
        let source = Rc::clone(&self.source);
        let id = self.scheduler.schedule(Box::new(move || {
            if let Some(state) = Weak::upgrade(&weak) {
                flush_state(&state, &source);
            }
        }));
        self.state.borrow_mut().scheduled = Some(id);
    }

    /// Whether a flush is scheduled.
    #[must_use]
    pub fn is_flush_scheduled(&self) -> bool {
        self.state.borrow().scheduled.is_some()
    }

    /// Number of flushes that have started.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.state.borrow().flushes
    }

    /// Cancel the scheduled flush and discard the buffer. Returns the number
    /// of discarded records.
    pub fn clear_changes(&self) -> usize {
        let (scheduled, discarded) = {
            let mut state = self.state.borrow_mut();
            let discarded = state.pending.len();
            state.pending.clear();
            (state.scheduled.take(), discarded)
        };
        if let Some(id) = scheduled {
            self.scheduler.cancel(id);
        }
        discarded
    }

    /// Flush synchronously, cancelling the scheduled flush.
    pub fn flush_now(&self) -> FlushReport {
        let scheduled = self.state.borrow_mut().scheduled.take();
        if let Some(id) = scheduled {
            self.scheduler.cancel(id);
        }
        flush_state(&self.state, &self.source)
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Snapshot of the buffered records.
    #[must_use]
    pub fn pending_changes(&self) -> Vec<ChangeRecord<T>> {
        self.state.borrow().pending.clone()
    }
}

fn flush_state<T>(state: &Rc<RefCell<ObservableState<T>>>, source: &Rc<str>) -> FlushReport {
    let (batch, observers, sink) = {
        let mut state = state.borrow_mut();
        state.scheduled = None;
        state.flushes += 1;
        let batch = std::mem::take(&mut state.pending);
        let observers: Vec<(ObserverId, ObserverFn<T>)> = state
            .observers
            .iter()
            .map(|entry| (entry.id, Rc::clone(&entry.callback)))
            .collect();
        (batch, observers, state.error_sink.clone())
    };

    let mut report = FlushReport::default();
    if batch.is_empty() {
        return report;
    }

    let _span = tracing::debug_span!(
        "observable_flush",
        source = &**source,
        records = batch.len(),
        observers = observers.len()
    )
    .entered();
    let start = Instant::now();

    for (id, callback) in observers {
        let outcome = catch_unwind(AssertUnwindSafe(|| callback(&batch)));
        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(payload) => Some(ObserverError::Panicked(panic_message(payload.as_ref()))),
        };
        report.observers += 1;
        if let Some(error) = error {
            let failure = FlushError {
                observer: id,
                source: Rc::clone(source),
                error,
            };
            match &sink {
                Some(sink) => sink(&failure),
                None => tracing::error!(
                    source = &**source,
                    observer = id.id(),
                    error = %failure.error,
                    "observer failed during flush"
                ),
            }
            report.errors.push(failure);
        }
    }

    report.delivered = batch.len();
    report.elapsed = start.elapsed();
    tracing::trace!(
        delivered = report.delivered,
        errors = report.errors.len(),
        elapsed_us = report.elapsed.as_micros() as u64,
        "flush complete"
    );
    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskQueue;

    fn setup() -> (TaskQueue, Observable<i32>) {
        let queue = TaskQueue::new();
        let obs = Observable::new("data", queue.handle());
        (queue, obs)
    }

    fn rec(obs: &Observable<i32>, index: usize, added: Vec<i32>) -> ChangeRecord<i32> {
        ChangeRecord::splice(obs.source(), index, Vec::new(), added)
    }

    fn collector(obs: &Observable<i32>) -> Rc<RefCell<Vec<Vec<usize>>>> {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let c = Rc::clone(&calls);
        obs.observe(move |batch| {
            c.borrow_mut()
                .push(batch.iter().map(|r| r.index).collect());
            Ok(())
        });
        calls
    }

    #[test]
    fn two_notifies_one_delivery() {
        let (queue, obs) = setup();
        let calls = collector(&obs);

        obs.notify([rec(&obs, 0, vec![1])]);
        obs.notify([rec(&obs, 1, vec![2])]);
        assert!(calls.borrow().is_empty(), "delivery is never synchronous");
        assert_eq!(queue.pending(), 1, "only one flush is scheduled");

        queue.tick();
        assert_eq!(*calls.borrow(), vec![vec![0, 1]]);
    }

    #[test]
    fn observers_run_in_registration_order() {
        let (queue, obs) = setup();
        let order = Rc::new(RefCell::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            obs.observe(move |_| {
                order.borrow_mut().push(name);
                Ok(())
            });
        }
        obs.notify([rec(&obs, 0, vec![1])]);
        queue.tick();
        assert_eq!(*order.borrow(), ["first", "second", "third"]);
    }

    #[test]
    fn notify_during_flush_goes_to_next_flush() {
        let (queue, obs) = setup();
        let calls = collector(&obs);
        let inner = obs.clone();
        let fired = Rc::new(std::cell::Cell::new(false));
        let f = Rc::clone(&fired);
        obs.observe(move |_| {
            if !f.replace(true) {
                inner.notify([ChangeRecord::splice(inner.source(), 9, Vec::new(), vec![9])]);
            }
            Ok(())
        });

        obs.notify([rec(&obs, 0, vec![1])]);
        queue.tick();
        assert_eq!(*calls.borrow(), vec![vec![0]]);
        assert!(obs.is_flush_scheduled());

        queue.tick();
        assert_eq!(*calls.borrow(), vec![vec![0], vec![9]]);
    }

    #[test]
    fn clear_changes_cancels_and_is_idempotent() {
        let (queue, obs) = setup();
        let calls = collector(&obs);
        obs.notify([rec(&obs, 0, vec![1])]);
        assert_eq!(obs.clear_changes(), 1);
        assert_eq!(obs.clear_changes(), 0);
        assert!(obs.pending_changes().is_empty());
        assert!(queue.is_idle());
        queue.tick();
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn empty_notify_schedules_nothing() {
        let (queue, obs) = setup();
        obs.notify(None);
        assert!(queue.is_idle());
    }

    #[test]
    fn unobserve_all_and_matching() {
        let (_queue, obs) = setup();
        let shared: ObserverFn<i32> = Rc::new(|_| Ok(()));
        obs.observe_with(Rc::clone(&shared), Some(1));
        obs.observe_with(Rc::clone(&shared), Some(2));
        obs.observe(|_| Ok(()));

        assert_eq!(obs.unobserve(Some((&shared, Some(1)))), 1);
        assert_eq!(obs.observer_count(), 2);
        assert_eq!(obs.unobserve(Some((&shared, Some(3)))), 0);
        assert_eq!(obs.unobserve(None), 2);
        assert_eq!(obs.observer_count(), 0);
    }

    #[test]
    fn unobserve_by_id() {
        let (_queue, obs) = setup();
        let id = obs.observe(|_| Ok(()));
        assert!(obs.unobserve_id(id));
        assert!(!obs.unobserve_id(id));
    }

    #[test]
    fn failing_observer_is_isolated() {
        let (queue, obs) = setup();
        obs.observe(|_| Err(ObserverError::failed("boom")));
        obs.observe(|_| panic!("kaboom"));
        let calls = collector(&obs);
        let sunk = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&sunk);
        obs.set_error_sink(move |e| s.borrow_mut().push(e.error.clone()));

        obs.notify([rec(&obs, 0, vec![1])]);
        queue.tick();

        assert_eq!(*calls.borrow(), vec![vec![0]]);
        assert_eq!(
            *sunk.borrow(),
            vec![
                ObserverError::Failed("boom".into()),
                ObserverError::Panicked("kaboom".into())
            ]
        );
    }

    #[test]
    fn flush_now_delivers_and_cancels_scheduled() {
        let (queue, obs) = setup();
        let calls = collector(&obs);
        obs.notify([rec(&obs, 3, vec![1])]);
        let report = obs.flush_now();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.observers, 1);
        assert!(report.errors.is_empty());
        assert!(queue.is_idle());
        assert_eq!(*calls.borrow(), vec![vec![3]]);
    }

    #[test]
    fn dropped_observable_flush_is_noop() {
        let queue = TaskQueue::new();
        {
            let obs: Observable<i32> = Observable::new("gone", queue.handle());
            obs.notify([ChangeRecord::splice(obs.source(), 0, Vec::new(), vec![1])]);
        }
        assert_eq!(queue.tick(), 1);
    }
}
