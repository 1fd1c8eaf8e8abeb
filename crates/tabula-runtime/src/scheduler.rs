#![forbid(unsafe_code)]

//! Single-threaded task scheduling.
//!
//! Batched change delivery needs "run this later, once". The [`Scheduler`]
//! trait is the seam: embedders can drive it from a real event loop, while
//! [`TaskQueue`] is a deterministic in-process queue that tests (and simple
//! hosts) step one tick at a time.
//!
//! # Invariants
//!
//! 1. A tick runs exactly the tasks that were queued when the tick began.
//!    Tasks queued while ticking run on a later tick (macrotask semantics).
//! 2. Tasks run in the order they were scheduled.
//! 3. A cancelled task never runs.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | `cancel` for an unknown or finished task | Returns `false` |
//! | Task schedules work forever | `run_until_idle` stops at `max_ticks` |

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Raw id value.
    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Defers tasks to a later turn of the host's loop.
///
/// Implementations must never run a task synchronously from inside
/// [`schedule`](Scheduler::schedule).
pub trait Scheduler {
    /// Queue `task` to run on a later tick.
    fn schedule(&self, task: Task) -> TaskId;

    /// Cancel a queued task. Returns `true` if it was still pending.
    fn cancel(&self, id: TaskId) -> bool;
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    tasks: VecDeque<(TaskId, Task)>,
    ticks: u64,
}

/// Deterministic macrotask queue.
///
/// Cloning shares the queue.
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use tabula_runtime::scheduler::{Scheduler, TaskQueue};
///
/// let queue = TaskQueue::new();
/// let hits = Rc::new(Cell::new(0));
/// let h = Rc::clone(&hits);
/// queue.schedule(Box::new(move || h.set(h.get() + 1)));
/// assert_eq!(hits.get(), 0);
/// queue.tick();
/// assert_eq!(hits.get(), 1);
/// ```
#[derive(Clone, Default)]
pub struct TaskQueue {
    state: Rc<RefCell<QueueState>>,
}

impl TaskQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This queue as a shared [`Scheduler`] handle.
    #[must_use]
    pub fn handle(&self) -> Rc<dyn Scheduler> {
        Rc::new(self.clone())
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state.borrow().tasks.is_empty()
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.state.borrow().ticks
    }

    /// Run one tick. Returns the number of tasks that ran.
    pub fn tick(&self) -> usize {
        let boundary = {
            let mut state = self.state.borrow_mut();
            state.ticks += 1;
            state.next_id
        };
        let mut ran = 0;
        loop {
            // The borrow must end before the task runs: tasks schedule more work.
            let next = {
                let mut state = self.state.borrow_mut();
                let ready = state.tasks.front().is_some_and(|(id, _)| id.0 < boundary);
                if ready { state.tasks.pop_front() } else { None }
            };
            let Some((_, task)) = next else { break };
            task();
            ran += 1;
        }
        ran
    }

    /// Tick until the queue is empty or `max_ticks` ticks have run.
    /// Returns the number of ticks run.
    pub fn run_until_idle(&self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && !self.is_idle() {
            self.tick();
            ticks += 1;
        }
        ticks
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, task: Task) -> TaskId {
        let mut state = self.state.borrow_mut();
        let id = TaskId(state.next_id);
        state.next_id += 1;
        state.tasks.push_back((id, task));
        id
    }

    fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.borrow_mut();
        match state.tasks.iter().position(|(queued, _)| *queued == id) {
            Some(pos) => {
                state.tasks.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TaskQueue")
            .field("pending", &state.tasks.len())
            .field("ticks", &state.ticks)
            .finish()
    }
}
