//! Where promise continuations run.
//!
//! A [`Scheduler`] only has to run a task at some later point. Ordering is
//! not its concern: every promise funnels its continuations through its own
//! serial queue, so a multi-threaded scheduler still runs them in
//! registration order.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A unit of work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send>;

/// Runs tasks at the next scheduling opportunity.
///
/// Implementations must never run the task inline within `schedule`.
pub trait Scheduler: Send + Sync + 'static {
    /// Queues `task` for execution.
    fn schedule(&self, task: Task);
}

impl Scheduler for tokio::runtime::Handle {
    fn schedule(&self, task: Task) {
        // A runtime that is shutting down drops the task, and with it any
        // reactions it owned.
        drop(self.spawn(async move { task() }));
    }
}

/// Runs each task on a short-lived OS thread.
///
/// Used when no async runtime is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, task: Task) {
        if let Err(error) = std::thread::Builder::new()
            .name("promise-dispatch".to_owned())
            .spawn(task)
        {
            tracing::warn!(%error, "failed to spawn promise dispatch thread");
        }
    }
}

/// A queue that runs tasks only when asked to.
///
/// Continuations run deterministically on the thread calling
/// [`TaskQueue::run_until_idle`], which makes it suitable for tests and for
/// embedding in an existing event loop.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Arc<Mutex<VecDeque<Task>>>,
}

impl TaskQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs queued tasks, including tasks queued while running, until the
    /// queue is empty. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.lock().pop_front() {
            task();
            ran += 1;
        }
        ran
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue").field("len", &self.len()).finish()
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, task: Task) {
        self.lock().push_back(task);
    }
}

/// A per-promise serial queue on top of a [`Scheduler`].
///
/// At most one drain is scheduled at a time, and it runs tasks in push order.
pub(crate) struct Dispatch {
    scheduler: Arc<dyn Scheduler>,
    queue: Mutex<DispatchQueue>,
}

#[derive(Default)]
struct DispatchQueue {
    tasks: VecDeque<Task>,
    scheduled: bool,
}

impl Dispatch {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            queue: Mutex::default(),
        })
    }

    pub(crate) fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub(crate) fn push(self: &Arc<Self>, task: Task) {
        {
            let mut queue = self.lock();
            queue.tasks.push_back(task);
            if queue.scheduled {
                return;
            }
            queue.scheduled = true;
        }
        self.schedule_drain();
    }

    fn schedule_drain(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.scheduler.schedule(Box::new(move || this.drain()));
    }

    fn drain(self: Arc<Self>) {
        let guard = DrainGuard(&self);
        loop {
            let task = {
                let mut queue = guard.0.lock();
                match queue.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        queue.scheduled = false;
                        break;
                    }
                }
            };
            task();
        }
        std::mem::forget(guard);
    }

    fn lock(&self) -> MutexGuard<'_, DispatchQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the queue moving when a task panics mid-drain.
struct DrainGuard<'a>(&'a Arc<Dispatch>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let reschedule = {
            let mut queue = self.0.lock();
            queue.scheduled = !queue.tasks.is_empty();
            queue.scheduled
        };
        if reschedule {
            self.0.schedule_drain();
        }
    }
}
