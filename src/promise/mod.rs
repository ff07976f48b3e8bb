//! A promise with chained continuations.
//!
//! A [`Promise`] is a single-assignment placeholder: it starts pending and
//! settles exactly once, either fulfilled with a value or rejected with an
//! error. The producer settles it through the matching [`Resolver`].
//!
//! Continuations registered with [`Promise::then`], [`Promise::catch`] and
//! [`Promise::then_or_else`] never run inside the registering call. They are
//! handed to a [`Scheduler`] and, for any one promise, run in registration
//! order. Each registration returns a derived promise settled with the
//! continuation's result, so an `Err` returned by a continuation rejects the
//! next promise in the chain.
//!
//! # Progress
//!
//! A producer may report [`Progress`] while the promise is pending. Progress
//! handlers are scheduled like continuations, are forwarded to derived
//! promises, and are dropped once the promise settles. Delivery is best-effort.
//!
//! # Cancellation
//!
//! [`Promise::cancel`] settles a pending promise with [`Cancelled`] and then
//! runs the canceller installed by the producer with [`Resolver::on_cancel`].
//! Cancelling a derived promise asks its source to cancel; the source gives in
//! once every promise derived from it has asked.

mod scheduler;

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use snafu::Snafu;

pub use scheduler::{Scheduler, Task, TaskQueue, ThreadScheduler};
use scheduler::Dispatch;

/// The error a promise is rejected with when it is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(display("Promise was cancelled"))]
pub struct Cancelled;

impl crate::Error for Cancelled {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Transfer progress reported by a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes transferred so far.
    pub transferred: u64,
    /// Total bytes expected, when known.
    pub total: Option<u64>,
}

/// The observable state of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled,
    /// Settled with an error.
    Rejected,
}

type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;
type ProgressHandler = Arc<dyn Fn(Progress) + Send + Sync>;
type Canceller = Box<dyn FnOnce() + Send>;

enum State<T, E> {
    Pending(Pending<T, E>),
    Settled(Result<T, E>),
}

struct Pending<T, E> {
    reactions: Vec<Reaction<T, E>>,
    progress: Vec<ProgressHandler>,
    canceller: Option<Canceller>,
    derived: usize,
    cancel_requests: usize,
}

impl<T, E> Default for Pending<T, E> {
    fn default() -> Self {
        Self {
            reactions: Vec::new(),
            progress: Vec::new(),
            canceller: None,
            derived: 0,
            cancel_requests: 0,
        }
    }
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
    dispatch: Arc<Dispatch>,
}

impl<T, E> Shared<T, E> {
    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> Shared<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Settles the promise. Returns the producer's canceller on success, or
    /// `None` if the promise had already settled.
    fn transition(&self, outcome: Result<T, E>) -> Option<Option<Canceller>> {
        let mut state = self.lock();
        let State::Pending(pending) = &mut *state else {
            return None;
        };
        // Reactions are queued under the lock so that a registration racing
        // with settlement cannot overtake them.
        for reaction in pending.reactions.drain(..) {
            let outcome = outcome.clone();
            self.dispatch.push(Box::new(move || reaction(outcome)));
        }
        let canceller = pending.canceller.take();
        *state = State::Settled(outcome);
        Some(canceller)
    }

    fn subscribe(&self, reaction: Reaction<T, E>) {
        let mut state = self.lock();
        match &mut *state {
            State::Pending(pending) => pending.reactions.push(reaction),
            State::Settled(outcome) => {
                let outcome = outcome.clone();
                self.dispatch.push(Box::new(move || reaction(outcome)));
            }
        }
    }

    fn notify(&self, progress: Progress) -> bool {
        let state = self.lock();
        let State::Pending(pending) = &*state else {
            return false;
        };
        for handler in &pending.progress {
            let handler = Arc::clone(handler);
            self.dispatch.push(Box::new(move || handler(progress)));
        }
        true
    }
}

/// A value or failure that may not be available yet.
///
/// Cloning a `Promise` yields another handle to the same settlement.
pub struct Promise<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Promise<T, E> {
    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        match &*self.shared.lock() {
            State::Pending(_) => PromiseState::Pending,
            State::Settled(Ok(_)) => PromiseState::Fulfilled,
            State::Settled(Err(_)) => PromiseState::Rejected,
        }
    }

    /// Returns true if the promise has not settled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + From<Cancelled> + Send + 'static,
{
    /// Creates a pending promise and the resolver that settles it.
    ///
    /// Continuations run on `scheduler`.
    #[must_use]
    pub fn pending(scheduler: Arc<dyn Scheduler>) -> (Self, Resolver<T, E>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending(Pending::default())),
            dispatch: Dispatch::new(scheduler),
        });
        let promise = Self {
            shared: Arc::clone(&shared),
        };
        (promise, Resolver { shared })
    }

    /// Creates a promise already fulfilled with `value`.
    #[must_use]
    pub fn fulfilled(scheduler: Arc<dyn Scheduler>, value: T) -> Self {
        Self::settled(scheduler, Ok(value))
    }

    /// Creates a promise already rejected with `error`.
    #[must_use]
    pub fn rejected(scheduler: Arc<dyn Scheduler>, error: E) -> Self {
        Self::settled(scheduler, Err(error))
    }

    fn settled(scheduler: Arc<dyn Scheduler>, outcome: Result<T, E>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Settled(outcome)),
                dispatch: Dispatch::new(scheduler),
            }),
        }
    }

    /// Registers a continuation for fulfillment. A rejection passes through
    /// to the returned promise unchanged.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.then_or_else(on_fulfilled, Err)
    }

    /// Registers a continuation for rejection. A value passes through to the
    /// returned promise unchanged.
    pub fn catch<F>(&self, on_rejected: F) -> Promise<T, E>
    where
        F: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.then_or_else(Ok, on_rejected)
    }

    /// Registers continuations for both outcomes. Exactly one of them runs.
    ///
    /// If the returned promise is cancelled before this promise settles,
    /// neither continuation runs.
    pub fn then_or_else<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
        R: FnOnce(E) -> Result<U, E> + Send + 'static,
    {
        let (derived, resolver) = Promise::pending(Arc::clone(self.shared.dispatch.scheduler()));

        let is_pending = {
            let mut state = self.shared.lock();
            match &mut *state {
                State::Pending(pending) => {
                    pending.derived += 1;
                    let forward = resolver.clone();
                    pending.progress.push(Arc::new(move |progress| {
                        forward.notify(progress);
                    }));
                    true
                }
                State::Settled(_) => false,
            }
        };

        if is_pending {
            let source = Arc::downgrade(&self.shared);
            resolver.on_cancel(move || request_cancel(&source));
        }

        let settle = RejectOnDrop(resolver.clone());
        self.shared.subscribe(Box::new(move |outcome| {
            if !settle.0.is_pending() {
                return;
            }
            let next = match outcome {
                Ok(value) => on_fulfilled(value),
                Err(error) => on_rejected(error),
            };
            settle.0.settle(next);
        }));

        derived
    }

    /// Registers a progress handler. Handlers registered after settlement never run.
    pub fn on_progress<F>(&self, handler: F) -> &Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        if let State::Pending(pending) = &mut *self.shared.lock() {
            pending.progress.push(Arc::new(handler));
        }
        self
    }

    /// Cancels the promise.
    ///
    /// A pending promise is rejected with [`Cancelled`] and the producer's
    /// canceller runs. Returns false, changing nothing, if the promise had
    /// already settled.
    pub fn cancel(&self) -> bool {
        match self.shared.transition(Err(E::from(Cancelled))) {
            Some(canceller) => {
                tracing::trace!("promise cancelled");
                if let Some(canceller) = canceller {
                    canceller();
                }
                true
            }
            None => false,
        }
    }

    /// Returns a future resolving to the settled outcome.
    ///
    /// The continuation is registered immediately. If the scheduler drops it
    /// without running it (for example because the runtime shut down), the
    /// future resolves to [`Cancelled`].
    pub fn wait(&self) -> impl Future<Output = Result<T, E>> + Send + use<T, E> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.shared.subscribe(Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }));
        async move { rx.await.unwrap_or_else(|_| Err(E::from(Cancelled))) }
    }
}

fn request_cancel<T, E>(source: &Weak<Shared<T, E>>)
where
    T: Clone + Send + 'static,
    E: Clone + From<Cancelled> + Send + 'static,
{
    let Some(shared) = source.upgrade() else {
        return;
    };
    let all_requested = match &mut *shared.lock() {
        State::Pending(pending) => {
            pending.cancel_requests += 1;
            pending.cancel_requests >= pending.derived
        }
        State::Settled(_) => false,
    };
    if all_requested {
        Promise { shared }.cancel();
    }
}

/// Rejects a derived promise with [`Cancelled`] when its continuation unwinds
/// or is dropped without running.
struct RejectOnDrop<T, E>(Resolver<T, E>)
where
    T: Clone + Send + 'static,
    E: Clone + From<Cancelled> + Send + 'static;

impl<T, E> Drop for RejectOnDrop<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + From<Cancelled> + Send + 'static,
{
    fn drop(&mut self) {
        if self.0.is_pending() {
            tracing::trace!("continuation abandoned");
            self.0.reject(E::from(Cancelled));
        }
    }
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + From<Cancelled> + Send + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// The producer side of a [`Promise`].
pub struct Resolver<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Fulfills the promise. Returns false if it had already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Rejects the promise. Returns false if it had already settled.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    /// Settles the promise with `outcome`. Returns false if it had already
    /// settled, in which case `outcome` is dropped.
    pub fn settle(&self, outcome: Result<T, E>) -> bool {
        let fulfilled = outcome.is_ok();
        let settled = self.shared.transition(outcome).is_some();
        if settled {
            tracing::trace!(fulfilled, "promise settled");
        } else {
            tracing::trace!("ignoring settlement of an already settled promise");
        }
        settled
    }

    /// Reports progress to the registered handlers. Returns false once settled.
    pub fn notify(&self, progress: Progress) -> bool {
        self.shared.notify(progress)
    }

    /// Installs the canceller run by [`Promise::cancel`], replacing any
    /// previous one. Dropped without running if the promise is already settled.
    pub fn on_cancel<F>(&self, canceller: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let State::Pending(pending) = &mut *self.shared.lock() {
            pending.canceller = Some(Box::new(canceller));
        }
    }

    /// Returns true if the promise has not settled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(&*self.shared.lock(), State::Pending(_))
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}
