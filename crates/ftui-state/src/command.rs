#![forbid(unsafe_code)]

//! Observable wrapper around one fallible unit of work.
//!
//! # Design
//!
//! A [`Command`] owns an action (synchronous or asynchronous), a
//! [`CommandStatus`] and the last [`Outcome`]. Views bind to it through
//! [`Listenable`] to drive spinners and disabled buttons.
//!
//! ```text
//!            execute()               settle
//!   Idle ─────────────▶ Running ─────────────▶ Done
//!    ▲                    │ execute(): joins     │
//!    │      clear()       │                      │ execute()
//!    └────────────────────┴──────────────────────┴──────▶ Running
//! ```
//!
//! # Invariants
//!
//! 1. `execute()` while `Running` does not call the action or notify. It
//!    returns a handle that resolves when the in-flight run settles.
//! 2. Every other `execute()` notifies exactly twice: on entering `Running`
//!    (result `None`) and on entering `Done` (result `Some`).
//! 3. `status()` reads `Running` as soon as `execute()` returns for an
//!    action that has not settled yet.
//! 4. Action panics are caught and stored as a failure; `execute()` never
//!    panics or errors because of the action.
//!
//! # Failure Modes
//!
//! - **Clear while running**: `clear()` does not cancel the in-flight
//!   action. When it settles it still writes its result and moves the
//!   command to `Done` (last writer wins).
//! - **Dropped execution**: an async run is shared between the command and
//!   every [`Execution`] handed out for it. Dropping one handle does not
//!   abandon the run: awaiting any other handle, including the one returned
//!   by a suppressed `execute()`, drives it to completion.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::error::{ActionPanic, CommandError};
// Import tracing macros (no-op when tracing feature is disabled).
#[cfg(feature = "tracing")]
use crate::logging::{debug, warn};
#[cfg(not(feature = "tracing"))]
use crate::{debug, warn};
use crate::notifier::{ChangeNotifier, Listenable};
use crate::outcome::Outcome;

/// Lifecycle of a [`Command`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    /// Never run, or cleared.
    #[default]
    Idle,
    /// Action in flight.
    Running,
    /// Action settled; a result is available.
    Done,
}

impl CommandStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a command, as a listener would record it.
pub struct CommandState<T, E> {
    pub status: CommandStatus,
    pub result: Option<Rc<Outcome<T, E>>>,
}

impl<T, E> Clone for CommandState<T, E> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            result: self.result.clone(),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for CommandState<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandState")
            .field("status", &self.status)
            .field("result", &self.result)
            .finish()
    }
}

enum Invocation<T, E> {
    Settled(Outcome<T, E>),
    Pending(LocalBoxFuture<'static, Outcome<T, E>>),
}

type Action<T, A, E> = Box<dyn Fn(A) -> Invocation<T, E>>;

/// An async run, shared by the command and every [`Execution`] for it.
type Run = Shared<LocalBoxFuture<'static, ()>>;

struct CommandInner<T, A, E> {
    action: Action<T, A, E>,
    status: Cell<CommandStatus>,
    result: RefCell<Option<Rc<Outcome<T, E>>>>,
    notifier: ChangeNotifier,
    label: RefCell<Option<String>>,
    completed_runs: Cell<u64>,
    started_runs: Cell<u64>,
    in_flight: RefCell<Option<(u64, Run)>>,
}

impl<T, A, E> CommandInner<T, A, E> {
    fn label(&self) -> String {
        self.label.borrow().clone().unwrap_or_default()
    }

    fn settle(&self, outcome: Outcome<T, E>) {
        debug!(label = %self.label(), ok = outcome.is_success(), "command settled");
        let previous = self.result.replace(Some(Rc::new(outcome)));
        drop(previous);
        self.status.set(CommandStatus::Done);
        self.completed_runs.set(self.completed_runs.get() + 1);
        self.notifier.notify_listeners();
    }

    /// Settle async run `id`, releasing its shared handle first when it is
    /// still the latest one.
    fn finish(&self, id: u64, outcome: Outcome<T, E>) {
        let retired = {
            let mut in_flight = self.in_flight.borrow_mut();
            let latest = matches!(&*in_flight, Some((current, _)) if *current == id);
            if latest {
                in_flight.take()
            } else {
                None
            }
        };
        drop(retired);
        self.settle(outcome);
    }
}

/// An observable, re-entrancy-guarded unit of work.
///
/// `T` is the success value, `A` the argument passed to each run and `E` the
/// failure type. `E` must be constructible from [`ActionPanic`] so that a
/// panicking action can be recorded as a failure.
///
/// Cloning a `Command` creates a new handle to the **same** state.
pub struct Command<T, A = (), E = CommandError> {
    inner: Rc<CommandInner<T, A, E>>,
}

impl<T, A, E> Clone for Command<T, A, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static, A: 'static, E: From<ActionPanic> + 'static> Command<T, A, E> {
    /// Wrap a synchronous action. It runs to completion inside
    /// [`execute`](Self::execute).
    pub fn new(action: impl Fn(A) -> Outcome<T, E> + 'static) -> Self {
        Self::from_action(Box::new(move |args: A| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(args)))
                .unwrap_or_else(captured);
            Invocation::Settled(outcome)
        }))
    }

    /// Wrap an asynchronous action. It is started inside
    /// [`execute`](Self::execute) and settles when any [`Execution`] for
    /// that run is driven to completion.
    pub fn new_async<F, Fut>(action: F) -> Self
    where
        F: Fn(A) -> Fut + 'static,
        Fut: Future<Output = Outcome<T, E>> + 'static,
    {
        Self::from_action(Box::new(move |args: A| {
            match panic::catch_unwind(AssertUnwindSafe(|| action(args))) {
                Ok(future) => Invocation::Pending(
                    AssertUnwindSafe(future)
                        .catch_unwind()
                        .map(|caught| caught.unwrap_or_else(captured))
                        .boxed_local(),
                ),
                Err(payload) => Invocation::Settled(captured(payload)),
            }
        }))
    }

    fn from_action(action: Action<T, A, E>) -> Self {
        Self {
            inner: Rc::new(CommandInner {
                action,
                status: Cell::new(CommandStatus::Idle),
                result: RefCell::new(None),
                notifier: ChangeNotifier::new(),
                label: RefCell::new(None),
                completed_runs: Cell::new(0),
                started_runs: Cell::new(0),
                in_flight: RefCell::new(None),
            }),
        }
    }

    /// Run the action with `args`.
    ///
    /// While a run is in flight this does nothing except return a handle
    /// to that run. Otherwise the result is cleared, the status becomes
    /// `Running` and listeners are notified before the action is invoked.
    pub fn execute(&self, args: A) -> Execution {
        let inner = &self.inner;
        if inner.status.get() == CommandStatus::Running {
            debug!(label = %inner.label(), "execute ignored, command already running");
            return match &*inner.in_flight.borrow() {
                Some((_, run)) => Execution::joining(run.clone()),
                None => Execution::complete(),
            };
        }

        let previous = inner.result.replace(None);
        drop(previous);
        // A run cleared while in flight stays reachable through its own
        // Executions only.
        let stale = inner.in_flight.replace(None);
        drop(stale);
        inner.status.set(CommandStatus::Running);
        debug!(label = %inner.label(), "command running");
        inner.notifier.notify_listeners();

        match (inner.action)(args) {
            Invocation::Settled(outcome) => {
                inner.settle(outcome);
                Execution::complete()
            }
            Invocation::Pending(future) => {
                let id = inner.started_runs.get() + 1;
                inner.started_runs.set(id);
                let weak = Rc::downgrade(inner);
                let run = async move {
                    let outcome = future.await;
                    if let Some(inner) = weak.upgrade() {
                        inner.finish(id, outcome);
                    }
                }
                .boxed_local()
                .shared();
                *inner.in_flight.borrow_mut() = Some((id, run.clone()));
                Execution::joining(run)
            }
        }
    }
}

impl<T: 'static, E: From<ActionPanic> + 'static> Command<T, (), E> {
    /// [`execute`](Self::execute) for argument-less actions.
    pub fn run(&self) -> Execution {
        self.execute(())
    }
}

impl<T, A, E> Command<T, A, E> {
    /// Name used in log events.
    #[must_use]
    pub fn with_label(self, label: impl Into<String>) -> Self {
        *self.inner.label.borrow_mut() = Some(label.into());
        self
    }

    #[must_use]
    pub fn label(&self) -> Option<String> {
        self.inner.label.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> CommandStatus {
        self.inner.status.get()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status() == CommandStatus::Running
    }

    /// The last settled outcome, or `None` while idle or running.
    #[must_use]
    pub fn result(&self) -> Option<Rc<Outcome<T, E>>> {
        self.inner.result.borrow().clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> CommandState<T, E> {
        CommandState {
            status: self.status(),
            result: self.result(),
        }
    }

    /// Number of runs that have settled since construction.
    #[must_use]
    pub fn completed_runs(&self) -> u64 {
        self.inner.completed_runs.get()
    }

    /// Return to `Idle` with no result and notify once, whatever the
    /// current status.
    pub fn clear(&self) {
        self.inner.status.set(CommandStatus::Idle);
        let previous = self.inner.result.replace(None);
        drop(previous);
        debug!(label = %self.inner.label(), "command cleared");
        self.inner.notifier.notify_listeners();
    }

    /// Alias for [`clear`](Self::clear).
    pub fn reset(&self) {
        self.clear();
    }
}

impl<T, A, E> Listenable for Command<T, A, E> {
    fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }
}

impl<T, A, E> fmt::Debug for Command<T, A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("label", &*self.inner.label.borrow())
            .field("status", &self.status())
            .field("has_result", &self.inner.result.borrow().is_some())
            .field("completed_runs", &self.completed_runs())
            .finish_non_exhaustive()
    }
}

fn captured<T, E: From<ActionPanic>>(payload: Box<dyn Any + Send>) -> Outcome<T, E> {
    let panic = ActionPanic::new(payload);
    warn!(message = panic.message().unwrap_or("<non-string payload>"), "command action panicked");
    Outcome::failure(E::from(panic))
}

/// Completion handle returned by [`Command::execute`].
///
/// Resolves once the run it belongs to has settled and both notifications
/// have fired. Never resolves to an error. Every handle for the same run
/// drives it; the first one polled to completion settles the command.
#[must_use = "an async action only makes progress while one of its Executions is polled"]
pub struct Execution {
    pending: Option<Run>,
}

impl Execution {
    fn complete() -> Self {
        Self { pending: None }
    }

    fn joining(run: Run) -> Self {
        Self { pending: Some(run) }
    }

    /// Whether the run has settled (or was never started).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.as_ref().is_none_or(|run| run.peek().is_some())
    }
}

impl Future for Execution {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(future) = self.pending.as_mut() {
            if future.poll_unpin(cx).is_pending() {
                return Poll::Pending;
            }
            self.pending = None;
        }
        Poll::Ready(())
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("complete", &self.is_complete())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
