//! Task representation and the per-task resumption machinery.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::process;

use static_assertions::assert_impl_all;
use strum::Display;

use crate::awaitable::{Awaitable, SuspendDecision};
use crate::promise::Promise;
use crate::registry::Registry;

/// Non-owning token for one task: cheap, copyable, comparable.
///
/// A handle keeps its identity after the task completed, but any operation
/// through a handle whose storage was released is rejected by the runtime.
/// Handles may travel across execution contexts; resumption elsewhere is
/// legal since all driving funnels through one `&mut` runtime at a time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TaskHandle {
    pub(crate) slot: usize,
    pub(crate) id: u64,
}

assert_impl_all!(TaskHandle: Send, Sync);

impl TaskHandle {
    /// Unique identity of the referenced task.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.id)
    }
}

/// Lifecycle state of a task.
///
/// Transitions are monotone except the running/suspended oscillation:
/// created → running → {suspended → running}* → completed. Completed is
/// terminal.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TaskState {
    Created,
    Running,
    Suspended,
    Completed,
}

/// Outcome of one body step.
pub enum Step<T, R = ()> {
    /// Suspension point: await the given awaitable before the next step.
    Suspend(Box<dyn Awaitable<R>>),
    /// Body completed with a value.
    Return(T),
    /// Body completed without producing a value.
    Done,
}

/// Suspendable task body as an explicit state machine.
///
/// There is no compiler transform here: the implementor keeps "which
/// suspension point to resume from" in its own state and [Coroutine::step]
/// runs the body from that point to the next suspension or to completion.
/// `input` carries the resume value of the awaitable just completed; the
/// first step receives the value of the promise's start awaitable.
pub trait Coroutine {
    type Output: 'static;
    type Resume: 'static;

    fn step(&mut self, cx: &mut Context<'_>, input: Self::Resume) -> Step<Self::Output, Self::Resume>;
}

/// Execution context of one body step.
pub struct Context<'a> {
    handle: TaskHandle,
    registry: &'a mut Registry,
}

impl<'a> Context<'a> {
    pub(crate) fn new(handle: TaskHandle, registry: &'a mut Registry) -> Context<'a> {
        Context { handle, registry }
    }

    /// Handle of the task this step belongs to.
    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    /// Registry for cross-task handle hand-off.
    pub fn registry(&mut self) -> &mut Registry {
        self.registry
    }
}

/// Where control goes after advancing a task.
pub(crate) enum Flow {
    /// Parked at a suspension point; control returns to the resumer.
    Park,
    /// Parked, handing control to another task.
    Transfer(TaskHandle),
    /// Completed, optionally handing control onward from the finish hook.
    Cease(Option<TaskHandle>),
}

/// Type-erased face of [Machine] stored in the runtime.
pub(crate) trait RawTask {
    fn advance(&mut self, this: TaskHandle, registry: &mut Registry) -> Flow;
}

enum Point<R> {
    Ready(R),
    Parked,
    Transferred(TaskHandle),
}

/// Pairs a promise with its body and holds the saved resumption point: the
/// pending awaitable of the last suspension plus the body's own state.
pub(crate) struct Machine<P: Promise, B> {
    promise: P,
    body: B,
    started: bool,
    pending: Option<Box<dyn Awaitable<P::Resume>>>,
}

impl<P: Promise, B> Machine<P, B> {
    pub fn new(promise: P, body: B) -> Machine<P, B> {
        Machine { promise, body, started: false, pending: None }
    }

    fn await_point(&mut self, this: TaskHandle, mut awaitable: Box<dyn Awaitable<P::Resume>>) -> Point<P::Resume> {
        if awaitable.is_ready() {
            return Point::Ready(awaitable.resume_value());
        }
        match awaitable.on_suspend(this) {
            SuspendDecision::Continue => Point::Ready(awaitable.resume_value()),
            SuspendDecision::Park => {
                self.pending = Some(awaitable);
                Point::Parked
            },
            SuspendDecision::TransferTo(next) => {
                self.pending = Some(awaitable);
                Point::Transferred(next)
            },
        }
    }

    fn finish(&mut self, this: TaskHandle) -> Flow {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut awaitable = self.promise.on_finish();
            if awaitable.is_ready() {
                return None;
            }
            match awaitable.on_suspend(this) {
                SuspendDecision::TransferTo(next) => Some(next),
                SuspendDecision::Park | SuspendDecision::Continue => None,
            }
        }));
        match outcome {
            Ok(next) => Flow::Cease(next),
            Err(_) => {
                // No later hook exists to catch a teardown failure.
                log::error!("{}: finish hook panicked, aborting", this);
                process::abort();
            },
        }
    }
}

impl<P, B> RawTask for Machine<P, B>
where
    P: Promise,
    B: Coroutine<Output = P::Output, Resume = P::Resume>,
{
    fn advance(&mut self, this: TaskHandle, registry: &mut Registry) -> Flow {
        let mut input = if !self.started {
            self.started = true;
            let start = self.promise.on_start();
            match self.await_point(this, start) {
                Point::Ready(value) => value,
                Point::Parked => return Flow::Park,
                Point::Transferred(next) => return Flow::Transfer(next),
            }
        } else {
            let mut pending = self.pending.take().expect("suspended task has no pending suspension");
            pending.resume_value()
        };
        loop {
            let mut cx = Context::new(this, &mut *registry);
            let step = panic::catch_unwind(AssertUnwindSafe(|| self.body.step(&mut cx, input)));
            match step {
                Ok(Step::Suspend(awaitable)) => match self.await_point(this, awaitable) {
                    Point::Ready(value) => input = value,
                    Point::Parked => return Flow::Park,
                    Point::Transferred(next) => return Flow::Transfer(next),
                },
                Ok(Step::Return(value)) => {
                    self.promise.on_return_value(value);
                    return self.finish(this);
                },
                Ok(Step::Done) => {
                    self.promise.on_return_void();
                    return self.finish(this);
                },
                Err(payload) => {
                    // A panic out of on_failure unwinds to the process-level
                    // fault handler.
                    self.promise.on_failure(payload);
                    return self.finish(this);
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{TaskHandle, TaskState};

    #[test]
    fn handle_display() {
        let handle = TaskHandle { slot: 3, id: 17 };
        assert_eq!(handle.to_string(), "task-17");
        assert_eq!(handle.id(), 17);
    }

    #[test]
    fn handle_identity() {
        let handle = TaskHandle { slot: 0, id: 1 };
        let copy = handle;
        assert_eq!(handle, copy);
        assert_ne!(handle, TaskHandle { slot: 0, id: 2 });
    }

    #[test]
    fn state_display() {
        assert_eq!(TaskState::Created.to_string(), "created");
        assert_eq!(TaskState::Running.to_string(), "running");
        assert_eq!(TaskState::Suspended.to_string(), "suspended");
        assert_eq!(TaskState::Completed.to_string(), "completed");
    }
}
