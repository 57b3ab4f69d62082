//! Driver for cooperative tasks: first invocation, resumption and the
//! transfer trampoline.

use std::sync::atomic::{AtomicU64, Ordering};

use derive_where::derive_where;
use ignore_result::Ignore;
use slab::Slab;

use crate::error::ContractError;
use crate::promise::Promise;
use crate::registry::Registry;
use crate::task::{Coroutine, Flow, Machine, RawTask, TaskHandle, TaskState};

static TID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive_where(Debug)]
struct TaskCell {
    id: u64,
    state: TaskState,
    #[derive_where(skip)]
    raw: Option<Box<dyn RawTask>>,
}

/// Runtime owns task storage and drives tasks to their suspension points.
///
/// All driving funnels through `&mut Runtime`, so at most one resumption is
/// in flight per task at any instant and the runtime needs no internal
/// locking. Callers resuming from different execution contexts serialize on
/// access to the runtime itself.
pub struct Runtime {
    tasks: Slab<TaskCell>,
    registry: Registry,
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime { tasks: Slab::new(), registry: Registry::new() }
    }

    /// Registry for cross-task handle hand-off.
    pub fn registry(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Spawns a task and performs its first invocation: the body runs until
    /// its first suspension point or completion before this returns. A
    /// promise whose start awaitable suspends parks the task before its
    /// first body step.
    ///
    /// Errs if a transfer issued during the first invocation targets a task
    /// that is not suspended.
    pub fn spawn<P, B>(&mut self, promise: P, body: B) -> Result<TaskHandle, ContractError>
    where
        P: Promise + 'static,
        B: Coroutine<Output = P::Output, Resume = P::Resume> + 'static,
    {
        let id = TID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let cell = TaskCell { id, state: TaskState::Created, raw: Some(Box::new(Machine::new(promise, body))) };
        let slot = self.tasks.insert(cell);
        let handle = TaskHandle { slot, id };
        log::trace!("{} spawned", handle);
        self.drive(handle)?;
        Ok(handle)
    }

    /// Resumes a suspended task. The task continues from exactly where it
    /// suspended and runs until its next suspension point or completion;
    /// transfer chains started by it run to quiescence before this returns.
    pub fn resume(&mut self, handle: TaskHandle) -> Result<(), ContractError> {
        let cell = self.cell(handle)?;
        if cell.state != TaskState::Suspended {
            return Err(ContractError::ResumeNotSuspended { handle, state: cell.state });
        }
        self.drive(handle)
    }

    /// Destroys a task without running its body further.
    ///
    /// For a suspended task this drops the retained body state, the pending
    /// awaitable and the promise, and does not invoke the finish hook. For a
    /// completed task it releases the remaining storage. A running task
    /// cannot be destroyed.
    pub fn destroy(&mut self, handle: TaskHandle) -> Result<(), ContractError> {
        let cell = self.cell(handle)?;
        match cell.state {
            TaskState::Running => Err(ContractError::DestroyRunning { handle }),
            state => {
                self.tasks.remove(handle.slot);
                log::trace!("{} destroyed while {}", handle, state);
                Ok(())
            },
        }
    }

    /// Checks whether the task completed. False for live tasks and for
    /// handles whose storage was released.
    pub fn is_done(&self, handle: TaskHandle) -> bool {
        self.state(handle) == Some(TaskState::Completed)
    }

    /// Current lifecycle state, or `None` once storage was released.
    pub fn state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.tasks.get(handle.slot).filter(|cell| cell.id == handle.id).map(|cell| cell.state)
    }

    /// Destroys all remaining tasks.
    pub fn shutdown(&mut self) {
        let handles: Vec<TaskHandle> = self.tasks.iter().map(|(slot, cell)| TaskHandle { slot, id: cell.id }).collect();
        for handle in handles {
            self.destroy(handle).ignore();
        }
    }

    fn cell(&mut self, handle: TaskHandle) -> Result<&mut TaskCell, ContractError> {
        self.tasks
            .get_mut(handle.slot)
            .filter(|cell| cell.id == handle.id)
            .ok_or(ContractError::DanglingHandle { handle })
    }

    /// Tail-iterative trampoline: transfer chains loop here instead of
    /// recursing, so a chain of N transfers costs O(1) additional stack.
    fn drive(&mut self, first: TaskHandle) -> Result<(), ContractError> {
        let mut next = Some(first);
        while let Some(handle) = next {
            next = self.advance(handle)?;
        }
        Ok(())
    }

    /// Runs one task forward to its next suspension decision. The task is
    /// fully parked before control leaves the runtime, so a handle handed to
    /// another context always observes a resumable continuation.
    fn advance(&mut self, handle: TaskHandle) -> Result<Option<TaskHandle>, ContractError> {
        let cell = self.cell(handle)?;
        cell.state = TaskState::Running;
        // If the machine unwinds (a panicking failure hook), the cell stays
        // running with no machine and later operations report it loudly.
        let mut raw = cell.raw.take().expect("live task has no machine");
        let flow = raw.advance(handle, &mut self.registry);
        let cell = self.tasks.get_mut(handle.slot).expect("running task vanished");
        match flow {
            Flow::Park => {
                cell.raw = Some(raw);
                cell.state = TaskState::Suspended;
                log::trace!("{} parked", handle);
                Ok(None)
            },
            Flow::Transfer(next) => {
                cell.raw = Some(raw);
                cell.state = TaskState::Suspended;
                log::trace!("{} parked, transferring control to {}", handle, next);
                self.check_transfer(handle, next)?;
                Ok(Some(next))
            },
            Flow::Cease(next) => {
                // The machine, and with it the promise, is dropped here,
                // right after the finish hook ran.
                cell.state = TaskState::Completed;
                log::trace!("{} completed", handle);
                if let Some(next) = next {
                    self.check_transfer(handle, next)?;
                }
                Ok(next)
            },
        }
    }

    fn check_transfer(&mut self, from: TaskHandle, to: TaskHandle) -> Result<(), ContractError> {
        match self.state(to) {
            None => Err(ContractError::TransferDangling { from, to }),
            Some(TaskState::Suspended) => Ok(()),
            Some(state) => Err(ContractError::TransferNotSuspended { from, to, state }),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Runtime;
    use crate::awaitable::Transfer;
    use crate::error::ContractError;
    use crate::promise::{completion, lazy_completion, Finished};
    use crate::task::{Context, Coroutine, Step, TaskState};

    struct Immediate(i32);

    impl Coroutine for Immediate {
        type Output = i32;
        type Resume = ();

        fn step(&mut self, _cx: &mut Context<'_>, _input: ()) -> Step<i32> {
            Step::Return(self.0)
        }
    }

    struct SelfTransfer {
        resumed: bool,
    }

    impl Coroutine for SelfTransfer {
        type Output = i32;
        type Resume = ();

        fn step(&mut self, cx: &mut Context<'_>, _input: ()) -> Step<i32> {
            if !self.resumed {
                self.resumed = true;
                Step::Suspend(Box::new(Transfer::to(cx.handle())))
            } else {
                Step::Return(7)
            }
        }
    }

    #[test]
    fn spawn_completes_immediately() {
        let mut runtime = Runtime::new();
        let (promise, outcome) = completion();
        let task = runtime.spawn(promise, Immediate(5)).unwrap();
        assert_eq!(runtime.is_done(task), true);
        assert_eq!(runtime.state(task), Some(TaskState::Completed));
        assert!(matches!(outcome.try_take(), Some(Finished::Value(5))));
    }

    #[test]
    fn resume_completed_task() {
        let mut runtime = Runtime::new();
        let (promise, _outcome) = completion();
        let task = runtime.spawn(promise, Immediate(5)).unwrap();
        assert_eq!(
            runtime.resume(task),
            Err(ContractError::ResumeNotSuspended { handle: task, state: TaskState::Completed })
        );
    }

    #[test]
    fn spawn_lazy_parks() {
        let mut runtime = Runtime::new();
        let (promise, outcome) = lazy_completion();
        let task = runtime.spawn(promise, Immediate(6)).unwrap();
        assert_eq!(runtime.state(task), Some(TaskState::Suspended));
        assert_eq!(outcome.is_ready(), false);
        runtime.resume(task).unwrap();
        assert_eq!(runtime.is_done(task), true);
        assert!(matches!(outcome.try_take(), Some(Finished::Value(6))));
    }

    #[test]
    fn transfer_to_self_trampolines() {
        let mut runtime = Runtime::new();
        let (promise, outcome) = completion();
        let task = runtime.spawn(promise, SelfTransfer { resumed: false }).unwrap();
        assert_eq!(runtime.is_done(task), true);
        assert!(matches!(outcome.try_take(), Some(Finished::Value(7))));
    }

    #[test]
    fn dangling_handle_after_destroy() {
        let mut runtime = Runtime::new();
        let (promise, _outcome) = lazy_completion();
        let task = runtime.spawn(promise, Immediate(5)).unwrap();
        runtime.destroy(task).unwrap();
        assert_eq!(runtime.state(task), None);
        assert_eq!(runtime.is_done(task), false);
        assert_eq!(runtime.resume(task), Err(ContractError::DanglingHandle { handle: task }));
        assert_eq!(runtime.destroy(task), Err(ContractError::DanglingHandle { handle: task }));
    }

    #[test]
    fn stale_handle_does_not_alias_reused_slot() {
        let mut runtime = Runtime::new();
        let (promise, _outcome) = lazy_completion();
        let stale = runtime.spawn(promise, Immediate(5)).unwrap();
        runtime.destroy(stale).unwrap();

        // The replacement reuses the vacated slot but carries a fresh id.
        let (promise, _outcome) = lazy_completion();
        let fresh = runtime.spawn(promise, Immediate(6)).unwrap();
        assert_ne!(stale, fresh);
        assert_eq!(runtime.state(fresh), Some(TaskState::Suspended));
        assert_eq!(runtime.resume(stale), Err(ContractError::DanglingHandle { handle: stale }));
    }

    #[test]
    fn destroy_completed_releases_storage() {
        let mut runtime = Runtime::new();
        let (promise, _outcome) = completion();
        let task = runtime.spawn(promise, Immediate(5)).unwrap();
        assert_eq!(runtime.is_done(task), true);
        runtime.destroy(task).unwrap();
        assert_eq!(runtime.state(task), None);
    }
}
