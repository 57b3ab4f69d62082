//! Promise side of a task: lifecycle hooks bracketing the body.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;

use static_assertions::assert_not_impl_any;

use crate::awaitable::{AlwaysSuspend, Awaitable, NeverSuspend};
use crate::error::{BodyError, PanicPayload};

/// Lifecycle hooks around a task body, executed in fixed order.
///
/// [Promise::on_start] is awaited before the first body step, so a task can
/// start already suspended. On normal completion exactly one of
/// [Promise::on_return_value] and [Promise::on_return_void] runs; on body
/// panic [Promise::on_failure] runs instead and the failure propagates no
/// further. [Promise::on_finish] is awaited unconditionally afterwards.
pub trait Promise {
    type Output: 'static;
    type Resume: 'static;

    /// Awaited before the body runs. Return [AlwaysSuspend] to park the task
    /// before its first step.
    fn on_start(&mut self) -> Box<dyn Awaitable<Self::Resume>>;

    /// Body completed with a value.
    fn on_return_value(&mut self, value: Self::Output);

    /// Body completed without producing a value.
    fn on_return_void(&mut self);

    /// Body panicked. This is the only recovery point for body failures.
    /// A panic out of this hook unwinds to the process-level fault handler.
    fn on_failure(&mut self, payload: PanicPayload);

    /// Awaited after return or failure. The awaitable may route control
    /// onward with a transfer, but the task is complete either way and its
    /// resume value is never consumed. A panic here aborts the process:
    /// there is no later hook to catch it.
    fn on_finish(&mut self) -> Box<dyn Awaitable<Self::Resume>>;
}

enum FinalState<T> {
    Pending,
    Value(T),
    Void,
    Failed(BodyError),
    Taken,
}

/// Final verdict of a completed task body.
#[derive(Debug)]
pub enum Finished<T> {
    Value(T),
    Void,
    Failed(BodyError),
}

type Joint<T> = Rc<RefCell<FinalState<T>>>;

/// Ready-made promise that stores the body's verdict for an [Outcome]
/// observer. Constructed through [completion] or [lazy_completion].
pub struct Completion<T: 'static, R: 'static = ()> {
    joint: Joint<T>,
    lazy: bool,
    marker: PhantomData<R>,
}

/// Observer half of [completion]: reads the verdict once the task is done.
pub struct Outcome<T: 'static> {
    joint: Joint<T>,
}

assert_not_impl_any!(Completion<()>: Send);
assert_not_impl_any!(Outcome<()>: Send);

impl<T: 'static, R: Default + 'static> Promise for Completion<T, R> {
    type Output = T;
    type Resume = R;

    fn on_start(&mut self) -> Box<dyn Awaitable<R>> {
        if self.lazy {
            Box::new(AlwaysSuspend)
        } else {
            Box::new(NeverSuspend)
        }
    }

    fn on_return_value(&mut self, value: T) {
        *self.joint.borrow_mut() = FinalState::Value(value);
    }

    fn on_return_void(&mut self) {
        *self.joint.borrow_mut() = FinalState::Void;
    }

    fn on_failure(&mut self, payload: PanicPayload) {
        *self.joint.borrow_mut() = FinalState::Failed(BodyError::new(payload));
    }

    fn on_finish(&mut self) -> Box<dyn Awaitable<R>> {
        Box::new(NeverSuspend)
    }
}

impl<T> Outcome<T> {
    /// Checks whether a verdict arrived.
    pub fn is_ready(&self) -> bool {
        !matches!(*self.joint.borrow(), FinalState::Pending | FinalState::Taken)
    }

    /// Takes the verdict. Returns `None` while the task still runs and after
    /// the verdict was taken.
    pub fn try_take(&self) -> Option<Finished<T>> {
        let mut state = self.joint.borrow_mut();
        match *state {
            FinalState::Pending | FinalState::Taken => None,
            _ => match mem::replace(&mut *state, FinalState::Taken) {
                FinalState::Value(value) => Some(Finished::Value(value)),
                FinalState::Void => Some(Finished::Void),
                FinalState::Failed(err) => Some(Finished::Failed(err)),
                FinalState::Pending | FinalState::Taken => unreachable!("completion: verdict vanished"),
            },
        }
    }
}

fn joint<T, R: Default>(lazy: bool) -> (Completion<T, R>, Outcome<T>) {
    let joint = Rc::new(RefCell::new(FinalState::Pending));
    (Completion { joint: joint.clone(), lazy, marker: PhantomData }, Outcome { joint })
}

/// Constructs a promise/observer pair for one task. The task runs to its
/// first suspension point as part of being spawned.
pub fn completion<T, R: Default + 'static>() -> (Completion<T, R>, Outcome<T>) {
    joint(false)
}

/// Like [completion], but the task starts parked before its first body step
/// and runs only once resumed.
pub fn lazy_completion<T, R: Default + 'static>() -> (Completion<T, R>, Outcome<T>) {
    joint(true)
}
