//! Suspension points for cooperative tasks.

use crate::task::TaskHandle;

/// Decision made by an [Awaitable] that reported itself not ready.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SuspendDecision {
    /// Stay suspended; control returns to whoever resumed the task.
    Park,
    /// Resume the same task immediately, the awaited condition cleared.
    Continue,
    /// Hand control directly to another suspended task.
    TransferTo(TaskHandle),
}

/// One suspension point in a task body.
///
/// An awaitable is materialized per suspension point and not retained across
/// suspensions. The driver consults [Awaitable::is_ready] once and, if the
/// point is not ready, [Awaitable::on_suspend] once. [Awaitable::resume_value]
/// is consumed exactly once when execution continues past the point, either
/// synchronously or on a later resumption.
pub trait Awaitable<T = ()> {
    fn is_ready(&mut self) -> bool;

    /// Invoked only when not ready, with the handle of the suspending task.
    fn on_suspend(&mut self, current: TaskHandle) -> SuspendDecision;

    /// Value delivered into the body past the suspension point.
    fn resume_value(&mut self) -> T;
}

/// Awaitable that is always ready. The task proceeds without suspending.
#[derive(Clone, Copy, Default, Debug)]
pub struct NeverSuspend;

impl<T: Default> Awaitable<T> for NeverSuspend {
    fn is_ready(&mut self) -> bool {
        true
    }

    fn on_suspend(&mut self, _current: TaskHandle) -> SuspendDecision {
        unreachable!("NeverSuspend is always ready")
    }

    fn resume_value(&mut self) -> T {
        T::default()
    }
}

/// Awaitable that is never ready and parks the task.
#[derive(Clone, Copy, Default, Debug)]
pub struct AlwaysSuspend;

impl<T: Default> Awaitable<T> for AlwaysSuspend {
    fn is_ready(&mut self) -> bool {
        false
    }

    fn on_suspend(&mut self, _current: TaskHandle) -> SuspendDecision {
        SuspendDecision::Park
    }

    fn resume_value(&mut self) -> T {
        T::default()
    }
}

/// Awaitable that parks the task and hands control to another one.
#[derive(Clone, Copy, Debug)]
pub struct Transfer {
    to: TaskHandle,
}

impl Transfer {
    pub fn to(to: TaskHandle) -> Transfer {
        Transfer { to }
    }
}

impl<T: Default> Awaitable<T> for Transfer {
    fn is_ready(&mut self) -> bool {
        false
    }

    fn on_suspend(&mut self, _current: TaskHandle) -> SuspendDecision {
        SuspendDecision::TransferTo(self.to)
    }

    fn resume_value(&mut self) -> T {
        T::default()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{AlwaysSuspend, Awaitable, NeverSuspend, SuspendDecision, Transfer};
    use crate::task::TaskHandle;

    fn handle() -> TaskHandle {
        TaskHandle { slot: 0, id: 1 }
    }

    #[test]
    fn never_suspend() {
        let mut awaitable = NeverSuspend;
        assert_eq!(Awaitable::<i32>::is_ready(&mut awaitable), true);
        assert_eq!(Awaitable::<i32>::resume_value(&mut awaitable), 0);
    }

    #[test]
    fn always_suspend() {
        let mut awaitable = AlwaysSuspend;
        assert_eq!(Awaitable::<()>::is_ready(&mut awaitable), false);
        assert_eq!(Awaitable::<()>::on_suspend(&mut awaitable, handle()), SuspendDecision::Park);
    }

    #[test]
    fn transfer() {
        let target = handle();
        let mut awaitable = Transfer::to(target);
        assert_eq!(Awaitable::<()>::is_ready(&mut awaitable), false);
        assert_eq!(Awaitable::<()>::on_suspend(&mut awaitable, handle()), SuspendDecision::TransferTo(target));
    }
}
