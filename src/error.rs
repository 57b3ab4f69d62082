use std::any::Any;
use std::fmt;

use static_assertions::assert_impl_all;
use thiserror::Error;

use crate::task::{TaskHandle, TaskState};

/// Payload captured from a panicking task body.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Wraps a body panic as [std::error::Error].
pub struct BodyError {
    panicked: PanicPayload,
}

assert_impl_all!(BodyError: Send);

impl BodyError {
    fn as_str(&self) -> Option<&str> {
        let panicked = self.panicked.as_ref();
        if let Some(s) = panicked.downcast_ref::<&str>() {
            Some(s)
        } else if let Some(s) = panicked.downcast_ref::<String>() {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub(crate) fn new(panicked: PanicPayload) -> Self {
        BodyError { panicked }
    }

    /// Converts this error to the panicked object.
    pub fn into_panic(self) -> PanicPayload {
        self.panicked
    }
}

impl fmt::Debug for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            None => write!(f, "BodyError::Panic({:?})", self.panicked.as_ref().type_id()),
            Some(s) => write!(f, "BodyError::Panic({:?})", s),
        }
    }
}

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic({:?})", self.as_str().unwrap_or(".."))
    }
}

impl std::error::Error for BodyError {}

/// Violations of the task lifecycle contract.
///
/// These are reported to the violating caller immediately and leave the
/// involved tasks in a well-defined state.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("{handle} is {state}, resume requires a suspended task")]
    ResumeNotSuspended { handle: TaskHandle, state: TaskState },
    #[error("{handle} is running and cannot be destroyed")]
    DestroyRunning { handle: TaskHandle },
    #[error("{handle} refers to no live task")]
    DanglingHandle { handle: TaskHandle },
    #[error("transfer from {from} targets {to} which is {state}, not suspended")]
    TransferNotSuspended { from: TaskHandle, to: TaskHandle, state: TaskState },
    #[error("transfer from {from} targets dangling handle {to}")]
    TransferDangling { from: TaskHandle, to: TaskHandle },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::BodyError;

    #[test]
    fn body_error_str() {
        let err = BodyError::new(Box::new("oooooops"));
        assert_eq!(err.to_string(), "panic(\"oooooops\")");
        assert_eq!(format!("{:?}", err), "BodyError::Panic(\"oooooops\")");
    }

    #[test]
    fn body_error_string() {
        let err = BodyError::new(Box::new("oooooops".to_string()));
        assert_eq!(err.to_string(), "panic(\"oooooops\")");
    }

    #[test]
    fn body_error_opaque() {
        let err = BodyError::new(Box::new(5));
        assert_eq!(err.to_string(), "panic(\"..\")");
        let panicked = err.into_panic();
        assert_eq!(*panicked.downcast_ref::<i32>().unwrap(), 5);
    }
}
