//! # Cooperative task facility with explicit suspension and symmetric transfer
//! `baton` runs suspendable tasks on a single logical thread of control: a
//! task executes until it voluntarily reaches a suspension point, parks
//! there, and later continues from exactly that point when someone holding
//! its [task::TaskHandle] resumes it. A suspension point may also hand
//! control directly to another suspended task; such transfers run on a
//! tail-iterative trampoline, so arbitrarily long chains cost constant
//! additional stack.
//!
//! There is no compiler transform involved. A body is an explicit state
//! machine implementing [task::Coroutine], bracketed by the lifecycle hooks
//! of a [promise::Promise] and suspended through values implementing
//! [awaitable::Awaitable].
//!
//! ## Usage
//! Construct a [runtime::Runtime], spawn tasks on it and resume them through
//! their handles.
//!
//! * Use [runtime::Runtime::spawn] to start a task; it runs to its first
//!   suspension point or completion before spawn returns.
//! * Use [promise::completion] to create a ready-made promise together with
//!   the [promise::Outcome] observer of the task's final verdict.
//! * Use [registry::Registry] (reachable from [task::Context] inside a body)
//!   to hand handles across tasks by name.
//!
//! ## Example
//! ```rust
//! use baton::{completion, AlwaysSuspend, Context, Coroutine, Finished, Runtime, Step};
//!
//! // Greets, suspends once, and finishes when resumed.
//! struct Hello(u8);
//!
//! impl Coroutine for Hello {
//!     type Output = &'static str;
//!     type Resume = ();
//!
//!     fn step(&mut self, cx: &mut Context<'_>, _input: ()) -> Step<&'static str> {
//!         self.0 += 1;
//!         match self.0 {
//!             1 => {
//!                 let handle = cx.handle();
//!                 cx.registry().register("hello", handle);
//!                 Step::Suspend(Box::new(AlwaysSuspend))
//!             },
//!             _ => Step::Return("hello coroutine"),
//!         }
//!     }
//! }
//!
//! let mut runtime = Runtime::new();
//! let (promise, outcome) = completion();
//! let task = runtime.spawn(promise, Hello(0)).unwrap();
//! assert!(!runtime.is_done(task));
//!
//! let hello = runtime.registry().lookup("hello").unwrap();
//! assert_eq!(hello, task);
//! runtime.resume(hello).unwrap();
//! assert!(runtime.is_done(hello));
//! match outcome.try_take() {
//!     Some(Finished::Value(greeting)) => assert_eq!(greeting, "hello coroutine"),
//!     other => panic!("unexpected verdict {:?}", other),
//! }
//! ```

pub mod awaitable;
mod error;
pub mod promise;
pub mod registry;
pub mod runtime;
pub mod task;

pub use awaitable::{AlwaysSuspend, Awaitable, NeverSuspend, SuspendDecision, Transfer};
pub use error::{BodyError, ContractError, PanicPayload};
pub use promise::{completion, lazy_completion, Completion, Finished, Outcome, Promise};
pub use registry::Registry;
pub use runtime::Runtime;
pub use task::{Context, Coroutine, Step, TaskHandle, TaskState};
