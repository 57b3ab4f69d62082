//! Named hand-off points for task handles.
//!
//! A task records its own handle under a name so peers can later resume it or
//! transfer control to it, instead of smuggling handles through process-wide
//! globals. Entries are plain tokens: the registry does not track liveness,
//! a looked-up handle may refer to a task that has since completed or been
//! destroyed and is validated only when used against the runtime.

use std::borrow::Cow;

use hashbrown::HashMap;

use crate::task::TaskHandle;

#[derive(Default, Debug)]
pub struct Registry {
    handles: HashMap<Cow<'static, str>, TaskHandle>,
}

impl Registry {
    pub(crate) fn new() -> Registry {
        Registry::default()
    }

    /// Records `handle` under `name`, returning the displaced handle if any.
    pub fn register(&mut self, name: impl Into<Cow<'static, str>>, handle: TaskHandle) -> Option<TaskHandle> {
        self.handles.insert(name.into(), handle)
    }

    /// Looks up the handle recorded under `name`.
    pub fn lookup(&self, name: &str) -> Option<TaskHandle> {
        self.handles.get(name).copied()
    }

    /// Removes and returns the handle recorded under `name`.
    pub fn unregister(&mut self, name: &str) -> Option<TaskHandle> {
        self.handles.remove(name)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
