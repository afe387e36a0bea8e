// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::fail::Fail;
use ::crossbeam_channel::Sender;
use ::std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{
        Wake,
        Waker,
    },
};

//==============================================================================
// Structures
//==============================================================================

/// Externally visible task identifier.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// Body of a simulated process. A process that fails aborts the simulation run.
pub type Coroutine = Pin<Box<dyn Future<Output = Result<(), Fail>>>>;

/// Task runs a single coroutine to completion. The coroutine is moved out of the task while it is being polled, so
/// the process body may spawn new tasks without invalidating the one currently running.
pub struct Task {
    /// Task name, used for logging.
    name: String,
    /// Task identifier.
    id: TaskId,
    /// Underlying coroutine to run. None while it is being polled.
    coroutine: Option<Coroutine>,
}

/// Wakes a task by pushing its identifier into the scheduler's ready queue, preserving wake order.
struct TaskWaker {
    task_id: TaskId,
    ready: Sender<TaskId>,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl Task {
    pub fn new(name: String, id: TaskId, coroutine: Coroutine) -> Self {
        Self {
            name,
            id,
            coroutine: Some(coroutine),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_id(&self) -> TaskId {
        self.id
    }

    pub fn take_coroutine(&mut self) -> Option<Coroutine> {
        self.coroutine.take()
    }

    pub fn restore_coroutine(&mut self, coroutine: Coroutine) {
        debug_assert!(self.coroutine.is_none());
        self.coroutine = Some(coroutine);
    }
}

/// Builds a waker that schedules `task_id` through `ready`.
pub fn new_waker(task_id: TaskId, ready: Sender<TaskId>) -> Waker {
    Waker::from(Arc::new(TaskWaker { task_id, ready }))
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<TaskId> for u64 {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        // The receiver lives as long as the scheduler. A send after teardown has nobody left to wake.
        if self.ready.send(self.task_id).is_err() {
            trace!("wake_by_ref(): scheduler is gone (task_id={:?})", self.task_id);
        }
    }
}
