// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod resource;
mod scheduler;
mod task;
mod yielder;

//==============================================================================
// Exports
//==============================================================================

pub use self::{
    resource::SharedResource,
    scheduler::{
        RunnableTask,
        Scheduler,
    },
    task::{
        Coroutine,
        TaskId,
    },
    yielder::{
        Yielder,
        YielderHandle,
    },
};
