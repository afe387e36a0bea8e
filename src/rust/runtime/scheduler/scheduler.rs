// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Implementation of our single-threaded process scheduler.
//!
//! Processes live in a slab. Wakers push task identifiers into a FIFO ready queue, so processes that become runnable
//! at the same virtual time resume in the order they were woken.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::scheduler::task::{
    new_waker,
    Coroutine,
    Task,
    TaskId,
};
use ::crossbeam_channel::{
    Receiver,
    Sender,
};
use ::slab::Slab;
use ::std::{
    collections::HashMap,
    task::Waker,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Internal offset into the slab that holds the task state.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct InternalId(usize);

/// Task Scheduler
pub struct Scheduler {
    // Mapping between external task ids and internal ids (the offset into the slab where the task lives). External ids
    // are never reused, so a stale waker cannot resume a newer task that landed in the same slot.
    ids: HashMap<TaskId, InternalId>,
    tasks: Slab<Task>,
    next_task_id: u64,
    ready_tx: Sender<TaskId>,
    ready_rx: Receiver<TaskId>,
}

/// A runnable task handed out by the scheduler. It must be given back through [Scheduler::restore_task] or
/// [Scheduler::remove_task] once polled.
pub struct RunnableTask {
    pub task_id: TaskId,
    pub coroutine: Coroutine,
    pub waker: Waker,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Scheduler {
    /// Inserts a task into the scheduler and marks it runnable. Returns its identifier.
    pub fn insert_task(&mut self, task_name: &str, coroutine: Coroutine) -> TaskId {
        let task_id: TaskId = TaskId::from(self.next_task_id);
        self.next_task_id += 1;
        let internal_id: InternalId = InternalId(self.tasks.insert(Task::new(task_name.to_string(), task_id, coroutine)));
        let existing: Option<InternalId> = self.ids.insert(task_id, internal_id);
        debug_assert!(existing.is_none(), "task ids are never reused");
        trace!(
            "insert_task(): name={:?}, id={:?}, internal_id={:?}",
            task_name,
            task_id,
            internal_id
        );
        self.wake(task_id);
        task_id
    }

    /// Removes a task from the scheduler. Returns its name.
    pub fn remove_task(&mut self, task_id: TaskId) -> Option<String> {
        let internal_id: InternalId = self.ids.remove(&task_id)?;
        let task: Task = self.tasks.try_remove(internal_id.0)?;
        trace!("remove_task(): name={:?}, id={:?}", task.get_name(), task_id);
        Some(task.get_name().to_string())
    }

    /// Pops the next runnable task in wake order, skipping wake-ups for tasks that no longer exist. The coroutine is
    /// moved out of the slab while it runs.
    pub fn next_runnable(&mut self) -> Option<RunnableTask> {
        while let Ok(task_id) = self.ready_rx.try_recv() {
            let internal_id: InternalId = match self.ids.get(&task_id) {
                Some(internal_id) => *internal_id,
                None => continue,
            };
            let task: &mut Task = match self.tasks.get_mut(internal_id.0) {
                Some(task) => task,
                None => continue,
            };
            if let Some(coroutine) = task.take_coroutine() {
                return Some(RunnableTask {
                    task_id: task.get_id(),
                    coroutine,
                    waker: new_waker(task_id, self.ready_tx.clone()),
                });
            }
        }
        None
    }

    /// Gives back a coroutine that is still pending.
    pub fn restore_task(&mut self, task_id: TaskId, coroutine: Coroutine) {
        if let Some(internal_id) = self.ids.get(&task_id) {
            if let Some(task) = self.tasks.get_mut(internal_id.0) {
                task.restore_coroutine(coroutine);
                return;
            }
        }
        warn!("restore_task(): dropping coroutine of unknown task (id={:?})", task_id);
    }

    /// Marks a task runnable.
    pub fn wake(&self, task_id: TaskId) {
        new_waker(task_id, self.ready_tx.clone()).wake();
    }

    /// Drops every task. Suspended processes never resume.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.tasks.clear();
        while self.ready_rx.try_recv().is_ok() {}
    }

    /// Returns whether this task id points to a valid task.
    pub fn is_valid_task(&self, task_id: &TaskId) -> bool {
        self.ids.contains_key(task_id)
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Scheduler {
    fn default() -> Self {
        let (ready_tx, ready_rx): (Sender<TaskId>, Receiver<TaskId>) = ::crossbeam_channel::unbounded();
        Self {
            ids: HashMap::default(),
            tasks: Slab::default(),
            next_task_id: 1,
            ready_tx,
            ready_rx,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
