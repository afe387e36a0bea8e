// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    request::Request,
    runtime::fail::Fail,
};

//======================================================================================================================
// Structures
//======================================================================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreState {
    Idle,
    Active,
}

/// A simulated core. It drains one queue and belongs to one pool of its host.
pub struct Core {
    id: usize,
    state: CoreState,
    /// Queue this core drains.
    queue: usize,
    /// Pool this core returns to when it goes idle.
    pool: usize,
    /// Request handed over by a dispatcher.
    assignment: Option<Request>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Core {
    pub fn new(id: usize, queue: usize, pool: usize) -> Self {
        Self {
            id,
            state: CoreState::Idle,
            queue,
            pool,
            assignment: None,
        }
    }

    /// Moves this core to the active state. Returns false if it already was active, in which case nothing changes.
    pub fn become_active(&mut self) -> bool {
        match self.state {
            CoreState::Active => false,
            CoreState::Idle => {
                self.state = CoreState::Active;
                true
            },
        }
    }

    pub fn become_idle(&mut self) {
        self.state = CoreState::Idle;
    }

    /// Hands `request` to this core. A core runs one request at a time.
    pub fn assign(&mut self, request: Request) -> Result<(), Fail> {
        if let Some(current) = &self.assignment {
            let cause: String = format!(
                "core already runs a request (core={:?}, current={:?}, new={:?})",
                self.id,
                current.idx(),
                request.idx()
            );
            error!("assign(): {}", cause);
            return Err(Fail::new(libc::EBUSY, &cause));
        }
        self.assignment = Some(request);
        Ok(())
    }

    /// Takes back the request this core was running.
    pub fn detach(&mut self) -> Option<Request> {
        self.assignment.take()
    }

    pub fn state(&self) -> CoreState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == CoreState::Active
    }

    pub fn queue(&self) -> usize {
        self.queue
    }

    pub fn pool(&self) -> usize {
        self.pool
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
