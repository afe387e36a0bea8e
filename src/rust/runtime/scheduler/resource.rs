// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::yielder::{
        Yielder,
        YielderHandle,
    },
    SharedObject,
};
use ::std::{
    collections::VecDeque,
    ops::{
        Deref,
        DerefMut,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Exclusive resource with a capacity of one accessor. Waiters are granted the resource in FIFO order.
pub struct Resource {
    locked: bool,
    waiters: VecDeque<YielderHandle>,
}

#[derive(Clone)]
pub struct SharedResource(SharedObject<Resource>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedResource {
    pub fn new() -> Self {
        Self(SharedObject::new(Resource {
            locked: false,
            waiters: VecDeque::new(),
        }))
    }

    /// Acquire this resource. Grants immediately if it is free, otherwise suspends the calling process until the
    /// holder hands the resource over.
    pub async fn acquire(mut self, yielder: &Yielder) -> Result<(), Fail> {
        if self.try_acquire() {
            return Ok(());
        }
        self.waiters.push_back(yielder.get_handle());
        yielder.yield_until_wake().await
    }

    /// Try to acquire this resource without waiting. Return [true] if successful.
    pub fn try_acquire(&mut self) -> bool {
        match self.locked {
            true => false,
            false => {
                self.locked = true;
                true
            },
        }
    }

    /// Release this resource. If somebody is waiting, ownership passes directly to the oldest waiter, which resumes
    /// at the current virtual time.
    pub fn release(&mut self) -> Result<(), Fail> {
        if !self.locked {
            let cause: &str = "resource was not held";
            error!("release(): {}", cause);
            return Err(Fail::new(libc::EPERM, cause));
        }
        match self.waiters.pop_front() {
            Some(mut next) => next.wake_with(Ok(())),
            None => self.locked = false,
        }
        Ok(())
    }

    pub fn is_held(&self) -> bool {
        self.locked
    }

    pub fn num_waiters(&self) -> usize {
        self.waiters.len()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for SharedResource {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for SharedResource {
    type Target = Resource;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SharedResource {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

//======================================================================================================================
// Tests
//======================================================================================================================
