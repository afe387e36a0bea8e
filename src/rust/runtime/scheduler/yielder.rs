// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    SharedObject,
};
use ::std::{
    future::Future,
    pin::Pin,
    task::{
        Context,
        Poll,
        Waker,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Yield is a future that lets the currently running process suspend until somebody holding its [YielderHandle]
/// wakes it up, either a timer expiring or a resource being handed over.
struct Yield {
    /// Shared references to wake a yielded process and return either an Ok to indicate it may resume or an error to
    /// stop the process.
    yielder_handle: YielderHandle,
}

/// Yield Handle
///
/// This is used to uniquely identify a suspended process. Timers and resources keep it to resume the process later.
#[derive(Clone)]
pub struct YielderHandle {
    result_handle: SharedObject<Option<Result<(), Fail>>>,
    waker_handle: SharedObject<Option<Waker>>,
}

/// Yielder lets a single process suspend itself. The yield handle can be used to wake the process.
pub struct Yielder {
    yielder_handle: YielderHandle,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl YielderHandle {
    pub fn new() -> Self {
        Self {
            result_handle: SharedObject::new(None),
            waker_handle: SharedObject::new(None),
        }
    }

    /// Wake this suspended process: Ok indicates it may resume and Fail indicates it should exit with an error.
    pub fn wake_with(&mut self, result: Result<(), Fail>) {
        if let Some(old_result) = self.result_handle.replace(result) {
            debug!(
                "wake_with(): already scheduled, overwriting result (old={:?})",
                old_result
            );
        } else if let Some(waker) = self.waker_handle.take() {
            waker.wake();
        }
    }

    /// Get the result this process should be woken with.
    fn take_result(&mut self) -> Option<Result<(), Fail>> {
        self.result_handle.take()
    }

    fn set_waker(&mut self, waker: Waker) {
        *self.waker_handle = Some(waker);
    }
}

impl Yielder {
    /// Create a new Yielder object for a specific process to yield.
    pub fn new() -> Self {
        Self {
            yielder_handle: YielderHandle::new(),
        }
    }

    /// Return a handle to this Yielder for waking the suspended process.
    pub fn get_handle(&self) -> YielderHandle {
        self.yielder_handle.clone()
    }

    /// Suspends until woken through a handle.
    pub async fn yield_until_wake(&self) -> Result<(), Fail> {
        Yield {
            yielder_handle: self.yielder_handle.clone(),
        }
        .await
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for YielderHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Yielder {
    fn default() -> Self {
        Self::new()
    }
}

impl Future for Yield {
    type Output = Result<(), Fail>;

    /// Polls the underlying operation. Spurious polls leave the process suspended.
    fn poll(self: Pin<&mut Self>, context: &mut Context) -> Poll<Self::Output> {
        let self_: &mut Self = self.get_mut();

        // First check if we've been woken.
        if let Some(result) = self_.yielder_handle.take_result() {
            return Poll::Ready(result);
        }

        // Stash the waker.
        self_.yielder_handle.set_waker(context.waker().clone());
        Poll::Pending
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::Yielder;
    use ::anyhow::Result;
    use ::futures::task::noop_waker_ref;
    use ::std::{
        future::Future,
        pin::Pin,
        task::Context,
    };

    #[test]
    fn wake_before_first_poll_completes_immediately() -> Result<()> {
        let mut ctx = Context::from_waker(noop_waker_ref());
        let yielder: Yielder = Yielder::new();
        let mut handle = yielder.get_handle();
        handle.wake_with(Ok(()));

        let fut = yielder.yield_until_wake();
        futures::pin_mut!(fut);
        crate::ensure_eq!(Future::poll(Pin::new(&mut fut), &mut ctx).is_ready(), true);
        Ok(())
    }

    #[test]
    fn stays_pending_until_woken() -> Result<()> {
        let mut ctx = Context::from_waker(noop_waker_ref());
        let yielder: Yielder = Yielder::new();
        let mut handle = yielder.get_handle();

        let fut = yielder.yield_until_wake();
        futures::pin_mut!(fut);
        crate::ensure_eq!(Future::poll(Pin::new(&mut fut), &mut ctx).is_pending(), true);
        crate::ensure_eq!(Future::poll(Pin::new(&mut fut), &mut ctx).is_pending(), true);

        handle.wake_with(Ok(()));
        crate::ensure_eq!(Future::poll(Pin::new(&mut fut), &mut ctx).is_ready(), true);
        Ok(())
    }
}
