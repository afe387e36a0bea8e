// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod fail;
pub mod logging;
pub mod scheduler;
pub mod timer;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    scheduler::{
        Coroutine,
        RunnableTask,
        Scheduler,
        TaskId,
        Yielder,
    },
    timer::SharedTimer,
};
use ::std::{
    convert::{
        AsMut,
        AsRef,
    },
    future::Future,
    ops::{
        Deref,
        DerefMut,
    },
    rc::Rc,
    task::{
        Context,
        Poll,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Simulation Runtime. One instance is one isolated world: a virtual clock and the processes that run against it.
#[derive(Default)]
pub struct SimRuntime {
    /// Scheduler
    scheduler: Scheduler,
    /// Shared timer that orders every pending wake-up by virtual time.
    timer: SharedTimer,
}

#[derive(Clone)]
pub struct SharedSimRuntime(SharedObject<SimRuntime>);

/// The SharedObject wraps an object that will be shared across processes.
pub struct SharedObject<T>(Rc<T>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedSimRuntime {
    pub fn new() -> Self {
        Self(SharedObject::<SimRuntime>::new(SimRuntime::default()))
    }

    /// Inserts the process `coroutine` named `task_name` into the scheduler. It first runs at the current virtual time,
    /// after every process that was already runnable.
    pub fn insert_coroutine<F>(&mut self, task_name: &str, coroutine: F) -> TaskId
    where
        F: Future<Output = Result<(), Fail>> + 'static,
    {
        trace!("Inserting coroutine: {:?}", task_name);
        let coroutine: Coroutine = Box::pin(coroutine);
        self.scheduler.insert_task(task_name, coroutine)
    }

    /// Suspends the calling process for `timeout` units of virtual time.
    pub fn wait<'a>(&self, timeout: f64, yielder: &'a Yielder) -> impl Future<Output = Result<(), Fail>> + 'a {
        self.timer.clone().wait(timeout, yielder)
    }

    /// Pumps events until none is left with a wake time at or before `until`, then moves the clock to `until`. Processes
    /// still suspended stay suspended, so a later call resumes the same world.
    pub fn run(&mut self, until: f64) -> Result<(), Fail> {
        if until < self.timer.now() {
            let cause: String = format!(
                "cannot run backwards in time (now={:?}, until={:?})",
                self.timer.now(),
                until
            );
            error!("run(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        loop {
            self.poll()?;
            if !self.timer.fire_next(until) {
                break;
            }
        }
        self.timer.advance_clock(until)
    }

    /// Runs every process that is ready at the current virtual time until each one reaches its next suspension point.
    /// A process that fails aborts the run.
    pub fn poll(&mut self) -> Result<(), Fail> {
        while let Some(RunnableTask {
            task_id,
            mut coroutine,
            waker,
        }) = self.scheduler.next_runnable()
        {
            let mut ctx: Context = Context::from_waker(&waker);
            match Future::poll(coroutine.as_mut(), &mut ctx) {
                Poll::Pending => self.scheduler.restore_task(task_id, coroutine),
                Poll::Ready(Ok(())) => {
                    let name: Option<String> = self.scheduler.remove_task(task_id);
                    trace!("poll(): process finished (name={:?}, id={:?})", name, task_id);
                },
                Poll::Ready(Err(e)) => {
                    let name: Option<String> = self.scheduler.remove_task(task_id);
                    error!("poll(): process failed (name={:?}, id={:?}, error={:?})", name, task_id, e);
                    return Err(e);
                },
            }
        }
        Ok(())
    }

    /// Drops every process and pending wake-up. Processes hold clones of the runtime, so this breaks those cycles.
    pub fn shutdown(&mut self) {
        self.scheduler.clear();
        self.timer.clear();
    }

    /// Gets the current virtual time.
    pub fn now(&self) -> f64 {
        self.timer.now()
    }

    pub fn num_tasks(&self) -> usize {
        self.scheduler.num_tasks()
    }
}

impl<T> SharedObject<T> {
    pub fn new(object: T) -> Self {
        Self(Rc::new(object))
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for SharedSimRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for SharedSimRuntime {
    type Target = SimRuntime;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl DerefMut for SharedSimRuntime {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

/// Dereferences a shared object for use.
impl<T> Deref for SharedObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

/// Dereferences a mutable reference to a shared object for use. This breaks Rust's ownership model because it allows
/// more than one mutable dereference of a shared object at a time. Processes of one world hold mutable references to
/// the same host, queues and runtime; the kernel only ever runs one process at a time, so these references are never
/// used concurrently. Shared objects may change whenever the holding process suspends.
impl<T> DerefMut for SharedObject<T> {
    fn deref_mut<'a>(&'a mut self) -> &'a mut Self::Target {
        let ptr: *mut T = Rc::as_ptr(&self.0) as *mut T;
        unsafe { &mut *ptr }
    }
}

/// Returns a reference to the interior object.
impl<T> AsRef<T> for SharedObject<T> {
    fn as_ref(&self) -> &T {
        self.0.as_ref()
    }
}

/// Returns a mutable reference to the interior object. Same caveats as DerefMut.
impl<T> AsMut<T> for SharedObject<T> {
    fn as_mut<'a>(&'a mut self) -> &'a mut T {
        let ptr: *mut T = Rc::as_ptr(&self.0) as *mut T;
        unsafe { &mut *ptr }
    }
}

impl<T> Clone for SharedObject<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
