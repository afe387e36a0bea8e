// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::{
    HostQueue,
    Layout,
    QueueRole,
    SharedHost,
};
use crate::{
    cpu::{
        Core,
        CoreGroup,
    },
    request::{
        FlowId,
        Request,
    },
    runtime::{
        fail::Fail,
        scheduler::Yielder,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Core that moves requests from the shared queue to the workers. It never runs requests itself.
pub const DISPATCHER_CORE: usize = 0;
/// Queue the dispatcher drains.
const SHARED_QUEUE: usize = 0;
/// Pool of worker cores.
const WORKER_POOL: usize = 0;
/// Pool holding only the dispatcher core.
const DISPATCHER_POOL: usize = 1;

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Core 0 dispatches, cores `1..num_cores` work.
pub(super) fn layout(num_cores: usize) -> Layout {
    let mut cores: Vec<Core> = vec![Core::new(DISPATCHER_CORE, SHARED_QUEUE, DISPATCHER_POOL)];
    cores.extend((1..num_cores).map(|id| Core::new(id, SHARED_QUEUE, WORKER_POOL)));
    Layout {
        queues: vec![HostQueue::fifo(QueueRole::Compute)],
        cores,
        pools: vec![CoreGroup::new(1..num_cores), CoreGroup::new([DISPATCHER_CORE])],
    }
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SharedHost {
    /// Starts the dispatch loop unless it already runs.
    pub(super) fn activate_dispatcher(&mut self) -> bool {
        if !self.cores[DISPATCHER_CORE].become_active() {
            return false;
        }
        self.pools[DISPATCHER_POOL].mark_active(DISPATCHER_CORE);
        trace!("activate_dispatcher(): now={:?}", self.runtime.now());
        let coroutine = self.clone().dispatch();
        self.runtime.insert_coroutine("dispatcher", coroutine);
        true
    }

    /// Hands queued requests to idle workers, one dequeue cost each, until the queue is empty or no worker is idle.
    async fn dispatch(mut self) -> Result<(), Fail> {
        let yielder: Yielder = Yielder::new();
        while !self.queues[SHARED_QUEUE].queue.is_empty() && self.pools[WORKER_POOL].has_idle() {
            let now: f64 = self.runtime.now();
            let request: Request = match self.queues[SHARED_QUEUE].queue.dequeue(now) {
                Some(request) => request,
                None => break,
            };
            if self.should_drop(&request, now) {
                debug!("dispatch(): dropping request={:?}, now={:?}", request.idx(), now);
                self.stats.record_drop(request.flow_id())?;
                continue;
            }
            if self.dequeue_cost > 0.0 {
                self.runtime.wait(self.dequeue_cost, &yielder).await?;
            }
            self.assign_to_worker(request)?;
        }
        self.cores[DISPATCHER_CORE].become_idle();
        self.pools[DISPATCHER_POOL].return_idle(DISPATCHER_CORE);
        Ok(())
    }

    /// Runs `request` on an idle worker for at most one time slice.
    fn assign_to_worker(&mut self, mut request: Request) -> Result<(), Fail> {
        let worker: usize = match self.pools[WORKER_POOL].take_idle() {
            Some(worker) => worker,
            None => {
                self.queues[SHARED_QUEUE].queue.requeue(request, true);
                return Ok(());
            },
        };
        let flow_id: FlowId = request.flow_id();
        let time_slice: f64 = self.flows[flow_id.0].time_slice;
        let run_time: f64 = match time_slice > 0.0 {
            true => time_slice.min(request.exec_time()),
            false => request.exec_time(),
        };
        let served: f64 = request.consume(run_time);
        self.stats.record_service(flow_id, served)?;
        trace!(
            "assign_to_worker(): request={:?}, worker={:?}, run_time={:?}",
            request.idx(),
            worker,
            run_time
        );
        self.cores[worker].assign(request)?;
        self.cores[worker].become_active();
        let coroutine = self.clone().run_worker(worker, run_time);
        self.runtime.insert_coroutine(&format!("worker-{}", worker), coroutine);
        Ok(())
    }

    async fn run_worker(mut self, worker: usize, run_time: f64) -> Result<(), Fail> {
        let yielder: Yielder = Yielder::new();
        self.runtime.wait(run_time, &yielder).await?;
        self.notified(worker)
    }

    /// Called when `worker` finishes its slice. Completes or requeues the request it ran and wakes the dispatcher.
    pub fn notified(&mut self, worker: usize) -> Result<(), Fail> {
        let request: Request = match self.cores.get_mut(worker).and_then(|core| core.detach()) {
            Some(request) => request,
            None => {
                let cause: String = format!("worker runs no request (worker={:?})", worker);
                error!("notified(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        self.cores[worker].become_idle();
        self.pools[WORKER_POOL].return_idle(worker);

        let flow_id: FlowId = request.flow_id();
        if request.is_done() {
            let latency: f64 = self.runtime.now() - request.start_time();
            debug!("notified(): request={:?}, latency={:?}", request.idx(), latency);
            self.stats.record_latency(flow_id, latency)?;
        } else {
            let enq_front: bool = self.flows[flow_id.0].enq_front;
            self.queues[SHARED_QUEUE].queue.requeue(request, enq_front);
        }
        self.activate_dispatcher();
        Ok(())
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
