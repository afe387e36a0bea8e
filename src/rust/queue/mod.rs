// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod balancer;
mod fifo;
mod flow;
mod group;
mod policy;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    balancer::LoadBalancer,
    fifo::FifoQueue,
    flow::FlowQueue,
    group::FlowQueueGroup,
    policy::DequeuePolicy,
};

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::request::Request;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Queue a host hands requests to.
pub enum RequestQueue {
    Fifo(FifoQueue),
    PerFlow(FlowQueueGroup),
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl RequestQueue {
    /// Admits `request`. Only per-flow queues with admission control ever hand the request back.
    pub fn enqueue(&mut self, request: Request) -> Result<(), Request> {
        match self {
            RequestQueue::Fifo(queue) => {
                queue.enqueue(request);
                Ok(())
            },
            RequestQueue::PerFlow(group) => group.enqueue(request),
        }
    }

    /// Puts back a preempted request, at the head of its queue if `front` is set.
    pub fn requeue(&mut self, request: Request, front: bool) {
        match self {
            RequestQueue::Fifo(queue) if front => queue.enqueue_front(request),
            RequestQueue::Fifo(queue) => queue.enqueue(request),
            RequestQueue::PerFlow(group) => group.requeue(request, front),
        }
    }

    pub fn dequeue(&mut self, now: f64) -> Option<Request> {
        match self {
            RequestQueue::Fifo(queue) => queue.dequeue(),
            RequestQueue::PerFlow(group) => group.dequeue(now),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestQueue::Fifo(queue) => queue.is_empty(),
            RequestQueue::PerFlow(group) => group.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RequestQueue::Fifo(queue) => queue.len(),
            RequestQueue::PerFlow(group) => group.len(),
        }
    }
}
