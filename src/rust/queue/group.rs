// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    queue::{
        flow::FlowQueue,
        policy::DequeuePolicy,
    },
    request::{
        FlowId,
        Request,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// One queue per flow. A [DequeuePolicy] decides which flow is serviced next.
pub struct FlowQueueGroup {
    queues: Vec<FlowQueue>,
    policy: DequeuePolicy,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl FlowQueueGroup {
    /// Builds a group whose queue `i` holds the requests of flow `i`.
    pub fn new(queues: Vec<FlowQueue>, policy: DequeuePolicy) -> Self {
        Self { queues, policy }
    }

    /// Admits `request` into the queue of its flow. The request is handed back if that queue rejects it or if its flow
    /// is not part of this group.
    pub fn enqueue(&mut self, request: Request) -> Result<(), Request> {
        let FlowId(flow) = request.flow_id();
        match self.queues.get_mut(flow) {
            Some(queue) => queue.enqueue(request),
            None => {
                warn!("enqueue(): no queue for this flow (flow={:?})", request.flow_id());
                Err(request)
            },
        }
    }

    /// Puts back an already admitted request.
    pub fn requeue(&mut self, request: Request, front: bool) {
        let FlowId(flow) = request.flow_id();
        match self.queues.get_mut(flow) {
            Some(queue) => queue.requeue(request, front),
            None => warn!("requeue(): dropping request of unknown flow (flow={:?})", request.flow_id()),
        }
    }

    /// Empty iff every member queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Removes the next request from the flow the policy selects. Returns [None] if there is no work.
    pub fn dequeue(&mut self, now: f64) -> Option<Request> {
        if self.is_empty() {
            return None;
        }
        let flow: usize = self.policy.select_queue(&self.queues, now)?;
        self.queues[flow].dequeue()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
