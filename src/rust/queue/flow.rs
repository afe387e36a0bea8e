// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    queue::fifo::FifoQueue,
    request::{
        ticks_length,
        Request,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Queue of a single flow. Tracks the backlog of the flow as the sum of the expected length of its members.
pub struct FlowQueue {
    requests: FifoQueue,
    /// Backlog, in accounting ticks.
    expected_ticks: u64,
    slo: Option<f64>,
    /// Number of cores this flow is entitled to.
    fair_core_share: f64,
    /// Reject arrivals that would push the load above one.
    admission_control: bool,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl FlowQueue {
    pub fn new(slo: Option<f64>, fair_core_share: f64) -> Self {
        Self {
            requests: FifoQueue::new(),
            expected_ticks: 0,
            slo,
            fair_core_share,
            admission_control: false,
        }
    }

    /// Builds a queue that rejects arrivals it cannot serve within the SLO.
    pub fn new_drop_queue(slo: Option<f64>, fair_core_share: f64) -> Self {
        Self {
            admission_control: true,
            ..Self::new(slo, fair_core_share)
        }
    }

    /// Admits `request`. A queue with admission control hands the request back when accepting it would push the load
    /// above one, leaving the backlog exactly as it was.
    pub fn enqueue(&mut self, request: Request) -> Result<(), Request> {
        let previous: u64 = self.expected_ticks;
        self.expected_ticks += request.expected_ticks();
        if self.admission_control && self.get_load() > 1.0 {
            self.expected_ticks = previous;
            return Err(request);
        }
        self.requests.enqueue(request);
        Ok(())
    }

    /// Puts back an already admitted request, at the head or at the tail.
    pub fn requeue(&mut self, request: Request, front: bool) {
        self.expected_ticks += request.expected_ticks();
        match front {
            true => self.requests.enqueue_front(request),
            false => self.requests.enqueue(request),
        }
    }

    pub fn dequeue(&mut self) -> Option<Request> {
        let request: Request = self.requests.dequeue()?;
        self.expected_ticks -= request.expected_ticks();
        Some(request)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn get_expected_length(&self) -> f64 {
        ticks_length(self.expected_ticks)
    }

    pub fn get_expected_ticks(&self) -> u64 {
        self.expected_ticks
    }

    /// Backlog normalized by the SLO and by the cores the flow is entitled to.
    pub fn get_load(&self) -> f64 {
        match self.slo {
            Some(slo) if slo > 0.0 && self.fair_core_share > 0.0 => {
                self.get_expected_length() / (slo * self.fair_core_share)
            },
            _ => 0.0,
        }
    }

    /// Latency of the head request relative to the SLO, if it were serviced right now.
    pub fn get_first_packet_latency(&self, now: f64) -> f64 {
        match (self.requests.front(), self.slo) {
            (Some(head), Some(slo)) if slo > 0.0 => (now - head.start_time() + head.exec_time()) / slo,
            _ => 0.0,
        }
    }

    /// Time the head request has waited so far, relative to the SLO.
    pub fn get_first_packet_wait(&self, now: f64) -> f64 {
        match (self.requests.front(), self.slo) {
            (Some(head), Some(slo)) if slo > 0.0 => (now - head.start_time()) / slo,
            _ => 0.0,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
