// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

/// Spreads arrivals over a fixed set of queues in round-robin order.
pub struct LoadBalancer {
    num_queues: usize,
    index: usize,
}

impl LoadBalancer {
    pub fn new(num_queues: usize) -> Self {
        Self {
            num_queues: num_queues.max(1),
            index: 0,
        }
    }

    /// Index of the queue the next arrival goes to.
    pub fn next_queue(&mut self) -> usize {
        let index: usize = self.index;
        self.index = (self.index + 1) % self.num_queues;
        index
    }
}
