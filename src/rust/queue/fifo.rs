// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::request::Request;
use ::std::collections::VecDeque;

//======================================================================================================================
// Structures
//======================================================================================================================

/// First-in first-out request queue. Preempted requests may be put back at the head.
#[derive(Default)]
pub struct FifoQueue {
    queue: VecDeque<Request>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: Request) {
        self.queue.push_back(request);
    }

    /// Puts `request` ahead of everything that is queued.
    pub fn enqueue_front(&mut self, request: Request) {
        self.queue.push_front(request);
    }

    pub fn dequeue(&mut self) -> Option<Request> {
        self.queue.pop_front()
    }

    pub fn front(&self) -> Option<&Request> {
        self.queue.front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::FifoQueue;
    use crate::request::{
        FlowId,
        Request,
    };
    use ::anyhow::Result;

    fn request(idx: u64) -> Request {
        Request::new(idx, FlowId(0), 1.0, 0.0)
    }

    #[test]
    fn dequeues_in_enqueue_order() -> Result<()> {
        let mut queue: FifoQueue = FifoQueue::new();
        for idx in 0..5 {
            queue.enqueue(request(idx));
        }
        let order: Vec<u64> = ::std::iter::from_fn(|| queue.dequeue()).map(|r| r.idx()).collect();
        crate::ensure_eq!(order, vec![0, 1, 2, 3, 4]);
        crate::ensure_eq!(queue.dequeue().is_none(), true);
        Ok(())
    }

    #[test]
    fn front_requeue_overtakes_later_arrivals() -> Result<()> {
        let mut queue: FifoQueue = FifoQueue::new();
        queue.enqueue(request(0));
        queue.enqueue(request(1));
        let preempted: Request = queue.dequeue().map_or(request(99), |r| r);
        queue.enqueue(request(2));
        queue.enqueue_front(preempted);

        crate::ensure_eq!(queue.len(), 3);
        crate::ensure_eq!(queue.front().map(|r| r.idx()), Some(0));
        let order: Vec<u64> = ::std::iter::from_fn(|| queue.dequeue()).map(|r| r.idx()).collect();
        crate::ensure_eq!(order, vec![0, 1, 2]);
        Ok(())
    }
}
