// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub mod generator;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::fmt;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Resolution at which queued work is accounted, in ticks per unit of virtual time.
pub const TICKS_PER_UNIT: f64 = 1_000_000.0;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Index of a flow in the workload configuration.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct FlowId(pub usize);

/// Unit of work. Remaining execution time only ever decreases.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    idx: u64,
    flow_id: FlowId,
    exec_time: f64,
    start_time: f64,
    expected_length: f64,
    network_time: Option<f64>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Request {
    pub fn new(idx: u64, flow_id: FlowId, exec_time: f64, start_time: f64) -> Self {
        let exec_time: f64 = exec_time.max(0.0);
        Self {
            idx,
            flow_id,
            exec_time,
            start_time,
            expected_length: exec_time,
            network_time: None,
        }
    }

    /// Attaches a network phase that runs before the compute phase on hosts that model one.
    pub fn with_network_time(mut self, network_time: f64) -> Self {
        self.network_time = Some(network_time.max(0.0));
        self
    }

    pub fn idx(&self) -> u64 {
        self.idx
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    pub fn exec_time(&self) -> f64 {
        self.exec_time
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn expected_length(&self) -> f64 {
        self.expected_length
    }

    /// Expected length in accounting ticks. Queues sum these so that backlog totals never drift.
    pub fn expected_ticks(&self) -> u64 {
        length_ticks(self.expected_length)
    }

    pub fn has_network_time(&self) -> bool {
        self.network_time.is_some()
    }

    /// Removes the pending network phase, if any.
    pub fn take_network_time(&mut self) -> Option<f64> {
        self.network_time.take()
    }

    /// Deducts `delta` units of service. Returns the amount actually deducted, which never exceeds what was left.
    pub fn consume(&mut self, delta: f64) -> f64 {
        let delta: f64 = delta.clamp(0.0, self.exec_time);
        self.exec_time -= delta;
        self.expected_length = (self.expected_length - delta).max(0.0);
        delta
    }

    pub fn is_done(&self) -> bool {
        self.exec_time <= 0.0
    }
}

/// Converts a length of virtual time into accounting ticks.
pub fn length_ticks(length: f64) -> u64 {
    (length.max(0.0) * TICKS_PER_UNIT).round() as u64
}

/// Converts accounting ticks back into virtual time.
pub fn ticks_length(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_UNIT
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<usize> for FlowId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl From<FlowId> for usize {
    fn from(value: FlowId) -> Self {
        value.0
    }
}

impl fmt::Debug for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow-{}", self.0)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::{
        length_ticks,
        FlowId,
        Request,
    };
    use ::anyhow::Result;

    #[test]
    fn consume_never_increases_remaining_work() -> Result<()> {
        let mut request: Request = Request::new(0, FlowId(0), 4.0, 1.0);
        crate::ensure_eq!(request.consume(1.5), 1.5);
        crate::ensure_eq!(request.exec_time(), 2.5);
        crate::ensure_eq!(request.expected_length(), 2.5);

        crate::ensure_eq!(request.consume(-3.0), 0.0);
        crate::ensure_eq!(request.exec_time(), 2.5);

        crate::ensure_eq!(request.consume(10.0), 2.5);
        crate::ensure_eq!(request.exec_time(), 0.0);
        crate::ensure_eq!(request.is_done(), true);
        Ok(())
    }

    #[test]
    fn network_phase_is_taken_once() -> Result<()> {
        let mut request: Request = Request::new(3, FlowId(1), 1.0, 0.0).with_network_time(0.25);
        crate::ensure_eq!(request.has_network_time(), true);
        crate::ensure_eq!(request.take_network_time(), Some(0.25));
        crate::ensure_eq!(request.take_network_time(), None);
        crate::ensure_eq!(request.exec_time(), 1.0);
        Ok(())
    }

    #[test]
    fn ticks_are_exact_for_representable_lengths() -> Result<()> {
        crate::ensure_eq!(length_ticks(0.1) + length_ticks(0.2), length_ticks(0.3));
        crate::ensure_eq!(length_ticks(-1.0), 0);
        Ok(())
    }
}
