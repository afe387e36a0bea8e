// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Dequeue policies.
//!
//! A policy picks the flow whose queue is serviced next. Max-selecting policies scan flows in ascending index order,
//! skip empty queues and only switch to a later flow on a strictly greater metric, so the lowest flow index wins ties.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    queue::flow::FlowQueue,
    runtime::fail::Fail,
};
use ::std::{
    fmt,
    str::FromStr,
};

//======================================================================================================================
// Structures
//======================================================================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum DequeuePolicy {
    /// Largest backlog.
    LongestLength,
    /// Largest backlog relative to the SLO.
    LongestLoad,
    /// Head request closest to breaching its SLO, counting its remaining service.
    FirstPacketLatency,
    /// Head request that waited longest relative to its SLO.
    FirstPacketWait,
    /// Cycles through the non-empty flows. `next` is the flow the scan starts from.
    RoundRobin { next: usize },
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl DequeuePolicy {
    pub fn round_robin() -> Self {
        DequeuePolicy::RoundRobin { next: 0 }
    }

    /// Picks the flow to service next. Returns [None] only if every queue is empty.
    pub fn select_queue(&mut self, queues: &[FlowQueue], now: f64) -> Option<usize> {
        let selected: Option<usize> = match self {
            DequeuePolicy::LongestLength => select_max(queues, |q| q.get_expected_length()),
            DequeuePolicy::LongestLoad => select_max(queues, |q| q.get_load()),
            DequeuePolicy::FirstPacketLatency => select_max(queues, |q| q.get_first_packet_latency(now)),
            DequeuePolicy::FirstPacketWait => select_max(queues, |q| q.get_first_packet_wait(now)),
            DequeuePolicy::RoundRobin { next } => {
                let num_queues: usize = queues.len();
                let chosen: Option<usize> = (0..num_queues)
                    .map(|offset| (*next + offset) % num_queues)
                    .find(|i| !queues[*i].is_empty());
                if let Some(chosen) = chosen {
                    *next = (chosen + 1) % num_queues;
                }
                chosen
            },
        };
        trace!("select_queue(): policy={}, flow={:?}", self, selected);
        selected
    }
}

fn select_max<F>(queues: &[FlowQueue], metric: F) -> Option<usize>
where
    F: Fn(&FlowQueue) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, queue) in queues.iter().enumerate() {
        if queue.is_empty() {
            continue;
        }
        let value: f64 = metric(queue);
        match best {
            Some((_, max)) if value <= max => (),
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl FromStr for DequeuePolicy {
    type Err = Fail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "longest-length" => Ok(DequeuePolicy::LongestLength),
            "longest-load" => Ok(DequeuePolicy::LongestLoad),
            "first-packet-latency" => Ok(DequeuePolicy::FirstPacketLatency),
            "first-packet-wait" => Ok(DequeuePolicy::FirstPacketWait),
            "round-robin" => Ok(DequeuePolicy::round_robin()),
            _ => {
                let cause: String = format!("unsupported queue policy (policy={:?})", s);
                error!("from_str(): {}", cause);
                Err(Fail::new(libc::ENOTSUP, &cause))
            },
        }
    }
}

impl fmt::Display for DequeuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = match self {
            DequeuePolicy::LongestLength => "longest-length",
            DequeuePolicy::LongestLoad => "longest-load",
            DequeuePolicy::FirstPacketLatency => "first-packet-latency",
            DequeuePolicy::FirstPacketWait => "first-packet-wait",
            DequeuePolicy::RoundRobin { .. } => "round-robin",
        };
        write!(f, "{}", name)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::DequeuePolicy;
    use crate::{
        queue::flow::FlowQueue,
        request::{
            FlowId,
            Request,
        },
    };
    use ::anyhow::Result;

    /// Builds one queue per entry, holding requests with the given service times, all started at time zero.
    fn queues(backlogs: &[&[f64]], slos: &[Option<f64>]) -> Vec<FlowQueue> {
        backlogs
            .iter()
            .zip(slos)
            .enumerate()
            .map(|(flow, (requests, slo))| {
                let mut queue: FlowQueue = FlowQueue::new(*slo, 1.0);
                for (idx, exec_time) in requests.iter().enumerate() {
                    queue.requeue(Request::new(idx as u64, FlowId(flow), *exec_time, 0.0), false);
                }
                queue
            })
            .collect()
    }

    #[test]
    fn longest_length_skips_empty_flows_and_breaks_ties_low() -> Result<()> {
        let queues: Vec<FlowQueue> = queues(&[&[], &[2.0], &[1.0, 1.0], &[3.0]], &[None; 4]);
        let mut policy: DequeuePolicy = DequeuePolicy::LongestLength;
        crate::ensure_eq!(policy.select_queue(&queues, 0.0), Some(3));

        let queues: Vec<FlowQueue> = queues_with_tie();
        crate::ensure_eq!(policy.select_queue(&queues, 0.0), Some(1));

        let empty: Vec<FlowQueue> = self::queues(&[&[], &[]], &[None; 2]);
        crate::ensure_eq!(policy.select_queue(&empty, 0.0), None);
        Ok(())
    }

    fn queues_with_tie() -> Vec<FlowQueue> {
        queues(&[&[], &[2.0], &[2.0]], &[None; 3])
    }

    #[test]
    fn longest_load_normalizes_by_slo() -> Result<()> {
        let queues: Vec<FlowQueue> = queues(&[&[4.0], &[1.0]], &[Some(10.0), Some(1.0)]);
        let mut policy: DequeuePolicy = DequeuePolicy::LongestLoad;
        crate::ensure_eq!(policy.select_queue(&queues, 0.0), Some(1));

        // Flows without an SLO weigh zero but are still served when nothing else is queued.
        let queues: Vec<FlowQueue> = self::queues(&[&[4.0], &[]], &[None, Some(1.0)]);
        crate::ensure_eq!(policy.select_queue(&queues, 0.0), Some(0));
        Ok(())
    }

    #[test]
    fn first_packet_policies_differ_on_remaining_service() -> Result<()> {
        // Both heads started at zero. Flow 0 has a long head request, flow 1 a slightly tighter SLO.
        let queues: Vec<FlowQueue> = queues(&[&[8.0], &[1.0]], &[Some(10.0), Some(9.0)]);
        let mut latency: DequeuePolicy = DequeuePolicy::FirstPacketLatency;
        let mut wait: DequeuePolicy = DequeuePolicy::FirstPacketWait;
        crate::ensure_eq!(latency.select_queue(&queues, 1.0), Some(0));
        crate::ensure_eq!(wait.select_queue(&queues, 1.0), Some(1));
        Ok(())
    }

    #[test]
    fn equal_slo_metrics_go_to_the_lowest_flow() -> Result<()> {
        // Flows 1 and 2 are identical, so every metric ties between them.
        let queues: Vec<FlowQueue> = queues(&[&[], &[2.0], &[2.0]], &[None, Some(4.0), Some(4.0)]);
        for mut policy in [DequeuePolicy::LongestLoad, DequeuePolicy::FirstPacketWait] {
            crate::ensure_eq!(policy.select_queue(&queues, 1.0), Some(1));
        }
        Ok(())
    }

    #[test]
    fn round_robin_visits_every_non_empty_flow_before_repeating() -> Result<()> {
        let queues: Vec<FlowQueue> = queues(&[&[1.0], &[], &[1.0], &[1.0], &[]], &[None; 5]);
        for start in 0..5 {
            let mut policy: DequeuePolicy = DequeuePolicy::RoundRobin { next: start };
            let mut visited: Vec<usize> = (0..3).filter_map(|_| policy.select_queue(&queues, 0.0)).collect();
            let repeat: Option<usize> = policy.select_queue(&queues, 0.0);
            crate::ensure_eq!(repeat, visited.first().copied());
            visited.sort();
            crate::ensure_eq!(visited, vec![0, 2, 3]);
        }
        Ok(())
    }

    #[test]
    fn parses_policy_names() -> Result<()> {
        crate::ensure_eq!("longest-load".parse::<DequeuePolicy>()?, DequeuePolicy::LongestLoad);
        crate::ensure_eq!("round-robin".parse::<DequeuePolicy>()?, DequeuePolicy::round_robin());
        crate::ensure_eq!(
            "shortest-job".parse::<DequeuePolicy>().map_err(|e| e.errno),
            Err(libc::ENOTSUP)
        );
        Ok(())
    }
}
