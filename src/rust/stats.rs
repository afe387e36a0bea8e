// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    config::FlowConfig,
    request::FlowId,
    runtime::fail::Fail,
};
use ::histogram::Histogram;
use ::serde::Serialize;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Latencies are recorded in the histogram in units of 1/1000 of a unit of virtual time.
const LATENCY_SCALE: f64 = 1000.0;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Outcomes of one flow.
pub struct FlowStats {
    slo: Option<f64>,
    histogram: Histogram,
    /// Latencies in completion order.
    latencies: Vec<f64>,
    violations: u64,
    dropped: u64,
    /// Served and dropped requests.
    completed: u64,
    /// Service time handed out to this flow, slices of preempted requests included.
    service_time: f64,
}

/// Outcomes of every flow of a simulated world.
#[derive(Default)]
pub struct SimStats {
    flows: Vec<FlowStats>,
}

/// Per-flow summary of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowReport {
    /// 99th percentile latency.
    pub latency: f64,
    pub per_core_through: f64,
    pub slo_success: f64,
    pub dropped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f64>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl FlowStats {
    pub fn new(slo: Option<f64>) -> Result<Self, Fail> {
        let histogram: Histogram = match Histogram::new(7, 64) {
            Ok(histogram) => histogram,
            Err(e) => {
                let cause: String = format!("cannot build latency histogram (error={:?})", e);
                error!("new(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        Ok(Self {
            slo,
            histogram,
            latencies: Vec::new(),
            violations: 0,
            dropped: 0,
            completed: 0,
            service_time: 0.0,
        })
    }

    fn record_latency(&mut self, latency: f64) -> Result<(), Fail> {
        let value: u64 = (latency.max(0.0) * LATENCY_SCALE).round() as u64;
        if let Err(e) = self.histogram.increment(value) {
            let cause: String = format!("cannot record latency (latency={:?}, error={:?})", latency, e);
            error!("record_latency(): {}", cause);
            return Err(Fail::new(libc::ERANGE, &cause));
        }
        self.latencies.push(latency);
        self.completed += 1;
        if matches!(self.slo, Some(slo) if latency > slo) {
            self.violations += 1;
        }
        Ok(())
    }

    fn record_drop(&mut self) {
        self.dropped += 1;
        self.violations += 1;
        self.completed += 1;
    }

    /// 99th percentile of the recorded latencies, zero if nothing was recorded.
    pub fn p99(&self) -> Result<f64, Fail> {
        if self.latencies.is_empty() {
            return Ok(0.0);
        }
        match self.histogram.percentile(99.0) {
            Ok(bucket) => Ok(bucket.end() as f64 / LATENCY_SCALE),
            Err(e) => {
                let cause: String = format!("cannot read latency percentile (error={:?})", e);
                error!("p99(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }

    /// Fraction of the completed requests that met the SLO.
    pub fn slo_success(&self) -> f64 {
        match self.completed {
            0 => 1.0,
            completed => 1.0 - self.violations as f64 / completed as f64,
        }
    }

    pub fn latencies(&self) -> &[f64] {
        &self.latencies
    }

    pub fn violations(&self) -> u64 {
        self.violations
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn service_time(&self) -> f64 {
        self.service_time
    }

    pub fn report(&self, cores: usize, print_values: bool) -> Result<FlowReport, Fail> {
        Ok(FlowReport {
            latency: self.p99()?,
            per_core_through: (self.completed - self.dropped) as f64 / cores.max(1) as f64,
            slo_success: self.slo_success(),
            dropped: self.dropped,
            values: print_values.then(|| self.latencies.clone()),
        })
    }
}

impl SimStats {
    /// One entry per configured flow, created up front.
    pub fn new(flows: &[FlowConfig]) -> Result<Self, Fail> {
        let flows: Vec<FlowStats> = flows
            .iter()
            .map(|flow| FlowStats::new(flow.slo))
            .collect::<Result<Vec<FlowStats>, Fail>>()?;
        Ok(Self { flows })
    }

    /// Records the completion of a request of `flow` after `latency` units of virtual time.
    pub fn record_latency(&mut self, flow: FlowId, latency: f64) -> Result<(), Fail> {
        self.get_mut(flow)?.record_latency(latency)
    }

    /// Records a request of `flow` that was dropped. A drop also counts as an SLO violation.
    pub fn record_drop(&mut self, flow: FlowId) -> Result<(), Fail> {
        self.get_mut(flow)?.record_drop();
        Ok(())
    }

    /// Records `service` units of virtual time spent running requests of `flow`.
    pub fn record_service(&mut self, flow: FlowId, service: f64) -> Result<(), Fail> {
        self.get_mut(flow)?.service_time += service;
        Ok(())
    }

    pub fn flows(&self) -> &[FlowStats] {
        &self.flows
    }

    pub fn report(&self, cores: usize, print_values: bool) -> Result<Vec<FlowReport>, Fail> {
        self.flows.iter().map(|flow| flow.report(cores, print_values)).collect()
    }

    fn get_mut(&mut self, flow: FlowId) -> Result<&mut FlowStats, Fail> {
        match self.flows.get_mut(flow.0) {
            Some(stats) => Ok(stats),
            None => {
                let cause: String = format!("no such flow (flow={:?})", flow);
                error!("get_mut(): {}", cause);
                Err(Fail::new(libc::ENOENT, &cause))
            },
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::{
        FlowReport,
        SimStats,
    };
    use crate::{
        config::FlowConfig,
        request::FlowId,
    };
    use ::anyhow::Result;

    #[test]
    fn counts_violations_and_drops() -> Result<()> {
        let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.5).with_slo(2.0), FlowConfig::fixed(1.0, 0.5)];
        let mut stats: SimStats = SimStats::new(&flows)?;

        stats.record_latency(FlowId(0), 1.0)?;
        stats.record_latency(FlowId(0), 3.0)?;
        stats.record_drop(FlowId(0))?;
        stats.record_latency(FlowId(0), 2.0)?;
        stats.record_latency(FlowId(1), 50.0)?;

        let reports: Vec<FlowReport> = stats.report(2, false)?;
        crate::ensure_eq!(reports[0].dropped, 1);
        crate::ensure_eq!(reports[0].slo_success, 0.5);
        crate::ensure_eq!(reports[0].per_core_through, 1.5);
        crate::ensure_eq!(reports[1].slo_success, 1.0);
        crate::ensure_eq!(stats.record_drop(FlowId(2)).map_err(|e| e.errno), Err(libc::ENOENT));
        Ok(())
    }

    #[test]
    fn p99_tracks_the_tail() -> Result<()> {
        let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.5)];
        let mut stats: SimStats = SimStats::new(&flows)?;
        crate::ensure_eq!(stats.report(1, false)?[0].latency, 0.0);
        crate::ensure_eq!(stats.report(1, false)?[0].slo_success, 1.0);

        for _ in 0..995 {
            stats.record_latency(FlowId(0), 1.0)?;
        }
        for _ in 0..5 {
            stats.record_latency(FlowId(0), 100.0)?;
        }
        let report: FlowReport = stats.report(1, true)?.remove(0);
        crate::ensure_eq!(report.latency >= 0.99 && report.latency <= 1.01, true);
        crate::ensure_eq!(report.values.map(|v| v.len()), Some(1000));

        for _ in 0..45 {
            stats.record_latency(FlowId(0), 100.0)?;
        }
        let report: FlowReport = stats.report(1, false)?.remove(0);
        crate::ensure_eq!(report.latency >= 99.0 && report.latency <= 101.0, true);
        crate::ensure_eq!(report.values, None);
        Ok(())
    }
}
