// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Workload generation.
//!
//! Every flow of a simulated world gets its own [RequestGenerator] process. All of them draw from one [WorkloadSource]
//! owned by that world, which holds the seeded random number generator and hands out request indices that increase
//! across flows.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    config::FlowConfig,
    host::SharedHost,
    request::{
        FlowId,
        Request,
    },
    runtime::{
        fail::Fail,
        scheduler::Yielder,
        SharedObject,
        SharedSimRuntime,
    },
};
use ::rand::{
    rngs::SmallRng,
    Rng,
    SeedableRng,
};
use ::std::f64::consts::PI;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Smallest service time a normal sampler may return.
const MIN_SAMPLE: f64 = 1e-3;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Service time distribution of a flow.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkGenerator {
    Fixed { exec_time: f64 },
    /// `heavy_per` percent of the requests take `heavy_time`, the rest take `exec_time`.
    HeavyTail { exec_time: f64, heavy_time: f64, heavy_per: f64 },
    Exponential { mean: f64 },
    Normal { mean: f64, std_dev: f64 },
}

/// Network phase distribution of a flow.
#[derive(Clone, Debug, PartialEq)]
pub enum NetworkGenerator {
    Fixed(f64),
    Exponential(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrivalKind {
    Fixed,
    Poisson,
}

/// Interarrival time distribution of a flow.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrivalGenerator {
    Fixed { interval: f64 },
    Poisson { mean: f64 },
}

/// Randomness and request numbering of one simulated world.
pub struct WorkloadSource {
    rng: SmallRng,
    next_idx: u64,
}

/// Process that emits the requests of one flow.
pub struct RequestGenerator {
    flow_id: FlowId,
    work: WorkGenerator,
    network: Option<NetworkGenerator>,
    arrival: ArrivalGenerator,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl WorkGenerator {
    pub fn next(&self, rng: &mut SmallRng) -> f64 {
        match *self {
            WorkGenerator::Fixed { exec_time } => exec_time,
            WorkGenerator::HeavyTail {
                exec_time,
                heavy_time,
                heavy_per,
            } => {
                if rng.gen::<f64>() * 100.0 < heavy_per {
                    heavy_time
                } else {
                    exec_time
                }
            },
            WorkGenerator::Exponential { mean } => sample_exponential(rng, mean),
            WorkGenerator::Normal { mean, std_dev } => sample_normal(rng, mean, std_dev),
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            WorkGenerator::Fixed { exec_time } => exec_time,
            WorkGenerator::HeavyTail {
                exec_time,
                heavy_time,
                heavy_per,
            } => heavy_time * (heavy_per / 100.0) + exec_time * ((100.0 - heavy_per) / 100.0),
            WorkGenerator::Exponential { mean } => mean,
            WorkGenerator::Normal { mean, .. } => mean,
        }
    }
}

impl NetworkGenerator {
    pub fn next(&self, rng: &mut SmallRng) -> f64 {
        match *self {
            NetworkGenerator::Fixed(time) => time,
            NetworkGenerator::Exponential(mean) => sample_exponential(rng, mean),
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            NetworkGenerator::Fixed(time) => time,
            NetworkGenerator::Exponential(mean) => mean,
        }
    }
}

impl ArrivalKind {
    /// Builds the generator of this kind with the given mean interarrival time.
    pub fn with_mean(self, mean: f64) -> ArrivalGenerator {
        match self {
            ArrivalKind::Fixed => ArrivalGenerator::Fixed { interval: mean },
            ArrivalKind::Poisson => ArrivalGenerator::Poisson { mean },
        }
    }
}

impl ArrivalGenerator {
    pub fn next(&self, rng: &mut SmallRng) -> f64 {
        match *self {
            ArrivalGenerator::Fixed { interval } => interval,
            ArrivalGenerator::Poisson { mean } => sample_exponential(rng, mean),
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            ArrivalGenerator::Fixed { interval } => interval,
            ArrivalGenerator::Poisson { mean } => mean,
        }
    }
}

impl WorkloadSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            next_idx: 0,
        }
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Hands out the next request index.
    pub fn next_idx(&mut self) -> u64 {
        let idx: u64 = self.next_idx;
        self.next_idx += 1;
        idx
    }
}

impl RequestGenerator {
    /// Builds the generator of flow `flow_id`. Unless the flow fixes its interarrival time, the mean interarrival time
    /// is derived from the flow's load spread over `cores_for_load` serving cores.
    pub fn new(flow_id: FlowId, flow: &FlowConfig, cores_for_load: usize) -> Result<Self, Fail> {
        let mean: f64 = match flow.inter_arrival {
            Some(inter_arrival) => inter_arrival,
            None => {
                let service: f64 = flow.work.mean() + flow.network.as_ref().map_or(0.0, |n| n.mean());
                service / (flow.load * cores_for_load as f64)
            },
        };
        if !(mean.is_finite() && mean > 0.0) {
            let cause: String = format!(
                "invalid mean interarrival time (flow={:?}, mean={:?})",
                flow_id, mean
            );
            error!("new(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        Ok(Self {
            flow_id,
            work: flow.work.clone(),
            network: flow.network.clone(),
            arrival: flow.arrival.with_mean(mean),
        })
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    pub fn arrival(&self) -> &ArrivalGenerator {
        &self.arrival
    }

    /// Waits one interarrival delay, then hands a fresh request to `host`, forever.
    pub async fn run(
        self,
        runtime: SharedSimRuntime,
        mut host: SharedHost,
        mut source: SharedObject<WorkloadSource>,
    ) -> Result<(), Fail> {
        let yielder: Yielder = Yielder::new();
        loop {
            let delay: f64 = self.arrival.next(source.rng());
            runtime.wait(delay, &yielder).await?;

            let exec_time: f64 = self.work.next(source.rng());
            let network_time: Option<f64> = self.network.as_ref().map(|n| n.next(source.rng()));
            let mut request: Request = Request::new(source.next_idx(), self.flow_id, exec_time, runtime.now());
            if let Some(network_time) = network_time {
                request = request.with_network_time(network_time);
            }
            host.receive_request(request)?;
        }
    }
}

/// Inverse transform sampling of an exponential distribution.
fn sample_exponential(rng: &mut SmallRng, mean: f64) -> f64 {
    // 1 - u lies in (0, 1], so the logarithm is finite.
    let u: f64 = 1.0 - rng.gen::<f64>();
    -mean * u.ln()
}

/// Box-Muller sampling of a normal distribution, floored at a small positive value.
fn sample_normal(rng: &mut SmallRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    let z: f64 = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
    (mean + std_dev * z).max(MIN_SAMPLE)
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::{
        ArrivalGenerator,
        ArrivalKind,
        RequestGenerator,
        WorkGenerator,
        WorkloadSource,
    };
    use crate::{
        config::FlowConfig,
        request::FlowId,
    };
    use ::anyhow::Result;

    #[test]
    fn heavy_tail_mean_weights_both_modes() -> Result<()> {
        let work: WorkGenerator = WorkGenerator::HeavyTail {
            exec_time: 1.0,
            heavy_time: 11.0,
            heavy_per: 10.0,
        };
        crate::ensure_eq!(work.mean(), 2.0);
        Ok(())
    }

    #[test]
    fn samplers_stay_positive_and_near_their_mean() -> Result<()> {
        let mut source: WorkloadSource = WorkloadSource::new(42);
        let exponential: WorkGenerator = WorkGenerator::Exponential { mean: 2.0 };
        let normal: WorkGenerator = WorkGenerator::Normal {
            mean: 1.0,
            std_dev: 2.0,
        };
        let samples: usize = 20_000;
        let mut sum: f64 = 0.0;
        for _ in 0..samples {
            let value: f64 = exponential.next(source.rng());
            crate::ensure_eq!(value >= 0.0, true);
            sum += value;
            crate::ensure_eq!(normal.next(source.rng()) > 0.0, true);
        }
        let mean: f64 = sum / samples as f64;
        crate::ensure_eq!((mean - 2.0).abs() < 0.1, true);
        Ok(())
    }

    #[test]
    fn interarrival_follows_load_and_cores() -> Result<()> {
        let flow: FlowConfig = FlowConfig::fixed(2.0, 0.5);
        let generator: RequestGenerator = RequestGenerator::new(FlowId(0), &flow, 4)?;
        crate::ensure_eq!(generator.arrival().clone(), ArrivalGenerator::Fixed { interval: 1.0 });

        let flow: FlowConfig = FlowConfig::fixed(2.0, 0.5).with_inter_arrival(3.0);
        let generator: RequestGenerator = RequestGenerator::new(FlowId(0), &flow, 4)?;
        crate::ensure_eq!(generator.arrival().mean(), 3.0);

        let flow: FlowConfig = FlowConfig::fixed(2.0, 0.5).with_arrival(ArrivalKind::Poisson);
        let generator: RequestGenerator = RequestGenerator::new(FlowId(0), &flow, 4)?;
        crate::ensure_eq!(generator.arrival().clone(), ArrivalGenerator::Poisson { mean: 1.0 });
        Ok(())
    }

    #[test]
    fn request_indices_increase_across_callers() -> Result<()> {
        let mut source: WorkloadSource = WorkloadSource::new(0);
        crate::ensure_eq!(source.next_idx(), 0);
        crate::ensure_eq!(source.next_idx(), 1);
        crate::ensure_eq!(source.next_idx(), 2);
        Ok(())
    }
}
