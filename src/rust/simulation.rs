// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    config::{
        FlowConfig,
        SimConfig,
    },
    host::SharedHost,
    request::{
        generator::{
            RequestGenerator,
            WorkloadSource,
        },
        FlowId,
    },
    runtime::{
        fail::Fail,
        SharedObject,
        SharedSimRuntime,
    },
    stats::SimStats,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// One isolated simulated world: a runtime, a host, and one request generator per flow.
pub struct Simulation {
    config: SimConfig,
    runtime: SharedSimRuntime,
    host: SharedHost,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Simulation {
    pub fn new(config: SimConfig, flows: Vec<FlowConfig>) -> Result<Self, Fail> {
        config.validate(&flows)?;
        let generators: Vec<RequestGenerator> = flows
            .iter()
            .enumerate()
            .map(|(i, flow)| RequestGenerator::new(FlowId(i), flow, config.cores_for_load()))
            .collect::<Result<Vec<RequestGenerator>, Fail>>()?;

        let mut runtime: SharedSimRuntime = SharedSimRuntime::new();
        let host: SharedHost = SharedHost::new(runtime.clone(), &config, flows)?;
        let source: SharedObject<WorkloadSource> = SharedObject::new(WorkloadSource::new(config.seed));
        for generator in generators {
            let task_name: String = format!("generator-{:?}", generator.flow_id());
            let coroutine = generator.run(runtime.clone(), host.clone(), source.clone());
            runtime.insert_coroutine(&task_name, coroutine);
        }

        Ok(Self { config, runtime, host })
    }

    /// Advances the world to virtual time `until`. Later calls resume where this one stopped.
    pub fn run_until(&mut self, until: f64) -> Result<(), Fail> {
        self.runtime.run(until)
    }

    /// Runs the world to its horizon and hands over what was recorded.
    pub fn run(mut self) -> Result<SimStats, Fail> {
        info!(
            "run(): host={}, cores={:?}, horizon={:?}, seed={:?}",
            self.config.host_kind, self.config.cores, self.config.horizon, self.config.seed
        );
        let horizon: f64 = self.config.horizon;
        self.run_until(horizon)?;
        Ok(self.host.take_stats())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn host(&self) -> &SharedHost {
        &self.host
    }

    pub fn now(&self) -> f64 {
        self.runtime.now()
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// Processes hold clones of the runtime and the host. Dropping them here breaks those reference cycles.
impl Drop for Simulation {
    fn drop(&mut self) {
        self.runtime.shutdown();
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
