// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    host::HostKind,
    queue::DequeuePolicy,
    request::generator::{
        ArrivalKind,
        NetworkGenerator,
        WorkGenerator,
    },
    runtime::fail::Fail,
};
use ::std::{
    fs::File,
    io::Read,
    ops::Index,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Keys recognized in a flow record of the workload configuration.
mod flow_keys {
    pub const WORK_GEN: &str = "work_gen";
    pub const INTER_GEN: &str = "inter_gen";
    pub const LOAD: &str = "load";
    pub const EXEC_TIME: &str = "exec_time";
    pub const MEAN: &str = "mean";
    pub const HEAVY_PER: &str = "heavy_per";
    pub const HEAVY_TIME: &str = "heavy_time";
    pub const STD_DEV: &str = "std_dev";
    pub const TIME_SLICE: &str = "time_slice";
    pub const SLO: &str = "slo";
    pub const DROP: &str = "drop";
    pub const ENQ_FRONT: &str = "enq_front";
    pub const NETWORK_TIME: &str = "network_time";
    pub const NETWORK_MEAN: &str = "network_mean";
    pub const ADMISSION_CONTROL: &str = "admission_control";
    pub const INTER_ARRIVAL: &str = "inter_arrival";
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Resolved configuration of one flow.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowConfig {
    /// Service time distribution.
    pub work: WorkGenerator,
    /// Interarrival time distribution.
    pub arrival: ArrivalKind,
    /// Share of the serving cores this flow keeps busy on average.
    pub load: f64,
    /// Fixed mean interarrival time. Overrides the one derived from `load`.
    pub inter_arrival: Option<f64>,
    /// Maximum contiguous run. Zero disables preemption.
    pub time_slice: f64,
    /// Target maximum latency.
    pub slo: Option<f64>,
    /// Drop requests that cannot meet the SLO anymore instead of running them.
    pub drop: bool,
    /// Requeue preempted requests at the front of their queue.
    pub enq_front: bool,
    /// Network phase distribution.
    pub network: Option<NetworkGenerator>,
    /// Reject arrivals that push the flow's queue load above one.
    pub admission_control: bool,
}

/// Configuration of one simulation run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    pub cores: usize,
    /// Cores serving the network queue of a partitioned host.
    pub network_cores: usize,
    pub host_kind: HostKind,
    pub dequeue_cost: f64,
    pub preemption_cost: f64,
    pub queue_policy: DequeuePolicy,
    /// Virtual time at which the run stops.
    pub horizon: f64,
    pub seed: u64,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl FlowConfig {
    pub fn new(work: WorkGenerator, load: f64) -> Self {
        Self {
            work,
            arrival: ArrivalKind::Poisson,
            load,
            inter_arrival: None,
            time_slice: 0.0,
            slo: None,
            drop: false,
            enq_front: false,
            network: None,
            admission_control: false,
        }
    }

    /// Flow with a constant service time and evenly spaced arrivals.
    pub fn fixed(exec_time: f64, load: f64) -> Self {
        Self::new(WorkGenerator::Fixed { exec_time }, load).with_arrival(ArrivalKind::Fixed)
    }

    pub fn with_arrival(mut self, arrival: ArrivalKind) -> Self {
        self.arrival = arrival;
        self
    }

    pub fn with_inter_arrival(mut self, inter_arrival: f64) -> Self {
        self.inter_arrival = Some(inter_arrival);
        self
    }

    pub fn with_time_slice(mut self, time_slice: f64) -> Self {
        self.time_slice = time_slice;
        self
    }

    pub fn with_slo(mut self, slo: f64) -> Self {
        self.slo = Some(slo);
        self
    }

    pub fn with_drop(mut self, drop: bool) -> Self {
        self.drop = drop;
        self
    }

    pub fn with_enq_front(mut self, enq_front: bool) -> Self {
        self.enq_front = enq_front;
        self
    }

    pub fn with_network(mut self, network: NetworkGenerator) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_admission_control(mut self, admission_control: bool) -> Self {
        self.admission_control = admission_control;
        self
    }

    /// Reads one flow record.
    pub fn from_yaml(flow: usize, yaml: &Yaml) -> Result<Self, Fail> {
        if yaml.as_hash().is_none() {
            return Err(invalid(flow, "flow record is not a mapping"));
        }

        let work: WorkGenerator = match get_str_or(flow, yaml, flow_keys::WORK_GEN, "fixed")? {
            "fixed" => WorkGenerator::Fixed {
                exec_time: get_number(flow, yaml, flow_keys::EXEC_TIME)?,
            },
            "heavy_tail" => WorkGenerator::HeavyTail {
                exec_time: get_number(flow, yaml, flow_keys::EXEC_TIME)?,
                heavy_time: get_number(flow, yaml, flow_keys::HEAVY_TIME)?,
                heavy_per: get_number(flow, yaml, flow_keys::HEAVY_PER)?,
            },
            "exponential" | "exponential_request" => WorkGenerator::Exponential {
                mean: get_mean(flow, yaml)?,
            },
            "normal" | "normal_request" => WorkGenerator::Normal {
                mean: get_mean(flow, yaml)?,
                std_dev: get_number(flow, yaml, flow_keys::STD_DEV)?,
            },
            other => {
                let cause: String = format!("unsupported work generator (flow={:?}, work_gen={:?})", flow, other);
                error!("from_yaml(): {}", cause);
                return Err(Fail::new(libc::ENOTSUP, &cause));
            },
        };

        let arrival: ArrivalKind = match get_str_or(flow, yaml, flow_keys::INTER_GEN, "poisson_arrival")? {
            "fixed" => ArrivalKind::Fixed,
            "poisson_arrival" | "poisson" => ArrivalKind::Poisson,
            other => {
                let cause: String = format!("unsupported arrival generator (flow={:?}, inter_gen={:?})", flow, other);
                error!("from_yaml(): {}", cause);
                return Err(Fail::new(libc::ENOTSUP, &cause));
            },
        };

        let network: Option<NetworkGenerator> = match (
            get_optional_number(flow, yaml, flow_keys::NETWORK_TIME)?,
            get_optional_number(flow, yaml, flow_keys::NETWORK_MEAN)?,
        ) {
            (Some(time), _) => Some(NetworkGenerator::Fixed(time)),
            (None, Some(mean)) => Some(NetworkGenerator::Exponential(mean)),
            (None, None) => None,
        };

        let config: Self = Self {
            work,
            arrival,
            load: get_number(flow, yaml, flow_keys::LOAD)?,
            inter_arrival: get_optional_number(flow, yaml, flow_keys::INTER_ARRIVAL)?,
            time_slice: get_optional_number(flow, yaml, flow_keys::TIME_SLICE)?.unwrap_or(0.0),
            slo: get_optional_number(flow, yaml, flow_keys::SLO)?,
            drop: get_bool_or(flow, yaml, flow_keys::DROP, false)?,
            enq_front: get_bool_or(flow, yaml, flow_keys::ENQ_FRONT, false)?,
            network,
            admission_control: get_bool_or(flow, yaml, flow_keys::ADMISSION_CONTROL, false)?,
        };
        config.validate(flow)?;
        Ok(config)
    }

    /// Checks that the numbers of this flow make sense.
    pub fn validate(&self, flow: usize) -> Result<(), Fail> {
        if !(self.load.is_finite() && self.load > 0.0) {
            return Err(invalid(flow, "load must be positive"));
        }
        if !(self.time_slice.is_finite() && self.time_slice >= 0.0) {
            return Err(invalid(flow, "time slice must not be negative"));
        }
        if let Some(slo) = self.slo {
            if !(slo.is_finite() && slo > 0.0) {
                return Err(invalid(flow, "slo must be positive"));
            }
        }
        if let Some(inter_arrival) = self.inter_arrival {
            if !(inter_arrival.is_finite() && inter_arrival > 0.0) {
                return Err(invalid(flow, "inter_arrival must be positive"));
            }
        }
        if !(self.work.mean().is_finite() && self.work.mean() > 0.0) {
            return Err(invalid(flow, "mean service time must be positive"));
        }
        if let WorkGenerator::HeavyTail { heavy_per, .. } = self.work {
            if !(0.0..=100.0).contains(&heavy_per) {
                return Err(invalid(flow, "heavy_per must be a percentage"));
            }
        }
        Ok(())
    }
}

impl SimConfig {
    /// Checks the run configuration against the flows it will serve.
    pub fn validate(&self, flows: &[FlowConfig]) -> Result<(), Fail> {
        let fail = |cause: &str| -> Fail {
            error!("validate(): {}", cause);
            Fail::new(libc::EINVAL, cause)
        };
        if self.cores == 0 {
            return Err(fail("at least one core is required"));
        }
        if self.host_kind == HostKind::Dispatcher && self.cores < 2 {
            return Err(fail("the dispatcher host requires at least two cores"));
        }
        if self.host_kind == HostKind::PartitionedGlobalQueue
            && (self.network_cores == 0 || self.network_cores >= self.cores)
        {
            return Err(fail("the partitioned host requires 1 <= network cores < cores"));
        }
        if !(self.dequeue_cost.is_finite() && self.dequeue_cost >= 0.0) {
            return Err(fail("dequeue cost must not be negative"));
        }
        if !(self.preemption_cost.is_finite() && self.preemption_cost >= 0.0) {
            return Err(fail("preemption cost must not be negative"));
        }
        if !(self.horizon.is_finite() && self.horizon > 0.0) {
            return Err(fail("simulation time must be positive"));
        }
        if flows.is_empty() {
            return Err(fail("the workload has no flows"));
        }
        for (i, flow) in flows.iter().enumerate() {
            flow.validate(i)?;
        }
        Ok(())
    }

    /// Cores over which flow loads are spread. The dispatcher core serves no requests.
    pub fn cores_for_load(&self) -> usize {
        match self.host_kind {
            HostKind::Dispatcher => self.cores - 1,
            _ => self.cores,
        }
    }
}

/// Parses a workload: a sequence of flow records, in YAML or JSON.
pub fn parse_workload(workload: &str) -> Result<Vec<FlowConfig>, Fail> {
    let documents: Vec<Yaml> = YamlLoader::load_from_str(workload)?;
    let flows: &Yaml = match &documents[..] {
        [document] => document,
        _ => {
            let cause: &str = "wrong number of workload documents";
            error!("parse_workload(): {}", cause);
            return Err(Fail::new(libc::EINVAL, cause));
        },
    };
    match flows.as_vec() {
        Some(records) if !records.is_empty() => records
            .iter()
            .enumerate()
            .map(|(i, record)| FlowConfig::from_yaml(i, record))
            .collect(),
        _ => {
            let cause: &str = "workload must be a non-empty sequence of flows";
            error!("parse_workload(): {}", cause);
            Err(Fail::new(libc::EINVAL, cause))
        },
    }
}

/// Reads a workload file.
pub fn load_workload(path: &str) -> Result<Vec<FlowConfig>, Fail> {
    let mut workload: String = String::new();
    File::open(path)?.read_to_string(&mut workload)?;
    parse_workload(&workload)
}

fn invalid(flow: usize, cause: &str) -> Fail {
    let cause: String = format!("{} (flow={:?})", cause, flow);
    error!("invalid flow configuration: {}", cause);
    Fail::new(libc::EINVAL, &cause)
}

/// Reads a number, accepting both integer and real literals.
fn as_number(yaml: &Yaml) -> Option<f64> {
    match yaml {
        Yaml::Real(_) => yaml.as_f64(),
        Yaml::Integer(value) => Some(*value as f64),
        _ => None,
    }
}

fn get_optional_number(flow: usize, yaml: &Yaml, index: &str) -> Result<Option<f64>, Fail> {
    match yaml.index(index) {
        Yaml::BadValue | Yaml::Null => Ok(None),
        value => match as_number(value) {
            Some(number) => Ok(Some(number)),
            None => Err(invalid(flow, &format!("parameter \"{}\" has unexpected type", index))),
        },
    }
}

fn get_number(flow: usize, yaml: &Yaml, index: &str) -> Result<f64, Fail> {
    match get_optional_number(flow, yaml, index)? {
        Some(number) => Ok(number),
        None => Err(invalid(flow, &format!("missing configuration option \"{}\"", index))),
    }
}

/// Mean of a sampled service time, under `mean` or, failing that, `exec_time`.
fn get_mean(flow: usize, yaml: &Yaml) -> Result<f64, Fail> {
    match get_optional_number(flow, yaml, flow_keys::MEAN)? {
        Some(mean) => Ok(mean),
        None => get_number(flow, yaml, flow_keys::EXEC_TIME),
    }
}

fn get_str_or<'a>(flow: usize, yaml: &'a Yaml, index: &str, default: &'a str) -> Result<&'a str, Fail> {
    match yaml.index(index) {
        Yaml::BadValue | Yaml::Null => Ok(default),
        value => match value.as_str() {
            Some(value) => Ok(value),
            None => Err(invalid(flow, &format!("parameter \"{}\" has unexpected type", index))),
        },
    }
}

fn get_bool_or(flow: usize, yaml: &Yaml, index: &str, default: bool) -> Result<bool, Fail> {
    match yaml.index(index) {
        Yaml::BadValue | Yaml::Null => Ok(default),
        value => match value.as_bool() {
            Some(value) => Ok(value),
            None => Err(invalid(flow, &format!("parameter \"{}\" has unexpected type", index))),
        },
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cores: 8,
            network_cores: 0,
            host_kind: HostKind::GlobalQueue,
            dequeue_cost: 0.0,
            preemption_cost: 0.0,
            queue_policy: DequeuePolicy::LongestLength,
            horizon: 500_000.0,
            seed: 0,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
