// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::schedsim::{
    cpu::CoreState,
    ensure_eq,
    ensure_neq,
    request::generator::{
        ArrivalKind,
        WorkGenerator,
    },
    DequeuePolicy,
    FlowConfig,
    HostKind,
    SharedHost,
    SimConfig,
    SimStats,
    Simulation,
};

//======================================================================================================================
// Helpers
//======================================================================================================================

fn config(host_kind: HostKind, cores: usize, horizon: f64) -> SimConfig {
    SimConfig {
        cores,
        host_kind,
        horizon,
        ..SimConfig::default()
    }
}

fn max_latency(stats: &SimStats, flow: usize) -> f64 {
    stats.flows()[flow].latencies().iter().copied().fold(0.0, f64::max)
}

fn run(config: SimConfig, flows: Vec<FlowConfig>) -> Result<SimStats> {
    Ok(Simulation::new(config, flows)?.run()?)
}

//======================================================================================================================
// Single Core FIFO
//======================================================================================================================

#[test]
fn overloaded_core_serves_in_arrival_order() -> Result<()> {
    let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(7.0, 1.0).with_inter_arrival(1.0)];
    let stats: SimStats = run(config(HostKind::GlobalQueue, 1, 50.0), flows)?;

    // Arrivals every unit, each taking seven: the backlog grows by six per request.
    ensure_eq!(
        stats.flows()[0].latencies().to_vec(),
        vec![7.0, 13.0, 19.0, 25.0, 31.0, 37.0, 43.0]
    );
    Ok(())
}

//======================================================================================================================
// Preemption
//======================================================================================================================

#[test]
fn time_slices_conserve_service_time() -> Result<()> {
    let flow: FlowConfig = FlowConfig::fixed(4.0, 0.8).with_inter_arrival(5.0);

    let plain: SimStats = run(config(HostKind::GlobalQueue, 1, 49.0), vec![flow.clone()])?;
    let sliced: SimStats = run(
        config(HostKind::GlobalQueue, 1, 49.0),
        vec![flow.clone().with_time_slice(1.5)],
    )?;
    ensure_eq!((plain.flows()[0].service_time() - 36.0).abs() < 1e-9, true);
    ensure_eq!((sliced.flows()[0].service_time() - 36.0).abs() < 1e-9, true);
    ensure_eq!(sliced.flows()[0].latencies().to_vec(), plain.flows()[0].latencies().to_vec());

    let costly: SimStats = run(
        SimConfig {
            preemption_cost: 0.1,
            ..config(HostKind::GlobalQueue, 1, 49.0)
        },
        vec![flow.with_time_slice(1.5)],
    )?;
    ensure_eq!(max_latency(&costly, 0) >= max_latency(&plain, 0), true);
    ensure_eq!((max_latency(&costly, 0) - 4.2).abs() < 1e-9, true);
    Ok(())
}

//======================================================================================================================
// Per-Flow Queues
//======================================================================================================================

fn competing_flows() -> Vec<FlowConfig> {
    vec![
        FlowConfig::fixed(1.0, 0.5).with_inter_arrival(2.0).with_slo(1.8),
        FlowConfig::fixed(1.0, 0.5).with_inter_arrival(2.0).with_slo(1.5),
    ]
}

fn perflow(policy: DequeuePolicy) -> SimConfig {
    SimConfig {
        queue_policy: policy,
        ..config(HostKind::PerFlowQueue, 1, 200.0)
    }
}

#[test]
fn longest_load_favors_the_tighter_slo() -> Result<()> {
    let by_length: SimStats = run(perflow(DequeuePolicy::LongestLength), competing_flows())?;
    let by_load: SimStats = run(perflow(DequeuePolicy::LongestLoad), competing_flows())?;

    // Equal backlogs: longest-length falls back to the lowest flow index.
    ensure_eq!(by_length.flows()[0].slo_success() > by_length.flows()[1].slo_success(), true);
    ensure_eq!(by_load.flows()[1].slo_success() >= by_load.flows()[0].slo_success(), true);
    ensure_eq!(by_load.flows()[1].slo_success() > by_length.flows()[1].slo_success(), true);
    Ok(())
}

#[test]
fn admission_control_bounds_latency() -> Result<()> {
    let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 1.0)
        .with_inter_arrival(0.25)
        .with_slo(1.0)
        .with_admission_control(true)];
    let stats: SimStats = run(config(HostKind::PerFlowQueue, 1, 50.0), flows)?;

    ensure_eq!(stats.flows()[0].dropped() > 0, true);
    ensure_eq!(max_latency(&stats, 0) <= 2.0 + 1e-9, true);
    Ok(())
}

//======================================================================================================================
// Static Core Allocation
//======================================================================================================================

#[test]
fn static_partition_must_match_core_count() -> Result<()> {
    let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.3); 3];
    let result = Simulation::new(config(HostKind::StaticCoreAllocation, 4, 10.0), flows);
    ensure_eq!(result.map(|_| ()).map_err(|e| e.errno), Err(libc::EINVAL));

    let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.3); 2];
    ensure_eq!(
        Simulation::new(config(HostKind::StaticCoreAllocation, 4, 10.0), flows).is_ok(),
        true
    );
    Ok(())
}

//======================================================================================================================
// Dispatcher
//======================================================================================================================

#[test]
fn dispatcher_lets_short_requests_overtake() -> Result<()> {
    let flows: Vec<FlowConfig> = vec![
        FlowConfig::fixed(10.0, 0.5).with_inter_arrival(20.0).with_time_slice(1.0),
        FlowConfig::fixed(0.5, 0.5).with_inter_arrival(20.0).with_time_slice(1.0),
    ];

    // One worker: the short request runs as soon as the long one is preempted.
    let dispatched: SimStats = run(config(HostKind::Dispatcher, 2, 100.0), flows.clone())?;
    ensure_eq!(max_latency(&dispatched, 1), 1.5);
    ensure_eq!(max_latency(&dispatched, 0), 10.5);

    // Without a dispatcher the short request waits for the long one to finish.
    let unsliced: Vec<FlowConfig> = flows.into_iter().map(|f| f.with_time_slice(0.0)).collect();
    let global: SimStats = run(config(HostKind::GlobalQueue, 1, 100.0), unsliced)?;
    ensure_eq!(max_latency(&global, 1), 10.5);
    Ok(())
}

//======================================================================================================================
// Other Hosts
//======================================================================================================================

#[test]
fn every_host_serves_a_light_load() -> Result<()> {
    let flows: Vec<FlowConfig> = vec![
        FlowConfig::new(WorkGenerator::Exponential { mean: 1.0 }, 0.3),
        FlowConfig::new(WorkGenerator::Fixed { exec_time: 0.5 }, 0.2)
            .with_network(::schedsim::request::generator::NetworkGenerator::Fixed(0.1)),
    ];
    for host_kind in [
        HostKind::GlobalQueue,
        HostKind::MultiQueue,
        HostKind::PartitionedGlobalQueue,
        HostKind::MixedGlobalQueue,
        HostKind::StaticCoreAllocation,
        HostKind::PerFlowQueue,
        HostKind::Dispatcher,
    ] {
        let config: SimConfig = SimConfig {
            network_cores: 1,
            seed: 7,
            ..config(host_kind, 4, 2000.0)
        };
        let stats: SimStats = run(config, flows.clone())?;
        for flow in stats.flows() {
            ensure_eq!(flow.completed() > 0, true);
            ensure_eq!(flow.dropped(), 0);
        }
    }
    Ok(())
}

#[test]
fn repeated_activation_is_ignored() -> Result<()> {
    let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.5).with_inter_arrival(2.0)];
    let mut simulation: Simulation = Simulation::new(config(HostKind::GlobalQueue, 2, 10.0), flows)?;
    let mut host: SharedHost = simulation.host().clone();
    ensure_eq!(host.kind(), simulation.config().host_kind);
    ensure_eq!(host.num_cores(), simulation.config().cores);

    ensure_eq!(host.become_active(1), true);
    ensure_eq!(host.become_active(1), false);
    ensure_eq!(host.core_state(1), Some(CoreState::Active));

    simulation.run_until(1.0)?;
    ensure_eq!(host.core_state(1), Some(CoreState::Idle));
    Ok(())
}

//======================================================================================================================
// Determinism
//======================================================================================================================

#[test]
fn same_seed_same_world() -> Result<()> {
    let flows = || -> Vec<FlowConfig> {
        vec![
            FlowConfig::new(WorkGenerator::Exponential { mean: 1.0 }, 0.7).with_arrival(ArrivalKind::Poisson),
            FlowConfig::new(
                WorkGenerator::HeavyTail {
                    exec_time: 0.5,
                    heavy_time: 20.0,
                    heavy_per: 1.0,
                },
                0.1,
            ),
        ]
    };
    let seeded = |seed: u64| -> SimConfig {
        SimConfig {
            seed,
            ..config(HostKind::GlobalQueue, 4, 1000.0)
        }
    };

    let first: SimStats = run(seeded(42), flows())?;
    let second: SimStats = run(seeded(42), flows())?;
    let other: SimStats = run(seeded(43), flows())?;
    for flow in 0..2 {
        ensure_eq!(
            first.flows()[flow].latencies().to_vec(),
            second.flows()[flow].latencies().to_vec()
        );
    }
    ensure_neq!(
        first.flows()[0].latencies().to_vec(),
        other.flows()[0].latencies().to_vec()
    );
    Ok(())
}
