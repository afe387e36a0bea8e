// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Simulated hosts.
//!
//! A host owns one or more request queues, each guarded by an exclusive resource, and pools of cores that drain them.
//! Arrivals are routed to a queue according to the [HostKind], and wake an idle core of the pool serving that queue.
//! Queue `i` is always served by pool `i`.

mod dispatcher;
mod kind;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::kind::HostKind;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    config::{
        FlowConfig,
        SimConfig,
    },
    cpu::{
        Core,
        CoreGroup,
        CoreState,
    },
    queue::{
        DequeuePolicy,
        FifoQueue,
        FlowQueue,
        FlowQueueGroup,
        LoadBalancer,
        RequestQueue,
    },
    request::{
        FlowId,
        Request,
    },
    runtime::{
        fail::Fail,
        scheduler::{
            SharedResource,
            Yielder,
        },
        SharedObject,
        SharedSimRuntime,
    },
    stats::SimStats,
};
use ::std::{
    mem,
    ops::{
        Deref,
        DerefMut,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Queue of a partitioned host that receives requests with a network phase.
const NETWORK_QUEUE: usize = 0;
/// Queue of a partitioned host that receives compute requests.
const COMPUTE_QUEUE: usize = 1;

//======================================================================================================================
// Structures
//======================================================================================================================

/// What the cores draining a queue do with the requests they take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueueRole {
    /// Run the compute phase.
    Compute,
    /// Run the network phase, then forward to the compute queue.
    Network,
    /// Run the network phase and requeue, or run the compute phase if the network phase is done.
    Mixed,
}

struct HostQueue {
    queue: RequestQueue,
    role: QueueRole,
    /// Serializes dequeues.
    resource: SharedResource,
}

/// Queues, cores and pools of a host.
struct Layout {
    queues: Vec<HostQueue>,
    cores: Vec<Core>,
    pools: Vec<CoreGroup>,
}

pub struct Host {
    runtime: SharedSimRuntime,
    kind: HostKind,
    flows: Vec<FlowConfig>,
    stats: SimStats,
    dequeue_cost: f64,
    preemption_cost: f64,
    queues: Vec<HostQueue>,
    cores: Vec<Core>,
    pools: Vec<CoreGroup>,
    balancer: LoadBalancer,
}

#[derive(Clone)]
pub struct SharedHost(SharedObject<Host>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl HostQueue {
    fn new(queue: RequestQueue, role: QueueRole) -> Self {
        Self {
            queue,
            role,
            resource: SharedResource::new(),
        }
    }

    fn fifo(role: QueueRole) -> Self {
        Self::new(RequestQueue::Fifo(FifoQueue::new()), role)
    }
}

impl Layout {
    /// One queue served by every core.
    fn shared(queue: HostQueue, num_cores: usize) -> Self {
        Self {
            queues: vec![queue],
            cores: (0..num_cores).map(|id| Core::new(id, 0, 0)).collect(),
            pools: vec![CoreGroup::new(0..num_cores)],
        }
    }

    /// Queue `i` is served by the `cores_per_queue[i]` cores that follow those of queue `i - 1`.
    fn partitioned(queues: Vec<HostQueue>, cores_per_queue: &[usize]) -> Self {
        let mut cores: Vec<Core> = Vec::new();
        let mut pools: Vec<CoreGroup> = Vec::new();
        for (queue, count) in cores_per_queue.iter().enumerate() {
            let first: usize = cores.len();
            cores.extend((first..first + count).map(|id| Core::new(id, queue, queue)));
            pools.push(CoreGroup::new(first..first + count));
        }
        Self { queues, cores, pools }
    }

    fn build(config: &SimConfig, flows: &[FlowConfig]) -> Result<Self, Fail> {
        let num_cores: usize = config.cores;
        let layout: Self = match config.host_kind {
            HostKind::GlobalQueue => Self::shared(HostQueue::fifo(QueueRole::Compute), num_cores),
            HostKind::MixedGlobalQueue => Self::shared(HostQueue::fifo(QueueRole::Mixed), num_cores),
            HostKind::PerFlowQueue => {
                let group: FlowQueueGroup = per_flow_queues(num_cores, flows, config.queue_policy.clone());
                Self::shared(HostQueue::new(RequestQueue::PerFlow(group), QueueRole::Compute), num_cores)
            },
            HostKind::MultiQueue => Self::partitioned(
                (0..num_cores).map(|_| HostQueue::fifo(QueueRole::Compute)).collect(),
                &vec![1; num_cores],
            ),
            HostKind::PartitionedGlobalQueue => Self::partitioned(
                vec![HostQueue::fifo(QueueRole::Network), HostQueue::fifo(QueueRole::Compute)],
                &[config.network_cores, num_cores - config.network_cores],
            ),
            HostKind::StaticCoreAllocation => {
                let allotment: Vec<usize> = static_allotment(num_cores, flows)?;
                Self::partitioned(
                    flows.iter().map(|_| HostQueue::fifo(QueueRole::Compute)).collect(),
                    &allotment,
                )
            },
            HostKind::Dispatcher => dispatcher::layout(num_cores),
        };
        Ok(layout)
    }
}

impl SharedHost {
    pub fn new(runtime: SharedSimRuntime, config: &SimConfig, flows: Vec<FlowConfig>) -> Result<Self, Fail> {
        config.validate(&flows)?;
        let Layout { queues, cores, pools } = Layout::build(config, &flows)?;
        let stats: SimStats = SimStats::new(&flows)?;
        info!(
            "new(): host={}, cores={:?}, queues={:?}, flows={:?}, dequeue_cost={:?}, preemption_cost={:?}",
            config.host_kind,
            cores.len(),
            queues.len(),
            flows.len(),
            config.dequeue_cost,
            config.preemption_cost
        );
        Ok(Self(SharedObject::new(Host {
            runtime,
            kind: config.host_kind,
            flows,
            stats,
            dequeue_cost: config.dequeue_cost,
            preemption_cost: config.preemption_cost,
            balancer: LoadBalancer::new(queues.len()),
            queues,
            cores,
            pools,
        })))
    }

    /// Accepts a new request: routes it to a queue and wakes a core to serve it. Requests turned away by admission
    /// control are counted as drops.
    pub fn receive_request(&mut self, request: Request) -> Result<(), Fail> {
        if request.flow_id().0 >= self.flows.len() {
            let cause: String = format!("no such flow (flow={:?}, request={:?})", request.flow_id(), request.idx());
            error!("receive_request(): {}", cause);
            return Err(Fail::new(libc::ENOENT, &cause));
        }
        debug!(
            "receive_request(): request={:?}, flow={:?}, exec_time={:?}, now={:?}",
            request.idx(),
            request.flow_id(),
            request.exec_time(),
            self.runtime.now()
        );
        let queue: usize = self.route(&request);
        self.admit(queue, request)
    }

    /// Starts the drain loop of `core`. Returns false if the core was already active, in which case nothing happens.
    pub fn become_active(&mut self, core: usize) -> bool {
        if self.kind == HostKind::Dispatcher {
            return self.activate_dispatcher();
        }
        let activated: bool = self.cores.get_mut(core).map_or(false, |c| c.become_active());
        if !activated {
            return false;
        }
        let pool: usize = self.cores[core].pool();
        self.pools[pool].mark_active(core);
        debug!("become_active(): core={:?}, now={:?}", core, self.runtime.now());
        let coroutine = self.clone().drain(core);
        self.runtime.insert_coroutine(&format!("core-{}", core), coroutine);
        true
    }

    /// Moves `core` back into its pool after it found its queue empty. `last_flow` is the flow of the last request the
    /// core served. On a statically partitioned host it names the pool the core returns to.
    pub fn core_become_idle(&mut self, core: usize, last_flow: Option<FlowId>) -> Result<(), Fail> {
        if core >= self.cores.len() {
            let cause: String = format!("no such core (core={:?})", core);
            error!("core_become_idle(): {}", cause);
            return Err(Fail::new(libc::ENOENT, &cause));
        }
        self.cores[core].become_idle();
        let home: usize = self.cores[core].pool();
        let pool: usize = match (self.kind, last_flow) {
            (HostKind::StaticCoreAllocation, Some(FlowId(flow))) => flow,
            _ => home,
        };
        if pool != home {
            let cause: String = format!("core served a foreign partition (core={:?}, pool={:?})", core, pool);
            error!("core_become_idle(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        self.pools[pool].return_idle(core);
        debug!("core_become_idle(): core={:?}, now={:?}", core, self.runtime.now());
        Ok(())
    }

    pub fn kind(&self) -> HostKind {
        self.kind
    }

    pub fn num_cores(&self) -> usize {
        self.cores.len()
    }

    pub fn core_state(&self, core: usize) -> Option<CoreState> {
        self.cores.get(core).map(|c| c.state())
    }

    pub fn num_queues(&self) -> usize {
        self.queues.len()
    }

    /// Requests waiting in queue `queue`.
    pub fn queue_len(&self, queue: usize) -> usize {
        self.queues.get(queue).map_or(0, |q| q.queue.len())
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Hands over the outcomes recorded so far.
    pub fn take_stats(&mut self) -> SimStats {
        mem::take(&mut self.stats)
    }

    fn route(&mut self, request: &Request) -> usize {
        match self.kind {
            HostKind::MultiQueue => self.balancer.next_queue(),
            HostKind::PartitionedGlobalQueue if request.has_network_time() => NETWORK_QUEUE,
            HostKind::PartitionedGlobalQueue => COMPUTE_QUEUE,
            HostKind::StaticCoreAllocation => request.flow_id().0,
            _ => 0,
        }
    }

    fn admit(&mut self, queue: usize, request: Request) -> Result<(), Fail> {
        match self.queues[queue].queue.enqueue(request) {
            Ok(()) => {
                self.wake(queue);
                Ok(())
            },
            Err(rejected) => {
                debug!(
                    "admit(): rejected (request={:?}, flow={:?})",
                    rejected.idx(),
                    rejected.flow_id()
                );
                self.stats.record_drop(rejected.flow_id())
            },
        }
    }

    /// Wakes an idle core of the pool serving `queue`, if there is one.
    fn wake(&mut self, queue: usize) {
        if self.kind == HostKind::Dispatcher {
            self.activate_dispatcher();
            return;
        }
        if let Some(core) = self.pools[queue].take_idle() {
            self.become_active(core);
        }
    }

    fn should_drop(&self, request: &Request, now: f64) -> bool {
        let flow: &FlowConfig = &self.flows[request.flow_id().0];
        match flow.slo {
            Some(slo) if flow.drop => now - request.start_time() + request.exec_time() > slo,
            _ => false,
        }
    }

    /// Drain loop of a core. Dequeues under the queue's resource, charging the dequeue cost while holding it, then
    /// runs the request. Ends when the queue is empty.
    async fn drain(mut self, core: usize) -> Result<(), Fail> {
        let yielder: Yielder = Yielder::new();
        let queue: usize = self.cores[core].queue();
        let mut last_flow: Option<FlowId> = None;
        while !self.queues[queue].queue.is_empty() {
            trace!("drain(): core={:?} acquiring queue={:?}", core, queue);
            self.queues[queue].resource.clone().acquire(&yielder).await?;
            let now: f64 = self.runtime.now();
            let request: Option<Request> = self.queues[queue].queue.dequeue(now);
            if request.is_some() && self.dequeue_cost > 0.0 {
                self.runtime.wait(self.dequeue_cost, &yielder).await?;
            }
            self.queues[queue].resource.release()?;

            if let Some(request) = request {
                last_flow = Some(request.flow_id());
                self.execute(queue, request, &yielder).await?;
            }
        }
        self.core_become_idle(core, last_flow)
    }

    async fn execute(&mut self, queue: usize, mut request: Request, yielder: &Yielder) -> Result<(), Fail> {
        let now: f64 = self.runtime.now();
        if self.should_drop(&request, now) {
            debug!("execute(): dropping request={:?}, now={:?}", request.idx(), now);
            return self.stats.record_drop(request.flow_id());
        }
        match self.queues[queue].role {
            QueueRole::Network => {
                if let Some(network_time) = request.take_network_time() {
                    self.runtime.wait(network_time, yielder).await?;
                }
                self.admit(COMPUTE_QUEUE, request)
            },
            QueueRole::Mixed if request.has_network_time() => {
                if let Some(network_time) = request.take_network_time() {
                    self.runtime.wait(network_time, yielder).await?;
                }
                self.queues[queue].queue.requeue(request, false);
                Ok(())
            },
            QueueRole::Mixed | QueueRole::Compute => self.serve(queue, request, yielder).await,
        }
    }

    /// Runs the compute phase of `request`. A request longer than its flow's time slice runs for one slice plus the
    /// preemption cost and goes back to its queue.
    async fn serve(&mut self, queue: usize, mut request: Request, yielder: &Yielder) -> Result<(), Fail> {
        let flow_id: FlowId = request.flow_id();
        let time_slice: f64 = self.flows[flow_id.0].time_slice;
        if time_slice > 0.0 && time_slice < request.exec_time() {
            trace!("serve(): preempting request={:?} after {:?}", request.idx(), time_slice);
            self.runtime.wait(time_slice + self.preemption_cost, yielder).await?;
            let served: f64 = request.consume(time_slice);
            self.stats.record_service(flow_id, served)?;
            let enq_front: bool = self.flows[flow_id.0].enq_front;
            self.queues[queue].queue.requeue(request, enq_front);
            return Ok(());
        }

        let exec_time: f64 = request.exec_time();
        self.runtime.wait(exec_time, yielder).await?;
        let served: f64 = request.consume(exec_time);
        self.stats.record_service(flow_id, served)?;
        let latency: f64 = self.runtime.now() - request.start_time();
        debug!("serve(): request={:?}, latency={:?}", request.idx(), latency);
        self.stats.record_latency(flow_id, latency)
    }
}

/// Per-flow queues of a host with `num_cores` cores. Flow `i` is entitled to a share of the cores proportional to its
/// load.
fn per_flow_queues(num_cores: usize, flows: &[FlowConfig], policy: DequeuePolicy) -> FlowQueueGroup {
    let total_load: f64 = flows.iter().map(|f| f.load).sum();
    let queues: Vec<FlowQueue> = flows
        .iter()
        .map(|flow| {
            let fair_core_share: f64 = num_cores as f64 * flow.load / total_load;
            match flow.admission_control {
                true => FlowQueue::new_drop_queue(flow.slo, fair_core_share),
                false => FlowQueue::new(flow.slo, fair_core_share),
            }
        })
        .collect();
    FlowQueueGroup::new(queues, policy)
}

/// Splits `num_cores` cores across flows in proportion to their load, rounding each share. The shares must add up to
/// the number of cores and every flow must get at least one.
pub fn static_allotment(num_cores: usize, flows: &[FlowConfig]) -> Result<Vec<usize>, Fail> {
    let total_load: f64 = flows.iter().map(|f| f.load).sum();
    let allotment: Vec<usize> = flows
        .iter()
        .map(|flow| (num_cores as f64 * flow.load / total_load).round() as usize)
        .collect();
    let allotted: usize = allotment.iter().sum();
    if allotted != num_cores || allotment.contains(&0) {
        let cause: String = format!(
            "static partition does not match the cores (cores={:?}, allotment={:?})",
            num_cores, allotment
        );
        error!("static_allotment(): {}", cause);
        return Err(Fail::new(libc::EINVAL, &cause));
    }
    Ok(allotment)
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Deref for SharedHost {
    type Target = Host;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl DerefMut for SharedHost {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

#[cfg(test)]
mod tests {
    use super::{
        static_allotment,
        HostKind,
        SharedHost,
    };
    use crate::{
        config::{
            FlowConfig,
            SimConfig,
        },
        cpu::CoreState,
        request::{
            FlowId,
            Request,
        },
        runtime::SharedSimRuntime,
    };
    use ::anyhow::Result;

    fn host(kind: HostKind, cores: usize, flows: Vec<FlowConfig>) -> Result<(SharedSimRuntime, SharedHost)> {
        let runtime: SharedSimRuntime = SharedSimRuntime::new();
        let config: SimConfig = SimConfig {
            cores,
            network_cores: 1,
            host_kind: kind,
            ..SimConfig::default()
        };
        let host: SharedHost = SharedHost::new(runtime.clone(), &config, flows)?;
        Ok((runtime, host))
    }

    #[test]
    fn become_active_twice_spawns_one_drain_loop() -> Result<()> {
        let (mut runtime, mut host) = host(HostKind::GlobalQueue, 2, vec![FlowConfig::fixed(1.0, 0.5)])?;
        crate::ensure_eq!(host.become_active(0), true);
        crate::ensure_eq!(host.become_active(0), false);
        crate::ensure_eq!(runtime.num_tasks(), 1);
        crate::ensure_eq!(host.core_state(0), Some(CoreState::Active));

        runtime.run(1.0)?;
        crate::ensure_eq!(runtime.num_tasks(), 0);
        crate::ensure_eq!(host.core_state(0), Some(CoreState::Idle));
        runtime.shutdown();
        Ok(())
    }

    #[test]
    fn arrivals_wake_one_idle_core_each() -> Result<()> {
        let (mut runtime, mut host) = host(HostKind::GlobalQueue, 2, vec![FlowConfig::fixed(1.0, 0.5)])?;
        for idx in 0..3 {
            host.receive_request(Request::new(idx, FlowId(0), 2.0, 0.0))?;
        }
        crate::ensure_eq!(runtime.num_tasks(), 2);

        runtime.run(10.0)?;
        let latencies: Vec<f64> = host.stats().flows()[0].latencies().to_vec();
        crate::ensure_eq!(latencies, vec![2.0, 2.0, 4.0]);
        crate::ensure_eq!(host.core_state(0), Some(CoreState::Idle));
        crate::ensure_eq!(host.core_state(1), Some(CoreState::Idle));
        runtime.shutdown();
        Ok(())
    }

    #[test]
    fn unknown_flows_are_fatal() -> Result<()> {
        let (mut runtime, mut host) = host(HostKind::GlobalQueue, 1, vec![FlowConfig::fixed(1.0, 0.5)])?;
        let result = host.receive_request(Request::new(0, FlowId(1), 1.0, 0.0));
        crate::ensure_eq!(result.map_err(|e| e.errno), Err(libc::ENOENT));
        runtime.shutdown();
        Ok(())
    }

    #[test]
    fn local_queues_are_fed_round_robin() -> Result<()> {
        let (mut runtime, mut host) = host(HostKind::MultiQueue, 3, vec![FlowConfig::fixed(1.0, 0.5)])?;
        crate::ensure_eq!(host.num_queues(), 3);
        for idx in 0..4 {
            host.receive_request(Request::new(idx, FlowId(0), 1.0, 0.0))?;
        }
        // Each arrival woke the core of its queue. The fourth one waits behind the first.
        crate::ensure_eq!(runtime.num_tasks(), 3);
        crate::ensure_eq!(host.queue_len(0), 2);
        runtime.run(5.0)?;
        crate::ensure_eq!(host.stats().flows()[0].latencies().to_vec(), vec![1.0, 1.0, 1.0, 2.0]);
        runtime.shutdown();
        Ok(())
    }

    #[test]
    fn partitioned_host_runs_network_phase_first() -> Result<()> {
        let (mut runtime, mut host) = host(HostKind::PartitionedGlobalQueue, 2, vec![FlowConfig::fixed(1.0, 0.5)])?;
        host.receive_request(Request::new(0, FlowId(0), 1.0, 0.0).with_network_time(0.5))?;
        host.receive_request(Request::new(1, FlowId(0), 1.0, 0.0))?;
        runtime.run(5.0)?;
        // The compute-only request runs right away. The other one reaches the compute core after its network phase
        // and waits for the first to finish.
        crate::ensure_eq!(host.stats().flows()[0].latencies().to_vec(), vec![1.0, 2.0]);
        runtime.shutdown();
        Ok(())
    }

    #[test]
    fn mixed_host_requeues_after_network_phase() -> Result<()> {
        let (mut runtime, mut host) = host(HostKind::MixedGlobalQueue, 1, vec![FlowConfig::fixed(1.0, 0.5)])?;
        host.receive_request(Request::new(0, FlowId(0), 1.0, 0.0).with_network_time(0.5))?;
        host.receive_request(Request::new(1, FlowId(0), 1.0, 0.0))?;
        runtime.run(5.0)?;
        // Request 0 runs its network phase, then goes behind request 1.
        crate::ensure_eq!(host.stats().flows()[0].latencies().to_vec(), vec![1.5, 2.5]);
        runtime.shutdown();
        Ok(())
    }

    #[test]
    fn preempted_requests_honor_their_flow_requeue_side() -> Result<()> {
        for (enq_front, expected) in [(true, vec![3.0, 4.0]), (false, vec![2.0, 4.0])] {
            let flow: FlowConfig = FlowConfig::fixed(3.0, 0.5)
                .with_time_slice(1.0)
                .with_enq_front(enq_front);
            let (mut runtime, mut host) = host(HostKind::GlobalQueue, 1, vec![flow])?;
            host.receive_request(Request::new(0, FlowId(0), 3.0, 0.0))?;
            host.receive_request(Request::new(1, FlowId(0), 1.0, 0.0))?;

            runtime.run(10.0)?;
            crate::ensure_eq!(host.stats().flows()[0].latencies().to_vec(), expected);
            runtime.shutdown();
        }
        Ok(())
    }

    #[test]
    fn droppable_requests_past_their_slo_are_discarded() -> Result<()> {
        let flow: FlowConfig = FlowConfig::fixed(1.0, 0.5).with_slo(2.5).with_drop(true);
        let (mut runtime, mut host) = host(HostKind::GlobalQueue, 1, vec![flow])?;
        for idx in 0..3 {
            host.receive_request(Request::new(idx, FlowId(0), 1.0, 0.0))?;
        }
        runtime.run(5.0)?;
        let reports = host.stats().report(1, false)?;
        crate::ensure_eq!(reports[0].dropped, 1);
        crate::ensure_eq!(host.stats().flows()[0].latencies().to_vec(), vec![1.0, 2.0]);
        crate::ensure_eq!(host.stats().flows()[0].violations(), 1);
        runtime.shutdown();
        Ok(())
    }

    #[test]
    fn static_allotment_follows_load() -> Result<()> {
        let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.6), FlowConfig::fixed(1.0, 0.2)];
        crate::ensure_eq!(static_allotment(4, &flows)?, vec![3, 1]);

        let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.3); 3];
        crate::ensure_eq!(static_allotment(4, &flows).map_err(|e| e.errno), Err(libc::EINVAL));

        let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.9), FlowConfig::fixed(1.0, 0.05)];
        crate::ensure_eq!(static_allotment(4, &flows).is_err(), true);
        Ok(())
    }

    #[test]
    fn static_host_keeps_flows_on_their_cores() -> Result<()> {
        let flows: Vec<FlowConfig> = vec![FlowConfig::fixed(1.0, 0.5), FlowConfig::fixed(1.0, 0.5)];
        let (mut runtime, mut host) = host(HostKind::StaticCoreAllocation, 2, flows)?;
        for idx in 0..2 {
            host.receive_request(Request::new(idx, FlowId(0), 1.0, 0.0))?;
        }
        host.receive_request(Request::new(2, FlowId(1), 1.0, 0.0))?;
        runtime.run(5.0)?;
        crate::ensure_eq!(host.stats().flows()[0].latencies().to_vec(), vec![1.0, 2.0]);
        crate::ensure_eq!(host.stats().flows()[1].latencies().to_vec(), vec![1.0]);
        runtime.shutdown();
        Ok(())
    }
}
