// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::{
    fmt,
    str::FromStr,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Queue topology and core affinity of a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKind {
    /// One shared FIFO served by every core.
    GlobalQueue,
    /// One FIFO per core, fed round-robin.
    MultiQueue,
    /// A network queue and a compute queue, each with its own cores.
    PartitionedGlobalQueue,
    /// One shared FIFO. Cores run the network phase and the compute phase of a request separately.
    MixedGlobalQueue,
    /// One FIFO per flow, with cores split across flows by load.
    StaticCoreAllocation,
    /// One queue per flow, served by every core under a dequeue policy.
    PerFlowQueue,
    /// One shared FIFO. A dispatcher core hands requests to worker cores, preempting them at slice boundaries.
    Dispatcher,
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl FromStr for HostKind {
    type Err = Fail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(HostKind::GlobalQueue),
            "local" => Ok(HostKind::MultiQueue),
            "partitioned-global" => Ok(HostKind::PartitionedGlobalQueue),
            "mixed-global" => Ok(HostKind::MixedGlobalQueue),
            "static-core" => Ok(HostKind::StaticCoreAllocation),
            "perflow" => Ok(HostKind::PerFlowQueue),
            "dispatcher" => Ok(HostKind::Dispatcher),
            _ => {
                let cause: String = format!("unsupported host type (host={:?})", s);
                error!("from_str(): {}", cause);
                Err(Fail::new(libc::ENOTSUP, &cause))
            },
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = match self {
            HostKind::GlobalQueue => "global",
            HostKind::MultiQueue => "local",
            HostKind::PartitionedGlobalQueue => "partitioned-global",
            HostKind::MixedGlobalQueue => "mixed-global",
            HostKind::StaticCoreAllocation => "static-core",
            HostKind::PerFlowQueue => "perflow",
            HostKind::Dispatcher => "dispatcher",
        };
        write!(f, "{}", name)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
