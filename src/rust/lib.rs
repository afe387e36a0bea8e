// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod config;
pub mod cpu;
pub mod host;
pub mod queue;
pub mod request;
pub mod runtime;
pub mod simulation;
pub mod stats;

pub use self::{
    config::{
        FlowConfig,
        SimConfig,
    },
    host::{
        HostKind,
        SharedHost,
    },
    queue::DequeuePolicy,
    request::{
        FlowId,
        Request,
    },
    runtime::{
        fail::Fail,
        SharedSimRuntime,
    },
    simulation::Simulation,
    stats::{
        FlowReport,
        SimStats,
    },
};

/// Ensures that two expressions are equal, bailing out of the enclosing `anyhow::Result` function otherwise.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    ::anyhow::bail!(
                        r#"ensure failed: `(left == right)` left: `{:?}`, right: `{:?}`"#,
                        left_val,
                        right_val
                    )
                }
            },
        }
    }};
}

/// Ensures that two expressions are not equal, bailing out of the enclosing `anyhow::Result` function otherwise.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val == *right_val {
                    ::anyhow::bail!(
                        r#"ensure failed: `(left != right)` left: `{:?}`, right: `{:?}`"#,
                        left_val,
                        right_val
                    )
                }
            },
        }
    }};
}
