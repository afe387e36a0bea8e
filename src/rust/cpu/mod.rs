// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod core;
mod group;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    core::{
        Core,
        CoreState,
    },
    group::CoreGroup,
};
