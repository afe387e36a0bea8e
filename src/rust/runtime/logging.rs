// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::fail::Fail;
use ::flexi_logger::{
    Logger,
    LoggerHandle,
};

//==============================================================================
// Standalone Functions
//==============================================================================

/// Maps the number of `-v` flags to a log specification.
pub fn level_for_verbosity(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Initializes logging features. The `RUST_LOG` environment variable takes precedence over `default_spec`. The
/// returned handle must be kept alive for as long as the program logs.
pub fn initialize(default_spec: &str) -> Result<LoggerHandle, Fail> {
    let logger: Logger = match Logger::try_with_env_or_str(default_spec) {
        Ok(logger) => logger,
        Err(e) => {
            let cause: String = format!("invalid log specification (spec={:?}, error={:?})", default_spec, e);
            return Err(Fail::new(libc::EINVAL, &cause));
        },
    };
    match logger.start() {
        Ok(handle) => Ok(handle),
        Err(e) => {
            let cause: String = format!("failed to start logger (error={:?})", e);
            Err(Fail::new(libc::EIO, &cause))
        },
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
