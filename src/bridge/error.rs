//! Bridge setup errors.
//!
//! Job failures never show up here; they are delivered as
//! [`ErrorEnvelope`](crate::envelope::ErrorEnvelope)s. These errors cover
//! building the bridge and reading consumer input.

use std::io;
use thiserror::Error;

use crate::config::SettingsError;

/// Result type for bridge setup.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The background runtime could not be built.
    #[error("failed to start engine runtime: {0}")]
    RuntimeStart(#[source] io::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Input for a job could not be read.
    #[error("failed to read input: {0}")]
    ReadInput(#[source] io::Error),
}

impl BridgeError {
    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Settings(_) => 2,
            Self::RuntimeStart(_) | Self::ReadInput(_) => 1,
        }
    }
}
