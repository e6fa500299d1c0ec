//! # querybridge
//!
//! Runs a blocking SQL engine off the control thread and hands owned results
//! back to it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            ControlContext (consumer thread)              │
//! │   parse / deparse / fingerprint / normalize / split /    │
//! │   scan / plpgsql, each as _sync and _async               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [bridge]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ExecutionBridge (background blocking pool)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [engine]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Engine trait  ─  PostgresEngine (sqlparser)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [envelope]
//! ┌─────────────────────────────────────────────────────────┐
//! │   NativeResult → ResultEnvelope { Success | Failure }    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [token] (scan only, on delivery)
//! ┌─────────────────────────────────────────────────────────┐
//! │         TokenJsonEncoder → {"version":..,"tokens":[..]}  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod logging;
pub mod token;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::bridge::{ControlContext, ExecutionBridge, Job, JobId, JobKind, Output};
    pub use crate::config::Settings;
    pub use crate::engine::{Engine, PostgresEngine, StatementRange};
    pub use crate::envelope::{format_sql_error, ErrorEnvelope, FormatOptions, ResultEnvelope};
    pub use crate::token::{Token, TokenJsonEncoder};
}

pub use bridge::{ControlContext, ExecutionBridge};
pub use envelope::{ErrorEnvelope, ResultEnvelope};
