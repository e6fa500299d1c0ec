//! Execution bridge between the control context and the blocking engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  ControlContext (single thread)                 │
//! │  - <op>_sync: run inline, return ResultEnvelope                 │
//! │  - <op>_async: copy input into a Job, keep sink in pending map  │
//! │  - dispatch_pending / run_until_idle: run sinks for deliveries  │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │ Job (owned input)        ▲ Delivery { id, envelope }
//!                 ▼                          │ (mpsc, unbounded)
//! ┌─────────────────────────────────────────────────────────────────┐
//! │             ExecutionBridge (tokio blocking pool)               │
//! │  - validate input, call exactly one Engine method               │
//! │  - NativeResult → ResultEnvelope, panics → ErrorEnvelope        │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//!                      Engine (PostgresEngine)
//! ```
//!
//! Sinks stay in the control context's pending table keyed by [`JobId`];
//! only the job and its result cross threads. A sink runs at most once
//! because delivery removes it from the table before calling it.

mod control;
mod error;
mod executor;
mod job;

pub use control::ControlContext;
pub use error::{BridgeError, BridgeResult};
pub use executor::ExecutionBridge;
pub use job::{Job, JobId, JobInput, JobKind, Output, ScannedTokens};
