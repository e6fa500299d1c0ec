//! Result marshalling and error taxonomy.
//!
//! ```text
//! engine call ──► NativeResult<P> ──from_native──► ResultEnvelope<P>
//!                 (payload | error)                 Success(P) | Failure(ErrorEnvelope)
//! ```
//!
//! Every value in this module has a single owner. Converting a
//! [`NativeResult`] consumes it, and an envelope is released by moving it into
//! [`ResultEnvelope::release`] or [`ResultEnvelope::into_result`].

mod error;
mod format;
mod native;
mod result;

pub use error::{
    ErrorEnvelope, ErrorKind, ALLOCATION_FAILED, AST_FORMAT_MISMATCH, EMPTY_AST, EMPTY_QUERY,
    ENGINE_PANICKED, EXECUTION_ABORTED, INPUT_MISMATCH,
};
pub use format::{format_sql_error, FormatOptions};
pub use native::{try_copy_str, NativeBuffer, NativeError, NativeResult};
pub use result::ResultEnvelope;
