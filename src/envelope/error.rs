//! Structured failure description carried by a failed [`ResultEnvelope`].
//!
//! [`ResultEnvelope`]: super::ResultEnvelope

use serde::Serialize;
use thiserror::Error;

use super::native::NativeError;

/// Message used when copying input or error fields could not allocate.
pub const ALLOCATION_FAILED: &str = "allocation failed";

/// Message used when a JSON AST cannot be converted to the binary form.
pub const AST_FORMAT_MISMATCH: &str = "input AST did not match expected format";

/// Message used when a text operation receives empty input.
pub const EMPTY_QUERY: &str = "Invalid input: query cannot be null or empty";

/// Message used when a binary deparse receives an empty AST.
pub const EMPTY_AST: &str = "Invalid input: AST data cannot be null or empty";

/// Message used when the engine call unwound instead of returning.
pub const ENGINE_PANICKED: &str = "engine call panicked";

/// Message used when a background context went away before finishing.
pub const EXECUTION_ABORTED: &str = "background execution context terminated";

/// Message used when a job's input does not fit its operation.
pub const INPUT_MISMATCH: &str = "Invalid input: payload type does not match operation";

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before reaching the engine.
    InputValidation,
    /// Reported by the engine itself.
    Engine,
    /// An allocation could not be satisfied.
    ResourceExhaustion,
    /// The bridge caught an anomaly (panic, lost context, mismatched payload).
    Internal,
}

/// A structured failure: message, optional origin, position and context.
///
/// `line_number` and `cursor_position` use `0` for "not applicable". Optional
/// fields stay `None` when the engine did not provide them; they are never
/// coerced to empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub message: String,
    pub function_name: Option<String>,
    pub file_name: Option<String>,
    pub line_number: i32,
    pub cursor_position: i32,
    pub context: Option<String>,
    #[serde(skip)]
    pub kind: ErrorKind,
}

impl ErrorEnvelope {
    /// Create an error with only a message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            function_name: None,
            file_name: None,
            line_number: 0,
            cursor_position: 0,
            context: None,
            kind,
        }
    }

    pub fn allocation_failed() -> Self {
        Self::new(ErrorKind::ResourceExhaustion, ALLOCATION_FAILED)
    }

    pub fn ast_format_mismatch() -> Self {
        Self::new(ErrorKind::InputValidation, AST_FORMAT_MISMATCH)
    }

    pub fn empty_query() -> Self {
        Self::new(ErrorKind::InputValidation, EMPTY_QUERY)
    }

    pub fn empty_ast() -> Self {
        Self::new(ErrorKind::InputValidation, EMPTY_AST)
    }

    pub fn input_mismatch() -> Self {
        Self::new(ErrorKind::InputValidation, INPUT_MISMATCH)
    }

    pub fn engine_panicked() -> Self {
        Self::new(ErrorKind::Internal, ENGINE_PANICKED)
    }

    pub fn execution_aborted() -> Self {
        Self::new(ErrorKind::Internal, EXECUTION_ABORTED)
    }

    /// Set the engine function the failure originated in.
    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Set the engine source file the failure originated in.
    pub fn with_file(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Set the origin line and the 1-based cursor position.
    pub fn at(mut self, line_number: i32, cursor_position: i32) -> Self {
        self.line_number = line_number;
        self.cursor_position = cursor_position;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Whether the error points at a position in the input.
    pub fn has_position(&self) -> bool {
        self.cursor_position > 0
    }

    /// Whether the error was reported by the engine rather than the bridge.
    pub fn is_engine_error(&self) -> bool {
        self.kind == ErrorKind::Engine
    }
}

impl From<NativeError> for ErrorEnvelope {
    fn from(err: NativeError) -> Self {
        Self {
            message: err.message,
            function_name: err.funcname,
            file_name: err.filename,
            line_number: err.lineno,
            cursor_position: err.cursorpos,
            context: err.context,
            kind: ErrorKind::Engine,
        }
    }
}
