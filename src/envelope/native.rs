//! Raw engine results before they are wrapped into a [`ResultEnvelope`].
//!
//! An engine call returns a [`NativeResult`]: an optional payload next to an
//! optional error record, mirroring the discriminator a native library hands
//! back. Buffers are owned values with no `Clone`, so a result has exactly one
//! owner at any time and is released exactly once, when that owner drops it.
//!
//! [`ResultEnvelope`]: super::ResultEnvelope

use super::error::ErrorEnvelope;

/// Error record produced by the engine.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NativeError {
    pub message: String,
    pub funcname: Option<String>,
    pub filename: Option<String>,
    pub lineno: i32,
    pub cursorpos: i32,
    pub context: Option<String>,
}

impl NativeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn in_function(mut self, funcname: impl Into<String>) -> Self {
        self.funcname = Some(funcname.into());
        self
    }
}

/// Result of one engine call.
///
/// A well-behaved engine sets exactly one of `payload` and `error`. The bridge
/// treats `error` as authoritative and a missing payload without an error as
/// an allocation failure.
#[derive(Debug)]
pub struct NativeResult<P> {
    pub payload: Option<P>,
    pub error: Option<Box<NativeError>>,
}

impl<P> NativeResult<P> {
    pub fn ok(payload: P) -> Self {
        Self {
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(error: NativeError) -> Self {
        Self {
            payload: None,
            error: Some(Box::new(error)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl<P> From<Result<P, NativeError>> for NativeResult<P> {
    fn from(result: Result<P, NativeError>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(error) => Self::err(error),
        }
    }
}

/// Owned, move-only byte buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct NativeBuffer(Box<[u8]>);

impl NativeBuffer {
    /// Copy `bytes` into a new buffer, reporting allocation failure as data.
    pub fn try_copy(bytes: &[u8]) -> Result<Self, ErrorEnvelope> {
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(bytes.len())
            .map_err(|_| ErrorEnvelope::allocation_failed())?;
        owned.extend_from_slice(bytes);
        Ok(Self(owned.into_boxed_slice()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0.into_vec()
    }
}

impl From<Vec<u8>> for NativeBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }
}

/// Copy `text` into a new owned string, reporting allocation failure as data.
pub fn try_copy_str(text: &str) -> Result<String, ErrorEnvelope> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(text.len())
        .map_err(|_| ErrorEnvelope::allocation_failed())?;
    owned.push_str(text);
    Ok(owned)
}
