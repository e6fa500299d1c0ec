//! Success-or-failure wrapper that owns the marshalled engine result.

use super::error::ErrorEnvelope;
use super::native::NativeResult;

/// Outcome of one job: either the owned success payload or an [`ErrorEnvelope`].
///
/// The envelope is move-only. [`release`](Self::release) and
/// [`into_result`](Self::into_result) take it by value, so reading a payload
/// after release or releasing twice does not compile.
#[must_use = "a result envelope owns its payload until it is released or consumed"]
#[derive(Debug, PartialEq)]
pub enum ResultEnvelope<T> {
    Success(T),
    Failure(ErrorEnvelope),
}

impl<T> ResultEnvelope<T> {
    /// Wrap a raw engine result, consuming (and so releasing) it.
    ///
    /// An error record wins over any payload that came with it. A result with
    /// neither is reported with the allocation sentinel.
    pub fn from_native(raw: NativeResult<T>) -> Self {
        match raw {
            NativeResult {
                error: Some(error), ..
            } => Self::Failure(ErrorEnvelope::from(*error)),
            NativeResult {
                payload: Some(payload),
                error: None,
            } => Self::Success(payload),
            NativeResult {
                payload: None,
                error: None,
            } => Self::Failure(ErrorEnvelope::allocation_failed()),
        }
    }

    pub fn success(payload: T) -> Self {
        Self::Success(payload)
    }

    pub fn failure(error: ErrorEnvelope) -> Self {
        Self::Failure(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorEnvelope> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ResultEnvelope<U> {
        match self {
            Self::Success(payload) => ResultEnvelope::Success(f(payload)),
            Self::Failure(error) => ResultEnvelope::Failure(error),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, ErrorEnvelope>) -> ResultEnvelope<U> {
        match self {
            Self::Success(payload) => f(payload).into(),
            Self::Failure(error) => ResultEnvelope::Failure(error),
        }
    }

    /// Transfer the payload into a plain `Result`.
    pub fn into_result(self) -> Result<T, ErrorEnvelope> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Failure(error) => Err(error),
        }
    }

    /// Free everything the envelope owns.
    pub fn release(self) {
        tracing::trace!(success = self.is_success(), "releasing result envelope");
        drop(self);
    }
}

impl<T> From<Result<T, ErrorEnvelope>> for ResultEnvelope<T> {
    fn from(result: Result<T, ErrorEnvelope>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(error) => Self::Failure(error),
        }
    }
}

impl<T> From<ResultEnvelope<T>> for Result<T, ErrorEnvelope> {
    fn from(envelope: ResultEnvelope<T>) -> Self {
        envelope.into_result()
    }
}
