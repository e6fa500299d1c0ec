//! JSON rendering of a scanned token stream.
//!
//! The document shape is fixed:
//!
//! ```text
//! {"version":<v>,"tokens":[{"start":0,"end":6,"text":"SELECT","tokenName":"KEYWORD","keywordName":"RESERVED_KEYWORD"},...]}
//! ```
//!
//! Token text escaping is deliberately minimal: only `"` and `\` are prefixed
//! with a backslash. Consumers depend on this narrower behavior, so it is not
//! full JSON string escaping.

use std::borrow::Cow;
use std::collections::TryReserveError;
use std::fmt::Write as _;

use super::Token;
use crate::config::EncoderSettings;

/// Document produced for an empty token stream or when the buffer cannot grow.
pub const EMPTY_DOCUMENT: &str = r#"{"version":0,"tokens":[]}"#;

/// Bytes one token object needs besides its escaped text: field names, two
/// integers, the class names and the separator.
const TOKEN_FRAME: usize = 128;

/// Renders `(version, tokens, input)` into the JSON token document.
#[derive(Debug, Clone, Copy)]
pub struct TokenJsonEncoder {
    base_overhead: usize,
    per_token_estimate: usize,
    safety_margin: usize,
}

impl Default for TokenJsonEncoder {
    fn default() -> Self {
        Self::from_settings(&EncoderSettings::default())
    }
}

impl TokenJsonEncoder {
    pub fn from_settings(settings: &EncoderSettings) -> Self {
        Self {
            base_overhead: settings.base_overhead,
            per_token_estimate: settings.per_token_estimate,
            safety_margin: settings.safety_margin,
        }
    }

    /// Encode the token stream. Never fails.
    ///
    /// An empty stream, or a buffer that cannot be allocated, produces
    /// [`EMPTY_DOCUMENT`].
    pub fn encode(&self, version: i32, tokens: &[Token], input: &str) -> String {
        if tokens.is_empty() {
            return EMPTY_DOCUMENT.to_string();
        }

        match self.try_encode(version, tokens, input) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, tokens = tokens.len(), "token document allocation failed");
                EMPTY_DOCUMENT.to_string()
            }
        }
    }

    fn try_encode(
        &self,
        version: i32,
        tokens: &[Token],
        input: &str,
    ) -> Result<String, TryReserveError> {
        let estimate = self
            .base_overhead
            .saturating_add(tokens.len().saturating_mul(self.per_token_estimate));
        let mut buf = JsonBuffer::with_capacity(estimate, self.safety_margin)?;

        buf.push_str("{\"version\":");
        buf.push_int(version);
        buf.push_str(",\"tokens\":[");

        let mut last_start = i32::MIN;
        for (i, token) in tokens.iter().enumerate() {
            if token.start < last_start {
                tracing::debug!(index = i, start = token.start, "token stream out of order");
            }
            last_start = token.start;

            let text = slice(input, token);
            buf.reserve_for(TOKEN_FRAME.saturating_add(text.len().saturating_mul(2)))?;

            if i > 0 {
                buf.push_str(",");
            }
            buf.push_str("{\"start\":");
            buf.push_int(token.start);
            buf.push_str(",\"end\":");
            buf.push_int(token.end);
            buf.push_str(",\"text\":\"");
            buf.push_escaped(&text);
            buf.push_str("\",\"tokenName\":\"");
            buf.push_str(token.class.name());
            buf.push_str("\",\"keywordName\":\"");
            buf.push_str(token.keyword.name());
            buf.push_str("\"}");
        }

        buf.push_str("]}");
        Ok(buf.into_string())
    }
}

/// Text covered by `token`, clamped to the input.
///
/// A negative length or a range outside the input yields an empty or
/// shortened slice instead of a fault.
fn slice<'a>(input: &'a str, token: &Token) -> Cow<'a, str> {
    let bytes = input.as_bytes();
    let clamp = |offset: i32| usize::try_from(offset).unwrap_or(0).min(bytes.len());
    let start = clamp(token.start);
    let end = clamp(token.end).max(start);
    String::from_utf8_lossy(&bytes[start..end])
}

/// Prefix every `"` and `\` with a backslash. Nothing else is touched.
pub fn escape_minimal(text: &str) -> Cow<'_, str> {
    if !text.contains(['"', '\\']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    push_escaped(&mut escaped, text);
    Cow::Owned(escaped)
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Output buffer that doubles whenever headroom drops below the safety margin.
struct JsonBuffer {
    out: String,
    safety_margin: usize,
}

impl JsonBuffer {
    fn with_capacity(capacity: usize, safety_margin: usize) -> Result<Self, TryReserveError> {
        let mut out = String::new();
        out.try_reserve_exact(capacity)?;
        Ok(Self { out, safety_margin })
    }

    /// Make sure at least `needed` bytes (and never less than the safety
    /// margin) fit without reallocating mid-token.
    fn reserve_for(&mut self, needed: usize) -> Result<(), TryReserveError> {
        let wanted = needed.max(self.safety_margin);
        let headroom = self.out.capacity() - self.out.len();
        if headroom >= wanted {
            return Ok(());
        }

        let target = self
            .out
            .capacity()
            .saturating_mul(2)
            .max(self.out.len().saturating_add(wanted));
        self.out.try_reserve_exact(target - self.out.len())
    }

    fn push_str(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn push_int(&mut self, n: i32) {
        // writing into a String cannot fail
        let _ = write!(self.out, "{n}");
    }

    fn push_escaped(&mut self, text: &str) {
        push_escaped(&mut self.out, text);
    }

    fn into_string(self) -> String {
        self.out
    }
}
