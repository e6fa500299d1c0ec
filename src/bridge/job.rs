//! Job descriptions and engine outputs.

use std::fmt;

use uuid::Uuid;

use crate::engine::StatementRange;
use crate::envelope::{try_copy_str, ErrorEnvelope, ErrorKind, NativeBuffer};
use crate::token::{Token, TokenJsonEncoder};

/// Identifier correlating a submitted job with its delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The engine operation a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Parse,
    Deparse,
    Fingerprint,
    ParsePlpgsql,
    Scan,
    Split,
    Normalize,
    JsonToAst,
}

impl JobKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Deparse => "deparse",
            Self::Fingerprint => "fingerprint",
            Self::ParsePlpgsql => "parse_plpgsql",
            Self::Scan => "scan",
            Self::Split => "split",
            Self::Normalize => "normalize",
            Self::JsonToAst => "json_to_ast",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned job input: SQL or AST JSON text, or a binary AST.
#[derive(Debug)]
pub enum JobInput {
    Text(String),
    Ast(NativeBuffer),
}

impl JobInput {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Ast(ast) => ast.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One requested operation with a private copy of its input.
///
/// Constructors copy the caller's data, so the job can cross to a background
/// thread regardless of what happens to the original afterwards. A failed
/// copy is reported as the allocation sentinel.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    kind: JobKind,
    input: JobInput,
}

impl Job {
    /// A job over a copy of `text`.
    pub fn text(kind: JobKind, text: &str) -> Result<Self, ErrorEnvelope> {
        Ok(Self::with_input(kind, JobInput::Text(try_copy_str(text)?)))
    }

    /// A job over a copy of a binary AST.
    pub fn binary(kind: JobKind, ast: &[u8]) -> Result<Self, ErrorEnvelope> {
        Ok(Self::with_input(kind, JobInput::Ast(NativeBuffer::try_copy(ast)?)))
    }

    fn with_input(kind: JobKind, input: JobInput) -> Self {
        Self {
            id: JobId::new(),
            kind,
            input,
        }
    }

    pub fn parse(sql: &str) -> Result<Self, ErrorEnvelope> {
        Self::text(JobKind::Parse, sql)
    }

    pub fn deparse(ast: &[u8]) -> Result<Self, ErrorEnvelope> {
        Self::binary(JobKind::Deparse, ast)
    }

    /// Deparse from AST JSON; converted to the binary form before the engine
    /// sees it.
    pub fn deparse_json(json: &str) -> Result<Self, ErrorEnvelope> {
        Self::text(JobKind::Deparse, json)
    }

    pub fn fingerprint(sql: &str) -> Result<Self, ErrorEnvelope> {
        Self::text(JobKind::Fingerprint, sql)
    }

    pub fn parse_plpgsql(sql: &str) -> Result<Self, ErrorEnvelope> {
        Self::text(JobKind::ParsePlpgsql, sql)
    }

    pub fn scan(sql: &str) -> Result<Self, ErrorEnvelope> {
        Self::text(JobKind::Scan, sql)
    }

    pub fn split(sql: &str) -> Result<Self, ErrorEnvelope> {
        Self::text(JobKind::Split, sql)
    }

    pub fn normalize(sql: &str) -> Result<Self, ErrorEnvelope> {
        Self::text(JobKind::Normalize, sql)
    }

    pub fn json_to_ast(json: &str) -> Result<Self, ErrorEnvelope> {
        Self::text(JobKind::JsonToAst, json)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn input(&self) -> &JobInput {
        &self.input
    }

    pub(crate) fn into_parts(self) -> (JobId, JobKind, JobInput) {
        (self.id, self.kind, self.input)
    }
}

/// Decoded scan result, still tied to the text it was scanned from.
#[derive(Debug, PartialEq)]
pub struct ScannedTokens {
    pub version: i32,
    pub tokens: Vec<Token>,
    pub source: String,
}

impl ScannedTokens {
    /// Render the JSON token document.
    pub fn to_json(&self, encoder: &TokenJsonEncoder) -> String {
        encoder.encode(self.version, &self.tokens, &self.source)
    }
}

/// Success payload of a job, shaped by its kind.
#[derive(Debug, PartialEq)]
pub enum Output {
    /// Parse tree JSON, SQL text, fingerprint, PL/pgSQL JSON or normalized SQL.
    Text(String),
    /// Binary AST from a JSON conversion.
    Ast(NativeBuffer),
    Statements(Vec<StatementRange>),
    Scan(ScannedTokens),
}

impl Output {
    fn describe(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Ast(_) => "ast",
            Self::Statements(_) => "statements",
            Self::Scan(_) => "scan",
        }
    }

    pub fn into_text(self) -> Result<String, ErrorEnvelope> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(unexpected_output("text", &other)),
        }
    }

    pub fn into_ast(self) -> Result<NativeBuffer, ErrorEnvelope> {
        match self {
            Self::Ast(ast) => Ok(ast),
            other => Err(unexpected_output("ast", &other)),
        }
    }

    pub fn into_statements(self) -> Result<Vec<StatementRange>, ErrorEnvelope> {
        match self {
            Self::Statements(ranges) => Ok(ranges),
            other => Err(unexpected_output("statements", &other)),
        }
    }

    pub fn into_scan(self) -> Result<ScannedTokens, ErrorEnvelope> {
        match self {
            Self::Scan(scanned) => Ok(scanned),
            other => Err(unexpected_output("scan", &other)),
        }
    }
}

fn unexpected_output(expected: &str, found: &Output) -> ErrorEnvelope {
    ErrorEnvelope::new(
        ErrorKind::Internal,
        format!("expected {expected} output, engine produced {}", found.describe()),
    )
}
