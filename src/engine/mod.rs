//! Boundary to the blocking SQL engine.
//!
//! The [`Engine`] trait is the whole contract the bridge relies on: every call
//! is a pure function of its input that blocks until done and returns a
//! [`NativeResult`] (payload or error record). Calls never panic in a
//! well-behaved engine; the bridge still guards against it.
//!
//! [`PostgresEngine`] is the bundled implementation, built on `sqlparser`
//! with the PostgreSQL dialect.

mod ast;
mod keywords;
mod lexer;
mod postgres;

pub use ast::{AstDocument, RawStmt};
pub use postgres::PostgresEngine;

use serde::{Deserialize, Serialize};

use crate::envelope::{NativeBuffer, NativeResult};

/// Version tag reported in parse trees and scan results.
pub const ENGINE_VERSION: i32 = 170000;

/// Byte range of one statement within a multi-statement input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRange {
    #[serde(rename = "stmt_location")]
    pub location: usize,
    #[serde(rename = "stmt_len")]
    pub length: usize,
}

impl StatementRange {
    pub fn end(&self) -> usize {
        self.location + self.length
    }

    /// The statement text within `input`, if the range fits.
    pub fn slice<'a>(&self, input: &'a str) -> Option<&'a str> {
        input.get(self.location..self.end())
    }
}

/// Payload of a scan: a version tag and the packed token records.
#[derive(Debug)]
pub struct ScanOutput {
    pub version: i32,
    pub tokens: NativeBuffer,
}

/// The external SQL engine.
pub trait Engine: Send + Sync {
    /// One-time setup. Must be idempotent; the bridge calls it when created.
    fn initialize(&self) {}

    /// Parse SQL into a JSON parse tree.
    fn parse(&self, sql: &str) -> NativeResult<String>;

    /// Turn a binary AST back into SQL text.
    fn deparse(&self, ast: &[u8]) -> NativeResult<String>;

    /// Structural fingerprint of a query, ignoring constants and layout.
    fn fingerprint(&self, sql: &str) -> NativeResult<String>;

    /// Parse PL/pgSQL function definitions into JSON.
    fn parse_plpgsql(&self, sql: &str) -> NativeResult<String>;

    /// Lex SQL into packed token records.
    fn scan(&self, sql: &str) -> NativeResult<ScanOutput>;

    /// Byte ranges of each statement.
    fn split(&self, sql: &str) -> NativeResult<Vec<StatementRange>>;

    /// Replace constants with numbered parameters.
    fn normalize(&self, sql: &str) -> NativeResult<String>;

    /// Validate a JSON AST and convert it to the binary form `deparse` takes.
    fn json_to_ast_binary(&self, json: &str) -> NativeResult<NativeBuffer>;
}
