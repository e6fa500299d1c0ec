//! Parse tree document exchanged as JSON (parse output, deparse input) and
//! as `bincode` bytes (the binary AST).

use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;

use super::StatementRange;

/// A parsed input: version tag plus its statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstDocument {
    pub version: i32,
    pub stmts: Vec<RawStmt>,
}

/// One statement and where it sits in the source text.
///
/// `stmt_len == 0` means the location is unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStmt {
    pub stmt: Statement,
    pub stmt_location: u32,
    pub stmt_len: u32,
}

impl AstDocument {
    /// Pair statements with their source ranges. Ranges are dropped when the
    /// counts disagree rather than guessing which statement goes where.
    pub fn new(version: i32, statements: Vec<Statement>, ranges: &[StatementRange]) -> Self {
        let located = statements.len() == ranges.len();
        let stmts = statements
            .into_iter()
            .enumerate()
            .map(|(i, stmt)| {
                let (stmt_location, stmt_len) = match ranges.get(i) {
                    Some(range) if located => (to_u32(range.location), to_u32(range.length)),
                    _ => (0, 0),
                };
                RawStmt {
                    stmt,
                    stmt_location,
                    stmt_len,
                }
            })
            .collect();
        Self { version, stmts }
    }

    pub fn to_binary(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Render the statements back to SQL, separated by `"; "`.
    pub fn to_sql(&self) -> String {
        self.stmts
            .iter()
            .map(|raw| raw.stmt.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
