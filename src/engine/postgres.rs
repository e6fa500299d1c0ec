//! [`Engine`] implementation on `sqlparser`'s PostgreSQL dialect.

use std::ops::ControlFlow;
use std::sync::{LazyLock, OnceLock};

use regex::Regex;
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlparser::ast::{visit_expressions, visit_expressions_mut, Expr, Statement, Value};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;
use tracing::{debug, trace};

use super::ast::AstDocument;
use super::keywords::KeywordTable;
use super::lexer::{self, Lexeme, LineIndex};
use super::{Engine, ScanOutput, StatementRange, ENGINE_VERSION};
use crate::envelope::{NativeBuffer, NativeError, NativeResult};
use crate::token::{self, KeywordClass, RawToken, TokenClass};

/// Location suffix `sqlparser` appends to its error messages.
static LOCATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Line: (\d+), Column: (\d+)").unwrap());

const PARSER_ERROR_PREFIX: &str = "sql parser error: ";

/// PostgreSQL engine backed by `sqlparser`.
///
/// Stateless apart from the keyword table, which is built on first use (or
/// by [`Engine::initialize`]) and shared by all worker threads afterwards.
#[derive(Debug, Default)]
pub struct PostgresEngine {
    keywords: OnceLock<KeywordTable>,
}

impl PostgresEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn keywords(&self) -> &KeywordTable {
        self.keywords.get_or_init(KeywordTable::postgres)
    }

    fn parse_statements(&self, stage: &str, sql: &str) -> Result<Vec<Statement>, NativeError> {
        Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| located_error(stage, sql, &e.to_string()))
    }

    fn lex(&self, stage: &str, sql: &str) -> Result<Vec<Lexeme>, NativeError> {
        lexer::lex(sql, self.keywords()).map_err(|e| located_error(stage, sql, &e.to_string()))
    }

    fn parse_json(&self, sql: &str) -> Result<String, NativeError> {
        let statements = self.parse_statements("parse", sql)?;
        let ranges = lexer::lex(sql, self.keywords())
            .map(|lexemes| lexer::statement_ranges(&lexemes))
            .unwrap_or_default();
        let document = AstDocument::new(ENGINE_VERSION, statements, &ranges);
        serde_json::to_string(&document).map_err(|e| {
            NativeError::new(format!("failed to serialize parse tree: {e}")).in_function("parse")
        })
    }

    fn deparse_binary(&self, ast: &[u8]) -> Result<String, NativeError> {
        let document = AstDocument::from_binary(ast).map_err(|e| {
            NativeError::new(format!("failed to decode AST: {e}")).in_function("deparse")
        })?;
        Ok(document.to_sql())
    }

    fn fingerprint_hex(&self, sql: &str) -> Result<String, NativeError> {
        self.parse_statements("fingerprint", sql)?;
        let lexemes = self.lex("fingerprint", sql)?;

        let mut hasher = Sha256::new();
        let significant = lexemes
            .iter()
            .filter(|l| !l.is_comment() && l.class != TokenClass::Semicolon);
        for (i, lexeme) in significant.enumerate() {
            if i > 0 {
                hasher.update(b" ");
            }
            hasher.update(fingerprint_text(lexeme).as_bytes());
        }
        let digest = hasher.finalize();
        Ok(digest[..8].iter().map(|b| format!("{b:02x}")).collect())
    }

    fn plpgsql_functions(&self, sql: &str) -> Result<String, NativeError> {
        let statements = self.parse_statements("parse_plpgsql", sql)?;
        let mut functions = Vec::new();
        for statement in statements
            .iter()
            .filter(|s| matches!(s, Statement::CreateFunction { .. }))
        {
            let value = serde_json::to_value(statement).map_err(|e| {
                NativeError::new(format!("failed to serialize function: {e}"))
                    .in_function("parse_plpgsql")
            })?;
            let Some(def) = value.get("CreateFunction") else {
                continue;
            };
            functions.push(json!({
                "PLpgSQL_function": {
                    "name": def["name"].clone(),
                    "args": def["args"].clone(),
                    "return_type": def["return_type"].clone(),
                    "language": def["language"].clone(),
                    "body": def["function_body"].clone(),
                }
            }));
        }
        serde_json::to_string(&functions).map_err(|e| {
            NativeError::new(format!("failed to serialize functions: {e}")).in_function("parse_plpgsql")
        })
    }

    fn scan_tokens(&self, sql: &str) -> Result<ScanOutput, NativeError> {
        let lexemes = lexer::lex(sql, self.keywords()).unwrap_or_else(|e| {
            debug!(error = %e, "tokenizer rejected scan input, reporting no tokens");
            Vec::new()
        });
        let raw: Vec<RawToken> = lexemes.iter().map(Lexeme::to_raw).collect();
        let packed = token::pack(&raw).map_err(|e| {
            NativeError::new(format!("failed to pack tokens: {e}")).in_function("scan")
        })?;
        Ok(ScanOutput {
            version: ENGINE_VERSION,
            tokens: NativeBuffer::from(packed),
        })
    }

    fn split_ranges(&self, sql: &str) -> Result<Vec<StatementRange>, NativeError> {
        self.parse_statements("split", sql)?;
        let lexemes = self.lex("split", sql)?;
        Ok(lexer::statement_ranges(&lexemes))
    }

    fn normalize_constants(&self, sql: &str) -> Result<String, NativeError> {
        let mut statements = self.parse_statements("normalize", sql)?;

        let mut next = 0usize;
        // neither visitor breaks, so both always return Continue
        let _: ControlFlow<()> = visit_expressions(&statements, |expr| {
            if let Expr::Value(Value::Placeholder(name)) = expr {
                if let Some(n) = name.strip_prefix('$').and_then(|d| d.parse::<usize>().ok()) {
                    next = next.max(n);
                }
            }
            ControlFlow::Continue(())
        });

        let _: ControlFlow<()> = visit_expressions_mut(&mut statements, |expr| {
            if let Expr::Value(value) = expr {
                if !matches!(value, Value::Null | Value::Placeholder(_)) {
                    next += 1;
                    *value = Value::Placeholder(format!("${next}"));
                }
            }
            ControlFlow::Continue(())
        });

        Ok(statements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "))
    }

    fn ast_from_json(&self, json: &str) -> Result<NativeBuffer, NativeError> {
        let document: AstDocument = serde_json::from_str(json).map_err(|e| {
            NativeError::new(format!("failed to read AST JSON: {e}")).in_function("json_to_ast")
        })?;
        let binary = document.to_binary().map_err(|e| {
            NativeError::new(format!("failed to encode AST: {e}")).in_function("json_to_ast")
        })?;
        Ok(NativeBuffer::from(binary))
    }
}

impl Engine for PostgresEngine {
    fn initialize(&self) {
        let table = self.keywords();
        trace!(keywords = table.len(), "postgres engine initialized");
    }

    fn parse(&self, sql: &str) -> NativeResult<String> {
        self.parse_json(sql).into()
    }

    fn deparse(&self, ast: &[u8]) -> NativeResult<String> {
        self.deparse_binary(ast).into()
    }

    fn fingerprint(&self, sql: &str) -> NativeResult<String> {
        self.fingerprint_hex(sql).into()
    }

    fn parse_plpgsql(&self, sql: &str) -> NativeResult<String> {
        self.plpgsql_functions(sql).into()
    }

    fn scan(&self, sql: &str) -> NativeResult<ScanOutput> {
        self.scan_tokens(sql).into()
    }

    fn split(&self, sql: &str) -> NativeResult<Vec<StatementRange>> {
        self.split_ranges(sql).into()
    }

    fn normalize(&self, sql: &str) -> NativeResult<String> {
        self.normalize_constants(sql).into()
    }

    fn json_to_ast_binary(&self, json: &str) -> NativeResult<NativeBuffer> {
        self.ast_from_json(json).into()
    }
}

/// Engine error for a failed stage, with the cursor taken from the
/// `Line: L, Column: C` suffix when present.
fn located_error(stage: &str, sql: &str, raw: &str) -> NativeError {
    let message = raw.strip_prefix(PARSER_ERROR_PREFIX).unwrap_or(raw).to_string();
    let cursorpos = LOCATION_PATTERN
        .captures(&message)
        .and_then(|caps| {
            let line = caps[1].parse::<u64>().ok()?;
            let column = caps[2].parse::<u64>().ok()?;
            (line > 0 && column > 0).then(|| LineIndex::new(sql).char_position(line, column))
        })
        .map_or(0, |pos| i32::try_from(pos).unwrap_or(i32::MAX));

    NativeError {
        message,
        cursorpos,
        ..NativeError::default()
    }
    .in_function(stage)
}

fn fingerprint_text(lexeme: &Lexeme) -> String {
    if lexeme.class.is_constant() || lexeme.class == TokenClass::Param {
        return "?".to_string();
    }
    match &lexeme.token {
        Token::Word(word) if word.quote_style.is_none() => {
            if lexeme.keyword == KeywordClass::None {
                word.value.to_lowercase()
            } else {
                word.value.to_uppercase()
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PostgresEngine {
        let engine = PostgresEngine::new();
        engine.initialize();
        engine
    }

    #[test]
    fn test_parse_error_position() {
        let result = engine().parse("NOT A QUERY");
        let err = result.error.unwrap();
        assert!(err.message.contains("NOT"));
        assert!(!err.message.starts_with(PARSER_ERROR_PREFIX));
        assert_eq!(err.funcname.as_deref(), Some("parse"));
        assert_eq!(err.filename, None);
        assert_eq!(err.lineno, 0);
        assert_eq!(err.cursorpos, 1);
    }

    #[test]
    fn test_error_position_on_second_line() {
        let err = engine().split("SELECT 1;\nNOT A QUERY").error.unwrap();
        assert_eq!(err.cursorpos, 11);
    }

    #[test]
    fn test_normalize_continues_numbering() {
        let result = engine().normalize("SELECT * FROM t WHERE a = $1 AND b = 2 AND c = 'x'");
        assert_eq!(
            result.payload.unwrap(),
            "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $3"
        );
    }

    #[test]
    fn test_normalize_leaves_null() {
        let result = engine().normalize("SELECT NULL, 7");
        assert_eq!(result.payload.unwrap(), "SELECT NULL, $1");
    }

    #[test]
    fn test_fingerprint_ignores_case_layout_and_constants() {
        let engine = engine();
        let a = engine.fingerprint("select * from users where id = 123").payload.unwrap();
        let b = engine
            .fingerprint("SELECT *\n  FROM Users -- lookup\n WHERE id = 456;")
            .payload
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let c = engine.fingerprint("select id from customers").payload.unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_scan_unterminated_string_is_empty() {
        let output = engine().scan("SELECT 'abc").payload.unwrap();
        assert_eq!(output.version, ENGINE_VERSION);
        assert!(token::unpack(output.tokens.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_plpgsql_extracts_functions() {
        let sql = "CREATE FUNCTION add_one(i integer) RETURNS integer AS $$ BEGIN RETURN i + 1; END; $$ LANGUAGE plpgsql";
        let json = engine().parse_plpgsql(sql).payload.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let functions = value.as_array().unwrap();
        assert_eq!(functions.len(), 1);
        assert!(functions[0].get("PLpgSQL_function").is_some());
    }

    #[test]
    fn test_plpgsql_without_functions() {
        assert_eq!(engine().parse_plpgsql("SELECT 1").payload.unwrap(), "[]");
    }

    #[test]
    fn test_json_to_ast_rejects_foreign_json() {
        let result = engine().json_to_ast_binary(r#"{"hello":"world"}"#);
        assert!(result.is_error());
        assert_eq!(result.error.unwrap().funcname.as_deref(), Some("json_to_ast"));
    }
}
