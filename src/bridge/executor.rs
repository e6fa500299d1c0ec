//! Runs jobs against the engine and marshals the results.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, trace, warn};

use super::job::{Job, JobInput, JobKind, Output, ScannedTokens};
use crate::engine::Engine;
use crate::envelope::{ErrorEnvelope, NativeBuffer, ResultEnvelope};
use crate::token;

/// Executes jobs against a shared engine.
///
/// Cheap to clone; clones share the engine. [`run`](Self::run) blocks the
/// calling thread, [`execute`](Self::execute) moves the call onto tokio's
/// blocking pool. Either way the outcome is a [`ResultEnvelope`]: input
/// problems, engine errors and engine panics all arrive as data.
#[derive(Clone)]
pub struct ExecutionBridge {
    engine: Arc<dyn Engine>,
}

impl ExecutionBridge {
    /// Wrap an engine and run its one-time initialization.
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self::from_arc(Arc::new(engine))
    }

    pub fn from_arc(engine: Arc<dyn Engine>) -> Self {
        engine.initialize();
        Self { engine }
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Run `job` on the current thread.
    pub fn run(&self, job: Job) -> ResultEnvelope<Output> {
        let (id, kind, input) = job.into_parts();
        trace!(job = %id, %kind, input_len = input.len(), "running job");

        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(kind, input))) {
            Ok(envelope) => envelope,
            Err(payload) => {
                let detail = panic_detail(payload.as_ref());
                error!(job = %id, %kind, panic = %detail, "engine call panicked");
                ResultEnvelope::Failure(
                    ErrorEnvelope::engine_panicked()
                        .with_function(kind.name())
                        .with_context(detail),
                )
            }
        }
    }

    /// Run `job` on the blocking pool of the current tokio runtime.
    pub async fn execute(&self, job: Job) -> ResultEnvelope<Output> {
        let (id, kind) = (job.id(), job.kind());
        let bridge = self.clone();
        match tokio::task::spawn_blocking(move || bridge.run(job)).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(job = %id, %kind, error = %e, "background execution did not complete");
                ResultEnvelope::Failure(ErrorEnvelope::execution_aborted().with_function(kind.name()))
            }
        }
    }

    /// Run several jobs concurrently, results in submission order.
    pub async fn execute_all<I>(&self, jobs: I) -> Vec<ResultEnvelope<Output>>
    where
        I: IntoIterator<Item = Job>,
    {
        join_all(jobs.into_iter().map(|job| self.execute(job))).await
    }

    fn dispatch(&self, kind: JobKind, input: JobInput) -> ResultEnvelope<Output> {
        match (kind, input) {
            (JobKind::Scan, JobInput::Text(sql)) => self.scan(sql),
            (JobKind::Deparse, JobInput::Ast(ast)) => self.deparse_binary(&ast),
            (JobKind::Deparse, JobInput::Text(json)) => self.deparse_json(&json),
            (JobKind::JsonToAst, JobInput::Text(json)) => match self.json_to_ast(&json) {
                Ok(ast) => ResultEnvelope::Success(Output::Ast(ast)),
                Err(err) => ResultEnvelope::Failure(err),
            },
            (_, JobInput::Text(sql)) if sql.is_empty() => {
                ResultEnvelope::Failure(ErrorEnvelope::empty_query())
            }
            (JobKind::Parse, JobInput::Text(sql)) => {
                ResultEnvelope::from_native(self.engine.parse(&sql)).map(Output::Text)
            }
            (JobKind::Fingerprint, JobInput::Text(sql)) => {
                ResultEnvelope::from_native(self.engine.fingerprint(&sql)).map(Output::Text)
            }
            (JobKind::ParsePlpgsql, JobInput::Text(sql)) => {
                ResultEnvelope::from_native(self.engine.parse_plpgsql(&sql)).map(Output::Text)
            }
            (JobKind::Normalize, JobInput::Text(sql)) => {
                ResultEnvelope::from_native(self.engine.normalize(&sql)).map(Output::Text)
            }
            (JobKind::Split, JobInput::Text(sql)) => {
                ResultEnvelope::from_native(self.engine.split(&sql)).map(Output::Statements)
            }
            (_, JobInput::Ast(_)) => ResultEnvelope::Failure(ErrorEnvelope::input_mismatch()),
        }
    }

    fn deparse_binary(&self, ast: &NativeBuffer) -> ResultEnvelope<Output> {
        if ast.is_empty() {
            return ResultEnvelope::Failure(ErrorEnvelope::empty_ast());
        }
        ResultEnvelope::from_native(self.engine.deparse(ast.as_bytes())).map(Output::Text)
    }

    /// Deparse from JSON. The engine's deparse is only reached when the JSON
    /// converts to a binary AST.
    fn deparse_json(&self, json: &str) -> ResultEnvelope<Output> {
        match self.json_to_ast(json) {
            Ok(ast) => self.deparse_binary(&ast),
            Err(err) => ResultEnvelope::Failure(err),
        }
    }

    fn json_to_ast(&self, json: &str) -> Result<NativeBuffer, ErrorEnvelope> {
        match ResultEnvelope::from_native(self.engine.json_to_ast_binary(json)).into_result() {
            Ok(ast) if !ast.is_empty() => Ok(ast),
            Ok(_) => {
                debug!("AST conversion produced no bytes");
                Err(ErrorEnvelope::ast_format_mismatch())
            }
            Err(err) => {
                debug!(error = %err, "AST JSON rejected");
                Err(ErrorEnvelope::ast_format_mismatch())
            }
        }
    }

    fn scan(&self, sql: String) -> ResultEnvelope<Output> {
        if sql.is_empty() {
            return ResultEnvelope::Success(Output::Scan(ScannedTokens {
                version: 0,
                tokens: Vec::new(),
                source: sql,
            }));
        }
        ResultEnvelope::from_native(self.engine.scan(&sql)).and_then(|scanned| {
            let tokens = token::unpack(scanned.tokens.as_bytes())?;
            Ok(Output::Scan(ScannedTokens {
                version: scanned.version,
                tokens,
                source: sql,
            }))
        })
    }
}

impl std::fmt::Debug for ExecutionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionBridge").finish_non_exhaustive()
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
