//! The control context: the only place sinks run.

use std::collections::HashMap;

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::error::{BridgeError, BridgeResult};
use super::executor::ExecutionBridge;
use super::job::{Job, JobId, JobKind, Output};
use crate::config::{BridgeSettings, Settings};
use crate::engine::{PostgresEngine, StatementRange};
use crate::envelope::{ErrorEnvelope, NativeBuffer, ResultEnvelope};
use crate::token::TokenJsonEncoder;

/// Delivery target of an asynchronous job.
type Sink = Box<dyn FnOnce(ResultEnvelope<Output>)>;

struct PendingJob {
    kind: JobKind,
    sink: Sink,
}

/// A finished job on its way back to the control context.
struct Delivery {
    id: JobId,
    envelope: ResultEnvelope<Output>,
}

/// Owned by the spawned task; reports the job as aborted if the task is
/// dropped before it delivers, e.g. when the runtime has shut down.
struct DeliveryGuard {
    id: JobId,
    kind: JobKind,
    tx: Option<mpsc::UnboundedSender<Delivery>>,
}

impl DeliveryGuard {
    fn send(&mut self, envelope: ResultEnvelope<Output>) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if tx.send(Delivery { id: self.id, envelope }).is_err() {
            debug!(job = %self.id, kind = %self.kind, "control context closed, dropping result");
        }
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(job = %self.id, kind = %self.kind, "job dropped before completion");
            self.send(ResultEnvelope::Failure(ErrorEnvelope::execution_aborted()));
        }
    }
}

enum Executor {
    Owned(Runtime),
    Borrowed(Handle),
}

impl Executor {
    fn handle(&self) -> &Handle {
        match self {
            Self::Owned(runtime) => runtime.handle(),
            Self::Borrowed(handle) => handle,
        }
    }

    /// A borrowed current-thread runtime only runs tasks inside its own
    /// `block_on`, so a blocking drain here would never see them finish.
    fn can_block(&self) -> bool {
        match self {
            Self::Owned(_) => true,
            Self::Borrowed(handle) => handle.runtime_flavor() != RuntimeFlavor::CurrentThread,
        }
    }
}

/// Single-threaded owner of consumer state and job sinks.
///
/// Asynchronous jobs run on the runtime's blocking pool. Finished jobs are
/// queued back here, and their sinks run only when this context drains the
/// queue via [`dispatch_pending`](Self::dispatch_pending),
/// [`run_until_idle`](Self::run_until_idle) or
/// [`block_until_idle`](Self::block_until_idle). Sinks are never sent to
/// another thread, so they need not be `Send`, and the context itself is
/// `!Send`.
///
/// # Example
///
/// ```ignore
/// let mut ctx = ControlContext::from_settings(&Settings::default())?;
///
/// ctx.fingerprint_async("SELECT * FROM users WHERE id = 7", |result| {
///     println!("{:?}", result.into_result());
/// });
/// ctx.block_until_idle();
/// ```
pub struct ControlContext {
    bridge: ExecutionBridge,
    executor: Executor,
    encoder: TokenJsonEncoder,
    pending: HashMap<JobId, PendingJob>,
    tx: mpsc::UnboundedSender<Delivery>,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl ControlContext {
    /// Create a context with its own multi-threaded runtime.
    ///
    /// Must not be created or dropped from inside another tokio runtime; use
    /// [`with_handle`](Self::with_handle) there instead.
    pub fn new(bridge: ExecutionBridge, settings: &BridgeSettings) -> BridgeResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(settings.worker_threads)
            .max_blocking_threads(settings.max_blocking_threads)
            .thread_name(settings.resolved_thread_name()?)
            .enable_time()
            .build()
            .map_err(BridgeError::RuntimeStart)?;
        debug!(
            worker_threads = settings.worker_threads,
            max_blocking_threads = settings.max_blocking_threads,
            "engine runtime started"
        );
        Ok(Self::with_executor(bridge, Executor::Owned(runtime)))
    }

    /// Create a context that schedules jobs on an existing runtime.
    ///
    /// With a current-thread runtime, drain through
    /// [`run_until_idle`](Self::run_until_idle) from inside that runtime;
    /// [`block_until_idle`](Self::block_until_idle) aborts pending jobs
    /// instead of waiting. Jobs submitted after the runtime shut down are
    /// delivered as aborted.
    pub fn with_handle(bridge: ExecutionBridge, handle: Handle) -> Self {
        Self::with_executor(bridge, Executor::Borrowed(handle))
    }

    /// Create a context around [`PostgresEngine`] from loaded settings.
    pub fn from_settings(settings: &Settings) -> BridgeResult<Self> {
        let bridge = ExecutionBridge::new(PostgresEngine::new());
        Ok(Self::new(bridge, &settings.bridge)?
            .with_encoder(TokenJsonEncoder::from_settings(&settings.encoder)))
    }

    fn with_executor(bridge: ExecutionBridge, executor: Executor) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            bridge,
            executor,
            encoder: TokenJsonEncoder::default(),
            pending: HashMap::new(),
            tx,
            rx,
        }
    }

    pub fn with_encoder(mut self, encoder: TokenJsonEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn bridge(&self) -> &ExecutionBridge {
        &self.bridge
    }

    /// Jobs submitted whose sink has not run yet.
    pub fn pending_jobs(&self) -> usize {
        self.pending.len()
    }

    // =========================================================================
    // Submission and delivery
    // =========================================================================

    /// Submit a job; `sink` runs later on this context with the raw output.
    pub fn submit<F>(&mut self, job: Job, sink: F) -> JobId
    where
        F: FnOnce(ResultEnvelope<Output>) + 'static,
    {
        let (id, kind) = (job.id(), job.kind());
        self.pending.insert(
            id,
            PendingJob {
                kind,
                sink: Box::new(sink),
            },
        );

        let bridge = self.bridge.clone();
        let mut guard = DeliveryGuard {
            id,
            kind,
            tx: Some(self.tx.clone()),
        };
        self.executor.handle().spawn(async move {
            let envelope = bridge.execute(job).await;
            guard.send(envelope);
        });
        trace!(job = %id, %kind, pending = self.pending.len(), "job submitted");
        id
    }

    /// Queue an already-failed job so its sink still runs on the next drain.
    fn reject<F>(&mut self, kind: JobKind, error: ErrorEnvelope, sink: F) -> JobId
    where
        F: FnOnce(ResultEnvelope<Output>) + 'static,
    {
        let id = JobId::new();
        debug!(job = %id, %kind, error = %error, "job rejected before submission");
        self.pending.insert(
            id,
            PendingJob {
                kind,
                sink: Box::new(sink),
            },
        );
        let envelope = ResultEnvelope::Failure(error);
        if let Err(mpsc::error::SendError(delivery)) = self.tx.send(Delivery { id, envelope }) {
            self.deliver(delivery);
        }
        id
    }

    /// Run the sinks of every job that has finished so far. Never blocks.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            if self.deliver(delivery) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Wait for and deliver every pending job.
    pub async fn run_until_idle(&mut self) -> usize {
        let mut delivered = self.dispatch_pending();
        while !self.pending.is_empty() {
            let Some(delivery) = self.rx.recv().await else {
                break;
            };
            if self.deliver(delivery) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Block the current thread until every pending job is delivered.
    ///
    /// On a borrowed current-thread runtime, jobs still pending are delivered
    /// as aborted. Panics if called from within an async context.
    pub fn block_until_idle(&mut self) -> usize {
        let mut delivered = self.dispatch_pending();
        if !self.pending.is_empty() && !self.executor.can_block() {
            warn!(
                pending = self.pending.len(),
                "cannot block on a borrowed current-thread runtime, aborting pending jobs"
            );
            return delivered + self.abort_pending();
        }
        while !self.pending.is_empty() {
            let Some(delivery) = self.rx.blocking_recv() else {
                break;
            };
            if self.deliver(delivery) {
                delivered += 1;
            }
        }
        delivered
    }

    fn abort_pending(&mut self) -> usize {
        let ids: Vec<JobId> = self.pending.keys().copied().collect();
        let mut delivered = 0;
        for id in ids {
            let envelope = ResultEnvelope::Failure(ErrorEnvelope::execution_aborted());
            if self.deliver(Delivery { id, envelope }) {
                delivered += 1;
            }
        }
        delivered
    }

    fn deliver(&mut self, delivery: Delivery) -> bool {
        let Delivery { id, envelope } = delivery;
        match self.pending.remove(&id) {
            Some(PendingJob { kind, sink }) => {
                trace!(job = %id, %kind, success = envelope.is_success(), "delivering result");
                sink(envelope);
                true
            }
            None => {
                warn!(job = %id, "result for unknown job");
                envelope.release();
                false
            }
        }
    }

    // =========================================================================
    // Typed operations
    // =========================================================================

    fn run_with<T>(
        &self,
        job: Result<Job, ErrorEnvelope>,
        convert: impl FnOnce(Output) -> Result<T, ErrorEnvelope>,
    ) -> ResultEnvelope<T> {
        match job {
            Ok(job) => self.bridge.run(job).and_then(convert),
            Err(error) => ResultEnvelope::Failure(error),
        }
    }

    fn submit_with<T, F, C>(
        &mut self,
        kind: JobKind,
        job: Result<Job, ErrorEnvelope>,
        sink: F,
        convert: C,
    ) -> JobId
    where
        F: FnOnce(ResultEnvelope<T>) + 'static,
        C: FnOnce(Output) -> Result<T, ErrorEnvelope> + 'static,
    {
        let typed = move |envelope: ResultEnvelope<Output>| sink(envelope.and_then(convert));
        match job {
            Ok(job) => self.submit(job, typed),
            Err(error) => self.reject(kind, error, typed),
        }
    }

    /// Parse SQL into the JSON parse tree.
    pub fn parse_sync(&self, sql: &str) -> ResultEnvelope<String> {
        self.run_with(Job::parse(sql), Output::into_text)
    }

    pub fn parse_async(
        &mut self,
        sql: &str,
        sink: impl FnOnce(ResultEnvelope<String>) + 'static,
    ) -> JobId {
        self.submit_with(JobKind::Parse, Job::parse(sql), sink, Output::into_text)
    }

    /// Deparse a binary AST into SQL.
    pub fn deparse_sync(&self, ast: &[u8]) -> ResultEnvelope<String> {
        self.run_with(Job::deparse(ast), Output::into_text)
    }

    pub fn deparse_async(
        &mut self,
        ast: &[u8],
        sink: impl FnOnce(ResultEnvelope<String>) + 'static,
    ) -> JobId {
        self.submit_with(JobKind::Deparse, Job::deparse(ast), sink, Output::into_text)
    }

    /// Deparse an AST given as JSON.
    pub fn deparse_json_sync(&self, json: &str) -> ResultEnvelope<String> {
        self.run_with(Job::deparse_json(json), Output::into_text)
    }

    pub fn deparse_json_async(
        &mut self,
        json: &str,
        sink: impl FnOnce(ResultEnvelope<String>) + 'static,
    ) -> JobId {
        self.submit_with(JobKind::Deparse, Job::deparse_json(json), sink, Output::into_text)
    }

    pub fn fingerprint_sync(&self, sql: &str) -> ResultEnvelope<String> {
        self.run_with(Job::fingerprint(sql), Output::into_text)
    }

    pub fn fingerprint_async(
        &mut self,
        sql: &str,
        sink: impl FnOnce(ResultEnvelope<String>) + 'static,
    ) -> JobId {
        self.submit_with(JobKind::Fingerprint, Job::fingerprint(sql), sink, Output::into_text)
    }

    pub fn parse_plpgsql_sync(&self, sql: &str) -> ResultEnvelope<String> {
        self.run_with(Job::parse_plpgsql(sql), Output::into_text)
    }

    pub fn parse_plpgsql_async(
        &mut self,
        sql: &str,
        sink: impl FnOnce(ResultEnvelope<String>) + 'static,
    ) -> JobId {
        self.submit_with(JobKind::ParsePlpgsql, Job::parse_plpgsql(sql), sink, Output::into_text)
    }

    pub fn normalize_sync(&self, sql: &str) -> ResultEnvelope<String> {
        self.run_with(Job::normalize(sql), Output::into_text)
    }

    pub fn normalize_async(
        &mut self,
        sql: &str,
        sink: impl FnOnce(ResultEnvelope<String>) + 'static,
    ) -> JobId {
        self.submit_with(JobKind::Normalize, Job::normalize(sql), sink, Output::into_text)
    }

    /// Scan SQL into the JSON token document.
    pub fn scan_sync(&self, sql: &str) -> ResultEnvelope<String> {
        let encoder = self.encoder;
        self.run_with(Job::scan(sql), move |out| {
            out.into_scan().map(|scanned| scanned.to_json(&encoder))
        })
    }

    /// Scan asynchronously. The token document is encoded on this context,
    /// as part of delivery.
    pub fn scan_async(
        &mut self,
        sql: &str,
        sink: impl FnOnce(ResultEnvelope<String>) + 'static,
    ) -> JobId {
        let encoder = self.encoder;
        self.submit_with(JobKind::Scan, Job::scan(sql), sink, move |out| {
            out.into_scan().map(|scanned| scanned.to_json(&encoder))
        })
    }

    pub fn split_sync(&self, sql: &str) -> ResultEnvelope<Vec<StatementRange>> {
        self.run_with(Job::split(sql), Output::into_statements)
    }

    pub fn split_async(
        &mut self,
        sql: &str,
        sink: impl FnOnce(ResultEnvelope<Vec<StatementRange>>) + 'static,
    ) -> JobId {
        self.submit_with(JobKind::Split, Job::split(sql), sink, Output::into_statements)
    }

    /// Convert AST JSON to the binary form accepted by `deparse`.
    pub fn json_to_ast_sync(&self, json: &str) -> ResultEnvelope<NativeBuffer> {
        self.run_with(Job::json_to_ast(json), Output::into_ast)
    }

    pub fn json_to_ast_async(
        &mut self,
        json: &str,
        sink: impl FnOnce(ResultEnvelope<NativeBuffer>) + 'static,
    ) -> JobId {
        self.submit_with(JobKind::JsonToAst, Job::json_to_ast(json), sink, Output::into_ast)
    }
}

impl std::fmt::Debug for ControlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlContext")
            .field("bridge", &self.bridge)
            .field("encoder", &self.encoder)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
