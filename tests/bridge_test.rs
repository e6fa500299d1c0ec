//! Asynchronous delivery through the control context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use querybridge::bridge::{ControlContext, ExecutionBridge, Job, JobId};
use querybridge::config::BridgeSettings;
use querybridge::engine::{Engine, PostgresEngine, ScanOutput, StatementRange};
use querybridge::envelope::{
    NativeBuffer, NativeResult, ResultEnvelope, AST_FORMAT_MISMATCH, ENGINE_PANICKED,
    EXECUTION_ABORTED,
};
use querybridge::token::EMPTY_DOCUMENT;
use tokio::runtime::{Builder, Handle};

/// Delegates to PostgresEngine and counts calls per operation.
#[derive(Default)]
struct CountingEngine {
    inner: PostgresEngine,
    deparse_calls: AtomicUsize,
    init_calls: AtomicUsize,
}

impl Engine for CountingEngine {
    fn initialize(&self) {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.initialize();
    }
    fn parse(&self, sql: &str) -> NativeResult<String> {
        self.inner.parse(sql)
    }
    fn deparse(&self, ast: &[u8]) -> NativeResult<String> {
        self.deparse_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.deparse(ast)
    }
    fn fingerprint(&self, sql: &str) -> NativeResult<String> {
        self.inner.fingerprint(sql)
    }
    fn parse_plpgsql(&self, sql: &str) -> NativeResult<String> {
        self.inner.parse_plpgsql(sql)
    }
    fn scan(&self, sql: &str) -> NativeResult<ScanOutput> {
        self.inner.scan(sql)
    }
    fn split(&self, sql: &str) -> NativeResult<Vec<StatementRange>> {
        self.inner.split(sql)
    }
    fn normalize(&self, sql: &str) -> NativeResult<String> {
        if sql.contains("boom") {
            panic!("normalizer exploded");
        }
        self.inner.normalize(sql)
    }
    fn json_to_ast_binary(&self, json: &str) -> NativeResult<NativeBuffer> {
        self.inner.json_to_ast_binary(json)
    }
}

fn context() -> ControlContext {
    ControlContext::with_handle(ExecutionBridge::new(PostgresEngine::new()), Handle::current())
}

#[tokio::test]
async fn test_each_sink_runs_once_on_control_thread() {
    let mut ctx = context();
    let control_thread = thread::current().id();
    let delivered: Rc<RefCell<HashMap<JobId, Vec<Result<String, String>>>>> = Rc::default();

    let queries: Vec<String> = (0..32)
        .map(|i| format!("SELECT col_{i} FROM table_{i} WHERE id = {i}"))
        .collect();

    let mut submitted = Vec::new();
    for sql in &queries {
        let seen = Rc::clone(&delivered);
        let id_slot = Rc::new(RefCell::new(None::<JobId>));
        let id_for_sink = Rc::clone(&id_slot);
        let id = ctx.normalize_async(sql, move |result| {
            assert_eq!(thread::current().id(), control_thread);
            let id = id_for_sink.borrow().expect("id recorded before delivery");
            seen.borrow_mut()
                .entry(id)
                .or_default()
                .push(result.into_result().map_err(|e| e.message));
        });
        *id_slot.borrow_mut() = Some(id);
        submitted.push((id, sql.clone()));
    }

    assert_eq!(ctx.pending_jobs(), queries.len());
    assert_eq!(ctx.run_until_idle().await, queries.len());
    assert_eq!(ctx.pending_jobs(), 0);

    let delivered = delivered.borrow();
    assert_eq!(delivered.len(), queries.len());
    for (id, sql) in submitted {
        let results = &delivered[&id];
        assert_eq!(results.len(), 1);
        let sync = ctx.normalize_sync(&sql).into_result().map_err(|e| e.message);
        assert_eq!(results[0], sync);
    }
}

#[tokio::test]
async fn test_async_matches_sync_for_every_operation() {
    let mut ctx = context();
    let sql = "SELECT a FROM t WHERE b = 'x'; SELECT 2";
    let results: Rc<RefCell<Vec<(&'static str, String)>>> = Rc::default();

    let push = |name: &'static str| {
        let results = Rc::clone(&results);
        move |env: ResultEnvelope<String>| {
            results.borrow_mut().push((name, env.into_result().unwrap()));
        }
    };
    ctx.parse_async(sql, push("parse"));
    ctx.fingerprint_async(sql, push("fingerprint"));
    ctx.normalize_async(sql, push("normalize"));
    ctx.scan_async(sql, push("scan"));
    ctx.parse_plpgsql_async(sql, push("plpgsql"));
    ctx.run_until_idle().await;

    let mut results = results.borrow().clone();
    results.sort();
    let expected = |name: &str| match name {
        "parse" => ctx.parse_sync(sql),
        "fingerprint" => ctx.fingerprint_sync(sql),
        "normalize" => ctx.normalize_sync(sql),
        "scan" => ctx.scan_sync(sql),
        _ => ctx.parse_plpgsql_sync(sql),
    };
    assert_eq!(results.len(), 5);
    for (name, value) in results {
        assert_eq!(value, expected(name).into_result().unwrap(), "{name}");
    }
}

#[tokio::test]
async fn test_split_async() {
    let mut ctx = context();
    let ranges = Rc::new(RefCell::new(Vec::new()));
    let slot = Rc::clone(&ranges);
    ctx.split_async("SELECT 1; SELECT 2; SELECT 3;", move |env| {
        *slot.borrow_mut() = env.into_result().unwrap();
    });
    ctx.run_until_idle().await;
    assert_eq!(ranges.borrow().len(), 3);
}

#[tokio::test]
async fn test_malformed_json_never_reaches_deparse() {
    let engine = Arc::new(CountingEngine::default());
    let bridge = ExecutionBridge::from_arc(engine.clone());
    let mut ctx = ControlContext::with_handle(bridge, Handle::current());

    let messages = Rc::new(RefCell::new(Vec::new()));
    for json in ["", "{not json", r#"{"version":170000,"stmts":[{"stmt":42}]}"#] {
        let slot = Rc::clone(&messages);
        ctx.deparse_json_async(json, move |env| {
            let err = env.into_result().unwrap_err();
            assert_eq!(err.function_name, None);
            assert_eq!(err.file_name, None);
            slot.borrow_mut().push(err.message);
        });
    }
    ctx.run_until_idle().await;

    let sync = ctx.deparse_json_sync("[]").into_result().unwrap_err();
    assert_eq!(sync.message, AST_FORMAT_MISMATCH);

    assert_eq!(*messages.borrow(), vec![AST_FORMAT_MISMATCH.to_string(); 3]);
    assert_eq!(engine.deparse_calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.init_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_valid_json_deparses() {
    let mut ctx = context();
    let tree = ctx.parse_sync("select a from t").into_result().unwrap();
    let sql = Rc::new(RefCell::new(String::new()));
    let slot = Rc::clone(&sql);
    ctx.deparse_json_async(&tree, move |env| *slot.borrow_mut() = env.into_result().unwrap());
    ctx.run_until_idle().await;
    assert_eq!(*sql.borrow(), "SELECT a FROM t");

    let binary = ctx.json_to_ast_sync(&tree).into_result().unwrap();
    assert_eq!(ctx.deparse_sync(binary.as_bytes()).into_result().unwrap(), "SELECT a FROM t");
}

#[tokio::test]
async fn test_scan_of_empty_or_unterminated_input_is_empty_document() {
    let mut ctx = context();
    let docs = Rc::new(RefCell::new(Vec::new()));
    for sql in ["", "SELECT 'never closed", "/* open comment"] {
        let slot = Rc::clone(&docs);
        ctx.scan_async(sql, move |env| slot.borrow_mut().push(env.into_result().unwrap()));
        assert_eq!(ctx.scan_sync(sql).into_result().unwrap(), EMPTY_DOCUMENT);
    }
    ctx.run_until_idle().await;
    assert_eq!(*docs.borrow(), vec![EMPTY_DOCUMENT.to_string(); 3]);
}

#[tokio::test]
async fn test_engine_panic_is_delivered_as_error() {
    let bridge = ExecutionBridge::new(CountingEngine::default());
    let mut ctx = ControlContext::with_handle(bridge, Handle::current());
    let message = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&message);
    ctx.normalize_async("SELECT 'boom'", move |env| {
        *slot.borrow_mut() = Some(env.into_result().unwrap_err().message);
    });
    ctx.run_until_idle().await;
    assert_eq!(message.borrow().as_deref(), Some(ENGINE_PANICKED));

    // the bridge keeps working afterwards
    assert!(ctx.normalize_sync("SELECT 1").is_success());
}

#[tokio::test]
async fn test_dispatch_pending_does_not_block() {
    let mut ctx = context();
    assert_eq!(ctx.dispatch_pending(), 0);
    ctx.fingerprint_async("SELECT 1", |env| env.release());
    let mut delivered = 0;
    while delivered == 0 {
        tokio::task::yield_now().await;
        delivered = ctx.dispatch_pending();
    }
    assert_eq!(delivered, 1);
    assert_eq!(ctx.pending_jobs(), 0);
}

#[test]
fn test_owned_runtime_blocking_drain() {
    let settings = BridgeSettings {
        worker_threads: 1,
        max_blocking_threads: 4,
        ..BridgeSettings::default()
    };
    let mut ctx = ControlContext::new(ExecutionBridge::new(PostgresEngine::new()), &settings).unwrap();
    let control_thread = thread::current().id();
    let count = Rc::new(RefCell::new(0));
    for i in 0..8 {
        let count = Rc::clone(&count);
        ctx.fingerprint_async(&format!("SELECT {i}"), move |env| {
            assert_eq!(thread::current().id(), control_thread);
            assert!(env.is_success());
            *count.borrow_mut() += 1;
        });
    }
    assert_eq!(ctx.block_until_idle(), 8);
    assert_eq!(*count.borrow(), 8);
}

#[tokio::test]
async fn test_bridge_execute_without_control_context() {
    let bridge = ExecutionBridge::new(PostgresEngine::new());
    let envelope = bridge.execute(Job::parse("SELECT 1").unwrap()).await;
    assert!(envelope.is_success());
    envelope.release();
}

fn aborted_message(ctx: &mut ControlContext) -> Rc<RefCell<Option<String>>> {
    let message = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&message);
    ctx.fingerprint_async("SELECT 1", move |env| {
        *slot.borrow_mut() = Some(env.into_result().unwrap_err().message);
    });
    message
}

#[test]
fn test_submit_after_runtime_shutdown_is_aborted() {
    let runtime = Builder::new_multi_thread().worker_threads(1).build().unwrap();
    let handle = runtime.handle().clone();
    drop(runtime);

    let mut ctx = ControlContext::with_handle(ExecutionBridge::new(PostgresEngine::new()), handle);
    let message = aborted_message(&mut ctx);
    assert_eq!(ctx.block_until_idle(), 1);
    assert_eq!(ctx.pending_jobs(), 0);
    assert_eq!(message.borrow().as_deref(), Some(EXECUTION_ABORTED));
}

#[test]
fn test_blocking_drain_on_idle_current_thread_runtime_is_aborted() {
    let runtime = Builder::new_current_thread().build().unwrap();
    let mut ctx = ControlContext::with_handle(
        ExecutionBridge::new(PostgresEngine::new()),
        runtime.handle().clone(),
    );
    let message = aborted_message(&mut ctx);
    assert_eq!(ctx.block_until_idle(), 1);
    assert_eq!(ctx.pending_jobs(), 0);
    assert_eq!(message.borrow().as_deref(), Some(EXECUTION_ABORTED));
}
