//! Structured logging for graph compilation and replica simulation.
//!
//! Design goals:
//! 1. Multi-level granularity (TRACE → FATAL)
//! 2. Domain-specific categories for filtering
//! 3. One JSON object per line, replayable by run id and sequence number
//! 4. Audit entries carrying the asset digest of every emitted controller

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Compile,  // Graph generation per component
    Topology, // Self-check results
    Runtime,  // Per-frame transitions
    Replica,  // Success replication and convergence
    Batch,    // Multi-avatar generation
    System,   // Startup, shutdown
    Profile,  // Performance profiling
    Audit,    // Asset digests
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Compile => "compile",
            Domain::Topology => "topology",
            Domain::Runtime => "runtime",
            Domain::Replica => "replica",
            Domain::Batch => "batch",
            Domain::System => "system",
            Domain::Profile => "profile",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }

        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            run_id,
        }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["avatar", "layer", "replica", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(Ok(mut w)) = writer.as_ref().map(|m| m.lock()) {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

/// Unfiltered entry with a free-form component name (used by binaries).
pub fn json_log(module: &str, mut fields: Map<String, Value>) {
    fields.insert("module".to_string(), Value::String(module.to_string()));
    emit_record(Level::Info, module, module, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => {
            write_line(&ctx.events, &line);
            eprintln!("{}", line);
        }
    }
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_component_compiled(avatar: &str, component: &str, layers: usize, states: usize, transitions: usize) {
    log(
        Level::Debug,
        Domain::Compile,
        "component_compiled",
        obj(&[
            ("avatar", v_str(avatar)),
            ("component", v_str(component)),
            ("layers", json!(layers)),
            ("states", json!(states)),
            ("transitions", json!(transitions)),
        ]),
    );
}

pub fn log_config_rejected(avatar: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Compile,
        "config_rejected",
        obj(&[("avatar", v_str(avatar)), ("msg", v_str(reason))]),
    );
}

pub fn log_topology_violation(avatar: &str, violation: &str) {
    log(
        Level::Error,
        Domain::Topology,
        "self_check_failed",
        obj(&[("avatar", v_str(avatar)), ("msg", v_str(violation))]),
    );
}

pub fn log_transition(replica: &str, layer: &str, from: &str, to: &str, label: &str) {
    log(
        Level::Trace,
        Domain::Runtime,
        "transition",
        obj(&[
            ("replica", v_str(replica)),
            ("layer", v_str(layer)),
            ("from", v_str(from)),
            ("to", v_str(to)),
            ("label", v_str(label)),
        ]),
    );
}

pub fn log_dropped_write(replica: &str, layer: &str, param: &str) {
    log(
        Level::Warn,
        Domain::Runtime,
        "dropped_write",
        obj(&[
            ("replica", v_str(replica)),
            ("layer", v_str(layer)),
            ("param", v_str(param)),
        ]),
    );
}

pub fn log_weight_ignored(replica: &str, target: usize, layers: usize) {
    log(
        Level::Warn,
        Domain::Runtime,
        "weight_target_ignored",
        obj(&[
            ("replica", v_str(replica)),
            ("target", json!(target)),
            ("layers", json!(layers)),
        ]),
    );
}

pub fn log_success_published(frame: u64, deliver_at: u64) {
    log(
        Level::Debug,
        Domain::Replica,
        "success_published",
        obj(&[("frame", json!(frame)), ("deliver_at", json!(deliver_at))]),
    );
}

pub fn log_success_delivered(replica: &str, frame: u64) {
    log(
        Level::Debug,
        Domain::Replica,
        "success_delivered",
        obj(&[("replica", v_str(replica)), ("frame", json!(frame))]),
    );
}

pub fn log_batch_summary(total: usize, built: usize, disabled: usize, failed: usize) {
    log(
        Level::Info,
        Domain::Batch,
        "batch_summary",
        obj(&[
            ("total", json!(total)),
            ("built", json!(built)),
            ("disabled", json!(disabled)),
            ("failed", json!(failed)),
        ]),
    );
}

pub fn log_asset_digest(avatar: &str, digest: &str, states: usize, transitions: usize) {
    log(
        Level::Info,
        Domain::Audit,
        "asset_digest",
        obj(&[
            ("avatar", v_str(avatar)),
            ("sha256", v_str(digest)),
            ("states", json!(states)),
            ("transitions", json!(transitions)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
    enabled: bool,
}

impl ProfileScope {
    pub fn new(label: &'static str) -> Self {
        Self::with_context(label, &[])
    }

    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        let enabled = Self::should_sample();
        Self {
            label,
            context: if enabled { Some(obj(fields)) } else { None },
            started: Instant::now(),
            enabled,
        }
    }

    fn should_sample() -> bool {
        std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|p| {
                if p >= 1.0 {
                    true
                } else if p <= 0.0 {
                    false
                } else {
                    let seq = PROFILE_SEQ.fetch_add(1, Ordering::SeqCst);
                    let bucket = (seq % 10_000) as f64 / 10_000.0;
                    bucket < p
                }
            })
            .unwrap_or(true)
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================
