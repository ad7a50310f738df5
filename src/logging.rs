//! Structured JSON-lines logging.
//!
//! Every record carries a run id, a monotonic sequence number, a level and a
//! domain, so a run can be filtered and replayed from its log alone. Records
//! go to stderr; stdout is reserved for the simulation report.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::io::Write;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
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
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Venue,   // Outcome draws, failures
    Agent,   // Balance bookkeeping
    Sim,     // Step loop progress
    System,  // Startup, config, summary
    Profile, // Timing
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Venue => "venue",
            Domain::Agent => "agent",
            Domain::Sim => "sim",
            Domain::System => "system",
            Domain::Profile => "profile",
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
static RUN_ID: OnceLock<String> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

pub fn run_id() -> &'static str {
    RUN_ID.get_or_init(|| {
        std::env::var("RUN_ID").unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()))
    })
}

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let line = Value::Object(build_record(level, domain, event, fields)).to_string();
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "{}", line);
}

fn build_record(level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) -> Map<String, Value> {
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));
    entry
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_run_start(fingerprint: &str, seed: u64, steps: u64, venues: usize, agents: usize) {
    log(
        Level::Info,
        Domain::System,
        "run_start",
        obj(&[
            ("config_hash", v_str(fingerprint)),
            ("seed", json!(seed)),
            ("steps", json!(steps)),
            ("venues", json!(venues)),
            ("agents", json!(agents)),
        ]),
    );
}

pub fn log_venue_failure(venue: usize, risk_param: f64, step: u64, exposed_agents: usize) {
    log(
        Level::Warn,
        Domain::Venue,
        "venue_failed",
        obj(&[
            ("venue", json!(venue)),
            ("risk_param", v_num(risk_param)),
            ("step", json!(step)),
            ("exposed_agents", json!(exposed_agents)),
        ]),
    );
}

pub fn log_step_checkpoint(step: u64, live_venues: usize, mean_capital: f64) {
    log(
        Level::Debug,
        Domain::Sim,
        "checkpoint",
        obj(&[
            ("step", json!(step)),
            ("live_venues", json!(live_venues)),
            ("mean_capital", v_num(mean_capital)),
        ]),
    );
}

pub fn log_agent_final(agent: usize, final_return: f64, max_drawdown: f64) {
    log(
        Level::Trace,
        Domain::Agent,
        "agent_final",
        obj(&[
            ("agent", json!(agent)),
            ("final_return", v_num(final_return)),
            ("max_drawdown", v_num(max_drawdown)),
        ]),
    );
}

pub fn log_run_summary(steps: u64, failed_venues: usize, wiped_agents: usize, best_return: f64, worst_return: f64) {
    log(
        Level::Info,
        Domain::System,
        "run_summary",
        obj(&[
            ("steps", json!(steps)),
            ("failed_venues", json!(failed_venues)),
            ("wiped_agents", json!(wiped_agents)),
            ("best_return", v_num(best_return)),
            ("worst_return", v_num(worst_return)),
        ]),
    );
}

// =============================================================================
// Field helpers
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
