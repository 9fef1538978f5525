//! Per-connection statement log

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    pub sql: String,
    pub bindings: Vec<Value>,
    pub elapsed: Duration,
}

/// Records executed statements while enabled. Every statement is also
/// emitted as a `tracing` debug event whether or not the log is enabled.
#[derive(Debug, Default)]
pub struct QueryLog {
    enabled: AtomicBool,
    entries: Mutex<Vec<QueryLogEntry>>,
}

impl QueryLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn record(&self, connection: &str, sql: &str, bindings: &[Value], elapsed: Duration) {
        tracing::debug!(
            connection,
            sql,
            bindings = bindings.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Executed statement"
        );

        if !self.is_enabled() {
            return;
        }
        match self.entries.lock() {
            Ok(mut entries) => entries.push(QueryLogEntry {
                sql: sql.to_string(),
                bindings: bindings.to_vec(),
                elapsed,
            }),
            Err(_) => tracing::warn!(connection, "Query log lock poisoned; entry dropped"),
        }
    }

    pub fn entries(&self) -> Vec<QueryLogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return all entries
    pub fn flush(&self) -> Vec<QueryLogEntry> {
        self.entries.lock().map(|mut e| std::mem::take(&mut *e)).unwrap_or_default()
    }
}
