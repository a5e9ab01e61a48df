use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use cabletrace_engine::AutoConnectOutcome;

use crate::state::{new_state, Shared};

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub memory_usage_mb: f32,
    pub storage: String,
    pub runs_total: u64,
    pub runs_failed: u64,
    pub connections_created: u64,
    pub map_rows_created: u64,
    pub row_failures: u64,
    pub last_run_at: Option<String>,
}

/// Compteurs des invocations auto-connect depuis le démarrage
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    storage: String,
    runs_total: Arc<AtomicU64>,
    runs_failed: Arc<AtomicU64>,
    connections_created: Arc<AtomicU64>,
    map_rows_created: Arc<AtomicU64>,
    row_failures: Arc<AtomicU64>,
    last_run_at: Shared<Option<OffsetDateTime>>,
}

impl HealthTracker {
    pub fn new(storage: impl Into<String>) -> Self {
        Self {
            start_time: Instant::now(),
            storage: storage.into(),
            runs_total: Arc::new(AtomicU64::new(0)),
            runs_failed: Arc::new(AtomicU64::new(0)),
            connections_created: Arc::new(AtomicU64::new(0)),
            map_rows_created: Arc::new(AtomicU64::new(0)),
            row_failures: Arc::new(AtomicU64::new(0)),
            last_run_at: new_state(None),
        }
    }

    pub fn record_run(&self, outcome: &AutoConnectOutcome) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
        self.connections_created.fetch_add(outcome.connections.len() as u64, Ordering::Relaxed);
        self.map_rows_created.fetch_add(outcome.map_rows.len() as u64, Ordering::Relaxed);
        self.row_failures.fetch_add(outcome.failures.len() as u64, Ordering::Relaxed);
        *self.last_run_at.lock() = Some(outcome.started_at);
    }

    /// Invocation interrompue par une erreur de store
    pub fn record_failed_run(&self) {
        self.runs_total.fetch_add(1, Ordering::Relaxed);
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        *self.last_run_at.lock() = Some(OffsetDateTime::now_utc());
    }

    pub fn get_health(&self) -> KernelHealth {
        let last_run = *self.last_run_at.lock();
        let last_run_at = last_run.and_then(|at| at.format(&Rfc3339).ok());

        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            memory_usage_mb: get_memory_usage_mb(),
            storage: self.storage.clone(),
            runs_total: self.runs_total.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            connections_created: self.connections_created.load(Ordering::Relaxed),
            map_rows_created: self.map_rows_created.load(Ordering::Relaxed),
            row_failures: self.row_failures.load(Ordering::Relaxed),
            last_run_at,
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }

    // approximation hors Linux
    12.0
}
