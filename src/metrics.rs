use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Operational counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub groups_created: Arc<AtomicU64>,
    pub groups_deleted: Arc<AtomicU64>,
    pub forced_deletes: Arc<AtomicU64>,
    pub deletes_blocked: Arc<AtomicU64>,
    pub reparents_rejected: Arc<AtomicU64>,
    pub characteristics_saved: Arc<AtomicU64>,
    pub exports: Arc<AtomicU64>,
    pub exported_rows: Arc<AtomicU64>,
    pub cache_hits: Arc<AtomicU64>,
    pub cache_misses: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            groups_created: Arc::new(AtomicU64::new(0)),
            groups_deleted: Arc::new(AtomicU64::new(0)),
            forced_deletes: Arc::new(AtomicU64::new(0)),
            deletes_blocked: Arc::new(AtomicU64::new(0)),
            reparents_rejected: Arc::new(AtomicU64::new(0)),
            characteristics_saved: Arc::new(AtomicU64::new(0)),
            exports: Arc::new(AtomicU64::new(0)),
            exported_rows: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_groups_created(&self) {
        self.groups_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_groups_deleted(&self, forced: bool) {
        self.groups_deleted.fetch_add(1, Ordering::Relaxed);
        if forced {
            self.forced_deletes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_deletes_blocked(&self) {
        self.deletes_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reparents_rejected(&self) {
        self.reparents_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_characteristics_saved(&self, count: u64) {
        self.characteristics_saved.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_export(&self, rows: u64) {
        self.exports.fetch_add(1, Ordering::Relaxed);
        self.exported_rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            groups_created: self.groups_created.load(Ordering::Relaxed),
            groups_deleted: self.groups_deleted.load(Ordering::Relaxed),
            forced_deletes: self.forced_deletes.load(Ordering::Relaxed),
            deletes_blocked: self.deletes_blocked.load(Ordering::Relaxed),
            reparents_rejected: self.reparents_rejected.load(Ordering::Relaxed),
            characteristics_saved: self.characteristics_saved.load(Ordering::Relaxed),
            exports: self.exports.load(Ordering::Relaxed),
            exported_rows: self.exported_rows.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub groups_created: u64,
    pub groups_deleted: u64,
    pub forced_deletes: u64,
    pub deletes_blocked: u64,
    pub reparents_rejected: u64,
    pub characteristics_saved: u64,
    pub exports: u64,
    pub exported_rows: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub uptime_seconds: u64,
}
