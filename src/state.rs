use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::characteristics::cascade::DeletePolicy;
use crate::config::AppConfig;
use crate::gate::StorageGate;
use crate::metrics::Metrics;

/// The shared application state.
///
/// Cloned into every handler by axum; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The SQLite connection pool.
    pub db: sqlx::SqlitePool,
    pub config: Arc<AppConfig>,
    pub metrics: Metrics,
    /// JSON responses of tree and listing endpoints, invalidated by writers.
    pub cache: ResponseCache,
    /// Caps concurrent storage calls issued by batch operations.
    pub gate: StorageGate,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let cache = ResponseCache::from_config(&config.cache);
        let gate = StorageGate::new(config.gate.db_permits);
        Self { db, config: Arc::new(config), metrics: Metrics::new(), cache, gate }
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::from_config(&self.config.catalog)
    }

    /// Drops cached responses matching each pattern. Bad patterns are logged, not fatal.
    pub fn invalidate(&self, patterns: &[&str]) {
        for pattern in patterns {
            match self.cache.clear(pattern) {
                Ok(n) if n > 0 => {
                    tracing::debug!("Invalidated {} cached entries for {}", n, pattern)
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Invalid cache pattern {}: {}", pattern, e),
            }
        }
    }
}
