use crate::db;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use sqlx::Row;

// Liveness check, no storage access
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness check: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response()
        }
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

/// Detailed health: storage round trip, schema completeness, cache and gate usage.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let started = std::time::Instant::now();
    let db_ok = sqlx::query("SELECT 1").fetch_one(&state.db).await.is_ok();
    let latency_ms = started.elapsed().as_millis() as u64;

    let expected: Vec<&str> = db::expected_tables().collect();
    let missing: Vec<&str> = match db::existing_tables(&state.db, &expected).await {
        Ok(present) => {
            expected.iter().copied().filter(|t| !present.iter().any(|p| p == t)).collect()
        }
        Err(e) => {
            tracing::warn!("Schema inspection failed: {}", e);
            expected.clone()
        }
    };

    let status = if !db_ok {
        "error"
    } else if missing.is_empty() {
        "ok"
    } else {
        "degraded"
    };
    let code = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    let body = json!({
        "success": db_ok,
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.metrics.start_time.elapsed().as_secs(),
        "database": { "connected": db_ok, "latency_ms": latency_ms },
        "schema": { "missing_tables": missing },
        "cache": { "enabled": state.cache.is_enabled(), "entries": state.cache.len() },
        "gate": { "capacity": state.gate.capacity(), "available": state.gate.available() },
    });
    (code, Json(body))
}

/// Row counts per expected table; missing tables are reported rather than failing.
pub async fn db_status(State(state): State<AppState>) -> impl IntoResponse {
    let expected: Vec<&str> = db::expected_tables().collect();
    let present = match db::existing_tables(&state.db, &expected).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("db-status failed: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                })),
            );
        }
    };

    let mut tables = Vec::with_capacity(expected.len());
    for table in &expected {
        let exists = present.iter().any(|p| p == table);
        let rows = if exists {
            // Names come from the static schema list, never from the request.
            let sql = format!("SELECT COUNT(*) AS n FROM {}", table);
            sqlx::query(&sql).fetch_one(&state.db).await.ok().map(|r| r.get::<i64, _>("n"))
        } else {
            None
        };
        tables.push(json!({ "table": table, "exists": exists, "rows": rows }));
    }

    let initialized = present.len() == expected.len();
    (StatusCode::OK, Json(json!({ "success": true, "initialized": initialized, "tables": tables })))
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot();
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let counters: [(&str, &str, u64); 10] = [
        ("groups_created", "Characteristic groups created", m.groups_created),
        ("groups_deleted", "Characteristic groups deleted", m.groups_deleted),
        ("forced_deletes", "Forced cascading group deletes", m.forced_deletes),
        ("deletes_blocked", "Group deletes refused by dependents", m.deletes_blocked),
        (
            "reparents_rejected",
            "Re-parent requests rejected by the cycle guard",
            m.reparents_rejected,
        ),
        ("characteristics_saved", "Product characteristic rows written", m.characteristics_saved),
        ("exports", "Export requests served", m.exports),
        ("exported_rows", "Rows written by exports", m.exported_rows),
        ("cache_hits", "Response cache hits", m.cache_hits),
        ("cache_misses", "Response cache misses", m.cache_misses),
    ];

    let mut body = String::new();
    for (name, help, value) in counters {
        body.push_str(&format!(
            "# HELP protez_admin_{name} {help}\n\
             # TYPE protez_admin_{name} counter\n\
             protez_admin_{name} {value}\n"
        ));
    }
    body.push_str(&format!(
        "# HELP protez_admin_uptime_seconds Uptime seconds\n\
         # TYPE protez_admin_uptime_seconds gauge\n\
         protez_admin_uptime_seconds {}\n",
        m.uptime_seconds
    ));
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
