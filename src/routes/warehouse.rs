//! Warehouse settings: a typed key/value store.
//!
//! Each value is kept as text next to its `data_type` (`boolean`, `number` or `string`)
//! and decoded back to JSON on read. An empty table is seeded with the defaults on the
//! first read.

use axum::{extract::State, Json};
use serde_json::{Map, Number, Value};
use sqlx::{Row, SqliteConnection};

use super::ok;
use crate::db::require_tables;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

const TABLE: &str = "warehouse_settings";
const MAX_KEY_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingType {
    Boolean,
    Number,
    String,
}

impl SettingType {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingType::Boolean => "boolean",
            SettingType::Number => "number",
            SettingType::String => "string",
        }
    }

    /// Unknown stored types read as strings.
    pub fn parse(s: &str) -> Self {
        match s {
            "boolean" => SettingType::Boolean,
            "number" => SettingType::Number,
            _ => SettingType::String,
        }
    }
}

pub const DEFAULT_SETTINGS: &[(&str, &str, SettingType)] = &[
    ("auto_reorder_enabled", "false", SettingType::Boolean),
    ("low_stock_threshold", "10", SettingType::Number),
    ("critical_stock_threshold", "5", SettingType::Number),
    ("default_warehouse_capacity", "1000", SettingType::Number),
    ("email_notifications", "true", SettingType::Boolean),
    ("low_stock_alerts", "true", SettingType::Boolean),
    ("movement_notifications", "false", SettingType::Boolean),
    ("daily_reports", "true", SettingType::Boolean),
    ("auto_zone_assignment", "false", SettingType::Boolean),
    ("auto_section_optimization", "false", SettingType::Boolean),
    ("batch_processing_enabled", "true", SettingType::Boolean),
    ("require_confirmation_for_deletion", "true", SettingType::Boolean),
    ("audit_trail_enabled", "true", SettingType::Boolean),
    ("user_activity_tracking", "true", SettingType::Boolean),
    ("cache_analytics_minutes", "15", SettingType::Number),
    ("max_concurrent_operations", "5", SettingType::Number),
    ("enable_background_sync", "true", SettingType::Boolean),
];

/// Stored text for a JSON value. `None` for nulls, arrays and objects.
pub fn encode_setting(value: &Value) -> Option<(String, SettingType)> {
    match value {
        Value::Bool(b) => Some((b.to_string(), SettingType::Boolean)),
        Value::Number(n) => Some((n.to_string(), SettingType::Number)),
        Value::String(s) => Some((s.clone(), SettingType::String)),
        _ => None,
    }
}

/// JSON value for stored text. Unparseable numbers read as 0.
pub fn decode_setting(raw: Option<&str>, kind: SettingType) -> Value {
    let raw = raw.unwrap_or_default();
    match kind {
        SettingType::Boolean => Value::Bool(raw == "true"),
        SettingType::Number => {
            if let Ok(i) = raw.parse::<i64>() {
                Value::from(i)
            } else {
                let float = raw.parse::<f64>().ok().and_then(Number::from_f64);
                float.map(Value::Number).unwrap_or(Value::from(0))
            }
        }
        SettingType::String => Value::String(raw.to_string()),
    }
}

async fn seed_defaults(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let mut seeded = 0;
    for (key, value, kind) in DEFAULT_SETTINGS {
        seeded += sqlx::query(
            "INSERT OR IGNORE INTO warehouse_settings (setting_key, setting_value, data_type) \
             VALUES (?, ?, ?)",
        )
        .bind(*key)
        .bind(*value)
        .bind(kind.as_str())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(seeded)
}

async fn load_settings(state: &AppState) -> AppResult<Map<String, Value>> {
    let rows = sqlx::query(
        "SELECT setting_key, setting_value, data_type FROM warehouse_settings ORDER BY setting_key",
    )
    .fetch_all(&state.db)
    .await?;
    let mut settings = Map::new();
    for row in rows {
        let key: String = row.try_get("setting_key")?;
        let raw: Option<String> = row.try_get("setting_value")?;
        let kind: String = row.try_get("data_type")?;
        settings.insert(key, decode_setting(raw.as_deref(), SettingType::parse(&kind)));
    }
    Ok(settings)
}

pub async fn get_settings(State(state): State<AppState>) -> AppResult<Json<Value>> {
    require_tables(&state.db, &[TABLE]).await?;

    let stored: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM warehouse_settings").fetch_one(&state.db).await?;
    if stored == 0 {
        let mut tx = state.db.begin().await?;
        match seed_defaults(&mut *tx).await {
            Ok(n) => {
                tx.commit().await?;
                tracing::info!("Seeded {} default warehouse settings", n);
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::error!("Rollback of warehouse defaults failed: {}", rb);
                }
                return Err(e.into());
            }
        }
    }

    Ok(ok(load_settings(&state).await?))
}

/// Upserts every key of the body in one transaction; each value's JSON type becomes its
/// stored `data_type`.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> AppResult<Json<Value>> {
    require_tables(&state.db, &[TABLE]).await?;
    if body.is_empty() {
        return Err(AppError::BadRequest("At least one setting is required".to_string()));
    }

    let mut entries = Vec::with_capacity(body.len());
    for (key, value) in &body {
        let key = key.trim();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(AppError::ValidationError {
                field: key.to_string(),
                message: format!("Setting keys must be 1..={} characters", MAX_KEY_LEN),
            });
        }
        let (text, kind) = encode_setting(value).ok_or_else(|| AppError::ValidationError {
            field: key.to_string(),
            message: format!("Setting {} must be a boolean, number or string", key),
        })?;
        entries.push((key.to_string(), text, kind));
    }

    let mut tx = state.db.begin().await?;
    for (key, text, kind) in &entries {
        let res = sqlx::query(
            "INSERT INTO warehouse_settings (setting_key, setting_value, data_type) \
             VALUES (?, ?, ?) \
             ON CONFLICT (setting_key) DO UPDATE SET \
                setting_value = excluded.setting_value, \
                data_type = excluded.data_type, \
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')",
        )
        .bind(key)
        .bind(text)
        .bind(kind.as_str())
        .execute(&mut *tx)
        .await;
        if let Err(e) = res {
            if let Err(rb) = tx.rollback().await {
                tracing::error!("Rollback of warehouse settings failed: {}", rb);
            }
            return Err(e.into());
        }
    }
    tx.commit().await?;

    tracing::info!("Updated {} warehouse setting(s)", entries.len());
    Ok(ok(load_settings(&state).await?))
}
