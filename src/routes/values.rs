use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use sqlx::Row;

use super::{keys, ok};
use crate::characteristics::store::{self, ValueRow};
use crate::error::{
    validation::{require_name, validate_color_hex},
    AppError, AppResult, OptionExt,
};
use crate::state::AppState;
use crate::types::{GroupIdQuery, ValueCreate, ValueUpdate};

async fn fetch_value(state: &AppState, id: i64) -> AppResult<ValueRow> {
    sqlx::query_as::<_, ValueRow>(
        "SELECT id, group_id, value, display_name, color_hex, sort_order, is_active, \
         created_at, updated_at \
         FROM characteristic_values WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_not_found("Characteristic value")
}

pub async fn list_values(
    State(state): State<AppState>,
    Query(q): Query<GroupIdQuery>,
) -> AppResult<Json<Value>> {
    let values = store::load_values(&state.db, q.group_id).await?;
    Ok(Json(json!({ "success": true, "total": values.len(), "data": values })))
}

pub async fn create_value(
    State(state): State<AppState>,
    Json(req): Json<ValueCreate>,
) -> AppResult<impl IntoResponse> {
    let group_id = req.group_id.ok_or_else(|| AppError::required("group_id"))?;
    let value = require_name(req.value.as_deref(), "value")?;
    validate_color_hex(req.color_hex.as_deref(), "color_hex")?;

    let group_exists = sqlx::query("SELECT 1 FROM characteristic_groups WHERE id = ?")
        .bind(group_id)
        .fetch_optional(&state.db)
        .await?
        .is_some();
    if !group_exists {
        return Err(AppError::NotFound(format!("Characteristic group {} not found", group_id)));
    }

    let sort_order = match req.sort_order {
        Some(s) => s,
        None => sqlx::query(
            "SELECT COALESCE(MAX(sort_order), 0) + 1 AS next \
             FROM characteristic_values WHERE group_id = ?",
        )
        .bind(group_id)
        .fetch_one(&state.db)
        .await?
        .get::<i64, _>("next"),
    };

    let id = sqlx::query(
        "INSERT INTO characteristic_values (group_id, value, display_name, color_hex, sort_order) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(group_id)
    .bind(&value)
    .bind(req.display_name.as_deref())
    .bind(req.color_hex.as_deref())
    .bind(sort_order)
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    state.invalidate(&[keys::GROUPS]);
    Ok((StatusCode::CREATED, ok(fetch_value(&state, id).await?)))
}

pub async fn update_value(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ValueUpdate>,
) -> AppResult<Json<Value>> {
    let current = fetch_value(&state, id).await?;
    let value = match req.value.as_deref() {
        Some(v) => require_name(Some(v), "value")?,
        None => current.value,
    };
    let color_hex = req.color_hex.unwrap_or(current.color_hex);
    validate_color_hex(color_hex.as_deref(), "color_hex")?;

    sqlx::query(
        "UPDATE characteristic_values \
         SET value = ?, display_name = ?, color_hex = ?, sort_order = ?, is_active = ?, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(&value)
    .bind(req.display_name.unwrap_or(current.display_name))
    .bind(color_hex)
    .bind(req.sort_order.unwrap_or(current.sort_order))
    .bind(req.is_active.unwrap_or(current.is_active))
    .bind(id)
    .execute(&state.db)
    .await?;

    state.invalidate(&[keys::GROUPS]);
    Ok(ok(fetch_value(&state, id).await?))
}

/// Refuses while product characteristics still point at the value.
pub async fn delete_value(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let current = fetch_value(&state, id).await?;

    let in_use: i64 =
        sqlx::query("SELECT COUNT(*) AS n FROM product_characteristics WHERE value_preset_id = ?")
            .bind(id)
            .fetch_one(&state.db)
            .await?
            .get("n");
    if in_use > 0 {
        return Err(AppError::Rejected {
            status: StatusCode::CONFLICT,
            code: "VALUE_IN_USE",
            message: format!(
                "Value \"{}\" is used by {} product characteristic(s)",
                current.value, in_use
            ),
            details: Some(json!({ "value_id": id, "count": in_use })),
        });
    }

    sqlx::query("DELETE FROM characteristic_values WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;
    state.invalidate(&[keys::GROUPS]);
    Ok(ok(json!({ "id": id, "deleted": true })))
}
