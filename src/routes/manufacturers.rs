use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::{model_lines::load_model_lines, ok};
use crate::error::{validation::require_name, AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{ManufacturerInput, ManufacturerRow};

async fn fetch_manufacturer(state: &AppState, id: i64) -> AppResult<ManufacturerRow> {
    sqlx::query_as::<_, ManufacturerRow>(
        "SELECT id, name, country, description, is_active, created_at, updated_at \
         FROM manufacturers WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_not_found("Manufacturer")
}

pub async fn list_manufacturers(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let rows = sqlx::query_as::<_, ManufacturerRow>(
        "SELECT id, name, country, description, is_active, created_at, updated_at \
         FROM manufacturers ORDER BY name, id",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(json!({ "success": true, "total": rows.len(), "data": rows })))
}

pub async fn get_manufacturer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    Ok(ok(fetch_manufacturer(&state, id).await?))
}

pub async fn manufacturer_model_lines(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    fetch_manufacturer(&state, id).await?;
    let lines = load_model_lines(&state, Some(id)).await?;
    Ok(Json(json!({ "success": true, "total": lines.len(), "data": lines })))
}

pub async fn create_manufacturer(
    State(state): State<AppState>,
    Json(req): Json<ManufacturerInput>,
) -> AppResult<impl IntoResponse> {
    let name = require_name(req.name.as_deref(), "name")?;
    let id = sqlx::query(
        "INSERT INTO manufacturers (name, country, description, is_active) VALUES (?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(req.country.as_deref())
    .bind(req.description.as_deref())
    .bind(req.is_active.unwrap_or(true))
    .execute(&state.db)
    .await?
        .last_insert_rowid();
    Ok((StatusCode::CREATED, ok(fetch_manufacturer(&state, id).await?)))
}

pub async fn update_manufacturer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ManufacturerInput>,
) -> AppResult<Json<Value>> {
    let current = fetch_manufacturer(&state, id).await?;
    let name = match req.name.as_deref() {
        Some(n) => require_name(Some(n), "name")?,
        None => current.name,
    };
    sqlx::query(
        "UPDATE manufacturers SET name = ?, country = ?, description = ?, is_active = ?, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(&name)
    .bind(req.country.or(current.country))
    .bind(req.description.or(current.description))
    .bind(req.is_active.unwrap_or(current.is_active))
    .bind(id)
    .execute(&state.db)
    .await?;
    Ok(ok(fetch_manufacturer(&state, id).await?))
}

/// Refuses while model lines or products reference the manufacturer.
pub async fn delete_manufacturer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let manufacturer = fetch_manufacturer(&state, id).await?;

    let (lines, products): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM model_series WHERE manufacturer_id = ?1), \
                (SELECT COUNT(*) FROM products WHERE manufacturer_id = ?1)",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    if lines > 0 || products > 0 {
        return Err(AppError::Rejected {
            status: StatusCode::CONFLICT,
            code: "HAS_DEPENDENTS",
            message: format!(
                "Manufacturer \"{}\" has {} model line(s) and {} product(s)",
                manufacturer.name, lines, products
            ),
            details: Some(json!({
                "manufacturer_id": id,
                "model_lines": lines,
                "products": products,
            })),
        });
    }

    sqlx::query("DELETE FROM manufacturers WHERE id = ?").bind(id).execute(&state.db).await?;
    Ok(ok(json!({ "id": id, "deleted": true })))
}
