use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::ok;
use crate::error::{validation::require_name, AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{ModelLineInput, ModelLineQuery, ModelLineRow};

const MODEL_LINE_SELECT: &str = "SELECT ms.id, ms.name, ms.description, ms.manufacturer_id, \
            m.name AS manufacturer_name, ms.category_id, ms.is_active, \
            (SELECT COUNT(*) FROM products p \
             WHERE p.model_line_id = ms.id AND p.is_deleted = 0) AS products_count, \
            ms.created_at, ms.updated_at \
     FROM model_series ms \
     LEFT JOIN manufacturers m ON m.id = ms.manufacturer_id";

pub(crate) async fn load_model_lines(
    state: &AppState,
    manufacturer_id: Option<i64>,
) -> AppResult<Vec<ModelLineRow>> {
    let sql = format!(
        "{} WHERE ?1 IS NULL OR ms.manufacturer_id = ?1 ORDER BY m.name, ms.name, ms.id",
        MODEL_LINE_SELECT
    );
    Ok(sqlx::query_as::<_, ModelLineRow>(&sql).bind(manufacturer_id).fetch_all(&state.db).await?)
}

async fn fetch_model_line(state: &AppState, id: i64) -> AppResult<ModelLineRow> {
    let sql = format!("{} WHERE ms.id = ?", MODEL_LINE_SELECT);
    sqlx::query_as::<_, ModelLineRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Model line")
}

async fn ensure_manufacturer(state: &AppState, id: i64) -> AppResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM manufacturers WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Manufacturer {} not found", id)))
}

/// `?include_products=true` attaches each line's product id/name pairs.
pub async fn list_model_lines(
    State(state): State<AppState>,
    Query(q): Query<ModelLineQuery>,
) -> AppResult<Json<Value>> {
    let lines = load_model_lines(&state, q.manufacturer_id).await?;
    if !q.include_products.unwrap_or(false) {
        return Ok(Json(json!({ "success": true, "total": lines.len(), "data": lines })));
    }

    let products: Vec<(i64, i64, String)> = sqlx::query_as(
        "SELECT model_line_id, id, name FROM products \
         WHERE model_line_id IS NOT NULL AND is_deleted = 0 ORDER BY name, id",
    )
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = lines
        .iter()
        .map(|line| {
            let own: Vec<Value> = products
                .iter()
                .filter(|(ml, _, _)| *ml == line.id)
                .map(|(_, id, name)| json!({ "id": id, "name": name }))
                .collect();
            let mut v = json!(line);
            v["products"] = json!(own);
            v
        })
        .collect();
    Ok(Json(json!({ "success": true, "total": data.len(), "data": data })))
}

pub async fn create_model_line(
    State(state): State<AppState>,
    Json(req): Json<ModelLineInput>,
) -> AppResult<impl IntoResponse> {
    let name = require_name(req.name.as_deref(), "name")?;
    let manufacturer_id = req.manufacturer_id.ok_or_else(|| AppError::required("manufacturer_id"))?;
    ensure_manufacturer(&state, manufacturer_id).await?;

    let id = sqlx::query(
        "INSERT INTO model_series (name, description, manufacturer_id, category_id, is_active) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(req.description.as_deref())
    .bind(manufacturer_id)
    .bind(req.category_id)
    .bind(req.is_active.unwrap_or(true))
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, ok(fetch_model_line(&state, id).await?)))
}

pub async fn update_model_line(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ModelLineInput>,
) -> AppResult<Json<Value>> {
    let current = fetch_model_line(&state, id).await?;
    let name = match req.name.as_deref() {
        Some(n) => require_name(Some(n), "name")?,
        None => current.name,
    };
    if let Some(mid) = req.manufacturer_id {
        ensure_manufacturer(&state, mid).await?;
    }

    sqlx::query(
        "UPDATE model_series SET name = ?, description = ?, manufacturer_id = ?, \
         category_id = ?, is_active = ?, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(&name)
    .bind(req.description.or(current.description))
    .bind(req.manufacturer_id.unwrap_or(current.manufacturer_id))
    .bind(req.category_id.or(current.category_id))
    .bind(req.is_active.unwrap_or(current.is_active))
    .bind(id)
    .execute(&state.db)
    .await?;

    Ok(ok(fetch_model_line(&state, id).await?))
}

pub async fn delete_model_line(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let line = fetch_model_line(&state, id).await?;
    if line.products_count > 0 {
        return Err(AppError::Rejected {
            status: StatusCode::CONFLICT,
            code: "HAS_PRODUCTS",
            message: format!("Model line \"{}\" has {} product(s)", line.name, line.products_count),
            details: Some(json!({ "model_line_id": id, "count": line.products_count })),
        });
    }
    sqlx::query("DELETE FROM model_series WHERE id = ?").bind(id).execute(&state.db).await?;
    Ok(ok(json!({ "id": id, "deleted": true })))
}
