//! Downloadable catalog files (price lists, brochures), grouped by year.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Datelike;
use serde_json::{json, Value};
use sqlx::{QueryBuilder, Sqlite};

use super::{cached, keys, ok};
use crate::error::{validation::require_name, AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{CatalogFileInput, CatalogFileRow, CatalogFilesQuery};

const FILE_COLUMNS: &str = "id, title, description, file_url, file_name, file_size, file_type, \
     year, is_active, created_at, updated_at";

const MIN_YEAR: i64 = 1900;
const MAX_YEAR: i64 = 2100;

fn list_key(active: bool, year: Option<i64>) -> String {
    match year {
        Some(y) => format!("catalog-files:{}:{}", active, y),
        None => format!("catalog-files:{}:all", active),
    }
}

async fn load_files(state: &AppState, active: bool, year: Option<i64>) -> AppResult<Value> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM catalog_files WHERE is_active = ", FILE_COLUMNS));
    qb.push_bind(active);
    if let Some(y) = year {
        qb.push(" AND year = ").push_bind(y);
    }
    qb.push(" ORDER BY year DESC, created_at DESC, id DESC");
    let rows = qb.build_query_as::<CatalogFileRow>().fetch_all(&state.db).await?;
    Ok(json!({ "success": true, "total": rows.len(), "data": rows }))
}

/// Active files unless `active=false`, newest year first. `nocache=true` reads through.
pub async fn list_catalog_files(
    State(state): State<AppState>,
    Query(q): Query<CatalogFilesQuery>,
) -> AppResult<Json<Value>> {
    let active = q.active.unwrap_or(true);
    if q.nocache {
        return Ok(Json(load_files(&state, active, q.year).await?));
    }
    let key = list_key(active, q.year);
    let data = cached(&state, &key, || load_files(&state, active, q.year)).await?;
    Ok(Json(data))
}

pub async fn create_catalog_file(
    State(state): State<AppState>,
    Json(req): Json<CatalogFileInput>,
) -> AppResult<impl IntoResponse> {
    let title = require_name(req.title.as_deref(), "title")?;
    let file_url = require_name(req.file_url.as_deref(), "file_url")?;
    let file_name = require_name(req.file_name.as_deref(), "file_name")?;
    if let Some(size) = req.file_size.filter(|s| *s < 0) {
        return Err(AppError::ValidationError {
            field: "file_size".to_string(),
            message: format!("file_size must not be negative, got {}", size),
        });
    }
    let year = req.year.unwrap_or_else(|| i64::from(chrono::Utc::now().year()));
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(AppError::ValidationError {
            field: "year".to_string(),
            message: format!("year must be between {} and {}, got {}", MIN_YEAR, MAX_YEAR, year),
        });
    }

    let id = sqlx::query(
        "INSERT INTO catalog_files \
         (title, description, file_url, file_name, file_size, file_type, year, is_active) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1)",
    )
    .bind(&title)
    .bind(req.description.as_deref())
    .bind(&file_url)
    .bind(&file_name)
    .bind(req.file_size)
    .bind(req.file_type.as_deref())
    .bind(year)
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    state.invalidate(&[keys::CATALOG_FILES]);
    tracing::info!(id, year, "Created catalog file {}", title);

    let sql = format!("SELECT {} FROM catalog_files WHERE id = ?", FILE_COLUMNS);
    let row = sqlx::query_as::<_, CatalogFileRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Catalog file")?;
    Ok((StatusCode::CREATED, ok(row)))
}

