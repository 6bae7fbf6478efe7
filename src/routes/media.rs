use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::future::try_join_all;
use serde_json::{json, Value};
use sqlx::{QueryBuilder, Sqlite};

use super::{cached, keys, ok};
use crate::error::{validation::require_name, AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{MediaInput, MediaItem, MediaRow};

/// Product ids looked up per gated query.
const NAME_CHUNK: usize = 200;

async fn fetch_media(state: &AppState, id: i64) -> AppResult<MediaRow> {
    sqlx::query_as::<_, MediaRow>(
        "SELECT id, product_id, file_name, url, mime_type, size_bytes, created_at \
         FROM media_files WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_not_found("Media file")
}

/// Resolves product names in chunks, each chunk holding a gate permit while it queries.
async fn product_names(state: &AppState, ids: Vec<i64>) -> AppResult<HashMap<i64, String>> {
    let lookups = ids.chunks(NAME_CHUNK).map(|chunk| async move {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name FROM products WHERE id IN (");
        let mut sep = qb.separated(", ");
        for id in chunk {
            sep.push_bind(*id);
        }
        sep.push_unseparated(")");
        let query = qb.build_query_as::<(i64, String)>();
        let rows: Vec<(i64, String)> = state.gate.run(query.fetch_all(&state.db)).await??;
        Ok::<_, AppError>(rows)
    });
    Ok(try_join_all(lookups).await?.into_iter().flatten().collect())
}

pub async fn list_media(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let data = cached(&state, keys::MEDIA_LIST, || async {
        let rows = sqlx::query_as::<_, MediaRow>(
            "SELECT id, product_id, file_name, url, mime_type, size_bytes, created_at \
             FROM media_files ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&state.db)
        .await?;

        let mut ids: Vec<i64> = rows.iter().filter_map(|m| m.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let names = product_names(&state, ids).await?;

        let items: Vec<MediaItem> = rows
            .into_iter()
            .map(|media| {
                let product_name = media.product_id.and_then(|pid| names.get(&pid).cloned());
                MediaItem { media, product_name }
            })
            .collect();
        Ok(json!({ "success": true, "total": items.len(), "data": items }))
    })
    .await?;
    Ok(Json(data))
}

pub async fn create_media(
    State(state): State<AppState>,
    Json(req): Json<MediaInput>,
) -> AppResult<impl IntoResponse> {
    let file_name = require_name(req.file_name.as_deref(), "file_name")?;
    let url = require_name(req.url.as_deref(), "url")?;
    let size_bytes = req.size_bytes.unwrap_or(0);
    if size_bytes < 0 {
        return Err(AppError::ValidationError {
            field: "size_bytes".to_string(),
            message: format!("size_bytes must not be negative, got {}", size_bytes),
        });
    }
    if let Some(pid) = req.product_id {
        sqlx::query_scalar::<_, i64>("SELECT id FROM products WHERE id = ? AND is_deleted = 0")
            .bind(pid)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", pid)))?;
    }

    let id = sqlx::query(
        "INSERT INTO media_files (product_id, file_name, url, mime_type, size_bytes) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(req.product_id)
    .bind(&file_name)
    .bind(&url)
    .bind(req.mime_type.as_deref())
    .bind(size_bytes)
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    state.invalidate(&[keys::MEDIA]);
    Ok((StatusCode::CREATED, ok(fetch_media(&state, id).await?)))
}

pub async fn delete_media(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let media = fetch_media(&state, id).await?;
    sqlx::query("DELETE FROM media_files WHERE id = ?").bind(id).execute(&state.db).await?;
    state.invalidate(&[keys::MEDIA]);
    tracing::info!(id, "Deleted media record {}", media.file_name);
    Ok(ok(json!({ "id": id, "deleted": true })))
}
