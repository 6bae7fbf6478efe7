use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::{cached, keys, ok};
use crate::characteristics::cascade::{self, CascadeError};
use crate::characteristics::guard::ensure_reparent_allowed;
use crate::characteristics::hierarchy::build_forest;
use crate::characteristics::store::{self, GroupRow, TreeTable};
use crate::error::{validation::require_name, AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{ForceQuery, GroupCreate, GroupUpdate};

const GROUP_COLUMNS: &str =
    "id, name, description, parent_id, sort_order, is_active, created_at, updated_at";

async fn fetch_group(state: &AppState, id: i64) -> AppResult<GroupRow> {
    let sql = format!("SELECT {} FROM characteristic_groups WHERE id = ?", GROUP_COLUMNS);
    sqlx::query_as::<_, GroupRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Characteristic group")
}

/// The full group forest in depth-first order with levels and breadcrumb paths.
pub async fn list_groups(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let data = cached(&state, keys::GROUPS_TREE, || async {
        let rows = store::load_groups(&state.db, false).await?;
        let forest = build_forest(&rows);
        Ok(json!({ "success": true, "data": forest, "total": forest.len() }))
    })
    .await?;
    Ok(Json(data))
}

pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<GroupCreate>,
) -> AppResult<impl IntoResponse> {
    let name = require_name(req.name.as_deref(), "name")?;
    if let Some(parent_id) = req.parent_id {
        fetch_group(&state, parent_id)
            .await
            .map_err(|_| AppError::NotFound(format!("Parent group {} not found", parent_id)))?;
    }

    let id = sqlx::query(
        "INSERT INTO characteristic_groups (name, description, parent_id, sort_order, is_active) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(req.description.as_deref())
    .bind(req.parent_id)
    .bind(req.sort_order.unwrap_or(0))
    .bind(req.is_active.unwrap_or(true))
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    state.metrics.inc_groups_created();
    state.invalidate(&[keys::GROUPS]);
    tracing::info!(id, parent_id = ?req.parent_id, "Created characteristic group {}", name);

    let group = fetch_group(&state, id).await?;
    Ok((StatusCode::CREATED, ok(group)))
}

pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<GroupUpdate>,
) -> AppResult<Json<Value>> {
    let current = fetch_group(&state, id).await?;

    let name = match req.name.as_deref() {
        Some(n) => require_name(Some(n), "name")?,
        None => current.name,
    };
    let parent_id = match req.parent_id {
        Some(candidate) => {
            if candidate != current.parent_id {
                let max_depth = state.config.catalog.max_hierarchy_depth;
                let checked =
                    ensure_reparent_allowed(&state.db, TreeTable::Groups, id, candidate, max_depth)
                        .await;
                if let Err(e) = checked {
                    if matches!(e, AppError::Rejected { .. }) {
                        state.metrics.inc_reparents_rejected();
                    }
                    return Err(e);
                }
            }
            candidate
        }
        None => current.parent_id,
    };
    let description = req.description.unwrap_or(current.description);

    sqlx::query(
        "UPDATE characteristic_groups \
         SET name = ?, description = ?, parent_id = ?, sort_order = ?, is_active = ?, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(&name)
    .bind(description.as_deref())
    .bind(parent_id)
    .bind(req.sort_order.unwrap_or(current.sort_order))
    .bind(req.is_active.unwrap_or(current.is_active))
    .bind(id)
    .execute(&state.db)
    .await?;

    state.invalidate(&[keys::GROUPS]);
    Ok(ok(fetch_group(&state, id).await?))
}

/// Guarded delete by default; `?force=true` cascades through descendants.
pub async fn delete_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(q): Query<ForceQuery>,
) -> AppResult<Json<Value>> {
    let force = q.force.unwrap_or(false);
    let policy = state.delete_policy();

    match cascade::delete_group(&state.db, id, force, &policy).await {
        Ok(outcome) => {
            state.metrics.inc_groups_deleted(force);
            state.invalidate(&[keys::GROUPS]);
            Ok(ok(outcome))
        }
        Err(CascadeError::Blocked(blocked)) => {
            state.metrics.inc_deletes_blocked();
            tracing::info!(group_id = id, code = blocked.code(), "Group delete refused");
            Err(blocked.into())
        }
        Err(e) => Err(e.into()),
    }
}
