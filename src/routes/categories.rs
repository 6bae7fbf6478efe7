use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use super::{cached, keys, ok};
use crate::characteristics::cascade::preview;
use crate::characteristics::guard::ensure_reparent_allowed;
use crate::characteristics::hierarchy::build_forest;
use crate::characteristics::store::{self, CategoryRow, TreeTable};
use crate::error::{validation::require_name, AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{CategoryCreate, CategoryUpdate};

async fn fetch_category(state: &AppState, id: i64) -> AppResult<CategoryRow> {
    sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, description, parent_id, type, sort_order, is_active, \
                created_at, updated_at \
         FROM product_categories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_not_found("Category")
}

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let data = cached(&state, keys::CATEGORIES_TREE, || async {
        let rows = store::load_categories(&state.db, false).await?;
        let forest = build_forest(&rows);
        Ok(json!({ "success": true, "total": forest.len(), "data": forest }))
    })
    .await?;
    Ok(Json(data))
}

/// Active categories only, as compact rows for select boxes.
pub async fn list_categories_flat(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let data = cached(&state, keys::CATEGORIES_FLAT, || async {
        let rows = store::load_categories(&state.db, true).await?;
        let flat: Vec<Value> = build_forest(&rows)
            .into_iter()
            .map(|n| {
                json!({
                    "id": n.row.id,
                    "name": n.row.name,
                    "parent_id": n.row.parent_id,
                    "type": n.row.kind,
                    "level": n.level,
                    "full_path": n.full_path,
                    "display_name": n.display_name,
                })
            })
            .collect();
        Ok(json!({ "success": true, "total": flat.len(), "data": flat }))
    })
    .await?;
    Ok(Json(data))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CategoryCreate>,
) -> AppResult<impl IntoResponse> {
    let name = require_name(req.name.as_deref(), "name")?;
    if let Some(parent_id) = req.parent_id {
        fetch_category(&state, parent_id)
            .await
            .map_err(|_| AppError::NotFound(format!("Parent category {} not found", parent_id)))?;
    }

    let id = sqlx::query(
        "INSERT INTO product_categories \
         (name, description, parent_id, type, sort_order, is_active) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(req.description.as_deref())
    .bind(req.parent_id)
    .bind(req.kind.as_deref().unwrap_or("product"))
    .bind(req.sort_order.unwrap_or(0))
    .bind(req.is_active.unwrap_or(true))
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    state.invalidate(&[keys::CATEGORIES]);
    Ok((StatusCode::CREATED, ok(fetch_category(&state, id).await?)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CategoryUpdate>,
) -> AppResult<Json<Value>> {
    let current = fetch_category(&state, id).await?;

    let name = match req.name.as_deref() {
        Some(n) => require_name(Some(n), "name")?,
        None => current.name,
    };
    let parent_id = match req.parent_id {
        Some(candidate) if candidate != current.parent_id => {
            let max_depth = state.config.catalog.max_hierarchy_depth;
            let checked = ensure_reparent_allowed(
                &state.db,
                TreeTable::Categories,
                id,
                candidate,
                max_depth,
            )
            .await;
            if let Err(e) = checked {
                if matches!(e, AppError::Rejected { .. }) {
                    state.metrics.inc_reparents_rejected();
                }
                return Err(e);
            }
            candidate
        }
        Some(same) => same,
        None => current.parent_id,
    };

    sqlx::query(
        "UPDATE product_categories \
         SET name = ?, description = ?, parent_id = ?, type = ?, sort_order = ?, is_active = ?, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(&name)
    .bind(req.description.unwrap_or(current.description))
    .bind(parent_id)
    .bind(req.kind.unwrap_or(current.kind))
    .bind(req.sort_order.unwrap_or(current.sort_order))
    .bind(req.is_active.unwrap_or(current.is_active))
    .bind(id)
    .execute(&state.db)
    .await?;

    state.invalidate(&[keys::CATEGORIES]);
    Ok(ok(fetch_category(&state, id).await?))
}

/// Refuses while subcategories or products still reference the category.
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let category = fetch_category(&state, id).await?;
    let preview_len = state.config.catalog.delete_preview_len;

    let children: Vec<String> = sqlx::query_scalar::<_, String>(
        "SELECT name FROM product_categories WHERE parent_id = ? ORDER BY sort_order, id",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    if !children.is_empty() {
        return Err(AppError::Rejected {
            status: StatusCode::CONFLICT,
            code: "HAS_CHILDREN",
            message: format!(
                "Category \"{}\" has {} subcategories: {}",
                category.name,
                children.len(),
                preview(&children, preview_len)
            ),
            details: Some(json!({
                "category_id": id,
                "count": children.len(),
                "children": children,
            })),
        });
    }

    let products: Vec<String> = sqlx::query_scalar::<_, String>(
        "SELECT name FROM products WHERE category_id = ? ORDER BY name",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    if !products.is_empty() {
        return Err(AppError::Rejected {
            status: StatusCode::CONFLICT,
            code: "HAS_PRODUCTS",
            message: format!(
                "Category \"{}\" is used by {} product(s): {}",
                category.name,
                products.len(),
                preview(&products, preview_len)
            ),
            details: Some(json!({ "category_id": id, "count": products.len() })),
        });
    }

    sqlx::query("DELETE FROM product_categories WHERE id = ?").bind(id).execute(&state.db).await?;
    state.invalidate(&[keys::CATEGORIES]);
    Ok(ok(json!({ "id": id, "deleted": true })))
}
