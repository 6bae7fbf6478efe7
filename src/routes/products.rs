use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{keys, ok};
use crate::error::{validation::require_name, AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{ProductInput, ProductListQuery, ProductRow, SearchQuery, SizeInput, SizeRow};

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.description, p.sku, p.price, \
            p.category_id, c.name AS category_name, \
            p.manufacturer_id, m.name AS manufacturer_name, \
            p.model_line_id, ms.name AS model_line_name, \
            p.in_stock, p.created_at, p.updated_at \
     FROM products p \
     LEFT JOIN product_categories c ON c.id = p.category_id \
     LEFT JOIN manufacturers m ON m.id = p.manufacturer_id \
     LEFT JOIN model_series ms ON ms.id = p.model_line_id";

const SIZE_COLUMNS: &str = "id, product_id, size_name, size_value, sku, price, stock_quantity, \
     weight, sort_order, is_available, created_at, updated_at";

const DEFAULT_PAGE: i64 = 100;
const MAX_PAGE: i64 = 1000;
const SEARCH_LIMIT: i64 = 50;

pub(crate) async fn fetch_product(state: &AppState, id: i64) -> AppResult<ProductRow> {
    let sql = format!("{} WHERE p.id = ? AND p.is_deleted = 0", PRODUCT_SELECT);
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Product")
}

async fn fetch_size(state: &AppState, id: i64) -> AppResult<SizeRow> {
    let sql = format!("SELECT {} FROM product_sizes WHERE id = ?", SIZE_COLUMNS);
    sqlx::query_as::<_, SizeRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Product size")
}

/// Checks that every referenced catalog row exists before a product write.
async fn ensure_references(state: &AppState, req: &ProductInput) -> AppResult<()> {
    let refs = [
        ("product_categories", "Category", req.category_id),
        ("manufacturers", "Manufacturer", req.manufacturer_id),
        ("model_series", "Model line", req.model_line_id),
    ];
    for (table, entity, id) in refs {
        let Some(id) = id else { continue };
        let sql = format!("SELECT id FROM {} WHERE id = ?", table);
        let found = sqlx::query_scalar::<_, i64>(&sql).bind(id).fetch_optional(&state.db).await?;
        if found.is_none() {
            return Err(AppError::NotFound(format!("{} {} not found", entity, id)));
        }
    }
    Ok(())
}

fn validate_price(price: Option<f64>, field: &str) -> AppResult<()> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(AppError::ValidationError {
            field: field.to_string(),
            message: format!("{} must be a non-negative number", field),
        }),
        _ => Ok(()),
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(q): Query<ProductListQuery>,
) -> AppResult<Json<Value>> {
    let limit = q.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let offset = q.offset.unwrap_or(0).max(0);

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(PRODUCT_SELECT);
    qb.push(" WHERE p.is_deleted = 0");
    if let Some(cid) = q.category_id {
        qb.push(" AND p.category_id = ").push_bind(cid);
    }
    if let Some(mid) = q.manufacturer_id {
        qb.push(" AND p.manufacturer_id = ").push_bind(mid);
    }
    if let Some(lid) = q.model_line_id {
        qb.push(" AND p.model_line_id = ").push_bind(lid);
    }
    qb.push(" ORDER BY p.name, p.id LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);

    let rows = qb.build_query_as::<ProductRow>().fetch_all(&state.db).await?;
    Ok(Json(json!({
        "success": true,
        "total": rows.len(),
        "limit": limit,
        "offset": offset,
        "data": rows,
    })))
}

/// Case-insensitive substring search over name, description and SKU. An empty query
/// returns an empty list.
pub async fn search_products(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Value>> {
    let term = q.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Ok(Json(json!({ "success": true, "total": 0, "data": [] })));
    }
    let limit = q.limit.unwrap_or(SEARCH_LIMIT).clamp(1, SEARCH_LIMIT);
    let pattern = format!("%{}%", term.to_lowercase());

    let sql = format!(
        "{} WHERE p.is_deleted = 0 \
           AND (LOWER(p.name) LIKE ?1 OR LOWER(COALESCE(p.description, '')) LIKE ?1 \
                OR LOWER(COALESCE(p.sku, '')) LIKE ?1) \
         ORDER BY p.name, p.id LIMIT ?2",
        PRODUCT_SELECT
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(json!({ "success": true, "total": rows.len(), "data": rows })))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    Ok(ok(fetch_product(&state, id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<ProductInput>,
) -> AppResult<impl IntoResponse> {
    let name = require_name(req.name.as_deref(), "name")?;
    validate_price(req.price, "price")?;
    ensure_references(&state, &req).await?;

    let id = sqlx::query(
        "INSERT INTO products \
         (name, description, sku, price, category_id, manufacturer_id, model_line_id, in_stock) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(req.description.as_deref())
    .bind(req.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()))
    .bind(req.price)
    .bind(req.category_id)
    .bind(req.manufacturer_id)
    .bind(req.model_line_id)
    .bind(req.in_stock.unwrap_or(true))
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    tracing::info!(id, "Created product {}", name);
    Ok((StatusCode::CREATED, ok(fetch_product(&state, id).await?)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ProductInput>,
) -> AppResult<Json<Value>> {
    let current = fetch_product(&state, id).await?;
    let name = match req.name.as_deref() {
        Some(n) => require_name(Some(n), "name")?,
        None => current.name,
    };
    validate_price(req.price, "price")?;
    ensure_references(&state, &req).await?;

    sqlx::query(
        "UPDATE products SET name = ?, description = ?, sku = ?, price = ?, category_id = ?, \
             manufacturer_id = ?, model_line_id = ?, in_stock = ?, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(&name)
    .bind(req.description.or(current.description))
    .bind(req.sku.or(current.sku))
    .bind(req.price.or(current.price))
    .bind(req.category_id.or(current.category_id))
    .bind(req.manufacturer_id.or(current.manufacturer_id))
    .bind(req.model_line_id.or(current.model_line_id))
    .bind(req.in_stock.unwrap_or(current.in_stock))
    .bind(id)
    .execute(&state.db)
    .await?;

    state.invalidate(&[keys::MEDIA]);
    Ok(ok(fetch_product(&state, id).await?))
}

/// Soft-deletes the product and drops its characteristics in one transaction. Order
/// items keep their copied product name.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let product = fetch_product(&state, id).await?;

    let mut tx = state.db.begin().await?;
    let removed = match retire_product(&mut *tx, id).await {
        Ok(n) => {
            tx.commit().await?;
            n
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::error!("Rollback of product {} delete failed: {}", id, rb);
            }
            return Err(e);
        }
    };

    state.invalidate(&[keys::MEDIA]);
    tracing::info!(id, removed_characteristics = removed, "Deleted product {}", product.name);
    Ok(ok(json!({ "id": id, "deleted": true, "deleted_characteristics": removed })))
}

async fn retire_product(conn: &mut SqliteConnection, id: i64) -> AppResult<u64> {
    let removed = sqlx::query("DELETE FROM product_characteristics WHERE product_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    sqlx::query(
        "UPDATE products \
         SET is_deleted = 1, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(removed)
}

pub async fn list_sizes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    fetch_product(&state, id).await?;
    let sql = format!(
        "SELECT {} FROM product_sizes WHERE product_id = ? ORDER BY sort_order, id",
        SIZE_COLUMNS
    );
    let rows = sqlx::query_as::<_, SizeRow>(&sql).bind(id).fetch_all(&state.db).await?;
    Ok(Json(json!({ "success": true, "total": rows.len(), "data": rows })))
}

pub async fn create_size(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(req): Json<SizeInput>,
) -> AppResult<impl IntoResponse> {
    fetch_product(&state, product_id).await?;
    let size_name = require_name(req.size_name.as_deref(), "size_name")?;
    validate_price(req.price, "price")?;

    let id = sqlx::query(
        "INSERT INTO product_sizes \
         (product_id, size_name, size_value, sku, price, stock_quantity, weight, sort_order, \
          is_available) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(product_id)
    .bind(&size_name)
    .bind(req.size_value.as_deref())
    .bind(req.sku.as_deref())
    .bind(req.price)
    .bind(req.stock_quantity)
    .bind(req.weight)
    .bind(req.sort_order.unwrap_or(0))
    .bind(req.is_available.unwrap_or(true))
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, ok(fetch_size(&state, id).await?)))
}

pub async fn update_size(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SizeInput>,
) -> AppResult<Json<Value>> {
    let current = fetch_size(&state, id).await?;
    let size_name = match req.size_name.as_deref() {
        Some(n) => require_name(Some(n), "size_name")?,
        None => current.size_name,
    };
    validate_price(req.price, "price")?;

    sqlx::query(
        "UPDATE product_sizes SET size_name = ?, size_value = ?, sku = ?, price = ?, \
             stock_quantity = ?, weight = ?, sort_order = ?, is_available = ?, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(&size_name)
    .bind(req.size_value.or(current.size_value))
    .bind(req.sku.or(current.sku))
    .bind(req.price.or(current.price))
    .bind(req.stock_quantity.or(current.stock_quantity))
    .bind(req.weight.or(current.weight))
    .bind(req.sort_order.unwrap_or(current.sort_order))
    .bind(req.is_available.unwrap_or(current.is_available))
    .bind(id)
    .execute(&state.db)
    .await?;

    Ok(ok(fetch_size(&state, id).await?))
}

pub async fn delete_size(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    fetch_size(&state, id).await?;
    sqlx::query("DELETE FROM product_sizes WHERE id = ?").bind(id).execute(&state.db).await?;
    Ok(ok(json!({ "id": id, "deleted": true })))
}
