use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use sqlx::SqliteConnection;

use super::ok;
use crate::error::{validation::require_name, AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{OrderItemInput, OrderItemRow, OrderQuery, OrderRow, OrderUpdate, ORDER_STATUSES};

const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, customer_email, status, notes, \
     total_amount, created_at, updated_at";

fn check_status(status: &str) -> AppResult<()> {
    if ORDER_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::ValidationError {
            field: "status".to_string(),
            message: format!(
                "Unknown order status '{}', expected one of: {}",
                status,
                ORDER_STATUSES.join(", ")
            ),
        })
    }
}

async fn fetch_order(conn: &mut SqliteConnection, id: i64) -> AppResult<OrderRow> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_not_found("Order")
}

async fn fetch_items(conn: &mut SqliteConnection, order_id: i64) -> AppResult<Vec<OrderItemRow>> {
    Ok(sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, product_id, product_name, quantity, price \
         FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?)
}

async fn order_with_items(state: &AppState, id: i64) -> AppResult<Value> {
    let mut conn = state.db.acquire().await?;
    let order = fetch_order(&mut *conn, id).await?;
    let items = fetch_items(&mut *conn, id).await?;
    let mut body = json!(order);
    body["items"] = json!(items);
    Ok(body)
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(q): Query<OrderQuery>,
) -> AppResult<Json<Value>> {
    if let Some(status) = q.status.as_deref() {
        check_status(status)?;
    }
    let sql = format!(
        "SELECT {} FROM orders WHERE ?1 IS NULL OR status = ?1 ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    );
    let rows =
        sqlx::query_as::<_, OrderRow>(&sql).bind(q.status.as_deref()).fetch_all(&state.db).await?;
    Ok(Json(json!({ "success": true, "total": rows.len(), "data": rows })))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    Ok(ok(order_with_items(&state, id).await?))
}

/// Updates header fields and, when `items` is present, replaces the items and recomputes
/// `total_amount`. Everything happens in one transaction.
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<OrderUpdate>,
) -> AppResult<Json<Value>> {
    if let Some(status) = req.status.as_deref() {
        check_status(status)?;
    }
    if let Some(name) = req.customer_name.as_deref() {
        require_name(Some(name), "customer_name")?;
    }

    let mut tx = state.db.begin().await?;
    if let Err(e) = apply_order_update(&mut *tx, id, &req).await {
        if let Err(rb) = tx.rollback().await {
            tracing::error!("Rollback of order {} update failed: {}", id, rb);
        }
        return Err(e);
    }
    tx.commit().await?;

    tracing::info!(id, status = ?req.status, "Updated order");
    Ok(ok(order_with_items(&state, id).await?))
}

async fn apply_order_update(
    conn: &mut SqliteConnection,
    id: i64,
    req: &OrderUpdate,
) -> AppResult<()> {
    fetch_order(conn, id).await?;

    sqlx::query(
        "UPDATE orders SET \
            status = COALESCE(?, status), \
            notes = COALESCE(?, notes), \
            customer_name = COALESCE(?, customer_name), \
            customer_phone = COALESCE(?, customer_phone), \
            customer_email = COALESCE(?, customer_email), \
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(req.status.as_deref())
    .bind(req.notes.as_deref())
    .bind(req.customer_name.as_deref().map(str::trim))
    .bind(req.customer_phone.as_deref())
    .bind(req.customer_email.as_deref())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if let Some(items) = &req.items {
        replace_items(conn, id, items).await?;
    }
    Ok(())
}

async fn replace_items(
    conn: &mut SqliteConnection,
    order_id: i64,
    items: &[OrderItemInput],
) -> AppResult<()> {
    sqlx::query("DELETE FROM order_items WHERE order_id = ?")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    let mut total = 0.0;
    for (i, item) in items.iter().enumerate() {
        let quantity = item.quantity.unwrap_or(1);
        let price = item.price.unwrap_or(0.0);
        if quantity <= 0 {
            return Err(AppError::ValidationError {
                field: format!("items[{}].quantity", i),
                message: format!("Quantity must be positive, got {}", quantity),
            });
        }
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::ValidationError {
                field: format!("items[{}].price", i),
                message: "Price must be a non-negative number".to_string(),
            });
        }

        let product_name = match (item.product_name.as_deref().map(str::trim), item.product_id) {
            (Some(n), _) if !n.is_empty() => n.to_string(),
            (_, Some(pid)) => {
                sqlx::query_scalar::<_, String>("SELECT name FROM products WHERE id = ?")
                    .bind(pid)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Product {} not found", pid)))?
            }
            _ => return Err(AppError::required(&format!("items[{}].product_name", i))),
        };

        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, product_name, quantity, price) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(&product_name)
        .bind(quantity)
        .bind(price)
        .execute(&mut *conn)
        .await?;
        total += price * quantity as f64;
    }

    sqlx::query("UPDATE orders SET total_amount = ? WHERE id = ?")
        .bind(total)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let mut tx = state.db.begin().await?;
    if let Err(e) = remove_order(&mut *tx, id).await {
        if let Err(rb) = tx.rollback().await {
            tracing::error!("Rollback of order {} delete failed: {}", id, rb);
        }
        return Err(e);
    }
    tx.commit().await?;
    Ok(ok(json!({ "id": id, "deleted": true })))
}

async fn remove_order(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
    fetch_order(conn, id).await?;
    sqlx::query("DELETE FROM order_items WHERE order_id = ?").bind(id).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM orders WHERE id = ?").bind(id).execute(&mut *conn).await?;
    Ok(())
}
