use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use super::products::fetch_product;
use crate::error::{AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{ProductRow, VariantRow};

const VARIANT_SELECT: &str = "SELECT v.id, v.product_id, v.variant_sku, v.variant_name, \
            v.price_modifier, v.stock_quantity, v.is_active, \
            p.name AS product_name, p.sku AS product_sku, v.created_at, v.updated_at \
     FROM product_variants v \
     LEFT JOIN products p ON p.id = v.product_id";

#[derive(Serialize)]
struct VariantOutcome {
    #[serde(flatten)]
    variant: VariantRow,
    is_existing: bool,
}

async fn fetch_variant(state: &AppState, id: i64) -> AppResult<VariantRow> {
    let sql = format!("{} WHERE v.id = ?", VARIANT_SELECT);
    sqlx::query_as::<_, VariantRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Product variant")
}

/// `<product sku or id>-VAR-<unix millis>`
fn variant_sku(product: &ProductRow) -> String {
    let base = product.sku.clone().unwrap_or_else(|| product.id.to_string());
    format!("{}-VAR-{}", base, chrono::Utc::now().timestamp_millis())
}

/// Live variants of a product, newest first.
pub async fn list_variants(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    fetch_product(&state, id).await?;
    let sql = format!(
        "{} WHERE v.product_id = ? AND v.is_deleted = 0 ORDER BY v.created_at DESC, v.id DESC",
        VARIANT_SELECT
    );
    let rows = sqlx::query_as::<_, VariantRow>(&sql).bind(id).fetch_all(&state.db).await?;
    Ok(Json(json!({ "success": true, "total": rows.len(), "data": rows })))
}

/// Returns the product's live variant, creating a default one on first call.
///
/// At most one live variant exists per product (partial unique index); a concurrent
/// creator loses with `CONFLICT`.
pub async fn ensure_variant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let product = fetch_product(&state, id).await?;

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM product_variants \
         WHERE product_id = ? AND is_deleted = 0 ORDER BY id LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    if let Some(variant_id) = existing {
        let variant = fetch_variant(&state, variant_id).await?;
        tracing::debug!(product_id = id, variant_id, "Returning existing product variant");
        let body = json!({
            "success": true,
            "data": VariantOutcome { variant, is_existing: true },
            "message": "Existing product variant",
        });
        return Ok((StatusCode::OK, Json(body)));
    }

    let variant_id = sqlx::query(
        "INSERT INTO product_variants \
         (product_id, variant_sku, variant_name, price_modifier, stock_quantity, is_active) \
         VALUES (?, ?, ?, 0, 0, 1)",
    )
    .bind(id)
    .bind(variant_sku(&product))
    .bind(format!("{} Variant", product.name))
    .execute(&state.db)
    .await?
    .last_insert_rowid();

    let variant = fetch_variant(&state, variant_id).await?;
    let sku = variant.variant_sku.as_str();
    tracing::info!(product_id = id, variant_id, sku, "Created product variant");
    let body = json!({
        "success": true,
        "data": VariantOutcome { variant, is_existing: false },
        "message": "Product variant created",
    });
    Ok((StatusCode::CREATED, Json(body)))
}
