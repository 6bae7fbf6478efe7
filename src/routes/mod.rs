//! HTTP route handlers for the catalog admin API.
//!
//! - `health`: liveness, readiness, schema status and metrics
//! - `groups`, `values`, `templates`: characteristic groups, preset values and templates
//! - `characteristics`: resolved product characteristics and their aggregations
//! - `categories`, `manufacturers`, `model_lines`, `products`: catalog entities
//! - `variants`: the default variant kept per product
//! - `catalog_menu`: catalog menu pins and the entities offered for them
//! - `catalog_files`: downloadable catalog files by year
//! - `media`, `orders`, `site_settings`, `warehouse`: remaining admin resources
//! - `export`: table export as CSV or JSON

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::error::AppResult;
use crate::middleware::{security_headers::security_headers_middleware, validation};
use crate::state::AppState;

pub mod catalog_files;
pub mod catalog_menu;
pub mod categories;
pub mod characteristics;
pub mod export;
pub mod groups;
pub mod health;
pub mod manufacturers;
pub mod media;
pub mod model_lines;
pub mod orders;
pub mod products;
pub mod site_settings;
pub mod templates;
pub mod values;
pub mod variants;
pub mod warehouse;

/// Cache keys and the invalidation patterns that cover them.
pub(crate) mod keys {
    pub const GROUPS_TREE: &str = "groups:tree";
    pub const GROUPS_AVAILABLE: &str = "groups:available";
    pub const GROUPS: &str = "groups:*";
    pub const CATEGORIES_TREE: &str = "categories:tree";
    pub const CATEGORIES_FLAT: &str = "categories:flat";
    pub const CATEGORIES: &str = "categories:*";
    pub const MEDIA_LIST: &str = "media:list";
    pub const MEDIA: &str = "media:*";
    pub const CATALOG_FILES: &str = "catalog-files:*";
}

/// `{success: true, data}` envelope.
pub(crate) fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Serves `key` from the response cache, computing and storing it on a miss.
pub(crate) async fn cached<F, Fut>(state: &AppState, key: &str, load: F) -> AppResult<Value>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<Value>>,
{
    if let Some(hit) = state.cache.get(key) {
        state.metrics.inc_cache_hit();
        return Ok(hit);
    }
    state.metrics.inc_cache_miss();
    let value = load().await?;
    state.cache.set(key, value.clone());
    Ok(value)
}

/// All routes, bound to `state`, without outer layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/health", get(health::health))
        .route("/db-status", get(health::db_status))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/spec-groups", get(groups::list_groups).post(groups::create_group))
        .route("/spec-groups/{id}", put(groups::update_group).delete(groups::delete_group))
        .route("/spec-enums", get(values::list_values).post(values::create_value))
        .route("/spec-enums/{id}", put(values::update_value).delete(values::delete_value))
        .route(
            "/admin/characteristic-templates",
            get(templates::list_templates)
                .post(templates::create_template)
                .put(templates::update_templates),
        )
        .route("/spec-values", get(characteristics::spec_values))
        .route(
            "/products/{id}/characteristics",
            get(characteristics::product_characteristics)
                .post(characteristics::save_product_characteristics),
        )
        .route("/characteristics/available", get(characteristics::available))
        .route("/characteristics/by-category", get(characteristics::by_category))
        .route("/categories", get(categories::list_categories).post(categories::create_category))
        .route("/categories-flat", get(categories::list_categories_flat))
        .route(
            "/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route(
            "/manufacturers",
            get(manufacturers::list_manufacturers).post(manufacturers::create_manufacturer),
        )
        .route(
            "/manufacturers/{id}",
            get(manufacturers::get_manufacturer)
                .put(manufacturers::update_manufacturer)
                .delete(manufacturers::delete_manufacturer),
        )
        .route("/manufacturers/{id}/model-lines", get(manufacturers::manufacturer_model_lines))
        .route(
            "/model-lines",
            get(model_lines::list_model_lines).post(model_lines::create_model_line),
        )
        .route(
            "/model-lines/{id}",
            put(model_lines::update_model_line).delete(model_lines::delete_model_line),
        )
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/search", get(products::search_products))
        .route(
            "/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/{id}/sizes", get(products::list_sizes).post(products::create_size))
        .route("/product-sizes/{id}", put(products::update_size).delete(products::delete_size))
        .route("/media", get(media::list_media).post(media::create_media))
        .route("/media/{id}", axum::routing::delete(media::delete_media))
        .route("/orders", get(orders::list_orders))
        .route(
            "/orders/{id}",
            get(orders::get_order).put(orders::update_order).delete(orders::delete_order),
        )
        .route(
            "/site-settings",
            get(site_settings::get_settings).put(site_settings::update_settings),
        )
        .route("/warehouse/settings", get(warehouse::get_settings).put(warehouse::update_settings))
        .route(
            "/products/{id}/variant",
            get(variants::list_variants).post(variants::ensure_variant),
        )
        .route(
            "/catalog-menu-settings",
            get(catalog_menu::list_menu_settings).post(catalog_menu::upsert_menu_setting),
        )
        .route(
            "/catalog-menu-settings/{id}",
            axum::routing::delete(catalog_menu::delete_menu_setting),
        )
        .route("/catalog-menu/available-entities", get(catalog_menu::available_entities))
        .route(
            "/catalog-files",
            get(catalog_files::list_catalog_files).post(catalog_files::create_catalog_file),
        )
        .route("/export", get(export::export_tables))
        .with_state(state)
}

/// The full application: routes plus body limit, validation, compression, tracing and
/// security headers. CORS is permissive in debug builds only.
pub fn app(state: AppState) -> Router {
    let cfg = state.config.clone();
    let app = router(state)
        .layer(DefaultBodyLimit::max(validation::MAX_BODY_BYTES))
        .layer(from_fn_with_state(
            validation::MAX_BODY_BYTES,
            validation::validate_request_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, security_headers_middleware));

    if cfg!(debug_assertions) {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
