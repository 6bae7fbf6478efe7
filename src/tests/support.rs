use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::state::AppState;

/// One connection only: every `sqlite::memory:` connection is its own database.
pub async fn memory_pool() -> SqlitePool {
    let pool =
        SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
    crate::db::init_db(&pool).await.unwrap();
    pool
}

pub async fn test_state() -> AppState {
    AppState::new(memory_pool().await, AppConfig::default())
}

pub async fn setup_app() -> (Router, AppState) {
    let state = test_state().await;
    (crate::routes::app(state.clone()), state)
}

/// Sends one request through the full middleware stack and decodes a JSON body
/// (`Value::Null` for non-JSON bodies).
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = call_raw(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn call_raw(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

pub async fn insert_group(
    pool: &SqlitePool,
    name: &str,
    parent_id: Option<i64>,
    sort_order: i64,
) -> i64 {
    sqlx::query("INSERT INTO characteristic_groups (name, parent_id, sort_order) VALUES (?, ?, ?)")
        .bind(name)
        .bind(parent_id)
        .bind(sort_order)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn insert_value(
    pool: &SqlitePool,
    group_id: i64,
    value: &str,
    display_name: Option<&str>,
) -> i64 {
    sqlx::query(
        "INSERT INTO characteristic_values (group_id, value, display_name) VALUES (?, ?, ?)",
    )
    .bind(group_id)
    .bind(value)
    .bind(display_name)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn insert_product(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO products (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub async fn insert_fact(
    pool: &SqlitePool,
    product_id: i64,
    group_id: i64,
    preset_id: Option<i64>,
) -> i64 {
    sqlx::query(
        "INSERT INTO product_characteristics (product_id, group_id, value_preset_id) \
         VALUES (?, ?, ?)",
    )
    .bind(product_id)
    .bind(group_id)
    .bind(preset_id)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
