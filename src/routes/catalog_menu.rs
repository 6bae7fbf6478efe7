//! Storefront catalog menu: which groups, categories, manufacturers and model lines are
//! pinned to the menu, and the pool of entities that could be.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::{sqlite::SqliteRow, Row};

use super::ok;
use crate::error::{AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{EntityTypeQuery, MenuSettingInput, MenuSettingRow, MENU_ENTITY_TYPES};

const MENU_COLUMNS: &str =
    "id, entity_type, entity_id, name, sort_order, is_visible, created_at, updated_at";
const MANUFACTURERS_CATEGORY: &str = "manufacturers_category";

/// One candidate menu entry. Type-specific fields are omitted when absent.
#[derive(Debug, Default, Serialize)]
pub struct MenuEntity {
    pub entity_type: &'static str,
    pub entity_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub is_active: bool,
    pub in_menu: bool,
    pub characteristics_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_root: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_series_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer_name: Option<String>,
    #[serde(rename = "virtual", skip_serializing_if = "std::ops::Not::not")]
    pub is_virtual: bool,
}

/// Table holding the entities of `entity_type`; `None` for the virtual entry.
fn entity_table(entity_type: &str) -> Option<&'static str> {
    match entity_type {
        "spec_group" => Some("characteristic_groups"),
        "category" => Some("product_categories"),
        "manufacturer" => Some("manufacturers"),
        "model_line" => Some("model_series"),
        _ => None,
    }
}

fn known_entity_type(raw: &str) -> AppResult<&'static str> {
    MENU_ENTITY_TYPES.iter().copied().find(|t| *t == raw).ok_or_else(|| AppError::ValidationError {
        field: "entity_type".to_string(),
        message: format!(
            "Unknown entity type '{}'; expected one of {}",
            raw,
            MENU_ENTITY_TYPES.join(", ")
        ),
    })
}

fn in_menu_sql(entity_type: &str, id_column: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM catalog_menu_settings cms \
                 WHERE cms.entity_type = '{}' AND cms.entity_id = {}) AS in_menu",
        entity_type, id_column
    )
}

fn base_entity(entity_type: &'static str, row: &SqliteRow) -> Result<MenuEntity, sqlx::Error> {
    Ok(MenuEntity {
        entity_type,
        entity_id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        in_menu: row.try_get("in_menu")?,
        ..Default::default()
    })
}

/// Active root characteristic groups with their active value and child counts.
async fn spec_groups(state: &AppState) -> Result<Vec<MenuEntity>, sqlx::Error> {
    let sql = format!(
        "SELECT cg.id, cg.name, cg.description, cg.is_active, {}, \
                (SELECT COUNT(*) FROM characteristic_values cv \
                 WHERE cv.group_id = cg.id AND cv.is_active = 1) AS characteristics_count, \
                (SELECT COUNT(*) FROM characteristic_groups child \
                 WHERE child.parent_id = cg.id AND child.is_active = 1) AS children_count \
         FROM characteristic_groups cg \
         WHERE cg.is_active = 1 AND cg.parent_id IS NULL \
         ORDER BY cg.name, cg.id",
        in_menu_sql("spec_group", "cg.id")
    );
    let rows = sqlx::query(&sql).fetch_all(&state.db).await?;
    rows.iter()
        .map(|row| -> Result<MenuEntity, sqlx::Error> {
            Ok(MenuEntity {
                characteristics_count: row.try_get("characteristics_count")?,
                children_count: Some(row.try_get("children_count")?),
                is_root: Some(true),
                ..base_entity("spec_group", row)?
            })
        })
        .collect()
}

/// Active root categories.
async fn categories(state: &AppState) -> Result<Vec<MenuEntity>, sqlx::Error> {
    let sql = format!(
        "SELECT c.id, c.name, c.description, c.is_active, c.type AS category_type, {}, \
                (SELECT COUNT(*) FROM product_categories child \
                 WHERE child.parent_id = c.id AND child.is_active = 1) AS children_count \
         FROM product_categories c \
         WHERE c.is_active = 1 AND c.parent_id IS NULL \
         ORDER BY c.name, c.id",
        in_menu_sql("category", "c.id")
    );
    let rows = sqlx::query(&sql).fetch_all(&state.db).await?;
    rows.iter()
        .map(|row| -> Result<MenuEntity, sqlx::Error> {
            Ok(MenuEntity {
                category_type: row.try_get("category_type")?,
                children_count: Some(row.try_get("children_count")?),
                is_root: Some(true),
                ..base_entity("category", row)?
            })
        })
        .collect()
}

async fn manufacturers(state: &AppState) -> Result<Vec<MenuEntity>, sqlx::Error> {
    let sql = format!(
        "SELECT m.id, m.name, m.description, m.is_active, m.country, {}, \
                (SELECT COUNT(*) FROM model_series ml \
                 WHERE ml.manufacturer_id = m.id AND ml.is_active = 1) AS model_series_count \
         FROM manufacturers m \
         WHERE m.is_active = 1 \
         ORDER BY m.name, m.id",
        in_menu_sql("manufacturer", "m.id")
    );
    let rows = sqlx::query(&sql).fetch_all(&state.db).await?;
    rows.iter()
        .map(|row| -> Result<MenuEntity, sqlx::Error> {
            Ok(MenuEntity {
                country: row.try_get("country")?,
                model_series_count: Some(row.try_get("model_series_count")?),
                ..base_entity("manufacturer", row)?
            })
        })
        .collect()
}

async fn model_lines(state: &AppState) -> Result<Vec<MenuEntity>, sqlx::Error> {
    let sql = format!(
        "SELECT ml.id, ml.name, ml.description, ml.is_active, ml.manufacturer_id, \
                m.name AS manufacturer_name, {} \
         FROM model_series ml \
         LEFT JOIN manufacturers m ON m.id = ml.manufacturer_id \
         WHERE ml.is_active = 1 \
         ORDER BY ml.name, ml.id",
        in_menu_sql("model_line", "ml.id")
    );
    let rows = sqlx::query(&sql).fetch_all(&state.db).await?;
    rows.iter()
        .map(|row| -> Result<MenuEntity, sqlx::Error> {
            Ok(MenuEntity {
                manufacturer_id: Some(row.try_get("manufacturer_id")?),
                manufacturer_name: row.try_get("manufacturer_name")?,
                ..base_entity("model_line", row)?
            })
        })
        .collect()
}

/// The virtual "all manufacturers" entry, offered until it is pinned.
async fn manufacturers_category(state: &AppState) -> Result<Vec<MenuEntity>, sqlx::Error> {
    let (pinned, active): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM catalog_menu_settings WHERE entity_type = ?), \
                (SELECT COUNT(*) FROM manufacturers WHERE is_active = 1)",
    )
    .bind(MANUFACTURERS_CATEGORY)
    .fetch_one(&state.db)
    .await?;

    if pinned > 0 {
        return Ok(Vec::new());
    }
    Ok(vec![MenuEntity {
        entity_type: MANUFACTURERS_CATEGORY,
        entity_id: 0,
        name: "Все производители".to_string(),
        description: Some(format!(
            "Автоматическая категория, включающая всех активных производителей ({})",
            active
        )),
        is_active: true,
        in_menu: false,
        characteristics_count: active,
        is_virtual: true,
        ..Default::default()
    }])
}

async fn load_entities(
    state: &AppState,
    entity_type: &str,
) -> Result<Vec<MenuEntity>, sqlx::Error> {
    match entity_type {
        "spec_group" => spec_groups(state).await,
        "category" => categories(state).await,
        "manufacturer" => manufacturers(state).await,
        "model_line" => model_lines(state).await,
        _ => manufacturers_category(state).await,
    }
}

/// Candidate menu entities by type, flattened, with in-menu statistics.
/// `?entity_type=` narrows `data` to one type's list.
pub async fn available_entities(
    State(state): State<AppState>,
    Query(q): Query<EntityTypeQuery>,
) -> AppResult<Json<Value>> {
    let filter = match q.entity_type.as_deref() {
        Some(raw) => Some(known_entity_type(raw)?),
        None => None,
    };

    let mut by_type = Vec::with_capacity(MENU_ENTITY_TYPES.len());
    for kind in MENU_ENTITY_TYPES {
        let entities = if filter.map_or(true, |f| f == *kind) {
            load_entities(&state, kind).await?
        } else {
            Vec::new()
        };
        by_type.push((*kind, entities));
    }

    let counts: Map<String, Value> =
        by_type.iter().map(|(k, v)| (k.to_string(), json!(v.len()))).collect();
    let flat: Vec<&MenuEntity> = by_type.iter().flat_map(|(_, v)| v.iter()).collect();
    let in_menu = flat.iter().filter(|e| e.in_menu).count();
    let stats = json!({
        "total": flat.len(),
        "in_menu": in_menu,
        "not_in_menu": flat.len() - in_menu,
        "by_type": counts,
    });

    let data = match filter {
        Some(kind) => json!(by_type.iter().find(|(k, _)| *k == kind).map(|(_, v)| v)),
        None => Value::Object(by_type.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()),
    };

    Ok(Json(json!({
        "success": true,
        "data": data,
        "flat": flat,
        "stats": stats,
        "entity_types": MENU_ENTITY_TYPES,
    })))
}

pub async fn list_menu_settings(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let sql = format!("SELECT {} FROM catalog_menu_settings ORDER BY sort_order, id", MENU_COLUMNS);
    let rows = sqlx::query_as::<_, MenuSettingRow>(&sql).fetch_all(&state.db).await?;
    Ok(Json(json!({ "success": true, "total": rows.len(), "data": rows })))
}

/// Pins an entity to the menu, or updates its entry. Fields left out keep their
/// stored values.
pub async fn upsert_menu_setting(
    State(state): State<AppState>,
    Json(req): Json<MenuSettingInput>,
) -> AppResult<Json<Value>> {
    let raw_type = req.entity_type.as_deref().map(str::trim).unwrap_or_default();
    if raw_type.is_empty() {
        return Err(AppError::required("entity_type"));
    }
    let entity_type = known_entity_type(raw_type)?;

    let entity_id = match entity_table(entity_type) {
        Some(table) => {
            let id = req.entity_id.ok_or_else(|| AppError::required("entity_id"))?;
            let sql = format!("SELECT id FROM {} WHERE id = ?", table);
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(id)
                .fetch_optional(&state.db)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{} {} not found", entity_type, id)))?
        }
        None => match req.entity_id {
            None | Some(0) => 0,
            Some(other) => {
                return Err(AppError::ValidationError {
                    field: "entity_id".to_string(),
                    message: format!("{} always uses entity_id 0, got {}", entity_type, other),
                })
            }
        },
    };
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    sqlx::query(
        "INSERT INTO catalog_menu_settings (entity_type, entity_id, name, sort_order, is_visible) \
         VALUES (?1, ?2, ?3, COALESCE(?4, 0), COALESCE(?5, 1)) \
         ON CONFLICT (entity_type, entity_id) DO UPDATE SET \
            name = COALESCE(?3, name), \
            sort_order = COALESCE(?4, sort_order), \
            is_visible = COALESCE(?5, is_visible), \
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')",
    )
    .bind(entity_type)
    .bind(entity_id)
    .bind(name)
    .bind(req.sort_order)
    .bind(req.is_visible)
    .execute(&state.db)
    .await?;

    let sql = format!(
        "SELECT {} FROM catalog_menu_settings WHERE entity_type = ? AND entity_id = ?",
        MENU_COLUMNS
    );
    let row = sqlx::query_as::<_, MenuSettingRow>(&sql)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("Menu entry")?;
    tracing::info!(entity_type, entity_id, "Catalog menu entry saved");
    Ok(ok(row))
}

pub async fn delete_menu_setting(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let removed = sqlx::query("DELETE FROM catalog_menu_settings WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::NotFound("Menu entry not found".to_string()));
    }
    Ok(ok(json!({ "id": id, "deleted": true })))
}
