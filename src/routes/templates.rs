use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use sqlx::{Row, SqliteConnection};

use super::{keys, ok};
use crate::characteristics::resolver::InputType;
use crate::characteristics::store::{self, TemplateRow};
use crate::db::require_tables;
use crate::error::{validation::require_name, AppError, AppResult};
use crate::state::AppState;
use crate::types::{
    GroupIdQuery, PresetValueInput, TemplateBatchUpdate, TemplateCreate, TemplateUpdate,
};

const TEMPLATE_TABLES: &[&str] =
    &["characteristic_groups", "characteristic_templates", "characteristic_values"];

fn parse_input_type(raw: Option<&str>) -> AppResult<InputType> {
    match raw {
        None => Ok(InputType::Text),
        Some(s) => s.parse().map_err(|e: crate::characteristics::resolver::UnknownInputType| {
            AppError::ValidationError { field: "input_type".to_string(), message: e.to_string() }
        }),
    }
}

fn rules_to_text(rules: Option<&Value>) -> AppResult<Option<String>> {
    match rules {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Object(_)) => Ok(Some(v.to_string())),
        Some(_) => Err(AppError::ValidationError {
            field: "validation_rules".to_string(),
            message: "validation_rules must be a JSON object".to_string(),
        }),
    }
}

/// Rules are stored as text; expose them as JSON, falling back to `{}` for corrupt rows.
fn template_json(t: &TemplateRow) -> Value {
    let mut v = json!(t);
    v["validation_rules"] = serde_json::from_str(&t.validation_rules).unwrap_or_else(|_| json!({}));
    v
}

pub async fn list_templates(
    State(state): State<AppState>,
    Query(q): Query<GroupIdQuery>,
) -> AppResult<Json<Value>> {
    require_tables(&state.db, TEMPLATE_TABLES).await?;
    let templates = store::load_templates(&state.db, q.group_id).await?;
    let data: Vec<Value> = templates.iter().map(template_json).collect();
    Ok(Json(json!({ "success": true, "total": data.len(), "data": data })))
}

/// Creates a template and, in the same transaction, the preset values it ships with.
pub async fn create_template(
    State(state): State<AppState>,
    Json(req): Json<TemplateCreate>,
) -> AppResult<impl IntoResponse> {
    require_tables(&state.db, TEMPLATE_TABLES).await?;

    let group_id = req.group_id.ok_or_else(|| AppError::required("group_id"))?;
    let name = require_name(req.name.as_deref(), "name")?;
    let input_type = parse_input_type(req.input_type.as_deref())?;
    let rules = rules_to_text(req.validation_rules.as_ref())?;

    let mut tx = state.db.begin().await?;
    match insert_template(&mut *tx, group_id, &name, input_type, rules, &req).await {
        Ok((id, preset_ids)) => {
            tx.commit().await?;
            state.invalidate(&[keys::GROUPS]);
            tracing::info!(
                id,
                group_id,
                presets = preset_ids.len(),
                "Created characteristic template {}",
                name
            );

            let template = store::load_templates(&state.db, Some(group_id))
                .await?
                .into_iter()
                .find(|t| t.id == id)
                .ok_or_else(|| {
                    AppError::NotFound("Characteristic template not found".to_string())
                })?;
            let mut body = template_json(&template);
            body["preset_value_ids"] = json!(preset_ids);
            Ok((StatusCode::CREATED, ok(body)))
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::error!("Rollback of template create failed: {}", rb);
            }
            Err(e)
        }
    }
}

async fn insert_template(
    conn: &mut SqliteConnection,
    group_id: i64,
    name: &str,
    input_type: InputType,
    rules: Option<String>,
    req: &TemplateCreate,
) -> AppResult<(i64, Vec<i64>)> {
    let group_exists = sqlx::query("SELECT 1 FROM characteristic_groups WHERE id = ?")
        .bind(group_id)
        .fetch_optional(&mut *conn)
        .await?
        .is_some();
    if !group_exists {
        return Err(AppError::NotFound(format!("Characteristic group {} not found", group_id)));
    }
    if let Some(unit_id) = req.unit_id {
        let unit_exists = sqlx::query("SELECT 1 FROM characteristic_units WHERE id = ?")
            .bind(unit_id)
            .fetch_optional(&mut *conn)
            .await?
            .is_some();
        if !unit_exists {
            return Err(AppError::NotFound(format!("Unit {} not found", unit_id)));
        }
    }

    let id = sqlx::query(
        "INSERT INTO characteristic_templates \
         (group_id, name, description, input_type, unit_id, is_required, sort_order, \
          validation_rules, default_value, placeholder_text) \
         VALUES (?, ?, ?, ?, ?, ?, ?, COALESCE(?, '{}'), ?, ?)",
    )
    .bind(group_id)
    .bind(name)
    .bind(req.description.as_deref())
    .bind(input_type.as_str())
    .bind(req.unit_id)
    .bind(req.is_required.unwrap_or(false))
    .bind(req.sort_order.unwrap_or(0))
    .bind(rules)
    .bind(req.default_value.as_deref())
    .bind(req.placeholder_text.as_deref())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let preset_ids = insert_presets(conn, group_id, &req.preset_values).await?;
    Ok((id, preset_ids))
}

/// Adds presets to the group, skipping blanks and values the group already has.
async fn insert_presets(
    conn: &mut SqliteConnection,
    group_id: i64,
    presets: &[PresetValueInput],
) -> AppResult<Vec<i64>> {
    let mut next_order: i64 = sqlx::query(
        "SELECT COALESCE(MAX(sort_order), 0) AS m FROM characteristic_values WHERE group_id = ?",
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await?
    .get("m");

    let mut ids = Vec::new();
    for preset in presets {
        let value = preset.value().trim();
        if value.is_empty() {
            continue;
        }
        let exists =
            sqlx::query("SELECT 1 FROM characteristic_values WHERE group_id = ? AND value = ?")
                .bind(group_id)
                .bind(value)
                .fetch_optional(&mut *conn)
                .await?
                .is_some();
        if exists {
            continue;
        }

        let (display_name, color_hex, sort_order) = match preset {
            PresetValueInput::Plain(_) => (None, None, None),
            PresetValueInput::Full { display_name, color_hex, sort_order, .. } => {
                crate::error::validation::validate_color_hex(color_hex.as_deref(), "color_hex")?;
                (display_name.clone(), color_hex.clone(), *sort_order)
            }
        };
        next_order += 1;
        let id = sqlx::query(
            "INSERT INTO characteristic_values \
             (group_id, value, display_name, color_hex, sort_order) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(group_id)
        .bind(value)
        .bind(display_name)
        .bind(color_hex)
        .bind(sort_order.unwrap_or(next_order))
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
        ids.push(id);
    }
    Ok(ids)
}

/// Applies a batch of template edits atomically: one unknown id rolls back the whole batch.
pub async fn update_templates(
    State(state): State<AppState>,
    Json(req): Json<TemplateBatchUpdate>,
) -> AppResult<Json<Value>> {
    require_tables(&state.db, TEMPLATE_TABLES).await?;
    if req.templates.is_empty() {
        return Err(AppError::BadRequest("templates must not be empty".to_string()));
    }

    let mut tx = state.db.begin().await?;
    let mut updated = 0u64;
    for update in &req.templates {
        match apply_template_update(&mut *tx, update).await {
            Ok(n) => updated += n,
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::error!("Rollback of template batch failed: {}", rb);
                }
                return Err(e);
            }
        }
    }
    tx.commit().await?;

    state.invalidate(&[keys::GROUPS]);
    Ok(ok(json!({ "updated": updated })))
}

async fn apply_template_update(conn: &mut SqliteConnection, u: &TemplateUpdate) -> AppResult<u64> {
    if let Some(name) = u.name.as_deref() {
        require_name(Some(name), "name")?;
    }
    let input_type = match u.input_type.as_deref() {
        Some(raw) => Some(parse_input_type(Some(raw))?),
        None => None,
    };
    let rules = rules_to_text(u.validation_rules.as_ref())?;

    let affected = sqlx::query(
        "UPDATE characteristic_templates SET \
            name = COALESCE(?, name), \
            description = COALESCE(?, description), \
            input_type = COALESCE(?, input_type), \
            unit_id = COALESCE(?, unit_id), \
            is_required = COALESCE(?, is_required), \
            sort_order = COALESCE(?, sort_order), \
            validation_rules = COALESCE(?, validation_rules), \
            default_value = COALESCE(?, default_value), \
            placeholder_text = COALESCE(?, placeholder_text), \
            updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
         WHERE id = ?",
    )
    .bind(u.name.as_deref().map(str::trim))
    .bind(u.description.as_deref())
    .bind(input_type.map(InputType::as_str))
    .bind(u.unit_id)
    .bind(u.is_required)
    .bind(u.sort_order)
    .bind(rules)
    .bind(u.default_value.as_deref())
    .bind(u.placeholder_text.as_deref())
    .bind(u.id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::NotFound(format!("Characteristic template {} not found", u.id)));
    }
    Ok(affected)
}
