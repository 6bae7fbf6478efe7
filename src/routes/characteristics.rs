use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{cached, keys, ok};
use crate::characteristics::aggregate::{
    by_group, by_section, GroupBucket, Grouped, Section, SectionIndex,
};
use crate::characteristics::hierarchy::{build_forest, descendants_post_order};
use crate::characteristics::resolver::{resolve_all, ResolvedCharacteristic};
use crate::characteristics::store::{self, FactFilter, TreeTable, ValueRow};
use crate::error::{AppError, AppResult, OptionExt};
use crate::state::AppState;
use crate::types::{
    ByCategoryQuery, CharacteristicInput, SaveCharacteristics, SizeRow, SpecValuesQuery,
};

async fn ensure_product(state: &AppState, id: i64) -> AppResult<String> {
    let name: Option<String> =
        sqlx::query_scalar::<_, String>("SELECT name FROM products WHERE id = ? AND is_deleted = 0")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;
    name.ok_or_not_found("Product")
}

async fn load_resolved(
    state: &AppState,
    filter: FactFilter,
) -> AppResult<Vec<ResolvedCharacteristic>> {
    let facts = store::load_facts(&state.db, filter).await?;
    Ok(resolve_all(facts, state.config.display.locale))
}

/// Flat list of resolved facts, optionally narrowed to one product and/or group.
pub async fn spec_values(
    State(state): State<AppState>,
    Query(q): Query<SpecValuesQuery>,
) -> AppResult<Json<Value>> {
    let filter = FactFilter { product_id: q.product_id, group_id: q.group_id };
    let resolved = load_resolved(&state, filter).await?;
    Ok(Json(json!({ "success": true, "total": resolved.len(), "data": resolved })))
}

/// Everything the product card needs: facts by group, facts by section, and sizes.
pub async fn product_characteristics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let product_name = ensure_product(&state, id).await?;

    let (groups, facts, sizes) = futures::try_join!(
        store::load_groups(&state.db, false),
        store::load_facts(&state.db, FactFilter { product_id: Some(id), group_id: None }),
        sqlx::query_as::<_, SizeRow>(
            "SELECT id, product_id, size_name, size_value, sku, price, stock_quantity, weight, \
                    sort_order, is_available, created_at, updated_at \
             FROM product_sizes WHERE product_id = ? ORDER BY sort_order, id",
        )
        .bind(id)
        .fetch_all(&state.db),
    )?;

    let index = SectionIndex::from_forest(&build_forest(&groups));
    let resolved = resolve_all(facts, state.config.display.locale);
    let sections = by_section(resolved.clone(), &index);
    let characteristics = by_group(resolved);

    Ok(ok(json!({
        "product_id": id,
        "product_name": product_name,
        "characteristics": characteristics,
        "sections": sections,
        "sizes": sizes,
    })))
}

/// Replaces all facts of a product in one transaction.
pub async fn save_product_characteristics(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SaveCharacteristics>,
) -> AppResult<Json<Value>> {
    ensure_product(&state, id).await?;

    let mut tx = state.db.begin().await?;
    let saved = match replace_facts(&mut *tx, id, &req.characteristics).await {
        Ok(n) => {
            tx.commit().await?;
            n
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::error!("Rollback of characteristics for product {} failed: {}", id, rb);
            }
            return Err(e);
        }
    };

    state.metrics.add_characteristics_saved(saved);
    tracing::info!(product_id = id, saved, "Replaced product characteristics");

    let resolved =
        load_resolved(&state, FactFilter { product_id: Some(id), group_id: None }).await?;
    Ok(ok(json!({ "saved": saved, "characteristics": by_group(resolved) })))
}

async fn replace_facts(
    conn: &mut SqliteConnection,
    product_id: i64,
    inputs: &[CharacteristicInput],
) -> AppResult<u64> {
    sqlx::query("DELETE FROM product_characteristics WHERE product_id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    let mut saved = 0;
    for (i, input) in inputs.iter().enumerate() {
        let group_id = owning_group(conn, i, input).await?;
        sqlx::query(
            "INSERT INTO product_characteristics \
             (product_id, group_id, template_id, value_text, value_numeric, value_color, \
              value_preset_id, label, is_primary) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product_id)
        .bind(group_id)
        .bind(input.template_id)
        .bind(input.value_text.as_deref())
        .bind(input.value_numeric)
        .bind(input.value_color.as_deref())
        .bind(input.value_preset_id)
        .bind(input.label.as_deref())
        .bind(input.is_primary)
        .execute(&mut *conn)
        .await?;
        saved += 1;
    }
    Ok(saved)
}

/// Resolves the group a fact belongs to and checks template and preset agree with it.
async fn owning_group(
    conn: &mut SqliteConnection,
    index: usize,
    input: &CharacteristicInput,
) -> AppResult<i64> {
    let field = |name: &str| format!("characteristics[{}].{}", index, name);

    let template_group: Option<i64> = match input.template_id {
        Some(tid) => Some(
            sqlx::query_scalar::<_, i64>(
                "SELECT group_id FROM characteristic_templates WHERE id = ?",
            )
            .bind(tid)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Characteristic template {} not found", tid))
            })?,
        ),
        None => None,
    };

    let group_id = match (input.group_id, template_group) {
        (Some(g), Some(t)) if g != t => {
            return Err(AppError::ValidationError {
                field: field("group_id"),
                message: format!(
                    "Template {} belongs to group {}, not {}",
                    input.template_id.unwrap_or_default(),
                    t,
                    g
                ),
            })
        }
        (Some(g), _) => g,
        (None, Some(t)) => t,
        (None, None) => return Err(AppError::required(&field("group_id"))),
    };

    if template_group.is_none() {
        let exists =
            sqlx::query_scalar::<_, i64>("SELECT id FROM characteristic_groups WHERE id = ?")
                .bind(group_id)
                .fetch_optional(&mut *conn)
                .await?
                .is_some();
        if !exists {
            return Err(AppError::NotFound(format!("Characteristic group {} not found", group_id)));
        }
    }

    if let Some(preset_id) = input.value_preset_id {
        let preset_group: Option<i64> =
            sqlx::query_scalar::<_, i64>("SELECT group_id FROM characteristic_values WHERE id = ?")
                .bind(preset_id)
                .fetch_optional(&mut *conn)
                .await?;
        match preset_group {
            None => {
                return Err(AppError::NotFound(format!(
                    "Characteristic value {} not found",
                    preset_id
                )))
            }
            Some(pg) if pg != group_id => {
                return Err(AppError::ValidationError {
                    field: field("value_preset_id"),
                    message: format!(
                        "Value {} belongs to group {}, not {}",
                        preset_id, pg, group_id
                    ),
                })
            }
            Some(_) => {}
        }
    }

    Ok(group_id)
}

/// Every active group with its active values, nested under root sections.
pub async fn available(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let data = cached(&state, keys::GROUPS_AVAILABLE, || async {
        let (groups, values) = futures::try_join!(
            store::load_groups(&state.db, true),
            store::load_values(&state.db, None)
        )?;

        let mut by_group_id: HashMap<i64, Vec<ValueRow>> = HashMap::new();
        for v in values {
            by_group_id.entry(v.group_id).or_default().push(v);
        }

        let mut sections: Vec<Section<ValueRow>> = Vec::new();
        for node in build_forest(&groups) {
            let own = by_group_id.remove(&node.row.id).unwrap_or_default();
            if node.is_root {
                sections.push(Section {
                    section_id: node.row.id,
                    section_name: node.row.name.clone(),
                    groups: Vec::new(),
                });
            }
            if let Some(section) = sections.last_mut() {
                section.groups.push(GroupBucket {
                    group_id: node.row.id,
                    group_name: node.full_path,
                    values: own,
                });
            }
        }
        Ok(json!({ "success": true, "data": { "sections": sections } }))
    })
    .await?;
    Ok(Json(data))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CategoryValueRow {
    pub group_id: i64,
    pub group_name: String,
    pub value_preset_id: Option<i64>,
    pub value: Option<String>,
    pub display_value: Option<String>,
    pub product_count: i64,
}

impl Grouped for CategoryValueRow {
    fn group_id(&self) -> i64 {
        self.group_id
    }
    fn group_name(&self) -> &str {
        &self.group_name
    }
}

/// Values used by the products of a category (and by default its subcategories), with
/// how many products carry each one.
pub async fn by_category(
    State(state): State<AppState>,
    Query(q): Query<ByCategoryQuery>,
) -> AppResult<Json<Value>> {
    let category_ids: Option<Vec<i64>> = match q.category_id {
        Some(cid) => {
            let links = store::parent_links(&state.db, TreeTable::Categories).await?;
            if !links.iter().any(|(id, _)| *id == cid) {
                return Err(AppError::NotFound(format!("Category {} not found", cid)));
            }
            let mut ids = vec![cid];
            if q.include_children.unwrap_or(true) {
                ids.extend(descendants_post_order(&links, cid));
            }
            Some(ids)
        }
        None => None,
    };

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT pc.group_id, g.name AS group_name, pc.value_preset_id, \
                COALESCE(v.value, pc.value_text) AS value, \
                COALESCE(v.display_name, v.value, pc.value_text) AS display_value, \
                COUNT(DISTINCT pc.product_id) AS product_count \
         FROM product_characteristics pc \
         JOIN products p ON p.id = pc.product_id AND p.is_deleted = 0 \
         JOIN characteristic_groups g ON g.id = pc.group_id \
         LEFT JOIN characteristic_values v ON v.id = pc.value_preset_id",
    );
    if let Some(ids) = &category_ids {
        qb.push(" WHERE p.category_id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(*id);
        }
        sep.push_unseparated(")");
    }
    qb.push(
        " GROUP BY pc.group_id, g.name, pc.value_preset_id, COALESCE(v.value, pc.value_text) \
          ORDER BY g.sort_order, g.id, MIN(COALESCE(v.sort_order, 0)), value",
    );

    let (rows, groups) = futures::try_join!(
        qb.build_query_as::<CategoryValueRow>().fetch_all(&state.db),
        store::load_groups(&state.db, false),
    )?;
    let index = SectionIndex::from_forest(&build_forest(&groups));

    Ok(ok(json!({
        "category_ids": category_ids,
        "total": rows.len(),
        "sections": by_section(rows, &index),
    })))
}
