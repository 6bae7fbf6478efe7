//! Row loaders for the characteristic tables and the category tree.

use serde::Serialize;
use sqlx::{Executor, Row, Sqlite};

use super::hierarchy::TreeRow;
use super::resolver::FactRow;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TreeRow for GroupRow {
    fn id(&self) -> i64 {
        self.id
    }
    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn sort_key(&self) -> i64 {
        self.sort_order
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TreeRow for CategoryRow {
    fn id(&self) -> i64 {
        self.id
    }
    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn sort_key(&self) -> i64 {
        self.sort_order
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ValueRow {
    pub id: i64,
    pub group_id: i64,
    pub value: String,
    pub display_name: Option<String>,
    pub color_hex: Option<String>,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TemplateRow {
    pub id: i64,
    pub group_id: i64,
    pub group_name: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub input_type: String,
    pub unit_id: Option<i64>,
    pub unit_code: Option<String>,
    pub is_required: bool,
    pub sort_order: i64,
    pub validation_rules: String,
    pub default_value: Option<String>,
    pub placeholder_text: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Self-referencing tables guarded against cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeTable {
    Groups,
    Categories,
}

impl TreeTable {
    pub fn entity(self) -> &'static str {
        match self {
            TreeTable::Groups => "group",
            TreeTable::Categories => "category",
        }
    }
}

/// Filter for [`load_facts`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FactFilter {
    pub product_id: Option<i64>,
    pub group_id: Option<i64>,
}

pub async fn load_groups<'e, E>(exec: E, active_only: bool) -> Result<Vec<GroupRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = if active_only {
        "SELECT id, name, description, parent_id, sort_order, is_active, created_at, updated_at \
         FROM characteristic_groups WHERE is_active = 1 ORDER BY sort_order, id"
    } else {
        "SELECT id, name, description, parent_id, sort_order, is_active, created_at, updated_at \
         FROM characteristic_groups ORDER BY sort_order, id"
    };
    sqlx::query_as::<_, GroupRow>(sql).fetch_all(exec).await
}

pub async fn load_categories<'e, E>(
    exec: E,
    active_only: bool,
) -> Result<Vec<CategoryRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = if active_only {
        "SELECT id, name, description, parent_id, type, sort_order, is_active, \
                created_at, updated_at \
         FROM product_categories WHERE is_active = 1 ORDER BY sort_order, id"
    } else {
        "SELECT id, name, description, parent_id, type, sort_order, is_active, \
                created_at, updated_at \
         FROM product_categories ORDER BY sort_order, id"
    };
    sqlx::query_as::<_, CategoryRow>(sql).fetch_all(exec).await
}

pub async fn load_values<'e, E>(
    exec: E,
    group_id: Option<i64>,
) -> Result<Vec<ValueRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, ValueRow>(
        "SELECT id, group_id, value, display_name, color_hex, sort_order, is_active, \
                created_at, updated_at \
         FROM characteristic_values \
         WHERE is_active = 1 AND (?1 IS NULL OR group_id = ?1) \
         ORDER BY group_id, sort_order, id",
    )
    .bind(group_id)
    .fetch_all(exec)
    .await
}

pub async fn load_templates<'e, E>(
    exec: E,
    group_id: Option<i64>,
) -> Result<Vec<TemplateRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, TemplateRow>(
        "SELECT t.id, t.group_id, g.name AS group_name, t.name, t.description, t.input_type, \
                t.unit_id, u.code AS unit_code, t.is_required, t.sort_order, t.validation_rules, \
                t.default_value, t.placeholder_text, t.created_at, t.updated_at \
         FROM characteristic_templates t \
         LEFT JOIN characteristic_groups g ON g.id = t.group_id \
         LEFT JOIN characteristic_units u ON u.id = t.unit_id \
         WHERE ?1 IS NULL OR t.group_id = ?1 \
         ORDER BY g.sort_order, t.sort_order, t.id",
    )
    .bind(group_id)
    .fetch_all(exec)
    .await
}

/// Facts joined with everything the resolver needs, ordered by group then value order.
pub async fn load_facts<'e, E>(exec: E, filter: FactFilter) -> Result<Vec<FactRow>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, FactRow>(
        "SELECT pc.id, pc.product_id, p.name AS product_name, \
                pc.group_id, g.name AS group_name, g.sort_order AS group_sort_order, \
                pc.template_id, t.name AS template_name, t.input_type, t.is_required, \
                u.code AS unit_code, u.name AS unit_name, \
                pc.value_text, pc.value_numeric, pc.value_color, pc.value_preset_id, \
                v.value AS preset_value, v.display_name AS preset_display_name, \
                v.color_hex AS preset_color, \
                pc.label, pc.is_primary \
         FROM product_characteristics pc \
         JOIN characteristic_groups g ON g.id = pc.group_id \
         LEFT JOIN products p ON p.id = pc.product_id \
         LEFT JOIN characteristic_templates t ON t.id = pc.template_id \
         LEFT JOIN characteristic_units u ON u.id = t.unit_id \
         LEFT JOIN characteristic_values v ON v.id = pc.value_preset_id \
         WHERE (?1 IS NULL OR pc.product_id = ?1) AND (?2 IS NULL OR pc.group_id = ?2) \
         ORDER BY pc.product_id, g.sort_order, g.id, t.sort_order, v.sort_order, pc.id",
    )
    .bind(filter.product_id)
    .bind(filter.group_id)
    .fetch_all(exec)
    .await
}

pub async fn parent_links<'e, E>(
    exec: E,
    table: TreeTable,
) -> Result<Vec<(i64, Option<i64>)>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = match table {
        TreeTable::Groups => "SELECT id, parent_id FROM characteristic_groups",
        TreeTable::Categories => "SELECT id, parent_id FROM product_categories",
    };
    let rows = sqlx::query(sql).fetch_all(exec).await?;
    Ok(rows.iter().map(|r| (r.get::<i64, _>("id"), r.get::<Option<i64>, _>("parent_id"))).collect())
}
