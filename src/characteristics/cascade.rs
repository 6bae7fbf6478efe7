//! Group removal: guarded by default, cascading when forced.
//!
//! Both modes run in one transaction. A guarded delete inspects dependents first and
//! refuses with a [`DeleteBlocked`] reason; a forced delete removes descendants depth-first
//! (post-order) along with every fact, template and preset value they own.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::json;
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::hierarchy::descendants_post_order;
use super::store::{self, TreeTable};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct DeletePolicy {
    pub protected_group: String,
    pub preview_len: usize,
    pub sample_len: usize,
}

impl DeletePolicy {
    pub fn from_config(cfg: &crate::config::CatalogConfig) -> Self {
        Self {
            protected_group: cfg.protected_group.clone(),
            preview_len: cfg.delete_preview_len,
            sample_len: cfg.delete_sample_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeleteBlocked {
    #[error("Group \"{name}\" is protected and cannot be deleted")]
    Protected { group_id: i64, name: String },
    #[error("Group \"{name}\" has {count} child group(s): {preview}")]
    HasChildren { group_id: i64, name: String, count: usize, names: Vec<String>, preview: String },
    #[error(
        "Group \"{name}\" is used by {count} characteristic(s) of \
         {product_count} product(s): {preview}"
    )]
    HasCharacteristics {
        group_id: i64,
        name: String,
        count: usize,
        product_count: usize,
        products: Vec<String>,
        preview: String,
    },
}

impl DeleteBlocked {
    pub fn code(&self) -> &'static str {
        match self {
            DeleteBlocked::Protected { .. } => "PROTECTED_GROUP",
            DeleteBlocked::HasChildren { .. } => "HAS_CHILDREN",
            DeleteBlocked::HasCharacteristics { .. } => "HAS_CHARACTERISTICS",
        }
    }

    pub fn details(&self) -> serde_json::Value {
        match self {
            DeleteBlocked::Protected { group_id, name } => {
                json!({ "group_id": group_id, "name": name })
            }
            DeleteBlocked::HasChildren { group_id, count, names, .. } => {
                json!({ "group_id": group_id, "count": count, "children": names })
            }
            DeleteBlocked::HasCharacteristics {
                group_id, count, product_count, products, ..
            } => json!({
                "group_id": group_id,
                "count": count,
                "product_count": product_count,
                "products": products,
                "can_force": true,
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CascadeError {
    #[error("Group {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Blocked(#[from] DeleteBlocked),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl From<CascadeError> for AppError {
    fn from(e: CascadeError) -> Self {
        match e {
            CascadeError::NotFound(id) => AppError::NotFound(format!("Group {} not found", id)),
            CascadeError::Blocked(b) => b.into(),
            CascadeError::Storage(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub group_id: i64,
    pub name: String,
    pub forced: bool,
    pub deleted_groups: u64,
    pub deleted_characteristics: u64,
    pub deleted_templates: u64,
    pub deleted_values: u64,
}

impl DeleteOutcome {
    fn absorb(&mut self, purged: Purged) {
        self.deleted_groups += purged.groups;
        self.deleted_characteristics += purged.characteristics;
        self.deleted_templates += purged.templates;
        self.deleted_values += purged.values;
    }
}

#[derive(Debug, Default)]
struct Purged {
    groups: u64,
    characteristics: u64,
    templates: u64,
    values: u64,
}

/// Joins the first `limit` names and appends "and N more" when truncated.
pub fn preview(names: &[String], limit: usize) -> String {
    let shown = names.iter().take(limit).cloned().collect::<Vec<_>>().join(", ");
    if names.len() > limit {
        format!("{} and {} more", shown, names.len() - limit)
    } else {
        shown
    }
}

pub async fn delete_group(
    pool: &SqlitePool,
    group_id: i64,
    force: bool,
    policy: &DeletePolicy,
) -> Result<DeleteOutcome, CascadeError> {
    let mut tx = pool.begin().await?;
    match delete_group_in(&mut *tx, group_id, force, policy).await {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::error!("Rollback of group {} delete failed: {}", group_id, rb);
            }
            Err(e)
        }
    }
}

async fn delete_group_in(
    conn: &mut SqliteConnection,
    group_id: i64,
    force: bool,
    policy: &DeletePolicy,
) -> Result<DeleteOutcome, CascadeError> {
    let name: String = sqlx::query("SELECT name FROM characteristic_groups WHERE id = ?")
        .bind(group_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|r| r.get("name"))
        .ok_or(CascadeError::NotFound(group_id))?;

    if name == policy.protected_group {
        return Err(DeleteBlocked::Protected { group_id, name }.into());
    }

    let mut outcome =
        DeleteOutcome { group_id, name: name.clone(), forced: force, ..Default::default() };

    if force {
        let links = store::parent_links(&mut *conn, TreeTable::Groups).await?;
        for id in descendants_post_order(&links, group_id) {
            outcome.absorb(purge_group(conn, id).await?);
        }
    } else {
        check_dependents(conn, group_id, &name, policy).await?;
    }

    outcome.absorb(purge_group(conn, group_id).await?);
    tracing::info!(
        group_id,
        forced = force,
        groups = outcome.deleted_groups,
        characteristics = outcome.deleted_characteristics,
        "Deleted characteristic group"
    );
    Ok(outcome)
}

async fn check_dependents(
    conn: &mut SqliteConnection,
    group_id: i64,
    name: &str,
    policy: &DeletePolicy,
) -> Result<(), CascadeError> {
    let children: Vec<String> = sqlx::query(
        "SELECT name FROM characteristic_groups WHERE parent_id = ? ORDER BY sort_order, id",
    )
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(|r| r.get("name"))
    .collect();
    if !children.is_empty() {
        return Err(DeleteBlocked::HasChildren {
            group_id,
            name: name.to_string(),
            count: children.len(),
            preview: preview(&children, policy.preview_len),
            names: children,
        }
        .into());
    }

    let rows = sqlx::query(
        "SELECT pc.product_id, p.name AS product_name \
         FROM product_characteristics pc \
         LEFT JOIN products p ON p.id = pc.product_id \
         WHERE pc.group_id = ?1 \
            OR pc.value_preset_id IN (SELECT id FROM characteristic_values WHERE group_id = ?1) \
            OR pc.template_id IN (SELECT id FROM characteristic_templates WHERE group_id = ?1)",
    )
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await?;

    if rows.is_empty() {
        return Ok(());
    }

    let mut product_ids = BTreeSet::new();
    let mut product_names = BTreeSet::new();
    for row in &rows {
        let pid: i64 = row.get("product_id");
        product_ids.insert(pid);
        let pname: Option<String> = row.get("product_name");
        product_names.insert(pname.unwrap_or_else(|| format!("#{}", pid)));
    }
    let names: Vec<String> = product_names.into_iter().collect();

    Err(DeleteBlocked::HasCharacteristics {
        group_id,
        name: name.to_string(),
        count: rows.len(),
        product_count: product_ids.len(),
        preview: preview(&names, policy.preview_len),
        products: names.into_iter().take(policy.sample_len).collect(),
    }
    .into())
}

/// Removes one group and everything it owns. Children must already be gone.
async fn purge_group(conn: &mut SqliteConnection, group_id: i64) -> Result<Purged, sqlx::Error> {
    let characteristics = sqlx::query(
        "DELETE FROM product_characteristics \
         WHERE group_id = ?1 \
            OR value_preset_id IN (SELECT id FROM characteristic_values WHERE group_id = ?1) \
            OR template_id IN (SELECT id FROM characteristic_templates WHERE group_id = ?1)",
    )
    .bind(group_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let templates = sqlx::query("DELETE FROM characteristic_templates WHERE group_id = ?")
        .bind(group_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let values = sqlx::query("DELETE FROM characteristic_values WHERE group_id = ?")
        .bind(group_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let groups = sqlx::query("DELETE FROM characteristic_groups WHERE id = ?")
        .bind(group_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(Purged { groups, characteristics, templates, values })
}
