//! Re-parenting checks for self-referencing trees.

use std::collections::{HashMap, HashSet};

use serde_json::json;
use sqlx::SqlitePool;

use super::store::{self, TreeTable};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReparentViolation {
    #[error("Record {id} cannot be its own parent")]
    IsSelf { id: i64 },
    #[error("Record {candidate_id} is a descendant of {id} and cannot become its parent")]
    IsDescendant { id: i64, candidate_id: i64 },
    #[error(
        "Subtree of record {id} is deeper than {max_depth} levels; the move cannot be verified"
    )]
    TooDeep { id: i64, candidate_id: i64, max_depth: usize },
}

impl ReparentViolation {
    pub fn code(&self) -> &'static str {
        match self {
            ReparentViolation::IsSelf { .. } => "SELF_PARENT",
            ReparentViolation::IsDescendant { .. } => "DESCENDANT_PARENT",
            ReparentViolation::TooDeep { .. } => "HIERARCHY_TOO_DEEP",
        }
    }

    pub fn details(&self) -> serde_json::Value {
        match self {
            ReparentViolation::IsSelf { id } => json!({ "id": id, "parent_id": id }),
            ReparentViolation::IsDescendant { id, candidate_id } => {
                json!({ "id": id, "parent_id": candidate_id })
            }
            ReparentViolation::TooDeep { id, candidate_id, max_depth } => {
                json!({ "id": id, "parent_id": candidate_id, "max_depth": max_depth })
            }
        }
    }
}

/// Result of a bounded descendant walk.
#[derive(Debug, Default)]
pub struct Descendants {
    pub ids: HashSet<i64>,
    /// False when nodes remain below `max_depth` that the walk did not visit.
    pub complete: bool,
}

/// Descendants of `root` down to `max_depth` edges. `root` is excluded.
pub fn descendants(links: &[(i64, Option<i64>)], root: i64, max_depth: usize) -> Descendants {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for &(id, parent) in links {
        if let Some(p) = parent {
            children.entry(p).or_default().push(id);
        }
    }
    let kids_of = |id: &i64| children.get(id).map(Vec::as_slice).unwrap_or(&[]);

    let mut ids = HashSet::new();
    let mut frontier = vec![root];
    for _ in 0..max_depth {
        let mut next = Vec::new();
        for id in &frontier {
            for &kid in kids_of(id) {
                if kid != root && ids.insert(kid) {
                    next.push(kid);
                }
            }
        }
        if next.is_empty() {
            return Descendants { ids, complete: true };
        }
        frontier = next;
    }

    let complete = frontier.iter().flat_map(kids_of).all(|kid| *kid == root || ids.contains(kid));
    Descendants { ids, complete }
}

/// Pure check: may `id` move under `candidate`? A `None` candidate (make root) always passes.
///
/// A subtree deeper than `max_depth` is refused as `TooDeep`: the candidate could sit below
/// the bound.
pub fn check_reparent(
    links: &[(i64, Option<i64>)],
    id: i64,
    candidate: Option<i64>,
    max_depth: usize,
) -> Result<(), ReparentViolation> {
    let Some(candidate_id) = candidate else {
        return Ok(());
    };
    if candidate_id == id {
        return Err(ReparentViolation::IsSelf { id });
    }
    let below = descendants(links, id, max_depth);
    if below.ids.contains(&candidate_id) {
        return Err(ReparentViolation::IsDescendant { id, candidate_id });
    }
    if !below.complete {
        return Err(ReparentViolation::TooDeep { id, candidate_id, max_depth });
    }
    Ok(())
}

/// Loads the current links of `table` and validates the move, including that the
/// candidate parent exists.
pub async fn ensure_reparent_allowed(
    pool: &SqlitePool,
    table: TreeTable,
    id: i64,
    candidate: Option<i64>,
    max_depth: usize,
) -> AppResult<()> {
    let Some(candidate_id) = candidate else {
        return Ok(());
    };
    if candidate_id == id {
        return Err(ReparentViolation::IsSelf { id }.into());
    }
    let links = store::parent_links(pool, table).await?;
    if !links.iter().any(|(lid, _)| *lid == candidate_id) {
        let entity = table.entity();
        return Err(AppError::NotFound(format!("Parent {} {} not found", entity, candidate_id)));
    }
    check_reparent(&links, id, candidate, max_depth).map_err(|v| {
        tracing::info!(code = v.code(), id, candidate_id, "Re-parent rejected");
        v.into()
    })
}
