//! In-memory forest construction for self-referencing tables.
//!
//! Characteristic groups and product categories share the same `(id, parent_id)` shape.
//! Rows are fetched flat and the walk happens here, so the storage engine does not need
//! recursive query support.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

/// Separator between ancestor names in [`HierarchyNode::full_path`].
pub const PATH_SEPARATOR: &str = " → ";

/// A row that takes part in a parent/child tree.
pub trait TreeRow {
    fn id(&self) -> i64;
    fn parent_id(&self) -> Option<i64>;
    fn name(&self) -> &str;
    /// Primary sibling order; ties are broken by `id`.
    fn sort_key(&self) -> i64;
}

/// A row placed in the forest.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyNode<T> {
    #[serde(flatten)]
    pub row: T,
    pub level: usize,
    pub full_path: String,
    pub display_name: String,
    pub children_count: usize,
    pub is_root: bool,
    /// Id of the root this node hangs under (its own id for roots).
    pub root_id: i64,
}

/// Builds the forest and returns it flattened depth-first, roots in sibling order.
///
/// Nodes whose parent is absent from `rows` are dropped along with their subtrees.
/// The input is expected to be acyclic; a visited set keeps corrupt data from looping.
pub fn build_forest<T: TreeRow + Clone>(rows: &[T]) -> Vec<HierarchyNode<T>> {
    let index: HashMap<i64, usize> = rows.iter().enumerate().map(|(i, r)| (r.id(), i)).collect();

    let mut roots: Vec<usize> = Vec::new();
    let mut children: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        match row.parent_id() {
            None => roots.push(i),
            Some(pid) if index.contains_key(&pid) => children.entry(pid).or_default().push(i),
            Some(_) => {}
        }
    }

    let order = |a: &usize, b: &usize| {
        let (ra, rb) = (&rows[*a], &rows[*b]);
        (ra.sort_key(), ra.id()).cmp(&(rb.sort_key(), rb.id()))
    };
    roots.sort_by(order);
    for list in children.values_mut() {
        list.sort_by(order);
    }

    let mut out = Vec::with_capacity(rows.len());
    let mut visited: HashSet<i64> = HashSet::with_capacity(rows.len());
    // (row index, level, parent full path, root id)
    let mut stack: Vec<(usize, usize, Option<String>, i64)> =
        roots.iter().rev().map(|&i| (i, 0, None, rows[i].id())).collect();

    while let Some((i, level, parent_path, root_id)) = stack.pop() {
        let row = &rows[i];
        if !visited.insert(row.id()) {
            continue;
        }
        let full_path = match parent_path {
            Some(p) => format!("{}{}{}", p, PATH_SEPARATOR, row.name()),
            None => row.name().to_string(),
        };
        let kids = children.get(&row.id()).map(Vec::as_slice).unwrap_or(&[]);
        for &child in kids.iter().rev() {
            stack.push((child, level + 1, Some(full_path.clone()), root_id));
        }
        out.push(HierarchyNode {
            row: row.clone(),
            level,
            display_name: format!("{}{}", "  ".repeat(level), row.name()),
            full_path,
            children_count: kids.len(),
            is_root: level == 0,
            root_id,
        });
    }

    out
}

/// All descendants of `root`, deepest first, so each id comes after all of its own
/// descendants. `root` itself is not included.
pub fn descendants_post_order(links: &[(i64, Option<i64>)], root: i64) -> Vec<i64> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for &(id, parent) in links {
        if let Some(p) = parent {
            children.entry(p).or_default().push(id);
        }
    }
    for list in children.values_mut() {
        list.sort_unstable();
    }

    let mut out = Vec::new();
    let mut visited: HashSet<i64> = HashSet::from([root]);
    // (id, expanded)
    let mut stack: Vec<(i64, bool)> = children
        .get(&root)
        .map(|c| c.iter().rev().map(|&id| (id, false)).collect())
        .unwrap_or_default();

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            out.push(id);
            continue;
        }
        if !visited.insert(id) {
            continue;
        }
        stack.push((id, true));
        if let Some(kids) = children.get(&id) {
            for &kid in kids.iter().rev() {
                if !visited.contains(&kid) {
                    stack.push((kid, false));
                }
            }
        }
    }

    out
}
