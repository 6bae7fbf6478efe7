use std::collections::HashMap;

use serde::Serialize;

use super::hierarchy::HierarchyNode;
use super::resolver::ResolvedCharacteristic;
use super::store::GroupRow;

/// Anything that can be bucketed under a characteristic group.
pub trait Grouped {
    fn group_id(&self) -> i64;
    fn group_name(&self) -> &str;
}

impl Grouped for ResolvedCharacteristic {
    fn group_id(&self) -> i64 {
        self.group_id
    }
    fn group_name(&self) -> &str {
        &self.group_name
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupBucket<V> {
    pub group_id: i64,
    pub group_name: String,
    pub values: Vec<V>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Section<V> {
    pub section_id: i64,
    pub section_name: String,
    pub groups: Vec<GroupBucket<V>>,
}

/// Maps each group to the root group it hangs under.
#[derive(Debug, Default, Clone)]
pub struct SectionIndex {
    roots: HashMap<i64, (i64, String)>,
}

impl SectionIndex {
    pub fn from_forest(forest: &[HierarchyNode<GroupRow>]) -> Self {
        let names: HashMap<i64, &str> =
            forest.iter().map(|n| (n.row.id, n.row.name.as_str())).collect();
        let roots = forest
            .iter()
            .map(|n| {
                let root_name = names.get(&n.root_id).copied().unwrap_or(n.row.name.as_str());
                (n.row.id, (n.root_id, root_name.to_string()))
            })
            .collect();
        Self { roots }
    }

    /// Groups outside the forest (inactive or orphaned) act as their own section.
    pub fn section_of(&self, group_id: i64, group_name: &str) -> (i64, String) {
        self.roots.get(&group_id).cloned().unwrap_or_else(|| (group_id, group_name.to_string()))
    }
}

/// One-level fold: group -> values, first-seen order.
pub fn by_group<V: Grouped>(rows: Vec<V>) -> Vec<GroupBucket<V>> {
    let mut out: Vec<GroupBucket<V>> = Vec::new();
    let mut pos: HashMap<i64, usize> = HashMap::new();
    for row in rows {
        let idx = *pos.entry(row.group_id()).or_insert_with(|| {
            out.push(GroupBucket {
                group_id: row.group_id(),
                group_name: row.group_name().to_string(),
                values: Vec::new(),
            });
            out.len() - 1
        });
        out[idx].values.push(row);
    }
    out
}

/// Two-level fold: section -> group -> values, first-seen order at both levels.
pub fn by_section<V: Grouped>(rows: Vec<V>, index: &SectionIndex) -> Vec<Section<V>> {
    let mut out: Vec<Section<V>> = Vec::new();
    let mut section_pos: HashMap<i64, usize> = HashMap::new();
    let mut group_pos: HashMap<i64, (usize, usize)> = HashMap::new();

    for row in rows {
        let gid = row.group_id();
        let (si, gi) = match group_pos.get(&gid) {
            Some(&p) => p,
            None => {
                let (section_id, section_name) = index.section_of(gid, row.group_name());
                let si = *section_pos.entry(section_id).or_insert_with(|| {
                    out.push(Section { section_id, section_name, groups: Vec::new() });
                    out.len() - 1
                });
                let groups = &mut out[si].groups;
                groups.push(GroupBucket {
                    group_id: gid,
                    group_name: row.group_name().to_string(),
                    values: Vec::new(),
                });
                let p = (si, groups.len() - 1);
                group_pos.insert(gid, p);
                p
            }
        };
        out[si].groups[gi].values.push(row);
    }
    out
}
