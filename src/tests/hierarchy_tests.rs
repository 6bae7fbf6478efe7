#[cfg(test)]
mod tests {
    use crate::characteristics::hierarchy::{
        build_forest, descendants_post_order, TreeRow, PATH_SEPARATOR,
    };

    #[derive(Debug, Clone)]
    struct Node {
        id: i64,
        parent: Option<i64>,
        name: &'static str,
        sort: i64,
    }

    impl TreeRow for Node {
        fn id(&self) -> i64 {
            self.id
        }
        fn parent_id(&self) -> Option<i64> {
            self.parent
        }
        fn name(&self) -> &str {
            self.name
        }
        fn sort_key(&self) -> i64 {
            self.sort
        }
    }

    fn n(id: i64, parent: Option<i64>, name: &'static str, sort: i64) -> Node {
        Node { id, parent, name, sort }
    }

    #[test]
    fn test_levels_paths_and_depth_first_order() {
        let rows = vec![
            n(3, Some(1), "Color", 0),
            n(1, None, "Appearance", 0),
            n(2, None, "Size", 1),
            n(4, Some(3), "Shade", 0),
        ];
        let forest = build_forest(&rows);

        let ids: Vec<i64> = forest.iter().map(|f| f.row.id).collect();
        assert_eq!(ids, vec![1, 3, 4, 2]);

        let shade = &forest[2];
        assert_eq!(shade.level, 2);
        assert_eq!(shade.full_path, format!("Appearance{0}Color{0}Shade", PATH_SEPARATOR));
        assert_eq!(shade.display_name, "    Shade");
        assert_eq!(shade.root_id, 1);
        assert!(!shade.is_root);

        assert_eq!(forest[0].children_count, 1);
        assert!(forest[3].is_root);
        assert_eq!(forest[3].full_path, "Size");
    }

    #[test]
    fn test_every_non_root_follows_its_parent_one_level_deeper() {
        let rows: Vec<Node> = (1..=30)
            .map(|i| n(i, if i <= 3 { None } else { Some((i - 1) / 3) }, "x", (i * 7) % 5))
            .collect();
        let forest = build_forest(&rows);
        assert_eq!(forest.len(), rows.len());

        for (pos, node) in forest.iter().enumerate() {
            if let Some(pid) = node.row.parent {
                let parent_pos = forest.iter().position(|p| p.row.id == pid).unwrap();
                assert!(parent_pos < pos);
                assert_eq!(forest[parent_pos].level + 1, node.level);
                assert!(node.full_path.starts_with(&forest[parent_pos].full_path));
            } else {
                assert_eq!(node.level, 0);
            }
        }
    }

    #[test]
    fn test_siblings_sorted_by_sort_key_then_id() {
        let rows = vec![n(10, None, "b", 1), n(5, None, "a", 1), n(7, None, "c", 0)];
        let ids: Vec<i64> = build_forest(&rows).iter().map(|f| f.row.id).collect();
        assert_eq!(ids, vec![7, 5, 10]);
    }

    #[test]
    fn test_orphans_are_dropped_with_their_subtree() {
        let rows = vec![
            n(1, None, "root", 0),
            n(2, Some(99), "orphan", 0),
            n(3, Some(2), "orphan child", 0),
        ];
        let forest = build_forest(&rows);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].row.id, 1);
    }

    #[test]
    fn test_cycle_without_root_produces_nothing() {
        let rows = vec![n(1, Some(2), "a", 0), n(2, Some(1), "b", 0)];
        assert!(build_forest(&rows).is_empty());
    }

    #[test]
    fn test_empty_input() {
        let rows: Vec<Node> = Vec::new();
        assert!(build_forest(&rows).is_empty());
    }

    #[test]
    fn test_descendants_post_order_puts_children_before_parents() {
        // 1 -> 2 -> 4, 1 -> 3
        let links = vec![(1, None), (2, Some(1)), (3, Some(1)), (4, Some(2)), (5, None)];
        let order = descendants_post_order(&links, 1);
        assert_eq!(order, vec![4, 2, 3]);
        assert!(descendants_post_order(&links, 5).is_empty());
    }
}
