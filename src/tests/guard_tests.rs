#[cfg(test)]
mod tests {
    use crate::characteristics::guard::{
        check_reparent, descendants, ensure_reparent_allowed, ReparentViolation,
    };
    use crate::characteristics::store::TreeTable;
    use crate::error::AppError;
    use crate::tests::support::{insert_group, memory_pool};

    // 1 -> 2 -> 3 -> 4, 5 standalone
    fn chain() -> Vec<(i64, Option<i64>)> {
        vec![(1, None), (2, Some(1)), (3, Some(2)), (4, Some(3)), (5, None)]
    }

    #[test]
    fn test_self_parent_rejected() {
        let to_self = check_reparent(&chain(), 2, Some(2), 10);
        assert_eq!(to_self, Err(ReparentViolation::IsSelf { id: 2 }));
    }

    #[test]
    fn test_descendant_parent_rejected() {
        let err = check_reparent(&chain(), 1, Some(4), 10).unwrap_err();
        assert_eq!(err, ReparentViolation::IsDescendant { id: 1, candidate_id: 4 });
        assert_eq!(err.code(), "DESCENDANT_PARENT");
    }

    #[test]
    fn test_unrelated_or_ancestor_parent_allowed() {
        assert!(check_reparent(&chain(), 3, Some(5), 10).is_ok());
        assert!(check_reparent(&chain(), 4, Some(1), 10).is_ok());
        assert!(check_reparent(&chain(), 4, None, 10).is_ok());
    }

    #[test]
    fn test_descendants_respect_depth_bound() {
        let links = chain();
        let all = descendants(&links, 1, 10);
        assert_eq!(all.ids.len(), 3);
        assert!(all.complete);
        let shallow = descendants(&links, 1, 2);
        assert!(shallow.ids.contains(&2) && shallow.ids.contains(&3));
        assert!(!shallow.ids.contains(&4));
        assert!(!shallow.complete);
        // exactly at the bound nothing is left unvisited
        assert!(descendants(&links, 1, 3).complete);
    }

    #[test]
    fn test_move_below_the_bound_is_refused() {
        // 0 -> 1 -> ... -> 12
        let links: Vec<(i64, Option<i64>)> =
            (0..13).map(|i| (i, if i == 0 { None } else { Some(i - 1) })).collect();

        assert_eq!(
            check_reparent(&links, 0, Some(12), 10),
            Err(ReparentViolation::TooDeep { id: 0, candidate_id: 12, max_depth: 10 })
        );
        // within reach the precise code wins
        assert_eq!(
            check_reparent(&links, 0, Some(10), 10),
            Err(ReparentViolation::IsDescendant { id: 0, candidate_id: 10 })
        );
        let violation = check_reparent(&links, 0, Some(12), 10).unwrap_err();
        assert_eq!(violation.code(), "HIERARCHY_TOO_DEEP");
        // a shallow subtree still moves freely
        assert!(check_reparent(&links, 5, Some(13), 10).is_ok());
        assert!(check_reparent(&links, 0, Some(12), 16).is_err());
    }

    #[test]
    fn test_descendants_terminate_on_cycles() {
        let links = vec![(1, Some(3)), (2, Some(1)), (3, Some(2))];
        let found = descendants(&links, 1, 64);
        assert!(found.ids.contains(&2) && found.ids.contains(&3));
        assert!(!found.ids.contains(&1));
        assert!(found.complete);
    }

    #[tokio::test]
    async fn test_ensure_reparent_allowed_against_storage() {
        let pool = memory_pool().await;
        let root = insert_group(&pool, "Root", None, 0).await;
        let child = insert_group(&pool, "Child", Some(root), 0).await;
        let other = insert_group(&pool, "Other", None, 1).await;

        let moved = ensure_reparent_allowed(&pool, TreeTable::Groups, child, Some(other), 10).await;
        assert!(moved.is_ok());
        assert!(ensure_reparent_allowed(&pool, TreeTable::Groups, root, None, 10).await.is_ok());

        match ensure_reparent_allowed(&pool, TreeTable::Groups, root, Some(child), 10).await {
            Err(AppError::Rejected { code, .. }) => assert_eq!(code, "DESCENDANT_PARENT"),
            other => panic!("expected rejection, got {:?}", other),
        }
        match ensure_reparent_allowed(&pool, TreeTable::Groups, root, Some(999), 10).await {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("group")),
            other => panic!("expected not found, got {:?}", other),
        }
    }
}
