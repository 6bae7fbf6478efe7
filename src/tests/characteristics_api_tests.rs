#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::tests::support::{call, count, insert_group, insert_product, insert_value, setup_app};

    #[tokio::test]
    async fn test_color_characteristic_end_to_end() {
        let (app, state) = setup_app().await;

        let (status, body) =
            call(&app, "POST", "/spec-groups", Some(json!({ "name": "Colors" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let gid = body["data"]["id"].as_i64().unwrap();

        let (status, body) = call(
            &app,
            "POST",
            "/spec-enums",
            Some(json!({
                "group_id": gid,
                "value": "red",
                "display_name": "Red",
                "color_hex": "#ff0000"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let vid = body["data"]["id"].as_i64().unwrap();

        let (status, body) =
            call(&app, "POST", "/products", Some(json!({ "name": "Knee Joint" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let pid = body["data"]["id"].as_i64().unwrap();

        let uri = format!("/products/{}/characteristics", pid);
        let (status, body) = call(
            &app,
            "POST",
            &uri,
            Some(json!({ "characteristics": [{ "group_id": gid, "value_preset_id": vid }] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["saved"], 1);

        let (status, body) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["product_name"], "Knee Joint");
        assert_eq!(data["characteristics"][0]["group_name"], "Colors");
        let fact = &data["characteristics"][0]["values"][0];
        assert_eq!(fact["display_value"], "Red");
        assert_eq!(fact["input_type"], "enum");
        assert_eq!(fact["formatted_value"]["type"], "enum");
        assert_eq!(fact["formatted_value"]["color"], "#ff0000");
        assert_eq!(data["sections"][0]["section_name"], "Colors");

        let (_, body) = call(&app, "GET", &format!("/spec-values?product_id={}", pid), None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["display_value"], "Red");

        // the value is pinned by the product
        let (status, body) = call(&app, "DELETE", &format!("/spec-enums/{}", vid), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "VALUE_IN_USE");

        let (status, body) = call(&app, "DELETE", &format!("/spec-groups/{}", gid), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "HAS_CHARACTERISTICS");
        assert_eq!(body["details"]["count"], 1);

        let (status, body) =
            call(&app, "DELETE", &format!("/spec-groups/{}?force=true", gid), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["forced"], true);
        assert_eq!(body["data"]["deleted_characteristics"], 1);
        assert_eq!(count(&state.db, "product_characteristics").await, 0);
        assert_eq!(count(&state.db, "characteristic_values").await, 0);
        assert_eq!(state.metrics.get_snapshot().forced_deletes, 1);
    }

    #[tokio::test]
    async fn test_group_tree_is_cached_until_a_write() {
        let (app, state) = setup_app().await;

        let (_, body) = call(&app, "GET", "/spec-groups", None).await;
        assert_eq!(body["total"], 0);

        // written behind the API's back: the cached tree does not see it
        insert_group(&state.db, "Hidden", None, 0).await;
        let (_, body) = call(&app, "GET", "/spec-groups", None).await;
        assert_eq!(body["total"], 0);

        let (status, _) = call(&app, "POST", "/spec-groups", Some(json!({ "name": "Size" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, body) = call(&app, "GET", "/spec-groups", None).await;
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_group_tree_levels_and_paths() {
        let (app, _state) = setup_app().await;
        let (_, root) =
            call(&app, "POST", "/spec-groups", Some(json!({ "name": "Appearance" }))).await;
        let root_id = root["data"]["id"].as_i64().unwrap();
        let (status, _) = call(
            &app,
            "POST",
            "/spec-groups",
            Some(json!({ "name": "Color", "parent_id": root_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = call(&app, "GET", "/spec-groups", None).await;
        let child = &body["data"][1];
        assert_eq!(child["level"], 1);
        assert_eq!(child["full_path"], "Appearance → Color");
        assert_eq!(child["root_id"], root_id);

        let (status, body) = call(
            &app,
            "POST",
            "/spec-groups",
            Some(json!({ "name": "Orphan", "parent_id": 999 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

        let (status, body) =
            call(&app, "POST", "/spec-groups", Some(json!({ "name": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_reparent_under_descendant_rejected() {
        let (app, state) = setup_app().await;
        let root = insert_group(&state.db, "Appearance", None, 0).await;
        let child = insert_group(&state.db, "Color", Some(root), 0).await;

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/spec-groups/{}", root),
            Some(json!({ "parent_id": child })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "DESCENDANT_PARENT");

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/spec-groups/{}", root),
            Some(json!({ "parent_id": root })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "SELF_PARENT");
        assert_eq!(state.metrics.get_snapshot().reparents_rejected, 2);

        // explicit null promotes to root
        let (status, body) = call(
            &app,
            "PUT",
            &format!("/spec-groups/{}", child),
            Some(json!({ "parent_id": null })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["parent_id"].is_null());

        // a rename leaves the parent alone
        let (_, body) = call(
            &app,
            "PUT",
            &format!("/spec-groups/{}", child),
            Some(json!({ "name": "Colour" })),
        )
        .await;
        assert_eq!(body["data"]["name"], "Colour");
    }

    #[tokio::test]
    async fn test_reparent_into_deep_chain_keeps_tree_intact() {
        let (app, state) = setup_app().await;
        // L0 -> L1 -> ... -> L12, deeper than the default bound of 10
        let mut ids = vec![insert_group(&state.db, "L0", None, 0).await];
        for level in 1..13 {
            let parent = ids[level - 1];
            ids.push(insert_group(&state.db, &format!("L{}", level), Some(parent), 0).await);
        }

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/spec-groups/{}", ids[0]),
            Some(json!({ "parent_id": ids[12] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(body["code"], "HIERARCHY_TOO_DEEP");
        assert_eq!(body["details"]["max_depth"], 10);

        let parent: Option<i64> =
            sqlx::query_scalar("SELECT parent_id FROM characteristic_groups WHERE id = ?")
                .bind(ids[0])
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(parent, None);

        let (_, body) = call(&app, "GET", "/spec-groups", None).await;
        assert_eq!(body["total"], 13);
    }

    #[tokio::test]
    async fn test_protected_group_delete_forbidden() {
        let (app, state) = setup_app().await;
        let gid = insert_group(&state.db, "Общие параметры", None, 0).await;
        let (status, body) =
            call(&app, "DELETE", &format!("/spec-groups/{}?force=true", gid), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "PROTECTED_GROUP");
        assert_eq!(state.metrics.get_snapshot().deletes_blocked, 1);
    }

    #[tokio::test]
    async fn test_values_listing_and_validation() {
        let (app, state) = setup_app().await;
        let gid = insert_group(&state.db, "Color", None, 0).await;
        insert_value(&state.db, gid, "red", None).await;

        let (status, body) = call(
            &app,
            "POST",
            "/spec-enums",
            Some(json!({ "group_id": gid, "value": "blue" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        // appended after existing values
        assert_eq!(body["data"]["sort_order"], 1);

        let (status, _) = call(
            &app,
            "POST",
            "/spec-enums",
            Some(json!({ "group_id": gid, "value": "x", "color_hex": "blue" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) =
            call(&app, "POST", "/spec-enums", Some(json!({ "group_id": 999, "value": "x" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&app, "GET", &format!("/spec-enums?group_id={}", gid), None).await;
        assert_eq!(body["total"], 2);

        let vid = body["data"][1]["id"].as_i64().unwrap();
        let (status, body) = call(
            &app,
            "PUT",
            &format!("/spec-enums/{}", vid),
            Some(json!({ "display_name": "Blue" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["display_name"], "Blue");
        assert_eq!(body["data"]["value"], "blue");

        let (status, _) = call(&app, "DELETE", &format!("/spec-enums/{}", vid), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_template_with_presets() {
        let (app, state) = setup_app().await;
        let gid = insert_group(&state.db, "Color", None, 0).await;
        insert_value(&state.db, gid, "green", None).await;

        let (status, body) = call(
            &app,
            "POST",
            "/admin/characteristic-templates",
            Some(json!({
                "group_id": gid,
                "name": "Shell color",
                "input_type": "enum",
                "validation_rules": { "required": true },
                "preset_values": [
                    "red",
                    "  ",
                    { "value": "blue", "display_name": "Blue" },
                    "red",
                    "green"
                ],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["data"]["input_type"], "enum");
        assert_eq!(body["data"]["validation_rules"]["required"], true);
        assert_eq!(body["data"]["preset_value_ids"].as_array().unwrap().len(), 2);
        assert_eq!(count(&state.db, "characteristic_values").await, 3);

        let (_, body) = call(
            &app,
            "GET",
            &format!("/admin/characteristic-templates?group_id={}", gid),
            None,
        )
        .await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["group_name"], "Color");

        let (status, body) = call(
            &app,
            "POST",
            "/admin/characteristic-templates",
            Some(json!({ "group_id": gid, "name": "Odd", "input_type": "slider" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "input_type");

        let (status, _) = call(
            &app,
            "POST",
            "/admin/characteristic-templates",
            Some(json!({ "group_id": gid, "name": "Rules", "validation_rules": [1, 2] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_template_batch_update_is_atomic() {
        let (app, state) = setup_app().await;
        let gid = insert_group(&state.db, "Weight", None, 0).await;
        let (_, body) = call(
            &app,
            "POST",
            "/admin/characteristic-templates",
            Some(json!({ "group_id": gid, "name": "Net weight", "input_type": "number" })),
        )
        .await;
        let tid = body["data"]["id"].as_i64().unwrap();

        let (status, _) = call(
            &app,
            "PUT",
            "/admin/characteristic-templates",
            Some(json!({
                "templates": [{ "id": tid, "name": "Renamed" }, { "id": 999, "name": "Ghost" }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let name: String =
            sqlx::query_scalar("SELECT name FROM characteristic_templates WHERE id = ?")
                .bind(tid)
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(name, "Net weight");

        let (status, body) = call(
            &app,
            "PUT",
            "/admin/characteristic-templates",
            Some(json!({
                "templates": [{ "id": tid, "name": "Gross weight", "is_required": true }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["updated"], 1);

        let (status, _) = call(
            &app,
            "PUT",
            "/admin/characteristic-templates",
            Some(json!({ "templates": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_templates_unavailable_without_schema() {
        let (app, state) = setup_app().await;
        sqlx::query("DROP TABLE characteristic_templates").execute(&state.db).await.unwrap();

        let (status, body) = call(&app, "GET", "/admin/characteristic-templates", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "SCHEMA_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_save_characteristics_replaces_and_validates() {
        let (app, state) = setup_app().await;
        let color = insert_group(&state.db, "Color", None, 0).await;
        let size = insert_group(&state.db, "Size", None, 1).await;
        let red = insert_value(&state.db, color, "red", None).await;
        let pid = insert_product(&state.db, "Knee Joint").await;
        let uri = format!("/products/{}/characteristics", pid);

        let (status, _) = call(
            &app,
            "POST",
            &uri,
            Some(json!({ "characteristics": [
                { "group_id": color, "value_preset_id": red },
                { "group_id": size, "value_text": "XL", "is_primary": true },
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count(&state.db, "product_characteristics").await, 2);

        // preset from another group
        let (status, body) = call(
            &app,
            "POST",
            &uri,
            Some(json!({ "characteristics": [
                { "group_id": size, "value_text": "L" },
                { "group_id": size, "value_preset_id": red },
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "characteristics[1].value_preset_id");
        // rolled back: the earlier set is intact
        assert_eq!(count(&state.db, "product_characteristics").await, 2);

        let (status, _) = call(
            &app,
            "POST",
            &uri,
            Some(json!({ "characteristics": [{ "value_text": "x" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, "POST", &uri, Some(json!({ "characteristics": [] }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["saved"], 0);
        assert_eq!(count(&state.db, "product_characteristics").await, 0);

        let (status, _) = call(&app, "GET", "/products/999/characteristics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_save_characteristics_storage_failure_keeps_previous_set() {
        let (app, state) = setup_app().await;
        let size = insert_group(&state.db, "Size", None, 0).await;
        let pid = insert_product(&state.db, "Knee Joint").await;
        let uri = format!("/products/{}/characteristics", pid);

        let (status, _) = call(
            &app,
            "POST",
            &uri,
            Some(json!({ "characteristics": [{ "group_id": size, "value_text": "M" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        sqlx::query(
            "CREATE TRIGGER refuse_xxl BEFORE INSERT ON product_characteristics \
             WHEN NEW.value_text = 'XXL' BEGIN SELECT RAISE(ABORT, 'size not stocked'); END",
        )
        .execute(&state.db)
        .await
        .unwrap();

        let (status, body) = call(
            &app,
            "POST",
            &uri,
            Some(json!({ "characteristics": [
                { "group_id": size, "value_text": "L" },
                { "group_id": size, "value_text": "XXL" },
            ] })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "DATABASE_ERROR");

        let stored: Vec<String> = sqlx::query_scalar(
            "SELECT value_text FROM product_characteristics WHERE product_id = ?",
        )
        .bind(pid)
        .fetch_all(&state.db)
        .await
        .unwrap();
        assert_eq!(stored, vec!["M".to_string()]);
    }

    #[tokio::test]
    async fn test_available_nests_groups_under_sections() {
        let (app, state) = setup_app().await;
        let root = insert_group(&state.db, "Appearance", None, 0).await;
        let color = insert_group(&state.db, "Color", Some(root), 0).await;
        let hidden = insert_group(&state.db, "Retired", None, 1).await;
        sqlx::query("UPDATE characteristic_groups SET is_active = 0 WHERE id = ?")
            .bind(hidden)
            .execute(&state.db)
            .await
            .unwrap();
        insert_value(&state.db, color, "red", None).await;

        let (status, body) = call(&app, "GET", "/characteristics/available", None).await;
        assert_eq!(status, StatusCode::OK);
        let sections = body["data"]["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0]["section_name"], "Appearance");
        let groups = sections[0]["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1]["group_name"], "Appearance → Color");
        assert_eq!(groups[1]["values"][0]["value"], "red");
    }

    #[tokio::test]
    async fn test_by_category_counts_products() {
        let (app, state) = setup_app().await;
        let (_, parent) =
            call(&app, "POST", "/categories", Some(json!({ "name": "Prosthetics" }))).await;
        let parent_id = parent["data"]["id"].as_i64().unwrap();
        let (_, child) = call(
            &app,
            "POST",
            "/categories",
            Some(json!({ "name": "Knees", "parent_id": parent_id })),
        )
        .await;
        let child_id = child["data"]["id"].as_i64().unwrap();

        let color = insert_group(&state.db, "Color", None, 0).await;
        let red = insert_value(&state.db, color, "red", Some("Red")).await;
        for name in ["Knee A", "Knee B"] {
            let (_, p) = call(
                &app,
                "POST",
                "/products",
                Some(json!({ "name": name, "category_id": child_id })),
            )
            .await;
            let pid = p["data"]["id"].as_i64().unwrap();
            call(
                &app,
                "POST",
                &format!("/products/{}/characteristics", pid),
                Some(json!({ "characteristics": [{ "group_id": color, "value_preset_id": red }] })),
            )
            .await;
        }

        let (status, body) = call(
            &app,
            "GET",
            &format!("/characteristics/by-category?category_id={}", parent_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 1);
        let row = &body["data"]["sections"][0]["groups"][0]["values"][0];
        assert_eq!(row["display_value"], "Red");
        assert_eq!(row["product_count"], 2);

        let (_, body) = call(
            &app,
            "GET",
            &format!(
                "/characteristics/by-category?category_id={}&include_children=false",
                parent_id
            ),
            None,
        )
        .await;
        assert_eq!(body["data"]["total"], 0);

        let (status, _) =
            call(&app, "GET", "/characteristics/by-category?category_id=999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
