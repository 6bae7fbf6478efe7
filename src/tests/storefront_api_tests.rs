#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::routes::warehouse::{decode_setting, encode_setting, SettingType, DEFAULT_SETTINGS};
    use crate::tests::support::{call, count, insert_group, insert_product, insert_value, setup_app};

    #[tokio::test]
    async fn test_variant_is_created_once_per_product() {
        let (app, state) = setup_app().await;
        let pid = insert_product(&state.db, "Knee KX").await;
        sqlx::query("UPDATE products SET sku = 'KX-1' WHERE id = ?")
            .bind(pid)
            .execute(&state.db)
            .await
            .unwrap();

        let uri = format!("/products/{}/variant", pid);
        let (status, first) = call(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["data"]["is_existing"], false);
        assert_eq!(first["data"]["variant_name"], "Knee KX Variant");
        assert_eq!(first["data"]["product_sku"], "KX-1");
        assert!(first["data"]["variant_sku"].as_str().unwrap().starts_with("KX-1-VAR-"));

        let (status, second) = call(&app, "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["data"]["is_existing"], true);
        assert_eq!(second["data"]["id"], first["data"]["id"]);

        let (status, list) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], 1);
        assert_eq!(count(&state.db, "product_variants").await, 1);
    }

    #[tokio::test]
    async fn test_variant_sku_falls_back_to_product_id() {
        let (app, state) = setup_app().await;
        let pid = insert_product(&state.db, "Socket").await;
        let (status, body) = call(&app, "POST", &format!("/products/{}/variant", pid), None).await;
        assert_eq!(status, StatusCode::CREATED);
        let sku = body["data"]["variant_sku"].as_str().unwrap();
        assert!(sku.starts_with(&format!("{}-VAR-", pid)), "sku was {}", sku);
    }

    #[tokio::test]
    async fn test_variant_requires_live_product() {
        let (app, state) = setup_app().await;
        let (status, body) = call(&app, "POST", "/products/404/variant", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let pid = insert_product(&state.db, "Retired").await;
        sqlx::query("UPDATE products SET is_deleted = 1 WHERE id = ?")
            .bind(pid)
            .execute(&state.db)
            .await
            .unwrap();
        let (status, _) = call(&app, "GET", &format!("/products/{}/variant", pid), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(count(&state.db, "product_variants").await, 0);
    }

    #[tokio::test]
    async fn test_warehouse_defaults_are_seeded_on_first_read() {
        let (app, state) = setup_app().await;
        assert_eq!(count(&state.db, "warehouse_settings").await, 0);

        let (status, body) = call(&app, "GET", "/warehouse/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        let settings = body["data"].as_object().unwrap();
        assert_eq!(settings.len(), DEFAULT_SETTINGS.len());
        assert_eq!(settings["low_stock_threshold"], 10);
        assert_eq!(settings["auto_reorder_enabled"], false);
        assert_eq!(settings["email_notifications"], true);

        // Seeding happens once; a second read does not duplicate rows.
        call(&app, "GET", "/warehouse/settings", None).await;
        assert_eq!(count(&state.db, "warehouse_settings").await, DEFAULT_SETTINGS.len() as i64);
    }

    #[tokio::test]
    async fn test_warehouse_update_keeps_value_types() {
        let (app, _state) = setup_app().await;
        call(&app, "GET", "/warehouse/settings", None).await;

        let body = json!({
            "low_stock_threshold": 3,
            "daily_reports": false,
            "report_email": "stock@example.org",
            "reserve_ratio": 0.25,
        });
        let (status, updated) = call(&app, "PUT", "/warehouse/settings", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["data"]["low_stock_threshold"], 3);
        assert_eq!(updated["data"]["daily_reports"], false);
        assert_eq!(updated["data"]["report_email"], "stock@example.org");
        assert_eq!(updated["data"]["reserve_ratio"], 0.25);

        let (_, reread) = call(&app, "GET", "/warehouse/settings", None).await;
        assert_eq!(reread["data"]["low_stock_threshold"], 3);
        assert_eq!(reread["data"]["critical_stock_threshold"], 5);
    }

    #[tokio::test]
    async fn test_warehouse_update_rejects_bad_values_atomically() {
        let (app, _state) = setup_app().await;
        call(&app, "GET", "/warehouse/settings", None).await;

        let (status, body) = call(&app, "PUT", "/warehouse/settings", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let bad = json!({ "low_stock_threshold": 1, "zones": ["A", "B"] });
        let (status, body) = call(&app, "PUT", "/warehouse/settings", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"]["field"], "zones");

        let (status, _) =
            call(&app, "PUT", "/warehouse/settings", Some(json!({ "daily_reports": null }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, reread) = call(&app, "GET", "/warehouse/settings", None).await;
        assert_eq!(reread["data"]["low_stock_threshold"], 10);
    }

    #[tokio::test]
    async fn test_warehouse_without_table_is_unavailable() {
        let (app, state) = setup_app().await;
        sqlx::query("DROP TABLE warehouse_settings").execute(&state.db).await.unwrap();
        let (status, body) = call(&app, "GET", "/warehouse/settings", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "SCHEMA_UNAVAILABLE");
        assert!(body["error"].as_str().unwrap().contains("warehouse_settings"));
    }

    #[test]
    fn test_setting_codec_types() {
        assert_eq!(encode_setting(&json!(true)), Some(("true".to_string(), SettingType::Boolean)));
        assert_eq!(encode_setting(&json!(12)), Some(("12".to_string(), SettingType::Number)));
        assert_eq!(encode_setting(&json!({ "a": 1 })), None);
        assert_eq!(encode_setting(&Value::Null), None);

        assert_eq!(decode_setting(Some("7"), SettingType::Number), json!(7));
        assert_eq!(decode_setting(Some("1.5"), SettingType::Number), json!(1.5));
        assert_eq!(decode_setting(Some("lots"), SettingType::Number), json!(0));
        assert_eq!(decode_setting(Some("yes"), SettingType::Boolean), json!(false));
        assert_eq!(decode_setting(None, SettingType::String), json!(""));
        assert_eq!(SettingType::parse("json"), SettingType::String);
    }

    fn entity<'a>(flat: &'a Value, entity_type: &str, id: i64) -> Option<&'a Value> {
        flat.as_array()?
            .iter()
            .find(|e| e["entity_type"] == entity_type && e["entity_id"] == id)
    }

    #[tokio::test]
    async fn test_menu_pins_show_up_in_available_entities() {
        let (app, state) = setup_app().await;
        let size = insert_group(&state.db, "Size", None, 0).await;
        insert_value(&state.db, size, "M", None).await;
        insert_group(&state.db, "Length", Some(size), 0).await;
        let (_, maker) =
            call(&app, "POST", "/manufacturers", Some(json!({ "name": "Ottobock" }))).await;
        let maker_id = maker["data"]["id"].as_i64().unwrap();

        let (status, body) = call(&app, "GET", "/catalog-menu/available-entities", None).await;
        assert_eq!(status, StatusCode::OK);
        let group = entity(&body["flat"], "spec_group", size).unwrap();
        assert_eq!(group["in_menu"], false);
        assert_eq!(group["characteristics_count"], 1);
        assert_eq!(group["children_count"], 1);
        let virtual_entry = entity(&body["flat"], "manufacturers_category", 0).unwrap();
        assert_eq!(virtual_entry["virtual"], true);
        assert_eq!(virtual_entry["characteristics_count"], 1);
        assert_eq!(body["stats"]["in_menu"], 0);
        assert_eq!(body["stats"]["by_type"]["manufacturer"], 1);

        let pin = json!({ "entity_type": "spec_group", "entity_id": size, "sort_order": 2 });
        let (status, saved) = call(&app, "POST", "/catalog-menu-settings", Some(pin)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["data"]["sort_order"], 2);
        assert_eq!(saved["data"]["is_visible"], true);

        // Re-pinning updates the same row and keeps omitted fields.
        let rename = json!({ "entity_type": "spec_group", "entity_id": size, "name": "Sizes" });
        let (_, renamed) = call(&app, "POST", "/catalog-menu-settings", Some(rename)).await;
        assert_eq!(renamed["data"]["id"], saved["data"]["id"]);
        assert_eq!(renamed["data"]["name"], "Sizes");
        assert_eq!(renamed["data"]["sort_order"], 2);

        let virtual_pin = json!({ "entity_type": "manufacturers_category" });
        let (status, _) = call(&app, "POST", "/catalog-menu-settings", Some(virtual_pin)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, "GET", "/catalog-menu/available-entities", None).await;
        assert_eq!(entity(&body["flat"], "spec_group", size).unwrap()["in_menu"], true);
        assert!(entity(&body["flat"], "manufacturers_category", 0).is_none());
        assert_eq!(entity(&body["flat"], "manufacturer", maker_id).unwrap()["in_menu"], false);
        assert_eq!(body["stats"]["in_menu"], 1);
        assert_eq!(body["stats"]["total"], 2);

        let (_, list) = call(&app, "GET", "/catalog-menu-settings", None).await;
        assert_eq!(list["total"], 2);
        assert_eq!(count(&state.db, "catalog_menu_settings").await, 2);
    }

    #[tokio::test]
    async fn test_available_entities_filter_by_type() {
        let (app, state) = setup_app().await;
        insert_group(&state.db, "Size", None, 0).await;
        call(&app, "POST", "/manufacturers", Some(json!({ "name": "Ossur" }))).await;

        let uri = "/catalog-menu/available-entities?entity_type=manufacturer";
        let (status, body) = call(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_array());
        assert_eq!(body["data"][0]["name"], "Ossur");
        assert_eq!(body["stats"]["total"], 1);
        assert_eq!(body["stats"]["by_type"]["spec_group"], 0);

        let uri = "/catalog-menu/available-entities?entity_type=brand";
        let (status, body) = call(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "entity_type");
    }

    #[tokio::test]
    async fn test_menu_setting_validation_and_delete() {
        let (app, state) = setup_app().await;

        let (status, body) = call(&app, "POST", "/catalog-menu-settings", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "entity_type");

        let missing = json!({ "entity_type": "category", "entity_id": 77 });
        let (status, _) = call(&app, "POST", "/catalog-menu-settings", Some(missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let no_id = json!({ "entity_type": "category" });
        let (status, body) = call(&app, "POST", "/catalog-menu-settings", Some(no_id)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "entity_id");

        let bad_virtual = json!({ "entity_type": "manufacturers_category", "entity_id": 5 });
        let (status, _) = call(&app, "POST", "/catalog-menu-settings", Some(bad_virtual)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(count(&state.db, "catalog_menu_settings").await, 0);

        let (_, category) =
            call(&app, "POST", "/categories", Some(json!({ "name": "Feet" }))).await;
        let pin = json!({ "entity_type": "category", "entity_id": category["data"]["id"] });
        let (_, saved) = call(&app, "POST", "/catalog-menu-settings", Some(pin)).await;
        let id = saved["data"]["id"].as_i64().unwrap();

        let uri = format!("/catalog-menu-settings/{}", id);
        let (status, body) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], true);
        let (status, _) = call(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_catalog_files_list_by_year_and_cache() {
        let (app, state) = setup_app().await;
        let older = json!({
            "title": "Price list",
            "file_url": "/files/prices-2023.pdf",
            "file_name": "prices-2023.pdf",
            "file_size": 2048,
            "year": 2023,
        });
        let (status, created) = call(&app, "POST", "/catalog-files", Some(older)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["is_active"], true);
        assert_eq!(created["data"]["year"], 2023);

        let (_, body) = call(&app, "GET", "/catalog-files", None).await;
        assert_eq!(body["total"], 1);

        let newer = json!({
            "title": "Brochure",
            "file_url": "/files/brochure.pdf",
            "file_name": "brochure.pdf",
            "year": 2025,
        });
        call(&app, "POST", "/catalog-files", Some(newer)).await;

        // Creating a file invalidates every cached listing.
        let (_, body) = call(&app, "GET", "/catalog-files", None).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["data"][0]["year"], 2025);

        let (_, body) = call(&app, "GET", "/catalog-files?year=2023", None).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["title"], "Price list");

        // A row written behind the API shows up only when the cache is bypassed.
        sqlx::query(
            "INSERT INTO catalog_files (title, file_url, file_name, year) \
             VALUES ('Manual', '/files/manual.pdf', 'manual.pdf', 2024)",
        )
        .execute(&state.db)
        .await
        .unwrap();
        let (_, cached) = call(&app, "GET", "/catalog-files", None).await;
        assert_eq!(cached["total"], 2);
        let (_, fresh) = call(&app, "GET", "/catalog-files?nocache=true", None).await;
        assert_eq!(fresh["total"], 3);

        let (_, inactive) = call(&app, "GET", "/catalog-files?active=false", None).await;
        assert_eq!(inactive["total"], 0);
    }

    #[tokio::test]
    async fn test_catalog_file_validation() {
        let (app, state) = setup_app().await;

        let no_title = json!({ "file_url": "/f.pdf", "file_name": "f.pdf" });
        let (status, body) = call(&app, "POST", "/catalog-files", Some(no_title)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "title");

        let bad_year =
            json!({ "title": "Old", "file_url": "/f.pdf", "file_name": "f.pdf", "year": 1850 });
        let (status, body) = call(&app, "POST", "/catalog-files", Some(bad_year)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "year");

        let negative =
            json!({ "title": "Neg", "file_url": "/f.pdf", "file_name": "f.pdf", "file_size": -1 });
        let (status, body) = call(&app, "POST", "/catalog-files", Some(negative)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"]["field"], "file_size");
        assert_eq!(count(&state.db, "catalog_files").await, 0);

        let undated = json!({ "title": "Current", "file_url": "/c.pdf", "file_name": "c.pdf" });
        let (status, body) = call(&app, "POST", "/catalog-files", Some(undated)).await;
        assert_eq!(status, StatusCode::CREATED);
        let year = body["data"]["year"].as_i64().unwrap();
        assert!((2024..=2100).contains(&year));
    }
}
