#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::tests::support::{call, call_raw, setup_app};

    #[tokio::test]
    async fn test_liveness_and_readiness() {
        let (app, _state) = setup_app().await;

        let (status, body) = call_raw(&app, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");

        let (status, body) = call_raw(&app, "GET", "/readyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ready");
    }

    #[tokio::test]
    async fn test_health_reports_schema() {
        let (app, state) = setup_app().await;
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"]["connected"], true);
        assert_eq!(body["schema"]["missing_tables"].as_array().unwrap().len(), 0);
        assert_eq!(body["gate"]["capacity"], 2);

        sqlx::query("DROP TABLE media_files").execute(&state.db).await.unwrap();
        let (_, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["schema"]["missing_tables"][0], "media_files");
    }

    #[tokio::test]
    async fn test_db_status_counts_rows() {
        let (app, state) = setup_app().await;
        sqlx::query("INSERT INTO manufacturers (name) VALUES ('Ottobock')")
            .execute(&state.db)
            .await
            .unwrap();

        let (status, body) = call(&app, "GET", "/db-status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["initialized"], true);
        let tables = body["tables"].as_array().unwrap();
        let manufacturers = tables.iter().find(|t| t["table"] == "manufacturers").unwrap();
        assert_eq!(manufacturers["rows"], 1);
        assert_eq!(manufacturers["exists"], true);
    }

    #[tokio::test]
    async fn test_metrics_endpoints() {
        let (app, _state) = setup_app().await;
        call(&app, "GET", "/spec-groups", None).await;
        call(&app, "GET", "/spec-groups", None).await;

        let (status, body) = call(&app, "GET", "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cache_misses"], 1);
        assert_eq!(body["cache_hits"], 1);

        let (status, text) = call_raw(&app, "GET", "/metrics/prometheus", None).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("# TYPE protez_admin_cache_hits counter"));
        assert!(text.contains("protez_admin_uptime_seconds"));
    }

    #[tokio::test]
    async fn test_version() {
        let (app, _state) = setup_app().await;
        let (status, body) = call(&app, "GET", "/version", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "protez-admin");
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn test_security_headers_present() {
        let (app, _state) = setup_app().await;
        let response = app
            .oneshot(Request::builder().uri("/spec-groups").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_routing() {
        let (app, _state) = setup_app().await;
        let (status, body) = call(&app, "GET", "/products/%2e%2e/1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PATH");
    }
}
