use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Upper bound for JSON request bodies, enforced before the body is read.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Rejects requests with traversal sequences in the URI and oversized declared bodies.
///
/// Runs before routing so malformed requests never reach a handler. The limit is passed
/// in as state so it agrees with the router's `DefaultBodyLimit`.
pub async fn validate_request_middleware(
    State(max_body): State<usize>,
    req: Request,
    next: Next,
) -> Response {
    let uri_path = req.uri().path();
    if contains_path_traversal(uri_path) {
        tracing::warn!(
            "Rejected request with traversal sequence: {}",
            sanitize_for_logging(uri_path)
        );
        return reject(
            StatusCode::BAD_REQUEST,
            "INVALID_PATH",
            "Path traversal detected in request".to_string(),
        );
    }

    if matches!(req.method(), &Method::POST | &Method::PUT) {
        let declared = req
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(length) = declared {
            if length > max_body {
                return reject(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "PAYLOAD_TOO_LARGE",
                    format!("Request body exceeds maximum size of {} bytes", max_body),
                );
            }
        }
    }

    next.run(req).await
}

fn reject(status: StatusCode, code: &'static str, message: String) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": message,
            "code": code,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();

    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }
    if path.contains("/./") || path.contains("....") {
        return true;
    }

    const ENCODED: &[&str] = &["%2e%2e", "%252e%252e", "%2e/", "/%2e", "%2f%2e", "%5c%2e", "%00"];
    if ENCODED.iter().any(|p| lower.contains(p)) {
        return true;
    }

    path.contains('\0')
}

/// Strips control characters, escapes quotes and caps length for log output.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}
