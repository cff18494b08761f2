// crates/endpoints-echo/src/lib.rs
// ============================================================================
// Module: Endpoints Echo Service
// Description: HTTP routes of the sample Cloud Endpoints application.
// Purpose: Echo JSON messages and report the caller identity from the proxy.
// Dependencies: axum, base64, serde, serde_json
// ============================================================================

//! ## Overview
//! The service sits behind the Endpoints proxy, which validates the API key
//! and any bearer token before forwarding. Requests reaching these handlers
//! are already authenticated; authenticated callers arrive with the
//! `X-Endpoint-API-UserInfo` header set to base64-encoded JSON claims.
//!
//! Routes:
//! - `POST /echo`: returns `{"message": ...}` unchanged.
//! - `GET /auth/info/googlejwt`, `/auth/info/googleidtoken`,
//!   `/auth/info/firebase`: return the decoded claims, or
//!   `{"id": "anonymous"}` when the proxy injected none.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header the Endpoints proxy uses to forward verified caller claims.
pub const USER_INFO_HEADER: &str = "x-endpoint-api-userinfo";

/// Auth info routes; all share one handler.
pub const AUTH_INFO_PATHS: [&str; 3] =
    ["/auth/info/googlejwt", "/auth/info/googleidtoken", "/auth/info/firebase"];

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Body of `POST /echo`, in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoMessage {
    /// Text to echo back.
    pub message: String,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the application router.
pub fn router() -> Router {
    AUTH_INFO_PATHS
        .iter()
        .fold(Router::new().route("/echo", post(echo)), |router, path| {
            router.route(path, get(auth_info))
        })
}

/// Echoes the `message` field.
async fn echo(body: Bytes) -> Response {
    match serde_json::from_slice::<EchoMessage>(&body) {
        Ok(message) => Json(message).into_response(),
        Err(err) => bad_request(&format!("invalid echo request: {err}")),
    }
}

/// Returns the caller identity forwarded by the proxy.
async fn auth_info(headers: HeaderMap) -> Response {
    let Some(encoded) = headers.get(USER_INFO_HEADER) else {
        return Json(json!({ "id": "anonymous" })).into_response();
    };
    let Ok(encoded) = encoded.to_str() else {
        return bad_request("user info header is not ascii");
    };
    match decode_user_info(encoded) {
        Some(claims) => Json(claims).into_response(),
        None => bad_request("user info header is not base64 json"),
    }
}

/// Decodes base64 JSON claims; the proxy may use either alphabet.
#[must_use]
pub fn decode_user_info(encoded: &str) -> Option<Value> {
    let trimmed = encoded.trim();
    let bytes = STANDARD
        .decode(trimmed)
        .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed.trim_end_matches('=')))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// 400 with a JSON error body.
fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
