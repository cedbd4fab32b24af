pub mod health;
pub mod messages;
pub mod sessions;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use cr_domain::error::Error;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    let api = Router::new()
        .route("/health", get(health::health))
        .route("/connect", post(sessions::connect))
        .route("/qr", get(sessions::qr))
        .route("/send", post(messages::send))
        .route("/disconnect", post(sessions::disconnect))
        .route("/connections", get(sessions::list_connections));

    // Path-prefixed aliases kept for callers of the original service.
    let compat = Router::new()
        .route("/api/whatsapp/connect", post(sessions::connect))
        .route("/api/whatsapp/qr", get(sessions::qr))
        .route("/api/whatsapp/send", post(messages::send))
        .route("/api/whatsapp/disconnect", post(sessions::disconnect))
        .route("/api/whatsapp/connections", get(sessions::list_connections));

    api.merge(compat)
}

/// JSON error body with the given status.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// Map a request-scoped domain error onto its HTTP status.
pub(crate) fn domain_error_response(err: &Error) -> Response {
    let status = match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::NotAuthenticated(_) => StatusCode::FORBIDDEN,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::EngineUnavailable(_) | Error::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}
