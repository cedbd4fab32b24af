//! Session lifecycle endpoints: pairing, status polling, disconnect,
//! listing.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::sessions::pairing::begin_pairing;
use crate::sessions::record::{SessionStatus, Tenant};
use crate::state::AppState;

use super::{domain_error_response, error_response};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /connect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ConnectBody {
    pub company_id: String,
    pub user_id: String,
}

/// Start a new pairing flow for a tenant.
///
/// Blocks until the first pairing code (bounded by the configured
/// timeout) or an immediate already-authenticated signal.
pub async fn connect(
    State(state): State<AppState>,
    body: Result<Json<ConnectBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid body: {e}")),
    };

    let tenant = Tenant {
        company_id: body.company_id,
        user_id: body.user_id,
    };
    let wait = Duration::from_millis(state.config.pairing.wait_timeout_ms);

    match begin_pairing(
        &state.registry,
        &state.identities,
        &state.driver,
        &state.router,
        tenant.clone(),
        wait,
    )
    .await
    {
        Ok(result) => {
            let status = if result.code.is_some() {
                "waiting_qr"
            } else {
                "authenticated"
            };
            Json(serde_json::json!({
                "connection_id": result.session.id,
                "qr_code": result.code,
                "status": status,
                "company_id": tenant.company_id,
                "user_id": tenant.user_id,
            }))
            .into_response()
        }
        Err(e) => domain_error_response(&e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /qr?connection_id=
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct QrParams {
    #[serde(default)]
    pub connection_id: Option<String>,
}

/// Poll the pairing state of a session.
pub async fn qr(State(state): State<AppState>, Query(params): Query<QrParams>) -> Response {
    let Some(connection_id) = params.connection_id else {
        return error_response(StatusCode::BAD_REQUEST, "connection_id is required");
    };

    let Some(record) = state.registry.get(&connection_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("session not found: {connection_id}"),
        );
    };

    if record.status.is_authenticated() {
        return Json(serde_json::json!({
            "connection_id": connection_id,
            "status": "authenticated",
            "jid": record.jid.map(|j| j.to_string()),
        }))
        .into_response();
    }

    let status = match record.status {
        SessionStatus::Disconnected => "disconnected",
        _ => "waiting_qr",
    };
    Json(serde_json::json!({
        "connection_id": connection_id,
        "status": status,
    }))
    .into_response()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /disconnect
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct DisconnectBody {
    pub connection_id: String,
}

/// Tear a session down and remove it from the registry.
pub async fn disconnect(
    State(state): State<AppState>,
    body: Result<Json<DisconnectBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid body: {e}")),
    };

    match state.registry.remove(&body.connection_id) {
        Some(record) => {
            // Engine I/O happens outside any registry lock.
            record.conn.disconnect().await;
            Json(serde_json::json!({ "status": "disconnected" })).into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("session not found: {}", body.connection_id),
        ),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /connections
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Snapshot of every live session.
pub async fn list_connections(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.registry.list();
    Json(serde_json::json!({
        "count": connections.len(),
        "connections": connections,
    }))
}
