//! Outbound message endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use cr_engine::Jid;

use crate::state::AppState;

use super::{domain_error_response, error_response};

#[derive(Debug, Deserialize)]
pub struct SendBody {
    pub connection_id: String,
    pub to: String,
    pub text: String,
}

/// Send a text message on an authenticated session.
pub async fn send(
    State(state): State<AppState>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("invalid body: {e}")),
    };

    let Some(record) = state.registry.get(&body.connection_id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("session not found: {}", body.connection_id),
        );
    };

    // Nothing reaches the engine on an unpaired session.
    if !record.status.is_authenticated() {
        return error_response(
            StatusCode::FORBIDDEN,
            format!("session not authenticated: {}", body.connection_id),
        );
    }

    let to = match Jid::parse(&body.to) {
        Ok(jid) => jid,
        Err(e) => return domain_error_response(&e),
    };

    // Protocol commands on one connection are serialized per record;
    // the registry itself stays unlocked during the send.
    let receipt = {
        let _guard = record.send_lock.lock().await;
        record.conn.send_text(&to, &body.text).await
    };

    match receipt {
        Ok(receipt) => Json(serde_json::json!({
            "status": "sent",
            "message_id": receipt.message_id,
            "timestamp": receipt.timestamp,
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(
                connection_id = %body.connection_id,
                error = %e,
                "send failed"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
