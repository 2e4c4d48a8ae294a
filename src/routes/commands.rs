//! `POST /commands`: dispatch an operator command.
//!
//! 204 on acknowledgement; failures map to 409 (not connected), 422 (bad
//! setpoint) and 502 (store write failed).

use std::sync::Arc;

use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::commands::Command;
use crate::error::CommandError;
use crate::orchestrator::Orchestrator;

// ---

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router() -> Router<Arc<Orchestrator>> {
    // ---
    Router::new().route("/commands", post(handler))
}

fn status_for(err: &CommandError) -> StatusCode {
    match err {
        CommandError::NotConnected => StatusCode::CONFLICT,
        CommandError::OutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CommandError::WriteFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

async fn handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(command): Json<Command>,
) -> impl IntoResponse {
    // ---
    info!("POST /commands - {:?}", command);

    match orchestrator.execute(command).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!("command rejected: {}", e);
            (
                status_for(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
