//! HTTP gateway: each sibling module exports a subrouter, merged here so
//! `main.rs` never needs to know about individual endpoints.

use std::sync::Arc;

use axum::Router;

use crate::orchestrator::Orchestrator;

mod commands;
mod health;
mod log;
mod state;

// ---

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    // ---
    Router::new()
        .merge(state::router())
        .merge(log::router())
        .merge(commands::router())
        .merge(health::router())
        .with_state(orchestrator)
}
