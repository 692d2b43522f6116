pub mod relay;
pub mod ws;

use std::sync::Arc;

use axum::Router;
use tokio::sync::RwLock;

use relay::{RelayState, SharedRelayState};

/// Build the relay router around a fresh room registry.
pub fn build_app(max_rooms: usize) -> (Router<()>, SharedRelayState) {
    let state: SharedRelayState = Arc::new(RwLock::new(RelayState::new(max_rooms)));

    // Clients connect to the bare host; `/relay` is kept for proxies that
    // route by path.
    let app = Router::new()
        .route("/", axum::routing::get(ws::ws_handler))
        .route("/relay", axum::routing::get(ws::ws_handler))
        .with_state(Arc::clone(&state));

    (app, state)
}
