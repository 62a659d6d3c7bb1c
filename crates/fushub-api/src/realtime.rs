use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::AppState;
use crate::middleware::verify_token;

#[derive(Deserialize)]
pub struct RealtimeQuery {
    token: String,
}

/// GET /realtime?token=<jwt>. Browsers cannot set headers on a WebSocket
/// handshake, so the token rides in the query string. The socket is tied to
/// the token's session and closes when that session signs out.
pub async fn upgrade(
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let session = match verify_token(&state, &query.token).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Rejected realtime connection: {}", e);
            return e.into_response();
        }
    };

    let dispatcher = state.dispatcher.clone();
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| {
        fushub_realtime::handle_connection(
            socket,
            dispatcher,
            session.user_id,
            session.session_id,
            shutdown,
        )
    })
}
