//! `/ws` upgrade handler, handing the accepted socket straight to the multiplexer.

use super::state::AppState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        state.multiplexer.accept(socket).await;
    })
}
