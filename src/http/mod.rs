//! Request Surface (§4.5): thin routing from HTTP verbs/paths into the Query, Store,
//! Auth, Blob, and Multiplexer components. No business logic lives here.

mod auth;
mod blobs;
mod documents;
pub mod envelope;
pub mod state;
mod ws;

pub use state::AppState;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full `/api/v1` router plus the `/ws` live-channel upgrade.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route(
            "/{collection}",
            get(documents::query_collection).post(documents::create_document),
        )
        .route(
            "/{collection}/{id}",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )
        .route(
            "/blobs/{*path}",
            put(blobs::put_blob).get(blobs::get_blob).delete(blobs::delete_blob),
        );

    Router::new()
        .nest("/api/v1", api)
        .route("/ws", get(ws::upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
