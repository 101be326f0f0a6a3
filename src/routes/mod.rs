mod auth;
mod events;
mod health;
mod pages;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router around an explicitly constructed state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/login", get(auth::login))
        .route("/redirect", get(auth::oauth_callback))
        .route("/stream", get(pages::stream))
        .route("/events", get(events::events))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
