pub mod auth;
pub mod forum;
pub mod home;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .merge(auth::router(state.clone()))
        .merge(forum::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
