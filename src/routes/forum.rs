use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::auth_required;
use crate::content::handlers as content;
use crate::state::AppState;
use crate::votes::handlers as votes;

/// Everything that writes forum content or reactions. All of it sits
/// behind the auth gate.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/post",
            get(content::new_post_page).post(content::create_post),
        )
        .route("/comment", post(content::create_comment))
        .route("/like", post(votes::like))
        .route("/commentlike", post(votes::comment_like))
        .route_layer(middleware::from_fn_with_state(state, auth_required))
}
