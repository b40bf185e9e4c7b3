use axum::middleware;
use axum::routing::get;
use axum::Router;

use crate::auth::{auth_required, handlers, not_auth_required};
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    let anonymous = Router::new()
        .route(
            "/signup",
            get(handlers::signup_page).post(handlers::signup_submit),
        )
        .route(
            "/login",
            get(handlers::login_page).post(handlers::login_submit),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            not_auth_required,
        ));

    let authenticated = Router::new()
        .route("/logout", get(handlers::logout).post(handlers::logout))
        .route_layer(middleware::from_fn_with_state(state, auth_required));

    anonymous.merge(authenticated)
}
