use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::cookies;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The session resolved by the gate, injected into request extensions.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: i64,
    pub token: String,
}

/// Look up the session cookie and validate it. Runs on every request; the
/// result is never cached across requests.
pub fn resolve_session(state: &AppState, headers: &HeaderMap) -> AppResult<Option<SessionUser>> {
    let Some(token) = cookies::cookie_value(headers, &state.config.auth.cookie_name) else {
        return Ok(None);
    };

    Ok(state.sessions.validate(token)?.map(|user_id| SessionUser {
        user_id,
        token: token.to_string(),
    }))
}

/// Page loads get redirected; API-style calls get a status code.
fn is_navigational(req: &Request) -> bool {
    if req.method() == Method::GET || req.method() == Method::HEAD {
        return true;
    }
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html"))
        .unwrap_or(false)
}

/// Middleware for routes that need a signed-in user.
pub async fn auth_required(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match resolve_session(&state, req.headers()) {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => {
            let stale_cookie =
                cookies::cookie_value(req.headers(), &state.config.auth.cookie_name).is_some();
            let mut response = if is_navigational(&req) {
                (
                    StatusCode::SEE_OTHER,
                    [(header::LOCATION, state.config.auth.login_path.clone())],
                )
                    .into_response()
            } else {
                AppError::Unauthorized.into_response()
            };
            if stale_cookie {
                if let Ok(value) =
                    cookies::clear_session_cookie(&state.config.auth.cookie_name).parse()
                {
                    response.headers_mut().insert(header::SET_COOKIE, value);
                }
            }
            response
        }
        Err(e) => e.into_response(),
    }
}

/// Middleware for login/signup: a signed-in user is sent to the landing page.
pub async fn not_auth_required(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match resolve_session(&state, req.headers()) {
        Ok(Some(_)) => (
            StatusCode::SEE_OTHER,
            [(header::LOCATION, state.config.auth.landing_path.clone())],
        )
            .into_response(),
        Ok(None) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// Handlers behind [`auth_required`] take the resolved session directly.
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<SessionUser>() {
            return Ok(user.clone());
        }
        resolve_session(state, &parts.headers)?.ok_or(AppError::Unauthorized)
    }
}
