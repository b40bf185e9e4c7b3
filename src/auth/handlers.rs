use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::cookies::{clear_session_cookie, session_cookie};
use crate::auth::gate::SessionUser;
use crate::auth::password::SignupForm;
use crate::auth::session::IssuedSession;
use crate::auth::users;
use crate::error::{AppError, AppResult};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub error: String,
    pub username: String,
    pub email: String,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub error: String,
    pub email: String,
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    /// Email or username.
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn redirect_with_cookie(location: &str, cookie: String) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, cookie),
        ],
    )
        .into_response()
}

/// Run bcrypt and write transactions off the async workers.
async fn run_blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task failed: {}", e)))?
}

fn issue_cookie(state: &AppState, issued: &IssuedSession) -> String {
    session_cookie(
        &state.config.auth.cookie_name,
        &issued.token,
        issued.expires_at,
    )
}

// -- Signup handlers --

/// GET /signup
pub async fn signup_page() -> Html<SignupTemplate> {
    Html(SignupTemplate {
        error: String::new(),
        username: String::new(),
        email: String::new(),
    })
}

fn signup_rejected(form: &SignupForm, err: AppError) -> Response {
    (
        err.status(),
        Html(SignupTemplate {
            error: err.public_message(),
            username: form.username.trim().to_string(),
            email: form.email.trim().to_string(),
        }),
    )
        .into_response()
}

/// POST /signup: create the user and its first session, then go home.
pub async fn signup_submit(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let new_user = match form.validate() {
        Ok(new_user) => new_user,
        Err(e) => return Ok(signup_rejected(&form, e)),
    };

    let outcome = {
        let state = state.clone();
        run_blocking(move || {
            users::signup(&state.db, &state.sessions, &state.passwords, &new_user)
        })
        .await
    };

    match outcome {
        Ok((_user, issued)) => Ok(redirect_with_cookie("/", issue_cookie(&state, &issued))),
        Err(e @ (AppError::Conflict(_) | AppError::Validation(_))) => {
            Ok(signup_rejected(&form, e))
        }
        Err(e) => Err(e),
    }
}

// -- Login handlers --

/// GET /login
pub async fn login_page() -> Html<LoginTemplate> {
    Html(LoginTemplate {
        error: String::new(),
        email: String::new(),
    })
}

fn login_rejected(form: &LoginForm, err: AppError) -> Response {
    (
        err.status(),
        Html(LoginTemplate {
            error: err.public_message(),
            email: form.email.trim().to_string(),
        }),
    )
        .into_response()
}

/// POST /login: check credentials and replace the user's session.
pub async fn login_submit(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let identifier = form.email.trim();
    if identifier.is_empty() || form.password.is_empty() {
        return Ok(login_rejected(
            &form,
            AppError::Validation("Email and password required".into()),
        ));
    }

    let outcome = {
        let state = state.clone();
        let identifier = identifier.to_string();
        let password = form.password.clone();
        run_blocking(move || {
            let user_id =
                users::authenticate(&state.db, &state.passwords, &identifier, &password)?;
            let issued = state.sessions.create_session(user_id)?;
            Ok((user_id, issued))
        })
        .await
    };

    let (user_id, issued) = match outcome {
        Ok(found) => found,
        Err(e @ AppError::InvalidCredentials) => return Ok(login_rejected(&form, e)),
        Err(e) => return Err(e),
    };
    tracing::info!("User {} logged in", user_id);

    Ok(redirect_with_cookie(
        &state.config.auth.landing_path,
        issue_cookie(&state, &issued),
    ))
}

// -- Logout handler --

/// GET|POST /logout: drop the session and clear the cookie.
pub async fn logout(State(state): State<AppState>, session: SessionUser) -> AppResult<Response> {
    state.sessions.revoke(session.user_id)?;
    tracing::info!("User {} logged out", session.user_id);

    Ok(redirect_with_cookie(
        "/",
        clear_session_cookie(&state.config.auth.cookie_name),
    ))
}
