use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::home::Html;
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_BODY_LEN: usize = 10_000;

#[derive(Template)]
#[template(path = "pages/new_post.html")]
pub struct NewPostTemplate {
    pub username: String,
    pub error: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewPostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewCommentForm {
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub comment: String,
}

/// GET /post
pub async fn new_post_page(user: CurrentUser) -> Html<NewPostTemplate> {
    Html(NewPostTemplate {
        username: user.username,
        error: String::new(),
        title: String::new(),
        content: String::new(),
    })
}

/// POST /post
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<NewPostForm>,
) -> AppResult<Response> {
    let title = form.title.trim();
    let content = form.content.trim();

    let problem = if title.is_empty() || content.is_empty() {
        Some("Title and content are required")
    } else if title.chars().count() > MAX_TITLE_LEN || content.chars().count() > MAX_BODY_LEN {
        Some("Post is too long")
    } else {
        None
    };

    if let Some(problem) = problem {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(NewPostTemplate {
                username: user.username,
                error: problem.to_string(),
                title: title.to_string(),
                content: content.to_string(),
            }),
        )
            .into_response());
    }

    state.content.create_post(user.id, title, content).await?;
    Ok(Redirect::to("/").into_response())
}

/// POST /comment
pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<NewCommentForm>,
) -> AppResult<Response> {
    let post_id: i64 = form
        .post_id
        .trim()
        .parse()
        .map_err(|_| AppError::Validation("Invalid post".into()))?;
    let body = form.comment.trim();
    if body.is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".into()));
    }
    if body.chars().count() > MAX_BODY_LEN {
        return Err(AppError::Validation("Comment is too long".into()));
    }

    state.content.create_comment(post_id, user.id, body).await?;
    Ok(Redirect::to("/").into_response())
}
