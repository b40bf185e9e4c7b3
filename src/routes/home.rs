use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::content::{CommentSummary, PostSummary};
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::state::AppState;

/// A post together with its comments, as shown on the home page.
pub struct Thread {
    pub summary: PostSummary,
    pub comments: Vec<CommentSummary>,
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub username: Option<String>,
    pub threads: Vec<Thread>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// GET /: the forum front page, for signed-in and anonymous visitors alike.
pub async fn index(State(state): State<AppState>, maybe_user: MaybeUser) -> AppResult<Response> {
    let posts = state.content.list_posts().await?;

    let mut threads = Vec::with_capacity(posts.len());
    for summary in posts {
        let comments = state.content.comments_for(summary.post.id).await?;
        threads.push(Thread { summary, comments });
    }

    Ok(Html(HomeTemplate {
        username: maybe_user.0.map(|u| u.username),
        threads,
    })
    .into_response())
}
