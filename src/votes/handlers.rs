use axum::extract::State;
use axum::{Form, Json};
use serde::Deserialize;

use crate::auth::SessionUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::votes::domain::{parse_target_id, Polarity, TargetKind, VoteTarget};
use crate::votes::repository::ToggleOutcome;

/// Fields are kept as raw strings so malformed input becomes a validation
/// error instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub kind: Option<String>,
}

impl VoteForm {
    fn target(&self) -> AppResult<VoteTarget> {
        VoteTarget::from_parts(
            parse_target_id(self.post_id.as_deref())?,
            parse_target_id(self.comment_id.as_deref())?,
        )
    }

    fn polarity(&self) -> AppResult<Polarity> {
        self.kind
            .as_deref()
            .ok_or_else(|| AppError::Validation("Missing vote kind".into()))?
            .parse()
    }
}

fn toggle(
    state: &AppState,
    session: &SessionUser,
    form: &VoteForm,
    expected: TargetKind,
) -> AppResult<Json<ToggleOutcome>> {
    let target = form.target()?;
    if target.kind() != expected {
        return Err(AppError::Validation(match expected {
            TargetKind::Post => "This endpoint only accepts post votes".into(),
            TargetKind::Comment => "This endpoint only accepts comment votes".into(),
        }));
    }
    let polarity = form.polarity()?;

    let outcome = state.votes.toggle(session.user_id, target, polarity)?;
    Ok(Json(outcome))
}

/// POST /like: toggle a reaction on a post.
pub async fn like(
    State(state): State<AppState>,
    session: SessionUser,
    Form(form): Form<VoteForm>,
) -> AppResult<Json<ToggleOutcome>> {
    toggle(&state, &session, &form, TargetKind::Post)
}

/// POST /commentlike: toggle a reaction on a comment.
pub async fn comment_like(
    State(state): State<AppState>,
    session: SessionUser,
    Form(form): Form<VoteForm>,
) -> AppResult<Json<ToggleOutcome>> {
    toggle(&state, &session, &form, TargetKind::Comment)
}
