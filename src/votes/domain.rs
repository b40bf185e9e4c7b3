// Vote domain types and the toggle state machine. Pure, no storage.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Direction of a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Like,
    Dislike,
}

impl Polarity {
    /// Stored value: +1 for like, -1 for dislike.
    pub fn value(self) -> i64 {
        match self {
            Polarity::Like => 1,
            Polarity::Dislike => -1,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Polarity::Like),
            -1 => Some(Polarity::Dislike),
            _ => None,
        }
    }
}

impl FromStr for Polarity {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" | "1" | "+1" => Ok(Polarity::Like),
            "dislike" | "-1" => Ok(Polarity::Dislike),
            _ => Err(AppError::Validation("Invalid vote kind".into())),
        }
    }
}

/// A user's current reaction to one target. `None` means no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    None,
    Liked,
    Disliked,
}

impl VoteState {
    pub fn from_stored(value: Option<i64>) -> Option<Self> {
        match value {
            None => Some(VoteState::None),
            Some(v) => Polarity::from_value(v).map(VoteState::from),
        }
    }
}

impl From<Polarity> for VoteState {
    fn from(p: Polarity) -> Self {
        match p {
            Polarity::Like => VoteState::Liked,
            Polarity::Dislike => VoteState::Disliked,
        }
    }
}

impl fmt::Display for VoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VoteState::None => "none",
            VoteState::Liked => "liked",
            VoteState::Disliked => "disliked",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Post,
    Comment,
}

/// What a vote points at: exactly one post or exactly one comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum VoteTarget {
    Post(i64),
    Comment(i64),
}

impl VoteTarget {
    /// Build a target from the two optional ids of a request. Exactly one
    /// must be present.
    pub fn from_parts(post_id: Option<i64>, comment_id: Option<i64>) -> AppResult<Self> {
        match (post_id, comment_id) {
            (Some(id), None) => Ok(VoteTarget::Post(id)),
            (None, Some(id)) => Ok(VoteTarget::Comment(id)),
            (Some(_), Some(_)) => Err(AppError::Validation(
                "A vote targets a post or a comment, not both".into(),
            )),
            (None, None) => Err(AppError::Validation("Missing vote target".into())),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            VoteTarget::Post(_) => TargetKind::Post,
            VoteTarget::Comment(_) => TargetKind::Comment,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => id,
        }
    }

    /// Column in `votes` that references this target.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post_id",
            VoteTarget::Comment(_) => "comment_id",
        }
    }

    /// Table holding the target itself.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "posts",
            VoteTarget::Comment(_) => "comments",
        }
    }
}

/// Parse an optional id field from a form. Blank counts as absent.
pub fn parse_target_id(raw: Option<&str>) -> AppResult<Option<i64>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(Some(id)),
        _ => Err(AppError::Validation("Invalid vote target".into())),
    }
}

/// Storage effect of one toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Insert(Polarity),
    Update(Polarity),
    Delete,
}

/// Toggle state machine: same polarity again clears the vote, the other
/// polarity flips it, and a first vote creates it.
pub fn transition(current: VoteState, input: Polarity) -> (VoteState, Transition) {
    match (current, input) {
        (VoteState::None, p) => (p.into(), Transition::Insert(p)),
        (VoteState::Liked, Polarity::Like) | (VoteState::Disliked, Polarity::Dislike) => {
            (VoteState::None, Transition::Delete)
        }
        (VoteState::Liked, Polarity::Dislike) | (VoteState::Disliked, Polarity::Like) => {
            (input.into(), Transition::Update(input))
        }
    }
}
