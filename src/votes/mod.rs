pub mod domain;
pub mod handlers;
pub mod repository;

pub use domain::{Polarity, TargetKind, VoteState, VoteTarget};
pub use repository::{Tally, ToggleOutcome, VoteEngine};
