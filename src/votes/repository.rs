use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::votes::domain::{transition, Polarity, Transition, VoteState, VoteTarget};

/// Like/dislike counts for one target, derived from the vote rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub likes: i64,
    pub dislikes: i64,
}

/// Result of a toggle: the caller's new state plus fresh counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub state: VoteState,
    #[serde(flatten)]
    pub tally: Tally,
}

/// Records and toggles reactions on posts and comments.
#[derive(Clone)]
pub struct VoteEngine {
    pool: DbPool,
}

impl VoteEngine {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Apply one toggle for `user_id` on `target`.
    ///
    /// Read, decide and write run inside a single immediate transaction, so
    /// concurrent toggles on the same (user, target) key are serialized and
    /// none is lost. Toggles by different users never share a key.
    pub fn toggle(
        &self,
        user_id: i64,
        target: VoteTarget,
        polarity: Polarity,
    ) -> AppResult<ToggleOutcome> {
        let mut conn = self.pool.get()?;
        let tx = db::write_tx(&mut conn)?;

        if !target_exists(&tx, target)? {
            return Err(AppError::NotFound);
        }

        let current = current_state(&tx, user_id, target)?;
        let (next, effect) = transition(current, polarity);
        let column = target.column();

        match effect {
            Transition::Insert(p) => {
                tx.execute(
                    &format!(
                        "INSERT INTO votes (user_id, {column}, value) VALUES (?1, ?2, ?3)"
                    ),
                    params![user_id, target.id(), p.value()],
                )?;
            }
            Transition::Update(p) => {
                tx.execute(
                    &format!("UPDATE votes SET value = ?3 WHERE user_id = ?1 AND {column} = ?2"),
                    params![user_id, target.id(), p.value()],
                )?;
            }
            Transition::Delete => {
                tx.execute(
                    &format!("DELETE FROM votes WHERE user_id = ?1 AND {column} = ?2"),
                    params![user_id, target.id()],
                )?;
            }
        }

        let tally = tally_in(&tx, target)?;
        tx.commit()?;

        tracing::debug!(
            "User {} toggled {:?} on {:?}: {} -> {}",
            user_id,
            polarity,
            target,
            current,
            next
        );
        Ok(ToggleOutcome { state: next, tally })
    }

    /// Current reaction of `user_id` to `target`.
    pub fn state(&self, user_id: i64, target: VoteTarget) -> AppResult<VoteState> {
        let conn = self.pool.get()?;
        current_state(&conn, user_id, target)
    }

    /// Counts for `target`. An unknown target simply has zero votes.
    pub fn tally(&self, target: VoteTarget) -> AppResult<Tally> {
        let conn = self.pool.get()?;
        tally_in(&conn, target)
    }
}

fn target_exists(conn: &Connection, target: VoteTarget) -> rusqlite::Result<bool> {
    conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)",
            target.table()
        ),
        params![target.id()],
        |row| row.get(0),
    )
}

fn current_state(conn: &Connection, user_id: i64, target: VoteTarget) -> AppResult<VoteState> {
    let value: Option<i64> = conn
        .query_row(
            &format!(
                "SELECT value FROM votes WHERE user_id = ?1 AND {} = ?2",
                target.column()
            ),
            params![user_id, target.id()],
            |row| row.get(0),
        )
        .optional()?;

    VoteState::from_stored(value)
        .ok_or_else(|| AppError::Internal(format!("unexpected vote value {:?}", value)))
}

fn tally_in(conn: &Connection, target: VoteTarget) -> AppResult<Tally> {
    let mut stmt = conn.prepare(&format!(
        "SELECT value, COUNT(*) FROM votes WHERE {} = ?1 GROUP BY value",
        target.column()
    ))?;
    let rows = stmt.query_map(params![target.id()], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut tally = Tally::default();
    for row in rows {
        let (value, count) = row?;
        match Polarity::from_value(value) {
            Some(Polarity::Like) => tally.likes = count,
            Some(Polarity::Dislike) => tally.dislikes = count,
            None => {}
        }
    }
    Ok(tally)
}
