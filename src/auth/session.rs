use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use rusqlite::{params, OptionalExtension, Transaction};

use crate::db::{self, TIMESTAMP_FORMAT};
use crate::error::AppResult;
use crate::state::DbPool;

/// Random bytes per token; hex-encoded this is 64 characters.
const TOKEN_BYTES: usize = 32;

/// A freshly created session, as handed to the cookie layer.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, validates and revokes session tokens.
///
/// A user has at most one session row: creating a session replaces any
/// previous one in the same transaction. Expired rows are never treated as
/// valid; they are swept opportunistically whenever a new session is made.
#[derive(Clone)]
pub struct SessionManager {
    pool: DbPool,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(pool: DbPool, session_hours: u64) -> Self {
        Self {
            pool,
            ttl: Duration::hours(session_hours as i64),
        }
    }

    /// Create a session for `user_id`, replacing any existing one.
    pub fn create_session(&self, user_id: i64) -> AppResult<IssuedSession> {
        self.create_session_at(user_id, Utc::now())
    }

    pub fn create_session_at(&self, user_id: i64, now: DateTime<Utc>) -> AppResult<IssuedSession> {
        let mut conn = self.pool.get()?;
        let tx = db::write_tx(&mut conn)?;

        let purged = purge_expired(&tx, now)?;
        if purged > 0 {
            tracing::debug!("Purged {} expired sessions", purged);
        }

        let issued = self.replace_in_tx(&tx, user_id, now)?;
        tx.commit()?;

        tracing::info!("Session created for user {}", user_id);
        Ok(issued)
    }

    /// Delete-then-insert inside a caller-owned transaction. Used directly by
    /// signup so the user row and its first session commit together.
    pub(crate) fn replace_in_tx(
        &self,
        tx: &Transaction<'_>,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<IssuedSession> {
        let token = generate_token()?;
        let expires_at = (now + self.ttl).trunc_subsecs(0);

        tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        tx.execute(
            "INSERT INTO sessions (id, token, user_id, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                uuid::Uuid::now_v7().to_string(),
                token,
                user_id,
                format_timestamp(expires_at),
            ],
        )?;

        Ok(IssuedSession { token, expires_at })
    }

    /// Resolve a token to its user. `None` if the token is unknown or the
    /// session is at or past its expiry.
    pub fn validate(&self, token: &str) -> AppResult<Option<i64>> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> AppResult<Option<i64>> {
        if token.is_empty() {
            return Ok(None);
        }

        let conn = self.pool.get()?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };

        match parse_timestamp(&expires_at) {
            Some(expires_at) if now < expires_at => Ok(Some(user_id)),
            Some(_) => Ok(None),
            None => {
                tracing::warn!("Session for user {} has unreadable expiry {:?}", user_id, expires_at);
                Ok(None)
            }
        }
    }

    /// Remove the session belonging to `user_id`. Revoking a session that
    /// does not exist is not an error.
    pub fn revoke(&self, user_id: i64) -> AppResult<()> {
        let conn = self.pool.get()?;
        let removed = conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        if removed > 0 {
            tracing::info!("Session revoked for user {}", user_id);
        }
        Ok(())
    }
}

fn purge_expired(tx: &Transaction<'_>, now: DateTime<Utc>) -> rusqlite::Result<usize> {
    tx.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![format_timestamp(now)],
    )
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Generate a 32-byte token from the OS random source, hex-encoded.
pub fn generate_token() -> Result<String, rand::Error> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex::encode(bytes))
}
