use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::auth::password::{verify_password, NewUser, PasswordHasher};
use crate::auth::session::{IssuedSession, SessionManager};
use crate::db::{self, models::User};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn conflict_for(err: &rusqlite::Error) -> Option<AppError> {
    if !db::is_unique_violation(err) {
        return None;
    }
    let detail = err.to_string();
    if detail.contains("users.email") {
        Some(AppError::Conflict("Email already taken".into()))
    } else if detail.contains("users.username") {
        Some(AppError::Conflict("Username already taken".into()))
    } else {
        None
    }
}

/// Register a user and open their first session in one transaction.
///
/// Duplicate email is reported before duplicate username. Nothing is written
/// if either check fails or if the session cannot be created.
pub fn signup(
    pool: &DbPool,
    sessions: &SessionManager,
    hasher: &PasswordHasher,
    new_user: &NewUser,
) -> AppResult<(User, IssuedSession)> {
    // bcrypt is slow; keep it outside the write lock.
    let hash = hasher.hash(&new_user.password)?;

    let mut conn = pool.get()?;
    let tx = db::write_tx(&mut conn)?;

    let email_taken: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![new_user.email],
        |row| row.get(0),
    )?;
    if email_taken {
        return Err(AppError::Conflict("Email already taken".into()));
    }

    let username_taken: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![new_user.username],
        |row| row.get(0),
    )?;
    if username_taken {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    tx.execute(
        "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
        params![new_user.username, new_user.email, hash],
    )
    .map_err(|e| conflict_for(&e).unwrap_or(AppError::Database(e)))?;
    let user_id = tx.last_insert_rowid();

    let issued = sessions.replace_in_tx(&tx, user_id, Utc::now())?;

    let user = tx.query_row(
        "SELECT id, username, email, password_hash, created_at FROM users WHERE id = ?1",
        params![user_id],
        user_from_row,
    )?;
    tx.commit()?;

    tracing::info!("New user registered: {} (id {})", user.username, user.id);
    Ok((user, issued))
}

/// Check a login identifier (email or username) and password.
///
/// Returns the user id, or `InvalidCredentials` without saying which part
/// was wrong. Both failure paths run one bcrypt verify at the hasher's cost.
pub fn authenticate(
    pool: &DbPool,
    hasher: &PasswordHasher,
    identifier: &str,
    password: &str,
) -> AppResult<i64> {
    let found: Option<(i64, String)> = {
        let conn = pool.get()?;
        conn.query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1 OR username = ?1",
            params![identifier],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
    };

    match found {
        Some((user_id, hash)) if verify_password(password, &hash) => Ok(user_id),
        Some((user_id, _)) => {
            tracing::warn!("Failed login for user {}", user_id);
            Err(AppError::InvalidCredentials)
        }
        None => {
            let _ = hasher.verify_dummy(password);
            tracing::warn!("Failed login for unknown identifier");
            Err(AppError::InvalidCredentials)
        }
    }
}

pub fn get_user(pool: &DbPool, user_id: i64) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = ?1",
            params![user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}
