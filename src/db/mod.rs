pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Timestamp layout used for every stored time (UTC, same as SQLite's
/// `datetime('now')`), so text comparison orders correctly.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn configure(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

pub fn create_pool(db_path: &Path, cfg: &DatabaseConfig) -> anyhow::Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let busy_timeout = Duration::from_millis(cfg.busy_timeout_ms);
    let manager =
        SqliteConnectionManager::file(db_path).with_init(move |c| configure(c, busy_timeout));
    let pool = Pool::builder()
        .max_size(cfg.max_connections.max(1))
        .connection_timeout(busy_timeout.max(Duration::from_millis(250)))
        .build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// Single-connection in-memory pool for tests and throwaway instances.
pub fn memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|c| configure(c, Duration::from_millis(5000)));
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Start a write transaction that takes the database write lock up front.
///
/// Every read-decide-write unit goes through here, so two writers on the
/// same key can never interleave between the read and the write. A second
/// writer waits up to the busy timeout and then fails with `SQLITE_BUSY`.
pub fn write_tx(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// True when `err` is a UNIQUE constraint failure (as opposed to other
/// constraint kinds such as foreign keys or CHECKs).
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> DbPool {
        memory_pool().unwrap()
    }

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path, &DatabaseConfig::default()).unwrap();
        assert!(db_path.exists());

        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in ["users", "sessions", "posts", "comments", "votes"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    fn seed_user_and_post(conn: &Connection) {
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash) VALUES (1, 'alice', 'a@x.com', 'h')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO posts (id, user_id, title, content) VALUES (5, 1, 't', 'c')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        seed_user_and_post(&conn);

        let err = conn
            .execute(
                "INSERT INTO users (username, email, password_hash) VALUES ('bob', 'a@x.com', 'h')",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn second_session_for_same_user_is_rejected() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        seed_user_and_post(&conn);

        conn.execute(
            "INSERT INTO sessions (id, token, user_id, expires_at) VALUES ('s1', 't1', 1, '2999-01-01 00:00:00')",
            [],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO sessions (id, token, user_id, expires_at) VALUES ('s2', 't2', 1, '2999-01-01 00:00:00')",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn vote_must_target_exactly_one_thing() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        seed_user_and_post(&conn);
        conn.execute(
            "INSERT INTO comments (id, post_id, user_id, body) VALUES (7, 5, 1, 'hi')",
            [],
        )
        .unwrap();

        let neither =
            conn.execute("INSERT INTO votes (user_id, value) VALUES (1, 1)", []);
        assert!(neither.is_err());

        let both = conn.execute(
            "INSERT INTO votes (user_id, post_id, comment_id, value) VALUES (1, 5, 7, 1)",
            [],
        );
        assert!(both.is_err());

        let bad_value = conn.execute(
            "INSERT INTO votes (user_id, post_id, value) VALUES (1, 5, 2)",
            [],
        );
        assert!(bad_value.is_err());
    }

    #[test]
    fn duplicate_post_vote_is_rejected_but_comment_vote_is_separate() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        seed_user_and_post(&conn);
        conn.execute(
            "INSERT INTO comments (id, post_id, user_id, body) VALUES (5, 5, 1, 'hi')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO votes (user_id, post_id, value) VALUES (1, 5, 1)",
            [],
        )
        .unwrap();
        let dup = conn
            .execute(
                "INSERT INTO votes (user_id, post_id, value) VALUES (1, 5, -1)",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&dup));

        // Same numeric id on the comment side is a different key.
        conn.execute(
            "INSERT INTO votes (user_id, comment_id, value) VALUES (1, 5, -1)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn deleting_a_post_cascades_to_its_votes() {
        let pool = test_pool();
        run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        seed_user_and_post(&conn);
        conn.execute(
            "INSERT INTO votes (user_id, post_id, value) VALUES (1, 5, 1)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM posts WHERE id = 5", []).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
