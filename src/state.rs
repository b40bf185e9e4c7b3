use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::password::PasswordHasher;
use crate::auth::session::SessionManager;
use crate::config::Config;
use crate::content::{ContentStore, SqliteContentStore};
use crate::error::AppResult;
use crate::votes::repository::VoteEngine;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub sessions: SessionManager,
    pub passwords: PasswordHasher,
    pub votes: VoteEngine,
    pub content: Arc<dyn ContentStore>,
}

impl AppState {
    /// Wire every component to the same store handle. Fails only if the
    /// configured bcrypt cost is out of range.
    pub fn new(db: DbPool, config: Config) -> AppResult<Self> {
        let passwords = PasswordHasher::new(config.auth.bcrypt_cost)?;
        let sessions = SessionManager::new(db.clone(), config.auth.session_hours);
        let votes = VoteEngine::new(db.clone());
        let content = Arc::new(SqliteContentStore::new(db.clone()));
        Ok(Self {
            db,
            config,
            sessions,
            passwords,
            votes,
            content,
        })
    }
}
