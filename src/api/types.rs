use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;

use crate::db::sqlite::open_database;
use crate::pipeline::llm::ChatCompletion;
use crate::session::{Cooldown, TurnGuards};

use super::error::ApiError;

/// Shared context for all API routes. Connections are opened per request;
/// only the cheap shared handles live here. The cooldown is global (the
/// upstream rate limit is shared), while turn guards are per account.
#[derive(Clone)]
pub struct ApiContext {
    pub db_path: Arc<PathBuf>,
    pub llm: Arc<dyn ChatCompletion + Send + Sync>,
    pub cooldown: Arc<Cooldown>,
    pub turn_guards: Arc<TurnGuards>,
}

impl ApiContext {
    pub fn new(db_path: PathBuf, llm: Arc<dyn ChatCompletion + Send + Sync>) -> Self {
        Self {
            db_path: Arc::new(db_path),
            llm,
            cooldown: Arc::new(Cooldown::new()),
            turn_guards: Arc::new(TurnGuards::new()),
        }
    }

    /// Open a fresh connection for this request.
    pub fn open_db(&self) -> Result<Connection, ApiError> {
        open_database(&self.db_path).map_err(ApiError::from)
    }
}
