use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::email::EmailProvider;
use crate::services::mls::MlsClient;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub mls: MlsClient,
    pub mailer: Box<dyn EmailProvider>,
}

impl AppState {
    // Never hold this guard across an await.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
