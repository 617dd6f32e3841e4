use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::resources::ResourceLookup;

/// Shared application state. All booking writes go through the single
/// connection mutex, which also serializes every check-then-act sequence
/// (availability check plus insert) for us.
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub resources: Box<dyn ResourceLookup>,
}
