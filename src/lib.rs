// sqlground - Sandboxed multi-dialect SQL playground backend
// Core library

pub mod config;
pub mod engine;
pub mod http;
pub mod observability;
pub mod safety;

use std::sync::Arc;

use config::StoreEndpoints;
use engine::drivers::{MySqlDriver, PostgresDriver, SqliteDriver};
use engine::{ConnectionManager, SqlBackend};
use safety::SafetyGate;

/// Shared application state: the statement gate and the connection
/// lifecycle manager, cloned into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SafetyGate>,
    pub manager: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(endpoints: &StoreEndpoints) -> Self {
        let mut manager = ConnectionManager::new();

        manager.register(
            Arc::new(SqliteDriver::new()) as Arc<dyn SqlBackend>,
            endpoints.sqlite.clone(),
        );
        manager.register(
            Arc::new(MySqlDriver::new()) as Arc<dyn SqlBackend>,
            endpoints.mysql.clone(),
        );
        manager.register(
            Arc::new(PostgresDriver::new()) as Arc<dyn SqlBackend>,
            endpoints.postgresql.clone(),
        );

        Self {
            gate: Arc::new(SafetyGate::new()),
            manager: Arc::new(manager),
        }
    }
}
