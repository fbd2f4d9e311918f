//! Store endpoint configuration
//!
//! One address per dialect, static for the process lifetime. The only
//! environment-dependent choice is loopback vs containerized network
//! addresses, decided by probing for `/.dockerenv`; explicit environment
//! variables override either form.

use std::env;
use std::path::Path;

use crate::engine::types::Dialect;

/// Connection endpoints for the three backing stores
#[derive(Debug, Clone)]
pub struct StoreEndpoints {
    pub sqlite: String,
    pub mysql: String,
    pub postgresql: String,
}

impl StoreEndpoints {
    /// Builds endpoints from the environment.
    pub fn from_env() -> Self {
        Self::for_runtime(Path::new("/.dockerenv").exists())
    }

    /// `containerized` picks the in-network hostnames used by the
    /// compose setup; otherwise everything points at localhost.
    pub fn for_runtime(containerized: bool) -> Self {
        let (mysql_host, postgres_host) = if containerized {
            ("mysql", "postgres")
        } else {
            ("localhost", "localhost")
        };

        Self {
            sqlite: env::var("SQLITE_PATH").unwrap_or_else(|_| "./testdb.sqlite".to_string()),
            mysql: env::var("MYSQL_URL").unwrap_or_else(|_| {
                format!("mysql://root:example@{}:3306/testdb", mysql_host)
            }),
            postgresql: env::var("POSTGRES_URL").unwrap_or_else(|_| {
                format!(
                    "postgres://postgres:example@{}:5432/testdb?sslmode=disable",
                    postgres_host
                )
            }),
        }
    }

    pub fn url_for(&self, dialect: Dialect) -> &str {
        match dialect {
            Dialect::Sqlite => &self.sqlite,
            Dialect::Mysql => &self.mysql,
            Dialect::Postgresql => &self.postgresql,
        }
    }
}

/// Address the HTTP server binds to
pub fn listen_addr() -> String {
    env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_and_container_forms() {
        let local = StoreEndpoints::for_runtime(false);
        assert!(local.url_for(Dialect::Mysql).contains("@localhost:3306"));

        let containerized = StoreEndpoints::for_runtime(true);
        assert!(containerized.url_for(Dialect::Mysql).contains("@mysql:3306"));
        assert!(containerized.url_for(Dialect::Postgresql).contains("@postgres:5432"));
    }
}
