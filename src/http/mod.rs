//! HTTP transport glue
//!
//! Thin axum layer over the core: request parsing, JSON shaping, and
//! the evaluate-before-acquire ordering. No statement reaches a
//! connection without an `allowed` verdict from the gatekeeper, and a
//! denied statement is never executed.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

use crate::engine::executor;
use crate::engine::types::{Dialect, QueryResult};
use crate::safety::ensure_row_limit;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/api/validate-sql", post(run_sql))
        .route("/api/db-status", get(db_status))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SqlRequest {
    pub sql: String,
    pub dialect: String,
}

#[derive(Debug, Serialize)]
pub struct SqlResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({
        "message": "pong",
        "status": "ok",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn db_status(State(state): State<AppState>) -> Json<BTreeMap<Dialect, bool>> {
    Json(state.manager.statuses().await)
}

async fn run_sql(
    State(state): State<AppState>,
    Json(req): Json<SqlRequest>,
) -> Json<SqlResponse> {
    // Safety first; the dialect label is judged here too
    let verdict = state.gate.evaluate_raw(&req.sql, &req.dialect);
    if verdict.is_denied() {
        return Json(SqlResponse {
            valid: false,
            error: verdict.reason,
            result: None,
        });
    }

    let dialect: Dialect = match req.dialect.parse() {
        Ok(dialect) => dialect,
        Err(e) => {
            return Json(SqlResponse {
                valid: false,
                error: Some(e.to_string()),
                result: None,
            });
        }
    };

    let (sql, rewritten) = ensure_row_limit(&req.sql);
    if rewritten {
        debug!("appended default row limit to unbounded select");
    }

    let backend = match state.manager.get_connection(dialect).await {
        Ok(backend) => backend,
        Err(e) => {
            return Json(SqlResponse {
                valid: true,
                error: Some(format!("Database connection error: {}", e)),
                result: None,
            });
        }
    };

    match executor::execute_bounded(&backend, &sql).await {
        Ok(result) => Json(SqlResponse {
            valid: true,
            error: None,
            result: Some(result),
        }),
        Err(e) => Json(SqlResponse {
            valid: true,
            error: Some(e.to_string()),
            result: None,
        }),
    }
}
