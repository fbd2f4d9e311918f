use tracing::{error, info};

use sqlground::config::{self, StoreEndpoints};
use sqlground::{http, observability, AppState};

#[tokio::main]
async fn main() {
    observability::init_tracing();
    info!("starting SQL playground server");

    let endpoints = StoreEndpoints::from_env();
    let state = AppState::new(&endpoints);

    // Embedded store failure is logged but not fatal; the network
    // stores keep retrying in the background.
    if let Err(e) = state.manager.init().await {
        error!("error initializing database connections: {}", e);
    }

    let app = http::router(state);
    let addr = config::listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", addr, e));

    info!("server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    info!("server exited");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down server");
}
