use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::config::AppConfig;
use crate::core::dashboard::{self, DashboardState, PAGE_ROUTE};
use crate::core::store::JsonStore;

pub async fn run(config: &AppConfig, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.dashboard.bind.clone());
    let port = port.unwrap_or(config.dashboard.port);
    let addr = format!("{}:{}", bind, port);

    let store = Arc::new(JsonStore::new(config.data_path()));
    let data_path = store.path().to_path_buf();
    let state = DashboardState {
        store,
        page_path: config.dashboard.page_path.clone(),
    };
    let app = dashboard::router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind dashboard server to {}", addr))?;
    tracing::info!(
        addr = %addr,
        data = %data_path.display(),
        "serving dashboard at http://{}{}",
        addr,
        PAGE_ROUTE
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Dashboard server error")?;
    tracing::info!("dashboard server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
