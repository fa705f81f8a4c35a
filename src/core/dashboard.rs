use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::store::{JsonStore, StoreError};

const DASHBOARD_PAGE: &str = include_str!("../../assets/dashboard.html");

pub const PAGE_ROUTE: &str = "/token-dashboard";
pub const DATA_ROUTE: &str = "/data/token_usage.json";

#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<JsonStore>,
    /// Serve this file instead of the built-in page.
    pub page_path: Option<PathBuf>,
}

/// Read-only routes: the chart page and the raw store document.
pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(root_redirect))
        .route(PAGE_ROUTE, get(page))
        .route("/token-dashboard/", get(page))
        .route(DATA_ROUTE, get(data))
        .route("/data/token_usage.json/", get(data))
        .fallback(not_found)
        .with_state(state)
}

async fn root_redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, PAGE_ROUTE)])
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}

async fn page(State(state): State<DashboardState>) -> Response {
    let Some(path) = state.page_path else {
        return Html(DASHBOARD_PAGE).into_response();
    };
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "dashboard page missing");
            (StatusCode::NOT_FOUND, "Dashboard not found").into_response()
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read dashboard page");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read dashboard").into_response()
        }
    }
}

async fn data(State(state): State<DashboardState>) -> Response {
    let store = state.store.clone();
    let ledger = match tokio::task::spawn_blocking(move || store.read_all()).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "store read task failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Store read failed").into_response();
        }
    };
    match ledger {
        Ok(ledger) => (
            [(header::CACHE_CONTROL, "no-store")],
            Json(ledger),
        )
            .into_response(),
        Err(e @ StoreError::Corrupt { .. }) => {
            tracing::error!(error = %e, "refusing to serve corrupt store");
            (StatusCode::INTERNAL_SERVER_ERROR, "Usage data is corrupt").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to read usage data");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read usage data").into_response()
        }
    }
}
