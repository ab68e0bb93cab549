//! Reference backend for the lead API.
//!
//! ```text
//! ┌──────────┐   HTTP    ┌───────────────────────────────────────────┐
//! │  Board   │ ────────> │  mod.rs  (build_router, ServerConfig)     │
//! │ (client) │ <──────── │    └─ api.rs  (handlers, AppState)        │
//! └──────────┘ WebSocket │         │                                 │
//!                        │         v                                 │
//!                        │  store::sqlite  (LeadDb via DbHandle)     │
//!                        │    └─ ws.rs  (WsMessage broadcast)        │
//!                        └───────────────────────────────────────────┘
//! ```

pub mod api;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use crate::session::DEFAULT_COMPANY;
use crate::store::sqlite::{DbHandle, LeadDb};
use api::AppState;

pub const DEFAULT_PORT: u16 = 3141;

/// Configuration for the lead server.
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    /// Company whose stage registry is seeded on startup when empty.
    pub seed_company: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: PathBuf::from(".leadboard/leads.db"),
            dev_mode: false,
            seed_company: DEFAULT_COMPANY.to_string(),
        }
    }
}

/// Build the full application router: lead API plus WebSocket.
pub fn build_router(state: Arc<AppState>) -> Router {
    let ws_tx = state.ws_tx.clone();

    api::api_router()
        .route(
            "/ws",
            get(move |ws_upgrade| ws::ws_handler_with_sender(ws_upgrade, ws_tx)),
        )
        .with_state(state)
}

/// Start the lead server and run until Ctrl+C.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = LeadDb::new(&config.db_path).context("Failed to initialize lead database")?;
    if db.list_stages(&config.seed_company)?.is_empty() {
        db.seed_default_stages(&config.seed_company)?;
    }
    let (ws_tx, _rx) = broadcast::channel::<String>(256);
    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        ws_tx,
    });

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, db = %config.db_path.display(), "Lead server listening");
    println!("Leadboard server running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let db = LeadDb::new_in_memory().unwrap();
        db.seed_default_stages(DEFAULT_COMPANY).unwrap();
        let (ws_tx, _) = broadcast::channel(16);
        build_router(Arc::new(AppState {
            db: DbHandle::new(db),
            ws_tx,
        }))
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_mounted() {
        let req = Request::builder()
            .uri("/api/stages")
            .body(Body::empty())
            .unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let stages: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stages[0]["name"], "New");
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let resp = test_router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3141);
        assert_eq!(config.db_path, PathBuf::from(".leadboard/leads.db"));
        assert_eq!(config.seed_company, "default");
        assert!(!config.dev_mode);
    }
}
