//! HTTP trigger for the sync pipeline.
//!
//! `POST /api/generate` runs one full sync per request. Handlers share only
//! the immutable configuration; each run gets its own access token.
use crate::config::Config;
use crate::pipeline;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

async fn generate(State(cfg): State<Arc<Config>>) -> Json<GenerateResponse> {
    info!("generate requested");
    match pipeline::run_once(&cfg).await {
        Ok(outcome) => Json(GenerateResponse {
            success: true,
            message: outcome.message(),
            count: Some(outcome.appended),
        }),
        Err(e) => {
            warn!("generate failed: {:#}", e);
            Json(GenerateResponse {
                success: false,
                message: format!("{:#}", e),
                count: None,
            })
        }
    }
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn router(cfg: Arc<Config>) -> Router {
    Router::new()
        .route("/api/generate", post(generate).options(preflight))
        .route("/health", get(health))
        .with_state(cfg)
        .layer(cors())
}

/// Bind `0.0.0.0:PORT` and serve until ctrl-c.
pub async fn serve(cfg: Config) -> Result<()> {
    cfg.credentials()?;
    let port = cfg.port()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(cfg));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
