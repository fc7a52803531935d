pub mod dashboard;
pub mod dispatch;
pub mod request;

#[cfg(test)]
mod tests;

use axum::{routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::registry::CapabilityRegistry;

/// Stamped on every response envelope.
pub const CREATOR: &str = "Kuroxel";

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    creator: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            creator: CREATOR,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            creator: CREATOR,
            data: None,
            error: Some(message),
        }
    }
}

/// Fixed routes plus one route per registered capability.
pub fn build_router(registry: Arc<CapabilityRegistry>, max_body_size: usize) -> Router {
    let mut router = Router::new()
        .route("/", get(dashboard::index))
        .route("/api", get(dashboard::api_info));

    for route in registry.routes() {
        router = router.route(
            &route.descriptor.route,
            dispatch::bind(route.capability.clone(), route.descriptor.method, max_body_size),
        );
    }

    router
        .with_state(registry)
        .layer(CatchPanicLayer::custom(dispatch::panic_response))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

pub async fn start_api_server(registry: Arc<CapabilityRegistry>, config: Arc<Config>) -> Result<()> {
    let app = build_router(registry.clone(), config.server.max_body_size);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ScrapeError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Carlotta API running on http://{}", listener.local_addr()?);
    info!("Total endpoints loaded: {}", registry.len());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
