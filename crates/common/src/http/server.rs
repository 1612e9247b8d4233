//! Reusable axum server with CORS and request logging.
//!
//! # Example
//!
//! ```ignore
//! use common::http::{run_http_server, CorsConfig, HttpServerConfig};
//!
//! let config = HttpServerConfig {
//!     port: 8080,
//!     cors_config: CorsConfig::allow_all(),
//!     ..Default::default()
//! };
//!
//! run_http_server(config, router, cancellation_token).await?;
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use http::{header, Method};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info};

use super::{HttpLoggingConfig, HttpLoggingLayer};

/// CORS configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins. Use `vec!["*".to_string()]` to allow all origins.
    pub allowed_origins: Vec<String>,
    /// Max age for CORS preflight cache in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse comma-separated origins string; an empty list allows all origins.
    pub fn from_comma_separated(origins: &str) -> Self {
        let allowed_origins: Vec<String> = origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            allowed_origins: if allowed_origins.is_empty() {
                vec!["*".to_string()]
            } else {
                allowed_origins
            },
            ..Self::default()
        }
    }
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub logging_config: HttpLoggingConfig,
    pub cors_config: CorsConfig,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            logging_config: HttpLoggingConfig::default(),
            cors_config: CorsConfig::default(),
        }
    }
}

/// Build a CORS layer from configuration.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.len() == 1 && config.allowed_origins[0] == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(Duration::from_secs(config.max_age_secs))
}

/// Serve `router` until the cancellation token fires.
///
/// Applies the logging layer and the CORS layer around every route, then
/// drains in-flight requests on shutdown.
pub async fn run_http_server(
    config: HttpServerConfig,
    router: Router,
    cancellation_token: CancellationToken,
) -> Result<(), anyhow::Error> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid server address {}:{}", config.host, config.port))?;

    let app = router
        .layer(HttpLoggingLayer::new(config.logging_config.clone()))
        .layer(build_cors_layer(&config.cors_config));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(address = %addr, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancellation_token.cancelled().await;
            debug!("HTTP server shutdown signal received");
        })
        .await
        .map_err(|e| {
            tracing::error!("HTTP server error: {}", e);
            anyhow::Error::from(e)
        })?;

    debug!("HTTP server stopped gracefully");
    Ok(())
}
