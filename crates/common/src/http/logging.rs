use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{error, info, warn, Instrument, Span};

/// Configuration for HTTP request logging
#[derive(Clone, Debug)]
pub struct HttpLoggingConfig {
    /// List of path prefixes to ignore (e.g., "/health")
    pub ignored_paths: Vec<String>,
}

impl Default for HttpLoggingConfig {
    fn default() -> Self {
        Self {
            ignored_paths: vec!["/health".to_string()],
        }
    }
}

impl HttpLoggingConfig {
    pub fn new(ignored_paths: Vec<String>) -> Self {
        Self { ignored_paths }
    }

    /// Parse comma-separated path prefixes
    pub fn from_comma_separated(paths: &str) -> Self {
        Self::new(
            paths
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    fn should_ignore(&self, path: &str) -> bool {
        self.ignored_paths
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }
}

/// Tower layer for logging HTTP requests
#[derive(Clone)]
pub struct HttpLoggingLayer {
    config: HttpLoggingConfig,
}

impl HttpLoggingLayer {
    pub fn new(config: HttpLoggingConfig) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for HttpLoggingLayer {
    type Service = HttpLoggingService<S>;

    fn layer(&self, service: S) -> Self::Service {
        HttpLoggingService {
            inner: service,
            config: self.config.clone(),
        }
    }
}

/// Service that logs method, path, status and latency of each request
#[derive(Clone)]
pub struct HttpLoggingService<S> {
    inner: S,
    config: HttpLoggingConfig,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for HttpLoggingService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let should_ignore = self.config.should_ignore(&path);
        let start = Instant::now();
        let future = self.inner.call(req);

        let span = Span::current();

        Box::pin(
            async move {
                let result = future.await;

                if !should_ignore {
                    let duration_ms = start.elapsed().as_millis();

                    match &result {
                        Ok(response) => {
                            let status = response.status();
                            if status.is_server_error() {
                                error!(
                                    method = %method,
                                    path = %path,
                                    http_status = status.as_u16(),
                                    duration_ms = %duration_ms,
                                    "{} {} - {} - {}ms",
                                    method,
                                    path,
                                    status.as_u16(),
                                    duration_ms
                                );
                            } else if status.is_client_error() {
                                warn!(
                                    method = %method,
                                    path = %path,
                                    http_status = status.as_u16(),
                                    duration_ms = %duration_ms,
                                    "{} {} - {} - {}ms",
                                    method,
                                    path,
                                    status.as_u16(),
                                    duration_ms
                                );
                            } else {
                                info!(
                                    method = %method,
                                    path = %path,
                                    http_status = status.as_u16(),
                                    duration_ms = %duration_ms,
                                    "{} {} - {} - {}ms",
                                    method,
                                    path,
                                    status.as_u16(),
                                    duration_ms
                                );
                            }
                        }
                        Err(e) => {
                            error!(
                                method = %method,
                                path = %path,
                                duration_ms = %duration_ms,
                                error = %e,
                                "{} {} - {}ms - ERROR: {}",
                                method,
                                path,
                                duration_ms,
                                e
                            );
                        }
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tower::ServiceExt;

    #[test]
    fn test_ignored_paths_match_prefix() {
        let config = HttpLoggingConfig::from_comma_separated("/health, /metrics");
        assert!(config.should_ignore("/health"));
        assert!(config.should_ignore("/metrics/prometheus"));
        assert!(!config.should_ignore("/api/v1/devices"));
    }

    #[tokio::test]
    async fn test_layer_passes_response_through() {
        let inner = tower::service_fn(|_req: http::Request<()>| async {
            Ok::<_, Infallible>(
                http::Response::builder()
                    .status(http::StatusCode::NO_CONTENT)
                    .body(())
                    .unwrap(),
            )
        });
        let service = HttpLoggingLayer::new(HttpLoggingConfig::default()).layer(inner);

        let response = service
            .oneshot(
                http::Request::builder()
                    .uri("/api/v1/devices")
                    .body(())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), http::StatusCode::NO_CONTENT);
    }
}
