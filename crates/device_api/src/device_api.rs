use crate::domain::DeviceService;
use crate::http::device_router;
use axum::Router;
use common::http::{run_http_server, HttpServerConfig};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct DeviceApi {
    service: Arc<DeviceService>,
    config: HttpServerConfig,
}

impl DeviceApi {
    pub fn new(service: Arc<DeviceService>, config: HttpServerConfig) -> Self {
        debug!("Initializing device API module");
        Self { service, config }
    }

    pub fn router(&self) -> Router {
        device_router(self.service.clone())
    }

    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let router = self.router();
        run_http_server(self.config, router, ctx).await
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
    {
        move |ctx| Box::pin(self.run(ctx))
    }
}
