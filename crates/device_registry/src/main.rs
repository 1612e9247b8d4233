mod config;
mod runner;

use crate::config::{ServiceConfig, StorageBackend};
use crate::runner::Runner;
use common::domain::DeviceRepository;
use common::http::{CorsConfig, HttpLoggingConfig, HttpServerConfig};
use common::memory::InMemoryDeviceRepository;
use common::postgres::{PostgresClient, PostgresConfig, PostgresDeviceRepository};
use common::telemetry::{init_telemetry, TelemetryConfig};
use device_api::{DeviceApi, DeviceService, PaginationConfig};
use goose::MigrationRunner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: "device-registry".to_string(),
        log_level: config.log_level.clone(),
        log_format: config.log_format,
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        storage_backend = ?config.storage_backend,
        http_port = config.http_port,
        "Starting device-registry service"
    );
    debug!("Configuration: {:?}", config);

    let storage = match initialize_storage(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            error!("Failed to initialize device storage: {:#}", e);
            std::process::exit(1);
        }
    };

    let device_service = Arc::new(DeviceService::new(
        storage.repository,
        PaginationConfig {
            default_size: config.default_page_size,
            max_size: config.max_page_size,
        },
    ));

    let http_config = HttpServerConfig {
        host: config.http_host.clone(),
        port: config.http_port,
        logging_config: HttpLoggingConfig::from_comma_separated(&config.http_ignored_paths),
        cors_config: CorsConfig::from_comma_separated(&config.http_cors_allowed_origins),
    };

    let device_api = DeviceApi::new(device_service, http_config);

    let mut runner = Runner::new()
        .with_named_process("device_api", device_api.into_runner_process())
        .with_closer_timeout(Duration::from_secs(config.shutdown_timeout_secs));

    if let Some(client) = storage.postgres {
        runner = runner.with_closer(move || async move {
            info!("Closing PostgreSQL pool");
            client.close();
            Ok(())
        });
    }

    match runner.run().await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("Application exiting with error: {:#}", e);
            std::process::exit(1);
        }
    }
}

struct Storage {
    repository: Arc<dyn DeviceRepository>,
    /// Pool handle kept for shutdown; `None` for the in-memory store
    postgres: Option<PostgresClient>,
}

async fn initialize_storage(config: &ServiceConfig) -> anyhow::Result<Storage> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using in-memory device storage");
            Ok(Storage {
                repository: Arc::new(InMemoryDeviceRepository::new()),
                postgres: None,
            })
        }
        StorageBackend::Postgres => {
            info!("Initializing PostgreSQL...");
            let postgres = config.postgres();
            if config.run_migrations {
                run_postgres_migrations(&postgres).await?;
            }
            let client = PostgresClient::from_config(&postgres)?;
            client.ping().await?;
            Ok(Storage {
                repository: Arc::new(PostgresDeviceRepository::new(client.clone())),
                postgres: Some(client),
            })
        }
    }
}

async fn run_postgres_migrations(config: &PostgresConfig) -> anyhow::Result<()> {
    let runner = MigrationRunner::new(
        config.goose_binary_path.clone(),
        config.migrations_dir.clone(),
        "postgres".to_string(),
        config.dsn(),
    );
    runner.run_migrations().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_has_no_pool_to_close() {
        let config: ServiceConfig = ::config::Config::builder()
            .set_override("storage_backend", "memory")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let storage = initialize_storage(&config).await.unwrap();

        assert!(storage.postgres.is_none());
        assert!(storage.repository.ping().await.is_ok());
    }
}
