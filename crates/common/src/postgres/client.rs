use anyhow::Result;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use tracing::debug;

use super::PostgresConfig;

/// PostgreSQL client wrapper with connection pooling
#[derive(Clone)]
pub struct PostgresClient {
    pool: Pool,
}

impl PostgresClient {
    /// Creates a new PostgreSQL client with connection pooling
    ///
    /// # Arguments
    /// * `host` - Database host (e.g., "localhost")
    /// * `port` - Database port (e.g., 5432)
    /// * `database` - Database name
    /// * `username` - Database username
    /// * `password` - Database password
    /// * `max_pool_size` - Maximum number of connections in the pool
    pub fn new(
        host: &str,
        port: u16,
        database: &str,
        username: &str,
        password: &str,
        max_pool_size: usize,
    ) -> Result<Self> {
        let mut cfg = Config::new();
        cfg.host = Some(host.to_string());
        cfg.port = Some(port);
        cfg.dbname = Some(database.to_string());
        cfg.user = Some(username.to_string());
        cfg.password = Some(password.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(max_pool_size));

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        Ok(Self { pool })
    }

    pub fn from_config(config: &PostgresConfig) -> Result<Self> {
        Self::new(
            &config.host,
            config.port,
            &config.database,
            &config.username,
            &config.password,
            config.max_pool_size,
        )
    }

    /// Pings the database to verify connectivity
    pub async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("postgreSQL connection successful");
        Ok(())
    }

    /// Gets a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }

    /// Closes the pool; later checkouts fail and idle connections are dropped
    pub fn close(&self) {
        self.pool.close();
        debug!("postgreSQL pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_pool_refuses_checkout() {
        // Pool creation is lazy, so no server is needed here
        let client = PostgresClient::from_config(&PostgresConfig::default()).unwrap();
        let other = client.clone();
        assert!(!client.is_closed());

        client.close();

        assert!(other.is_closed());
        assert!(other.get_connection().await.is_err());
    }
}
