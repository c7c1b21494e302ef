//! autoreview Redis - list queue backend
//!
//! Jobs are consumed with `LPOP`; the pop itself removes them, so there is no
//! acknowledgment and no redelivery.

use async_trait::async_trait;
use autoreview_core::config::RedisConfig;
use autoreview_core::queue::ListClient;
use autoreview_core::{Error, Result};
use redis::{AsyncCommands, ConnectionInfo, ErrorKind, IntoConnectionInfo, RedisError};
use tracing::{debug, info};

/// List client backed by a Redis server
#[derive(Debug, Clone)]
pub struct RedisList {
    client: redis::Client,
}

impl RedisList {
    /// Create a client for `address` with optional password and database
    ///
    /// No connection is made until the first command.
    pub fn new(address: &str, password: Option<String>, db: i64) -> Result<Self> {
        let info = connection_info(address, password, db)?;
        let client = redis::Client::open(info).map_err(map_redis_error)?;
        info!(address, db, "Created Redis client");
        Ok(Self { client })
    }

    /// Create a client from the redis section of the config
    pub fn from_config(config: &RedisConfig) -> Result<Self> {
        let address = config
            .address
            .as_deref()
            .ok_or_else(|| Error::Config("queue.redis.address is required".to_string()))?;
        Self::new(address, config.password.clone(), config.db)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)
    }
}

#[async_trait]
impl ListClient for RedisList {
    async fn pop(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.lpop(key, None).await.map_err(map_redis_error)?;
        debug!(key, hit = value.is_some(), "LPOP");
        Ok(value)
    }

    async fn push(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.rpush(key, value).await.map_err(map_redis_error)?;
        Ok(())
    }
}

/// Build connection info, accepting bare `host:port` addresses
fn connection_info(address: &str, password: Option<String>, db: i64) -> Result<ConnectionInfo> {
    let url = if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    };

    let mut info = url
        .as_str()
        .into_connection_info()
        .map_err(|e| Error::Config(format!("Invalid Redis address '{}': {}", address, e)))?;

    if password.is_some() {
        info.redis.password = password;
    }
    info.redis.db = db;
    Ok(info)
}

fn map_redis_error(err: RedisError) -> Error {
    match err.kind() {
        ErrorKind::InvalidClientConfig => Error::Config(format!("Redis: {}", err)),
        _ => Error::Transport(format!("Redis: {}", err)),
    }
}
