/// Redis-backed cache store
///
/// The connection is established lazily on first use and released
/// explicitly on shutdown.
use crate::{
    cache::CacheStore,
    error::{ValidatorError, ValidatorResult},
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::{
    fmt::Display,
    future::Future,
    sync::Mutex,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Pause between connection attempts after a failure
const CONNECT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Shared connection handle, established on first use.
///
/// The connect itself runs outside any lock: a stalled attempt holds up
/// only the request that made it. After a failed attempt, callers fail fast
/// until `retry_backoff` has passed.
pub(crate) struct LazyConnection<C> {
    slot: RwLock<Option<C>>,
    last_failure: Mutex<Option<Instant>>,
    connect_timeout: Duration,
    retry_backoff: Duration,
}

impl<C: Clone> LazyConnection<C> {
    pub(crate) fn new(connect_timeout: Duration, retry_backoff: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            last_failure: Mutex::new(None),
            connect_timeout,
            retry_backoff,
        }
    }

    pub(crate) async fn get_or_connect<F, Fut, E>(&self, connect: F) -> ValidatorResult<C>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, E>>,
        E: Display,
    {
        if let Some(conn) = self.slot.read().await.as_ref() {
            return Ok(conn.clone());
        }

        if self.in_backoff() {
            return Err(ValidatorError::Cache(
                "Redis unavailable, waiting before reconnecting".to_string(),
            ));
        }

        info!("Redis client initiated connection to the server");

        let conn = match tokio::time::timeout(self.connect_timeout, connect()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                self.record_failure();
                error!("Failed to connect to Redis: {}", e);
                return Err(ValidatorError::Cache(format!("Redis connection failed: {}", e)));
            }
            Err(_) => {
                self.record_failure();
                error!("Redis connection timed out after {:?}", self.connect_timeout);
                return Err(ValidatorError::Cache("Redis connection timed out".to_string()));
            }
        };

        let mut slot = self.slot.write().await;
        // A concurrent attempt may have published first
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }

        info!("Redis client connected");
        *slot = Some(conn.clone());
        if let Ok(mut last_failure) = self.last_failure.lock() {
            *last_failure = None;
        }
        Ok(conn)
    }

    pub(crate) async fn take(&self) -> Option<C> {
        self.slot.write().await.take()
    }

    fn in_backoff(&self) -> bool {
        self.last_failure
            .lock()
            .ok()
            .and_then(|last_failure| *last_failure)
            .map(|at| at.elapsed() < self.retry_backoff)
            .unwrap_or(false)
    }

    fn record_failure(&self) {
        if let Ok(mut last_failure) = self.last_failure.lock() {
            *last_failure = Some(Instant::now());
        }
    }
}

pub struct RedisStore {
    client: Client,
    connection: LazyConnection<ConnectionManager>,
}

impl RedisStore {
    /// Create a store; no connection is opened yet
    pub fn new(redis_url: &str, connect_timeout_secs: u64) -> ValidatorResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            ValidatorError::Cache(format!("Redis client creation failed: {}", e))
        })?;

        Ok(Self {
            client,
            connection: LazyConnection::new(
                Duration::from_secs(connect_timeout_secs),
                CONNECT_RETRY_BACKOFF,
            ),
        })
    }

    async fn connection(&self) -> ValidatorResult<ConnectionManager> {
        self.connection
            .get_or_connect(|| ConnectionManager::new(self.client.clone()))
            .await
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> ValidatorResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", key, e);
            ValidatorError::Cache(format!("Cache get failed: {}", e))
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> ValidatorResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| {
                warn!("Redis SET failed for {}: {}", key, e);
                ValidatorError::Cache(format!("Cache set failed: {}", e))
            })
    }

    async fn close(&self) {
        if self.connection.take().await.is_some() {
            warn!("Redis client disconnected");
        }
    }
}
