use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("{0}")]
    Message(String),
}

/// Key-value backend holding the last accepted price per product title.
///
/// Keys are raw titles with no namespace.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn get_price(&self, title: &str) -> Result<Option<f64>, CacheError>;
    async fn set_price(&self, title: &str, price: f64) -> Result<(), CacheError>;
}

/// Redis-backed store. The connection is opened on first use, so an
/// unreachable server surfaces as a per-call [`CacheError`].
pub struct RedisPriceStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisPriceStore {
    pub fn open(redis_url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl PriceStore for RedisPriceStore {
    async fn get_price(&self, title: &str) -> Result<Option<f64>, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.get(title).await?)
    }

    async fn set_price(&self, title: &str, price: f64) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let () = conn.set(title, price).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPriceStore {
    prices: Mutex<HashMap<String, f64>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn prices(&self) -> HashMap<String, f64> {
        self.prices.lock().await.clone()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn get_price(&self, title: &str) -> Result<Option<f64>, CacheError> {
        Ok(self.prices.lock().await.get(title).copied())
    }

    async fn set_price(&self, title: &str, price: f64) -> Result<(), CacheError> {
        self.prices.lock().await.insert(title.to_string(), price);
        Ok(())
    }
}

/// Change detector over a [`PriceStore`].
///
/// Store failures fail open: the record is reported as changed so a real
/// update is never dropped, at the cost of re-persisting an unchanged one.
#[derive(Clone)]
pub struct PriceCache {
    store: Arc<dyn PriceStore>,
}

impl PriceCache {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self { store }
    }

    /// True only when `title` is cached at exactly `price`. Otherwise the
    /// cache is set to `price` and false is returned.
    pub async fn is_unchanged(&self, title: &str, price: f64) -> bool {
        match self.check_and_record(title, price).await {
            Ok(unchanged) => unchanged,
            Err(err) => {
                warn!(title, price, error = %err, "price cache unavailable; treating record as changed");
                false
            }
        }
    }

    async fn check_and_record(&self, title: &str, price: f64) -> Result<bool, CacheError> {
        if self.store.get_price(title).await? == Some(price) {
            return Ok(true);
        }
        self.store.set_price(title, price).await?;
        Ok(false)
    }
}
