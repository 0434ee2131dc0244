use async_trait::async_trait;
use pricewatch_core::ProductRecord;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Message(String),
}

/// Durable store for accepted records. Returns the surrogate id it assigned.
#[async_trait]
pub trait ProductSink: Send + Sync {
    async fn insert(&self, record: &ProductRecord) -> Result<i64, SinkError>;
}

#[derive(Debug, Clone)]
pub struct PgProductSink {
    pool: PgPool,
}

impl PgProductSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connections are established on first insert; only the URL is checked here.
    pub fn connect_lazy(database_url: &str) -> Result<Self, SinkError> {
        let pool = PgPool::connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProductSink for PgProductSink {
    async fn insert(&self, record: &ProductRecord) -> Result<i64, SinkError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (title, price, image_path)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&record.title)
        .bind(record.price)
        .bind(&record.image_path)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

/// Applies the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct MemoryProductSink {
    rows: Mutex<Vec<(i64, ProductRecord)>>,
}

impl MemoryProductSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<(i64, ProductRecord)> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl ProductSink for MemoryProductSink {
    async fn insert(&self, record: &ProductRecord) -> Result<i64, SinkError> {
        let mut rows = self.rows.lock().await;
        let id = rows.len() as i64 + 1;
        rows.push((id, record.clone()));
        Ok(id)
    }
}
