//! Fetch, cache, and persistence backends for the price watch pipeline.

mod cache;
mod fetch;
mod images;
mod sink;
mod snapshot;

pub use cache::{CacheError, MemoryPriceStore, PriceCache, PriceStore, RedisPriceStore};
pub use fetch::{FetchError, HttpPageFetcher, PageFetcherConfig, PageSource, RetryPolicy};
pub use images::{file_name_for_url, ImageError, ImageStore, LocalImageStore};
pub use sink::{run_migrations, MemoryProductSink, PgProductSink, ProductSink, SinkError};
pub use snapshot::{SnapshotError, SnapshotWriter};

pub const CRATE_NAME: &str = "pricewatch-storage";
