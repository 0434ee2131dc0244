//! Core domain model for the catalog price watch pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "pricewatch-core";

/// Title used when a listing node carries no readable title.
pub const MISSING_TITLE: &str = "No title found";

/// One listing node as read off a catalog page, before its image is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCandidate {
    pub title: String,
    pub price: f64,
    pub image_url: String,
}

/// Accepted product observation.
///
/// `title` is the only identity: the price cache and the snapshot file both
/// key on it. The serde names are the snapshot file's field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename = "product_title")]
    pub title: String,
    #[serde(rename = "product_price")]
    pub price: f64,
    #[serde(rename = "path_to_image")]
    pub image_path: String,
}

impl ProductRecord {
    pub fn from_candidate(candidate: ListingCandidate, image_path: impl Into<String>) -> Self {
        Self {
            title: candidate.title,
            price: candidate.price,
            image_path: image_path.into(),
        }
    }
}

/// Per-run input, immutable for the duration of one scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSettings {
    pub pages: u32,
    #[serde(default)]
    pub proxy: Option<String>,
}

impl ScrapeSettings {
    pub fn new(pages: u32) -> Self {
        Self { pages, proxy: None }
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

/// Whether an accepted record also reached durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Persistence {
    Stored { id: i64 },
    NotStored { reason: String },
}

impl Persistence {
    pub fn is_stored(&self) -> bool {
        matches!(self, Persistence::Stored { .. })
    }
}

/// A record that passed the change filter, plus the outcome of the sink write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedRecord {
    pub record: ProductRecord,
    pub persistence: Persistence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages: u32,
    /// Records that passed the change filter in this run.
    pub scraped: usize,
    /// Subset of `scraped` that the storage sink accepted.
    pub stored: usize,
}

impl ScrapeSummary {
    pub fn message(&self) -> String {
        format!("Scraped {} products", self.scraped)
    }
}
