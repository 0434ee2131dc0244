use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http status {last_status} for {url} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: usize,
        last_status: u16,
    },
}

/// Retry schedule for non-success statuses. The delay is fixed, not exponential.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> usize {
        self.max_attempts.max(1)
    }
}

#[derive(Debug, Clone)]
pub struct PageFetcherConfig {
    pub base_url: String,
    pub proxy: Option<String>,
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub retry: RetryPolicy,
}

impl PageFetcherConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            proxy: None,
            timeout: Duration::from_secs(20),
            user_agent: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Anything that can hand back the markup of one numbered listing page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, page: u32) -> Result<String, FetchError>;
}

#[derive(Debug)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpPageFetcher {
    pub fn new(config: PageFetcherConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .with_context(|| format!("invalid proxy address {proxy}"))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("building reqwest client")?;
        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            retry: config.retry,
        })
    }

    /// Page 1 is the catalog root; later pages live under `page/<n>`.
    pub fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            self.base_url.clone()
        } else {
            format!("{}page/{}", self.base_url, page)
        }
    }
}

#[async_trait]
impl PageSource for HttpPageFetcher {
    async fn fetch(&self, page: u32) -> Result<String, FetchError> {
        let url = self.page_url(page);
        let span = info_span!("page_fetch", page, url = %url);

        async {
            let attempts = self.retry.attempts();
            let mut last_status = StatusCode::INTERNAL_SERVER_ERROR;

            for attempt in 1..=attempts {
                let resp = self.client.get(&url).send().await?;
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp.text().await?);
                }

                last_status = status;
                warn!(status = status.as_u16(), attempt, attempts, "page fetch returned error status");
                if attempt < attempts {
                    tokio::time::sleep(self.retry.delay).await;
                }
            }

            Err(FetchError::RetriesExhausted {
                url: url.clone(),
                attempts,
                last_status: last_status.as_u16(),
            })
        }
        .instrument(span)
        .await
    }
}
