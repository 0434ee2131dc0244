//! Axum front door: `POST /scrape` behind a bearer token.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pricewatch_core::{ScrapeSettings, ScrapeSummary};
use pricewatch_sync::{ScrapeConfig, Scraper};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

pub const CRATE_NAME: &str = "pricewatch-web";

/// Runs one scrape for a request.
#[async_trait]
pub trait ScrapeRunner: Send + Sync {
    async fn run(&self, settings: ScrapeSettings) -> anyhow::Result<ScrapeSummary>;
}

#[async_trait]
impl ScrapeRunner for Scraper {
    async fn run(&self, settings: ScrapeSettings) -> anyhow::Result<ScrapeSummary> {
        Scraper::run(self, &settings).await
    }
}

#[derive(Clone)]
pub struct AppState {
    api_token: Arc<str>,
    runner: Arc<dyn ScrapeRunner>,
    // One run at a time per process; the snapshot file has no lock of its own.
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(api_token: impl Into<String>, runner: Arc<dyn ScrapeRunner>) -> Self {
        Self {
            api_token: Arc::from(api_token.into()),
            runner,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeRequest {
    pub pages: i64,
    #[serde(default)]
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub scraped: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: &'static str,
}

fn reject(status: StatusCode, detail: &'static str) -> Response {
    (status, Json(ErrorBody { detail })).into_response()
}

pub fn app(state: AppState) -> Router {
    // Auth runs ahead of body extraction.
    let scrape = Router::new()
        .route("/scrape", post(scrape_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));
    Router::new()
        .route("/health", get(health_handler))
        .merge(scrape)
        .with_state(state)
}

pub async fn serve(config: ScrapeConfig) -> anyhow::Result<()> {
    let api_token = config
        .api_token
        .clone()
        .context("API_TOKEN must be set to serve the scrape endpoint")?;
    let port = config.web_port;
    let scraper = Scraper::connect(config).await?;
    let state = AppState::new(api_token, Arc::new(scraper));

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    info!(port, "listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

/// Exact string comparison against the configured secret.
fn authorized(headers: &HeaderMap, api_token: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == api_token)
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !authorized(request.headers(), &state.api_token) {
        return reject(StatusCode::FORBIDDEN, "Invalid or missing token");
    }
    next.run(request).await
}

async fn scrape_handler(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Response {
    let Ok(pages) = u32::try_from(request.pages) else {
        return reject(StatusCode::UNPROCESSABLE_ENTITY, "pages must be a positive integer");
    };
    if pages == 0 {
        return reject(StatusCode::UNPROCESSABLE_ENTITY, "pages must be a positive integer");
    }

    let Ok(_guard) = state.run_lock.try_lock() else {
        return reject(StatusCode::CONFLICT, "A scrape is already running");
    };

    let settings = ScrapeSettings {
        pages,
        proxy: request.proxy,
    };
    match state.runner.run(settings).await {
        Ok(summary) => Json(ScrapeResponse {
            scraped: summary.scraped,
        })
        .into_response(),
        Err(err) => {
            error!(error = %format!("{err:#}"), "Scraping failed");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Scraping failed")
        }
    }
}
