use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("requesting image {url}: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("image url {0} has no file name")]
    NoFileName(String),
    #[error("image download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error("writing image {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Maps a remote image URL to a stored-location handle.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, url: &str) -> Result<String, ImageError>;
}

/// Last non-empty path segment of `url`, ignoring any query string.
pub fn file_name_for_url(url: &str) -> Result<String, ImageError> {
    let parsed = Url::parse(url).map_err(|_| ImageError::NoFileName(url.to_string()))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(ToString::to_string)
        .ok_or_else(|| ImageError::NoFileName(url.to_string()))
}

/// Downloads images into one flat directory, named after the URL's last segment.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    client: reqwest::Client,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            root: root.into(),
            client,
        })
    }

    async fn write_atomically(&self, path: &Path, bytes: &[u8]) -> Result<(), ImageError> {
        let io_err = |source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.root).await.map_err(io_err)?;

        let temp_path = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await.map_err(io_err)?;
        file.write_all(bytes).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_err(err));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn store(&self, url: &str) -> Result<String, ImageError> {
        let file_name = file_name_for_url(url)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ImageError::Request {
                url: url.to_string(),
                source,
            })?
            .error_for_status()?;
        let bytes = resp.bytes().await?;

        let path = self.root.join(file_name);
        self.write_atomically(&path, &bytes).await?;
        Ok(path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    async fn spawn_image_server() -> String {
        let app = Router::new()
            .route(
                "/uploads/2024/05/kettle-300x300.jpg",
                get(|| async { b"JPEGDATA".to_vec() }),
            )
            .route("/uploads/missing.jpg", get(|| async { StatusCode::NOT_FOUND }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn file_name_is_last_path_segment() {
        assert_eq!(
            file_name_for_url("https://cdn.example/wp/uploads/kettle.jpg?ver=2").unwrap(),
            "kettle.jpg"
        );
        assert_eq!(
            file_name_for_url("https://cdn.example/wp/uploads/kettle.jpg/").unwrap(),
            "kettle.jpg"
        );
        assert!(matches!(
            file_name_for_url("https://cdn.example/"),
            Err(ImageError::NoFileName(_))
        ));
        assert!(file_name_for_url("not a url").is_err());
    }

    #[tokio::test]
    async fn stores_download_under_deterministic_name() {
        let base = spawn_image_server().await;
        let dir = tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().join("images"), Duration::from_secs(5)).unwrap();

        let url = format!("{base}/uploads/2024/05/kettle-300x300.jpg");
        let first = store.store(&url).await.unwrap();
        let second = store.store(&url).await.unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with("kettle-300x300.jpg"));
        assert_eq!(std::fs::read(&first).unwrap(), b"JPEGDATA");
    }

    #[tokio::test]
    async fn error_status_is_a_download_failure() {
        let base = spawn_image_server().await;
        let dir = tempdir().unwrap();
        let store = LocalImageStore::new(dir.path(), Duration::from_secs(5)).unwrap();

        let err = store.store(&format!("{base}/uploads/missing.jpg")).await.unwrap_err();
        assert!(matches!(err, ImageError::Download(_)));
    }
}
