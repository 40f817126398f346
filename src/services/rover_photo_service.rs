//! RoverPhotoService: sequences cache gate, fetch, directory creation and
//! batch download for one earth date.
//!
//! A date directory that already exists is always a cache hit, even if the
//! download that created it partially failed. Requests for the same date in
//! this process are serialised by a per-date lock; a directory created by
//! someone else between the check and creation is also treated as a hit.

use crate::{
    config::AppConfig,
    models::{request_key::RequestKey, summary::BatchResult},
    services::{
        photo_cache::{CacheError, PhotoCache},
        photo_downloader::PhotoDownloader,
        photo_fetcher::{FetchError, PhotoFetcher},
    },
};
use reqwest::Client;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Storage(#[from] CacheError),
    #[error("pipeline task aborted: {0}")]
    Aborted(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Terminal state of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Directory already present; nothing was fetched.
    CacheHit {
        directory: PathBuf,
        images_found: usize,
    },
    /// Upstream had no photos; the directory was still created.
    NoRecords { directory: PathBuf },
    /// Every download reached a terminal state.
    Downloaded {
        directory: PathBuf,
        result: BatchResult,
    },
    /// Downloads were launched and are still running.
    DownloadStarted {
        directory: PathBuf,
        images_found: usize,
    },
}

type KeyLocks = Arc<Mutex<HashMap<RequestKey, Arc<Mutex<()>>>>>;

#[derive(Clone)]
pub struct RoverPhotoService {
    pub cache: PhotoCache,
    fetcher: PhotoFetcher,
    downloader: PhotoDownloader,
    background_downloads: bool,
    key_locks: KeyLocks,
}

impl RoverPhotoService {
    pub fn new(
        cache: PhotoCache,
        fetcher: PhotoFetcher,
        downloader: PhotoDownloader,
        background_downloads: bool,
    ) -> Self {
        Self {
            cache,
            fetcher,
            downloader,
            background_downloads,
            key_locks: Arc::default(),
        }
    }

    /// Wire every collaborator from the start-up configuration, sharing one
    /// HTTP client between fetcher and downloader.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self::new(
            PhotoCache::new(&cfg.storage_dir),
            PhotoFetcher::new(
                client.clone(),
                &cfg.api_base_url,
                &cfg.api_key,
                cfg.rovers.clone(),
            ),
            PhotoDownloader::new(client),
            cfg.background_downloads,
        ))
    }

    /// Run the pipeline for `key` from cache check to terminal outcome.
    ///
    /// A fetch failure returns before any directory is created. Once past
    /// the cache check the work runs in its own task, so a caller that goes
    /// away does not leave a half-filled directory behind.
    pub async fn get_rover_photos(&self, key: RequestKey) -> PipelineResult<PipelineOutcome> {
        if self.cache.exists(&key).await? {
            return self.cache_hit(&key).await;
        }

        let service = self.clone();
        tokio::spawn(async move { service.run_locked(key).await })
            .await
            .unwrap_or_else(|err| Err(PipelineError::Aborted(err.to_string())))
    }

    async fn run_locked(&self, key: RequestKey) -> PipelineResult<PipelineOutcome> {
        let lock = {
            let mut locks = self.key_locks.lock().await;
            locks.entry(key).or_default().clone()
        };
        let outcome = {
            let _guard = lock.lock().await;
            self.fetch_and_store(&key).await
        };

        let mut locks = self.key_locks.lock().await;
        // Only the map and this request still hold the lock: nobody is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&key);
        }
        outcome
    }

    async fn fetch_and_store(&self, key: &RequestKey) -> PipelineResult<PipelineOutcome> {
        // A request holding the lock before us may have filled the entry.
        if self.cache.exists(key).await? {
            return self.cache_hit(key).await;
        }

        let batch = self.fetcher.fetch(key).await?;

        let directory = match self.cache.ensure_created(key).await {
            Ok(directory) => directory,
            Err(CacheError::AlreadyExists(path)) => {
                info!(date = %key, directory = %path.display(), "directory created concurrently, treating as cached");
                return self.cache_hit(key).await;
            }
            Err(err) => return Err(err.into()),
        };

        if batch.is_empty() {
            info!(date = %key, "no photos for date");
            return Ok(PipelineOutcome::NoRecords { directory });
        }

        if self.background_downloads {
            let images_found = batch.len();
            let downloader = self.downloader.clone();
            let target = directory.clone();
            tokio::spawn(async move { downloader.download(batch, &target).await });
            info!(date = %key, images_found, "downloads started in background");
            return Ok(PipelineOutcome::DownloadStarted {
                directory,
                images_found,
            });
        }

        let result = self.downloader.download(batch, &directory).await;
        Ok(PipelineOutcome::Downloaded { directory, result })
    }

    async fn cache_hit(&self, key: &RequestKey) -> PipelineResult<PipelineOutcome> {
        let images_found = self.cache.list_count(key).await?;
        info!(date = %key, images_found, "serving date from existing directory");
        Ok(PipelineOutcome::CacheHit {
            directory: self.cache.directory(key),
            images_found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rover::Rover;

    use axum::{Json, Router, extract::State, routing::get};
    use serde_json::{Value, json};

    fn service_against(
        root: &std::path::Path,
        base_url: &str,
        rovers: Vec<Rover>,
    ) -> RoverPhotoService {
        let client = Client::new();
        RoverPhotoService::new(
            PhotoCache::new(root),
            PhotoFetcher::new(client.clone(), base_url, "DEMO_KEY", rovers),
            PhotoDownloader::new(client),
            false,
        )
    }

    fn offline_service(root: &std::path::Path) -> RoverPhotoService {
        service_against(root, "http://127.0.0.1:9/rovers", Rover::ALL.to_vec())
    }

    /// Answer the photo listing only after creating the date directory,
    /// as another process racing on the same storage root would.
    async fn racing_listing(State(dir): State<PathBuf>) -> Json<Value> {
        tokio::fs::create_dir_all(&dir).await.unwrap();
        Json(json!({ "photos": [{ "img_src": "http://127.0.0.1:9/a.jpg" }] }))
    }

    #[tokio::test]
    async fn existing_directory_short_circuits_without_fetching() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("2020-07-01");
        tokio::fs::create_dir(&dir).await.unwrap();
        tokio::fs::write(dir.join("a.jpg"), b"a").await.unwrap();

        // The upstream is unreachable, so anything but a cache hit would fail.
        let service = offline_service(tmp.path());
        let key = RequestKey::parse("2020-07-01").unwrap();
        let outcome = service.get_rover_photos(key).await.unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::CacheHit {
                directory: dir,
                images_found: 1
            }
        );
    }

    #[tokio::test]
    async fn fetch_failure_creates_no_directory_and_releases_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let service = offline_service(tmp.path());
        let key = RequestKey::parse("2020-07-02").unwrap();

        let err = service.get_rover_photos(key).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(_)));
        assert!(!service.cache.exists(&key).await.unwrap());
        assert!(service.key_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn directory_created_during_fetch_is_a_cache_hit() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("2020-07-03");
        let upstream = Router::new()
            .route("/rovers/{rover}/photos", get(racing_listing))
            .with_state(dir.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/rovers", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.ok();
        });

        let service = service_against(tmp.path(), &base, vec![Rover::Curiosity]);
        let key = RequestKey::parse("2020-07-03").unwrap();
        let outcome = service.get_rover_photos(key).await.unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::CacheHit {
                directory: dir,
                images_found: 0
            }
        );
        assert!(service.key_locks.lock().await.is_empty());
    }
}
