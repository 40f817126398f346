//! Batch downloader.
//!
//! Every image in a batch is fetched concurrently and streamed to
//! `destination/<file name>`. Failures are counted, never cancel sibling
//! downloads, and only the first one is reported.

use crate::models::{
    photo::{ImageRef, PhotoBatch},
    summary::{BatchResult, DownloadOutcome},
};
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt, pin_mut};
use reqwest::Client;
use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    task::{self, JoinError, JoinSet},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("location has no usable file name")]
    InvalidName,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type DownloadResult<T> = Result<T, DownloadError>;

#[derive(Clone)]
pub struct PhotoDownloader {
    client: Client,
}

impl PhotoDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download every image in `batch` into `destination`.
    ///
    /// Resolves once each item has either been written or failed. Items
    /// whose file names collide overwrite one another on disk.
    pub async fn download(&self, batch: PhotoBatch, destination: &Path) -> BatchResult {
        let mut result = BatchResult::new(batch.len());
        if batch.is_empty() {
            return result;
        }

        let mut downloads = JoinSet::new();
        let mut locations = HashMap::new();
        for image in batch.images {
            let downloader = self.clone();
            let destination = destination.to_path_buf();
            let location = image.location.clone();
            let handle = downloads.spawn(async move {
                match downloader.download_one(&image, &destination).await {
                    Ok((file_name, bytes)) => DownloadOutcome::Saved { file_name, bytes },
                    Err(err) => DownloadOutcome::Failed {
                        location: image.location,
                        reason: err.to_string(),
                    },
                }
            });
            locations.insert(handle.id(), location);
        }

        // Collect results as they complete
        while let Some(joined) = downloads.join_next_with_id().await {
            let outcome = joined_outcome(joined, &mut locations);
            match &outcome {
                DownloadOutcome::Saved { file_name, bytes } => {
                    debug!(file = %file_name, bytes, "image saved");
                }
                DownloadOutcome::Failed { location, reason } => {
                    warn!(url = %location, error = %reason, "image download failed");
                }
            }
            result.record(&outcome);
        }

        info!(
            directory = %destination.display(),
            found = result.found,
            downloaded = result.downloaded,
            "batch download finished"
        );
        result
    }

    async fn download_one(
        &self,
        image: &ImageRef,
        destination: &Path,
    ) -> DownloadResult<(String, u64)> {
        let file_name = image.file_name().ok_or(DownloadError::InvalidName)?;

        let resp = self
            .client
            .get(&image.location)
            .send()
            .await
            .map_err(|err| DownloadError::Transport(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        let stream = resp.bytes_stream().map_err(io::Error::other);
        let bytes = write_stream(destination.join(&file_name), stream).await?;
        Ok((file_name, bytes))
    }
}

/// Resolve a joined task into its outcome. A task that panicked or was
/// aborted is reported as a failure of the location it was downloading.
fn joined_outcome(
    joined: Result<(task::Id, DownloadOutcome), JoinError>,
    locations: &mut HashMap<task::Id, String>,
) -> DownloadOutcome {
    match joined {
        Ok((id, outcome)) => {
            locations.remove(&id);
            outcome
        }
        Err(err) => DownloadOutcome::Failed {
            location: locations
                .remove(&err.id())
                .unwrap_or_else(|| "<unknown>".into()),
            reason: format!("download task aborted: {}", err),
        },
    }
}

/// Stream bytes to `file_path` through a hidden temp file in the same
/// directory, renaming into place only once everything is flushed.
///
/// The temp file is removed on any error, so a failed download leaves
/// nothing behind.
async fn write_stream<S>(file_path: PathBuf, stream: S) -> io::Result<u64>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let parent = file_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| io::Error::other("file path missing parent directory"))?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
    let mut file = File::create(&tmp_path).await?;

    let mut size_bytes: u64 = 0;
    pin_mut!(stream);
    while let Some(chunk_res) = stream.next().await {
        let chunk = match chunk_res {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };
        size_bytes += chunk.len() as u64;
        if let Err(err) = file.write_all(&chunk).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
    }
    if let Err(err) = file.flush().await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    if let Err(err) = file.sync_all().await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err);
    }
    drop(file);

    if let Err(err) = fs::rename(&tmp_path, &file_path).await {
        if err.kind() == ErrorKind::AlreadyExists {
            replace_existing(&tmp_path, &file_path).await?;
        } else {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
    }

    Ok(size_bytes)
}

/// Swap `tmp_path` in for an existing `file_path` on platforms where rename
/// refuses to overwrite. The temp file is removed if either step fails.
async fn replace_existing(tmp_path: &Path, file_path: &Path) -> io::Result<()> {
    let replaced = match fs::remove_file(file_path).await {
        Ok(()) => fs::rename(tmp_path, file_path).await,
        Err(err) => Err(err),
    };
    if let Err(err) = replaced {
        let _ = fs::remove_file(tmp_path).await;
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_batch_returns_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let downloader = PhotoDownloader::new(Client::new());
        let result = downloader
            .download(PhotoBatch::default(), tmp.path())
            .await;
        assert_eq!(result, BatchResult::default());
    }

    #[tokio::test]
    async fn unnamed_locations_fail_without_network() {
        let tmp = tempfile::tempdir().unwrap();
        let downloader = PhotoDownloader::new(Client::new());
        let batch: PhotoBatch = vec![ImageRef::new("http://127.0.0.1:9/")]
            .into_iter()
            .collect();

        let result = downloader.download(batch, tmp.path()).await;
        assert_eq!(result.found, 1);
        assert_eq!(result.downloaded, 0);
        assert_eq!(
            result.first_error.as_deref(),
            Some("http://127.0.0.1:9/: location has no usable file name")
        );
    }

    #[tokio::test]
    async fn write_stream_persists_all_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("photo.jpg");
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
        ]);

        let written = write_stream(target.clone(), chunks).await.unwrap();
        assert_eq!(written, 6);
        assert_eq!(fs::read(&target).await.unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn write_stream_failure_leaves_no_files() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("photo.jpg");
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(io::Error::other("connection reset")),
        ]);

        let err = write_stream(target.clone(), chunks).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
        let mut entries = fs::read_dir(tmp.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_replacement_removes_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let tmp_path = tmp.path().join(".tmp-pending");
        fs::write(&tmp_path, b"new").await.unwrap();
        // A non-empty directory cannot be removed as a file.
        let target = tmp.path().join("taken.jpg");
        fs::create_dir(&target).await.unwrap();
        fs::write(target.join("inner"), b"x").await.unwrap();

        assert!(replace_existing(&tmp_path, &target).await.is_err());
        assert!(!fs::try_exists(&tmp_path).await.unwrap());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn panicked_task_is_reported_with_its_location() {
        let mut tasks: JoinSet<DownloadOutcome> = JoinSet::new();
        let mut locations = HashMap::new();
        let handle = tasks.spawn(async { panic!("decoder crashed") });
        locations.insert(handle.id(), "http://x/a.jpg".to_string());

        let joined = tasks.join_next_with_id().await.unwrap();
        let outcome = joined_outcome(joined, &mut locations);

        match outcome {
            DownloadOutcome::Failed { location, reason } => {
                assert_eq!(location, "http://x/a.jpg");
                assert!(reason.starts_with("download task aborted"), "{reason}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(locations.is_empty());
    }

    #[tokio::test]
    async fn write_stream_overwrites_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("dup.jpg");
        fs::write(&target, b"old").await.unwrap();

        let chunks = futures::stream::iter(vec![Ok(Bytes::from_static(b"new"))]);
        write_stream(target.clone(), chunks).await.unwrap();
        assert_eq!(fs::read(&target).await.unwrap(), b"new");
    }
}
