//! Directory cache gate.
//!
//! One directory per earth date lives directly under `base_path`. The mere
//! existence of that directory means the date was already processed: there
//! is no staleness check and no detection of a previously partial download.

use crate::models::request_key::RequestKey;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Another request (or process) created the directory first.
    #[error("directory `{0}` already exists")]
    AlreadyExists(PathBuf),
    #[error("storage error for `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Clone, Debug)]
pub struct PhotoCache {
    /// Root under which date directories are created.
    pub base_path: PathBuf,
}

impl PhotoCache {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory holding the photos for `key`. Does not check existence.
    pub fn directory(&self, key: &RequestKey) -> PathBuf {
        self.base_path.join(key.to_string())
    }

    pub async fn exists(&self, key: &RequestKey) -> CacheResult<bool> {
        let path = self.directory(key);
        fs::try_exists(&path)
            .await
            .map_err(|source| CacheError::Io { path, source })
    }

    /// Create the directory for `key`.
    ///
    /// Fails with [`CacheError::AlreadyExists`] if it is already present, so
    /// call it only after [`PhotoCache::exists`] reported absence.
    pub async fn ensure_created(&self, key: &RequestKey) -> CacheResult<PathBuf> {
        let path = self.directory(key);
        if let Err(err) = fs::create_dir_all(&self.base_path).await {
            return Err(CacheError::Io {
                path: self.base_path.clone(),
                source: err,
            });
        }
        match fs::create_dir(&path).await {
            Ok(()) => {
                debug!("created photo directory {}", path.display());
                Ok(path)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(CacheError::AlreadyExists(path))
            }
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Number of visible entries stored for `key`.
    ///
    /// Hidden entries (in-flight temp files) are not counted.
    pub async fn list_count(&self, key: &RequestKey) -> CacheResult<usize> {
        let path = self.directory(key);
        let io_err = |source: io::Error| CacheError::Io {
            path: path.clone(),
            source,
        };
        let mut entries = fs::read_dir(&path).await.map_err(io_err)?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            if !entry.file_name().to_string_lossy().starts_with('.') {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> RequestKey {
        RequestKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn directory_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = PhotoCache::new(tmp.path());
        let date = key("2020-07-01");

        assert!(!cache.exists(&date).await.unwrap());
        let created = cache.ensure_created(&date).await.unwrap();
        assert_eq!(created, tmp.path().join("2020-07-01"));
        assert!(cache.exists(&date).await.unwrap());
        assert_eq!(cache.list_count(&date).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn second_creation_is_a_distinct_collision() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = PhotoCache::new(tmp.path());
        let date = key("2019-03-04");

        cache.ensure_created(&date).await.unwrap();
        let err = cache.ensure_created(&date).await.unwrap_err();
        assert!(matches!(err, CacheError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn list_count_skips_hidden_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = PhotoCache::new(tmp.path());
        let date = key("2015-06-03");
        let dir = cache.ensure_created(&date).await.unwrap();

        fs::write(dir.join("a.jpg"), b"a").await.unwrap();
        fs::write(dir.join("b.jpg"), b"b").await.unwrap();
        fs::write(dir.join(".tmp-partial"), b"").await.unwrap();

        assert_eq!(cache.list_count(&date).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_base_path_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = PhotoCache::new(tmp.path().join("nested/photos"));
        let date = key("2012-08-06");

        cache.ensure_created(&date).await.unwrap();
        assert!(cache.exists(&date).await.unwrap());
    }
}
