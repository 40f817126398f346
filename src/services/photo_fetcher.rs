//! Multi-rover photo fetcher.
//!
//! Issues one `photos?earth_date=` request per configured rover, all in
//! flight at once, and merges the image locations into a single batch.
//! Any rover failing fails the whole fetch; there is no partial batch.

use crate::models::{
    photo::{ImageRef, PhotoBatch, RoverPhotosPayload},
    request_key::RequestKey,
    rover::Rover,
};
use futures::future::try_join_all;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to rover `{rover}` failed: {message}")]
    Transport { rover: Rover, message: String },
    #[error("rover `{rover}` returned HTTP {status}: {body}")]
    Status {
        rover: Rover,
        status: u16,
        body: String,
    },
    #[error("rover `{rover}` reported an error: {detail}")]
    Api { rover: Rover, detail: String },
    #[error("rover `{rover}` returned an unreadable body: {message}")]
    Parse { rover: Rover, message: String },
    #[error("rover `{rover}` fetch task aborted: {message}")]
    Aborted { rover: Rover, message: String },
}

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Clone)]
pub struct PhotoFetcher {
    client: Client,
    base_url: String,
    api_key: String,
    rovers: Vec<Rover>,
}

impl PhotoFetcher {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        rovers: Vec<Rover>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            rovers,
        }
    }

    /// Fetch and merge the photo lists of every rover for `key`.
    ///
    /// Every rover request is spawned before any is awaited. The first
    /// failure resolves the call; requests still in flight keep running
    /// and their results are dropped. Zero photos overall is an empty batch,
    /// not an error.
    pub async fn fetch(&self, key: &RequestKey) -> FetchResult<PhotoBatch> {
        let earth_date = key.to_string();

        let handles = self.rovers.iter().map(|&rover| {
            let fetcher = self.clone();
            let earth_date = earth_date.clone();
            let task = tokio::spawn(async move { fetcher.fetch_rover(rover, &earth_date).await });
            async move {
                task.await.unwrap_or_else(|err| {
                    Err(FetchError::Aborted {
                        rover,
                        message: err.to_string(),
                    })
                })
            }
        });

        let per_rover = try_join_all(handles).await.inspect_err(|err| {
            warn!(date = %earth_date, error = %err, "photo fetch failed");
        })?;

        let batch: PhotoBatch = per_rover.into_iter().flatten().collect();
        info!(date = %earth_date, images = batch.len(), "photo fetch complete");
        Ok(batch)
    }

    async fn fetch_rover(&self, rover: Rover, earth_date: &str) -> FetchResult<Vec<ImageRef>> {
        let url = format!("{}/{}/photos", self.base_url, rover);
        debug!(%rover, %url, date = earth_date, "requesting rover photos");

        let resp = self
            .client
            .get(&url)
            .query(&[("earth_date", earth_date), ("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| FetchError::Transport {
                rover,
                message: err.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|err| FetchError::Transport {
            rover,
            message: err.to_string(),
        })?;

        // Error payloads are checked before the status so the upstream's own
        // description wins over a bare status code.
        let payload = serde_json::from_str::<RoverPhotosPayload>(&body);
        if let Ok(RoverPhotosPayload {
            error: Some(detail),
            ..
        }) = &payload
        {
            return Err(FetchError::Api {
                rover,
                detail: describe_error(detail),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                rover,
                status: status.as_u16(),
                body,
            });
        }

        let payload = payload.map_err(|err| FetchError::Parse {
            rover,
            message: err.to_string(),
        })?;
        let photos = payload.photos.ok_or_else(|| FetchError::Parse {
            rover,
            message: "response has neither `photos` nor `error`".into(),
        })?;

        debug!(%rover, date = earth_date, photos = photos.len(), "rover photos received");
        Ok(photos
            .into_iter()
            .map(|photo| ImageRef::new(photo.img_src))
            .collect())
    }
}

/// Flatten an upstream error value into a readable message.
fn describe_error(detail: &serde_json::Value) -> String {
    match detail {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| detail.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_descriptions_prefer_message_text() {
        assert_eq!(describe_error(&json!("bad date")), "bad date");
        assert_eq!(
            describe_error(&json!({"code": "API_KEY_INVALID", "message": "An invalid api_key was supplied."})),
            "An invalid api_key was supplied."
        );
        assert_eq!(
            describe_error(&json!({"code": "OVER_RATE_LIMIT"})),
            r#"{"code":"OVER_RATE_LIMIT"}"#
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        let fetcher = PhotoFetcher::new(
            Client::new(),
            "http://127.0.0.1:9/rovers",
            "DEMO_KEY",
            vec![Rover::Curiosity],
        );
        let key = RequestKey::parse("2020-07-01").unwrap();
        let err = fetcher.fetch(&key).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport {
                rover: Rover::Curiosity,
                ..
            }
        ));
    }
}
