//! Download outcomes and the JSON summary returned to callers.

use serde::Serialize;

/// Terminal state of a single image download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// File written; carries the number of bytes stored.
    Saved { file_name: String, bytes: u64 },
    Failed { location: String, reason: String },
}

/// Aggregate outcome of a batch download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub found: usize,
    pub downloaded: usize,
    /// Reason of the first failure to complete, if any.
    pub first_error: Option<String>,
}

impl BatchResult {
    pub fn new(found: usize) -> Self {
        Self {
            found,
            ..Self::default()
        }
    }

    /// Count one finished item. Only the first failure is retained.
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Saved { .. } => self.downloaded += 1,
            DownloadOutcome::Failed { location, reason } => {
                if self.first_error.is_none() {
                    self.first_error = Some(format!("{}: {}", location, reason));
                }
            }
        }
    }
}

pub const SUCCESS_MESSAGE: &str = "200. Success";
pub const NO_RECORDS_MESSAGE: &str =
    "204. The request was successful, but no matching records were returned.";
pub const DOWNLOAD_NOTE: &str = "Download process has begun but may take some time to complete.";

/// Body of a successful `GET /api/v1/roverphotos` response.
#[derive(Debug, Serialize)]
pub struct RoverPhotosResponse {
    pub message: String,
    pub images_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_downloaded: Option<usize>,
    pub image_directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_only_first_failure() {
        let mut result = BatchResult::new(3);
        result.record(&DownloadOutcome::Failed {
            location: "http://x/a.jpg".into(),
            reason: "HTTP 404".into(),
        });
        result.record(&DownloadOutcome::Saved {
            file_name: "b.jpg".into(),
            bytes: 10,
        });
        result.record(&DownloadOutcome::Failed {
            location: "http://x/c.jpg".into(),
            reason: "HTTP 500".into(),
        });

        assert_eq!(result.found, 3);
        assert_eq!(result.downloaded, 1);
        assert_eq!(result.first_error.as_deref(), Some("http://x/a.jpg: HTTP 404"));
    }

    #[test]
    fn response_omits_absent_fields() {
        let body = RoverPhotosResponse {
            message: SUCCESS_MESSAGE.into(),
            images_found: 2,
            images_downloaded: None,
            image_directory: "./2020-07-01".into(),
            note: None,
            error: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["images_found"], 2);
        assert!(json.get("images_downloaded").is_none());
        assert!(json.get("note").is_none());
        assert!(json.get("error").is_none());
    }
}
