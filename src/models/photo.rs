//! Image references gathered from the upstream photo API.

use reqwest::Url;
use serde::Deserialize;

/// A single retrievable image, identified by its source URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    pub location: String,
}

impl ImageRef {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Final path segment of the location, used as the on-disk file name.
    ///
    /// Query strings and fragments are ignored. Locations that do not parse
    /// as URLs fall back to their raw last `/` segment. Returns `None` when
    /// there is no usable final segment.
    pub fn file_name(&self) -> Option<String> {
        let name = match Url::parse(&self.location) {
            Ok(url) => url.path_segments()?.next_back()?.to_string(),
            Err(_) => {
                let path = self.location.split(['?', '#']).next().unwrap_or("");
                path.rsplit('/').next().unwrap_or("").to_string()
            }
        };
        match name.as_str() {
            "" | "." | ".." => None,
            raw if raw.contains('\\') => None,
            _ => Some(name),
        }
    }
}

/// Ordered collection of image references for one request key.
///
/// Built fresh per request and merged in rover declaration order, then in
/// per-rover response order. No deduplication is performed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhotoBatch {
    pub images: Vec<ImageRef>,
}

impl PhotoBatch {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn extend(&mut self, images: impl IntoIterator<Item = ImageRef>) {
        self.images.extend(images);
    }
}

impl FromIterator<ImageRef> for PhotoBatch {
    fn from_iter<I: IntoIterator<Item = ImageRef>>(iter: I) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}

/// Body returned by `GET <base>/<rover>/photos`.
///
/// The upstream either reports an `error` or lists `photos`; anything else
/// is treated as malformed by the fetcher.
#[derive(Debug, Deserialize)]
pub struct RoverPhotosPayload {
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub photos: Option<Vec<PhotoRecord>>,
}

/// One photo record; only the image location is needed.
#[derive(Debug, Deserialize)]
pub struct PhotoRecord {
    pub img_src: String,
}
