//! HTTP handlers for the rover photo endpoint.
//! Date parsing happens here; everything past a valid date is delegated to
//! `RoverPhotoService`.

use crate::{
    errors::AppError,
    models::{
        request_key::RequestKey,
        summary::{DOWNLOAD_NOTE, NO_RECORDS_MESSAGE, RoverPhotosResponse, SUCCESS_MESSAGE},
    },
    services::rover_photo_service::{PipelineOutcome, RoverPhotoService},
};
use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Query params accepted by `GET /api/v1/roverphotos`.
#[derive(Debug, Deserialize)]
pub struct RoverPhotosQuery {
    pub earthdate: Option<String>,
}

/// `GET /api/v1/roverphotos?earthdate=<date>`
///
/// Downloads every rover photo taken on the given earth date into a
/// directory named after it, or reports the existing directory if the date
/// was requested before.
pub async fn get_rover_photos(
    State(service): State<RoverPhotoService>,
    query: Result<Query<RoverPhotosQuery>, QueryRejection>,
) -> Result<Json<RoverPhotosResponse>, AppError> {
    let raw = query
        .ok()
        .and_then(|Query(q)| q.earthdate)
        .ok_or_else(AppError::invalid_input)?;
    let key = RequestKey::parse(&raw).map_err(|err| {
        debug!(error = %err, "rejecting earth date");
        AppError::invalid_input()
    })?;

    let outcome = service.get_rover_photos(key).await?;
    Ok(Json(summarize(outcome)))
}

/// Fallback for every unmatched method or path.
pub async fn not_found() -> AppError {
    AppError::not_found()
}

fn summarize(outcome: PipelineOutcome) -> RoverPhotosResponse {
    let success = |directory: &Path,
                   images_found: usize,
                   images_downloaded: Option<usize>,
                   error: Option<String>| RoverPhotosResponse {
        message: SUCCESS_MESSAGE.into(),
        images_found,
        images_downloaded,
        image_directory: directory.display().to_string(),
        note: Some(DOWNLOAD_NOTE.into()),
        error,
    };

    match outcome {
        PipelineOutcome::CacheHit {
            directory,
            images_found,
        } => success(&directory, images_found, None, None),
        PipelineOutcome::DownloadStarted {
            directory,
            images_found,
        } => success(&directory, images_found, None, None),
        PipelineOutcome::Downloaded { directory, result } => success(
            &directory,
            result.found,
            Some(result.downloaded),
            result.first_error,
        ),
        PipelineOutcome::NoRecords { directory } => RoverPhotosResponse {
            message: NO_RECORDS_MESSAGE.into(),
            images_found: 0,
            images_downloaded: Some(0),
            image_directory: directory.display().to_string(),
            note: None,
            error: None,
        },
    }
}
