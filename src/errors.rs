use crate::services::rover_photo_service::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for request failures that keeps the message local.
///
/// The numeric status is embedded in the message text as well as the HTTP
/// status code, e.g. `"400. Invalid input."`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error carrying the failure text.
    pub fn internal(msg: impl fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("500. {}", msg))
    }

    /// Shortcut for 404 Not Found
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "404. Not found.")
    }

    /// Shortcut for 400 Bad Request on a missing or unparseable date.
    pub fn invalid_input() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "400. Invalid input.")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "message": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match &err {
            PipelineError::Fetch(_) => tracing::warn!(error = %err, "upstream fetch failed"),
            PipelineError::Storage(_) => tracing::error!(error = %err, "storage failure"),
            PipelineError::Aborted(_) => tracing::error!(error = %err, "pipeline task failed"),
        }
        AppError::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::rover::Rover, services::photo_fetcher::FetchError};

    #[test]
    fn pipeline_errors_become_500_with_code_in_message() {
        let err = AppError::from(PipelineError::Fetch(FetchError::Api {
            rover: Rover::Spirit,
            detail: "An invalid api_key was supplied.".into(),
        }));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.message,
            "500. rover `spirit` reported an error: An invalid api_key was supplied."
        );
    }

    #[test]
    fn client_errors_use_fixed_messages() {
        assert_eq!(AppError::invalid_input().status, StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found().message, "404. Not found.");
    }
}
