//! Defines the public routes of the rover photo service.
//!
//! ## Structure
//! - `GET /api/v1/roverphotos?earthdate=<date>`: fetch and download photos for a date
//! - `GET /healthz`: liveness
//! - `GET /readyz`: storage readiness
//!
//! Any other path, or any other method on these paths, answers
//! `404 {"message": "404. Not found."}`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        rover_photo_handlers::{get_rover_photos, not_found},
    },
    services::rover_photo_service::RoverPhotoService,
};
use axum::{Router, routing::get};

/// Build and return the router for all routes.
///
/// The router carries shared state (`RoverPhotoService`) to all handlers.
pub fn routes() -> Router<RoverPhotoService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz).fallback(not_found))
        .route("/readyz", get(readyz).fallback(not_found))
        .route(
            "/api/v1/roverphotos",
            get(get_rover_photos).fallback(not_found),
        )
        .fallback(not_found)
}
