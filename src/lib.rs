//! Mars rover photo downloader.
//!
//! Serves `GET /api/v1/roverphotos?earthdate=<date>`: photo listings for
//! every configured rover are fetched concurrently, merged, and each image
//! is downloaded into a directory named after the canonical date.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
