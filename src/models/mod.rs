//! Core data models for the rover photo service.
//!
//! A request is keyed by a canonical earth date, fans out across a fixed
//! set of rovers, and produces a batch of image references that are
//! downloaded into a directory named after the date.

pub mod photo;
pub mod request_key;
pub mod rover;
pub mod summary;
