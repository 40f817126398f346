pub mod photo_cache;
pub mod photo_downloader;
pub mod photo_fetcher;
pub mod rover_photo_service;
