pub mod health_handlers;
pub mod rover_photo_handlers;
