pub mod config;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod playback;
pub mod repositories;
pub mod streaming;
pub mod utils;
