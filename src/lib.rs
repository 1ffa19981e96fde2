pub mod best_score;
pub mod config;
pub mod constants;
pub mod engine;
pub mod grid;
pub mod input;
pub mod playback;
pub mod rng;
pub mod server_protocol;
pub mod types;
