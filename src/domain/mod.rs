pub mod batch;
pub mod config;
pub mod job;
pub mod tts;
