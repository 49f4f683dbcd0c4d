pub mod auth;
pub mod background_jobs;
pub mod misc;
pub mod pdf;
pub mod scoring;
