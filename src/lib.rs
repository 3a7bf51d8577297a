pub mod batch;
pub mod classify;
pub mod config;
pub mod export;
pub mod input;
pub mod lift;
pub mod metrics;
pub mod models;
pub mod report;
pub mod shock;

/// Application name for XDG paths
pub const APP_NAME: &str = "drumstats";
