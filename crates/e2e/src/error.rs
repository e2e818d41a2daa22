//! Error types for browser smoke runs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("{0}")]
    Config(#[from] autosmoke_common::Error),

    #[error("'{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Browser capture produced no readable result: {0}")]
    InvalidCapture(String),

    #[error("Auth setup failed: {0}")]
    Auth(String),

    #[error("App failed to start: {0}")]
    ServerStartup(String),

    #[error("App at {url} did not respond within {waited_secs}s")]
    AppNotReady { url: String, waited_secs: u64 },

    #[error("Lighthouse failed for {url}: {reason}")]
    Lighthouse { url: String, reason: String },

    #[error("Visual regression: {0}")]
    Visual(String),

    #[error("Screenshot not found: {0}")]
    ScreenshotNotFound(PathBuf),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Route task failed: {0}")]
    Task(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type E2eResult<T> = Result<T, E2eError>;
