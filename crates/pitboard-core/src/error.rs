use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid overlay descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Failed to create window {0}")]
    WindowCreation(String),
    #[error("Overlay {id} failed to load its content: {reason}")]
    ContentLoad { id: String, reason: String },
    #[error("Overlay {0} was closed before its content loaded")]
    WindowClosed(String),
    #[error("Overlay service is not running")]
    ChannelClosed,
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "tauri")]
    #[error("Tauri error: {0}")]
    Tauri(#[from] tauri::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
