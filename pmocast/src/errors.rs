use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CastError {
    #[error("Cast I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Cannot load client identity: {0}")]
    Identity(String),

    #[error("Malformed cast message: {0}")]
    Decode(String),

    #[error("Frame of {0} bytes exceeds the 64 KiB limit")]
    FrameTooLarge(usize),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload must be a JSON object")]
    InvalidPayload,

    #[error("No reply to request {request_id} within {timeout:?}")]
    Timeout { request_id: u64, timeout: Duration },

    #[error("Application {0} is not available on this device")]
    AppUnavailable(String),

    #[error("Application did not show up after {polls} status polls")]
    LaunchTimeout { polls: u32 },

    #[error("Media load rejected: {0}")]
    LoadRejected(String),

    #[error("No application is active")]
    NoActiveApp,

    #[error("Not connected to the cast device")]
    NotConnected,
}
