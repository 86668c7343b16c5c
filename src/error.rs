//! Error types for the exporter.
//!
//! This module defines custom error types using `thiserror` for structured
//! error handling throughout the application.

use thiserror::Error;

/// Main error type for exporter operations.
///
/// Collection errors fall into three classes: [`Transport`](Self::Transport)
/// for connection-level failures, [`Status`](Self::Status) for non-200
/// responses, and [`Decode`](Self::Decode) for response bodies that do not
/// match the expected shape. The orchestrator treats all three the same way:
/// the first one aborts the scrape.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Connection, DNS, TLS or timeout failure while talking to PBS
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// PBS responded with a non-200 status
    #[error("status code {code} returned from {url}")]
    Status { code: u16, url: String },

    /// PBS response body did not decode into the expected shape
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Metrics registration or encoding error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// HTTP server error
    #[error("HTTP server error: {0}")]
    Server(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;
