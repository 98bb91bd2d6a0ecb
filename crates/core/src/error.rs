//! Error type shared by every fallible operation in the core library
//!
//! External lookups in the forecast path never surface these errors to the
//! caller: they are logged and replaced with heuristic defaults. Everything
//! else (reading shards, loading models, parsing requests) propagates with `?`.

use thiserror::Error;

/// Errors produced by the record reader, dataset builder, models and forecaster.
#[derive(Debug, Error)]
pub enum IgnisError {
    /// Underlying file or stream failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TFRecord frame did not match its checksum.
    #[error("Corrupt record frame: {0}")]
    CorruptFrame(String),

    /// Protobuf payload of a record could not be decoded.
    #[error("Malformed example at byte {offset}: {message}")]
    MalformedExample {
        /// Byte offset inside the record payload where decoding failed
        offset: usize,
        /// What the decoder expected
        message: String,
    },

    /// JSON (de)serialization failure for datasets, models, configs or requests.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport or status failure from a conditions endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered but without the fields we need.
    #[error("Unexpected response from {endpoint}: {message}")]
    UnexpectedResponse {
        /// Which endpoint answered
        endpoint: &'static str,
        /// What was missing
        message: String,
    },

    /// Model input or training data has the wrong shape.
    #[error("Invalid model input: {0}")]
    InvalidInput(String),

    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type IgnisResult<T> = Result<T, IgnisError>;

impl IgnisError {
    pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> Self {
        Self::MalformedExample {
            offset,
            message: message.into(),
        }
    }
}
