//! Error types for tempoiq-stream.

use thiserror::Error;

/// Code reported for failures that happened before a status line existed.
pub const TRANSPORT_ERROR_CODE: u16 = 600;

/// Code reported when a request could not be built or encoded.
pub const SERIALIZATION_ERROR_CODE: u16 = 601;

/// Code reported when a response body or continuation token could not be decoded.
pub const DECODE_ERROR_CODE: u16 = 602;

/// Error type for tempoiq-stream operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced a response (connect, TLS, timeout, I/O).
    #[error("Transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Failed to serialize a request body to JSON.
    #[error("Failed to serialize request: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The query was rejected before it was sent.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The server answered with a failure status.
    #[error("Request failed with status {status}: {message}")]
    Request {
        /// HTTP status code returned by the server.
        status: u16,
        /// Response body, or the reason phrase when the body was empty.
        message: String,
    },

    /// Failed to decode a response body.
    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// A `next_page` token was malformed or did not match the originating query.
    #[error("Invalid continuation token: {message}")]
    Continuation {
        /// Description of what was wrong with the token.
        message: String,
    },

    /// The configured endpoint could not be turned into a URL.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// A page fetch was dropped before it completed; the cursor cannot resume.
    #[error("Page fetch was interrupted before completing")]
    Interrupted,
}

impl Error {
    /// Numeric code for this error.
    ///
    /// Server failures report the HTTP status; client-side failures report one
    /// of the sentinel codes above 599.
    pub fn code(&self) -> u16 {
        match self {
            Error::Transport(_) | Error::Interrupted => TRANSPORT_ERROR_CODE,
            Error::Serialization(_) | Error::InvalidQuery(_) | Error::InvalidUrl { .. } => {
                SERIALIZATION_ERROR_CODE
            }
            Error::Request { status, .. } => *status,
            Error::Decode(_) | Error::Continuation { .. } => DECODE_ERROR_CODE,
        }
    }

    pub(crate) fn continuation(message: impl Into<String>) -> Self {
        Error::Continuation {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(Box::new(e))
    }
}

/// Result type alias for tempoiq-stream operations.
pub type Result<T> = std::result::Result<T, Error>;
