//! Error types for the API client.
//!
//! # Design
//! A rejected call carries the backend's error body whenever one arrived,
//! because callers inspect backend-defined payloads uniformly. Only when no
//! usable body exists does the lower-level status or transport failure
//! surface.

use serde_json::Value;
use thiserror::Error;

/// A round trip that did not produce a response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("request could not be built: {0}")]
    InvalidRequest(String),

    #[error("response body could not be read: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            // is_connect() is not available on wasm32
            #[cfg(not(target_arch = "wasm32"))]
            if err.is_connect() {
                return TransportError::Connection(err.to_string());
            }
            TransportError::Other(err.to_string())
        }
    }
}

/// Settings could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("INTERNAL_API_PORT is not a valid port: {0:?}")]
    InvalidPort(String),
}

/// Why an API call was rejected.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with an error status and a body.
    #[error("HTTP {status}: {body}")]
    Response { status: u16, body: Value },

    /// The backend answered with an error status and nothing usable in the body.
    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A success response whose body could not be parsed.
    #[error("malformed response body: {0}")]
    Decode(String),

    #[error("request data could not be encoded: {0}")]
    Encode(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// The backend's error payload, if the rejection carries one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Response { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Response { status, .. } | ApiError::Status { status } => Some(*status),
            _ => None,
        }
    }
}
