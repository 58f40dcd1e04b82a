//! Error types for the wiz_ambient library

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for wiz_ambient operations
pub type Result<T> = std::result::Result<T, AmbientError>;

/// Every failure the sync engine, the capture layer or the bulb client can report.
#[derive(Error, Debug)]
pub enum AmbientError {
    /// The screen could not be captured
    #[error("Screen capture failed: {message}")]
    Capture {
        message: String,
        #[source]
        source: Option<xcap::XCapError>,
    },

    /// No monitor matched the request
    #[error("No monitor found: {reason}")]
    NoMonitor { reason: String },

    /// Capture region rejected before it reached the capturer
    #[error("Invalid region {width}x{height}: both sides must be larger than {minimum} pixels")]
    InvalidRegion {
        width: u32,
        height: u32,
        minimum: u32,
    },

    /// The bulb answered with an error object
    #[error("Bulb {addr} rejected {method}: {message}")]
    BulbRejected {
        addr: SocketAddr,
        method: String,
        message: String,
    },

    /// The bulb never answered
    #[error("Bulb {addr} did not answer {method} after {attempts} attempts")]
    BulbTimeout {
        addr: SocketAddr,
        method: String,
        attempts: u32,
    },

    /// Socket level failure
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// A datagram could not be encoded or decoded
    #[error("Malformed WiZ message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Config file could not be read or parsed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },
}

impl AmbientError {
    pub fn capture(message: impl Into<String>, source: xcap::XCapError) -> Self {
        Self::Capture {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn network(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Network {
            message: message.into(),
            source,
        }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// True when retrying the same operation later has a chance of succeeding.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AmbientError::BulbTimeout { .. }
                | AmbientError::Network { .. }
                | AmbientError::Capture { .. }
        )
    }
}
