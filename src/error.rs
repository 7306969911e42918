//! BullyScale Error Types

use thiserror::Error;

use crate::state::NodeId;

/// Result type alias for BullyScale operations
pub type Result<T> = std::result::Result<T, Error>;

/// BullyScale error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Wire errors
    #[error("Message serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Unexpected response to {request}: got {response}")]
    UnexpectedResponse {
        request: &'static str,
        response: &'static str,
    },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    #[error("Failed to bind listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    // Membership errors
    #[error("Node {0} is not in the membership directory")]
    UnknownNode(NodeId),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The peer could not be reached at all (dial failure or timeout)
    pub fn is_peer_unreachable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed { .. } | Error::ConnectionTimeout(_)
        )
    }

    /// The peer was reached but the call errored or the reply was malformed
    pub fn is_remote_call_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::Serialization(_)
                | Error::FrameTooLarge { .. }
                | Error::UnexpectedResponse { .. }
                | Error::Io(_)
        )
    }

    /// Errors the process cannot continue past
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Bind { .. } | Error::Config(_) | Error::ConfigParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let dial = Error::ConnectionFailed {
            address: "127.0.0.1:3004".into(),
            reason: "refused".into(),
        };
        assert!(dial.is_peer_unreachable());
        assert!(!dial.is_remote_call_failure());
        assert!(!dial.is_fatal());

        let malformed = Error::UnexpectedResponse {
            request: "Election",
            response: "StatusResponse",
        };
        assert!(malformed.is_remote_call_failure());
        assert!(!malformed.is_peer_unreachable());

        let bind = Error::Bind {
            address: "127.0.0.1:3000".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(bind.is_fatal());
        assert!(bind.to_string().contains("127.0.0.1:3000"));
    }
}
