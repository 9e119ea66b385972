//! Error types for the CloudStack connector.

use crate::config::ConfigError;
use thiserror::Error;

/// Errors raised by the CloudStack connector.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CloudstackError {
    /// Raised when the connection record or configuration is unusable, for
    /// example a malformed URL or a missing zone selection. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Raised when a request is missing a required field.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Wrapper for failed remote calls. The message is the provider's own
    /// text where a structured error body was available.
    #[error("provider error: {message}")]
    Provider {
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when a lookup that expects an existing remote target finds
    /// nothing.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of resource looked up (for example `server`).
        resource: String,
        /// Identifier used for the lookup.
        id: String,
    },
    /// Raised when a provider response does not have the expected envelope.
    #[error("unexpected {command} response: {message}")]
    Decode {
        /// API command whose response failed to decode.
        command: String,
        /// Description of the shape mismatch.
        message: String,
    },
    /// Raised when a bounded wait elapses.
    #[error("timeout waiting for {action} on server {server_id}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Provider server identifier.
        server_id: String,
    },
    /// Raised when create fails after the provider allocated a server. The
    /// allocated server has already been rolled back when this is returned.
    #[error("failed to create server {server_id}: {message}")]
    PartialProvisioning {
        /// Identifier of the server that was allocated and then destroyed.
        server_id: String,
        /// Message describing the original failure.
        message: String,
    },
    /// Raised when a second create is attempted on the same connection while
    /// one is still running.
    #[error("a server create is already in flight for this connection")]
    CreateInProgress,
    /// Raised when the SSH key pair bound to a connection cannot be created.
    #[error("failed to set up key pair: {message}")]
    KeyPairSetup {
        /// Message describing the failure.
        message: String,
    },
    /// Raised when the local key pair store fails.
    #[error("key pair store error: {message}")]
    Store {
        /// Message describing the failure.
        message: String,
    },
}

impl CloudstackError {
    /// Returns the message suitable for showing to an operator. Provider
    /// messages are surfaced verbatim, everything else uses the display form.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Provider { message }
            | Self::PartialProvisioning { message, .. }
            | Self::KeyPairSetup { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns `true` for [`CloudstackError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for CloudstackError {
    fn from(value: reqwest::Error) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<ConfigError> for CloudstackError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}
