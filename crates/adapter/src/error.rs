//! Error types for the API adapter.
//!
//! Every failure that reaches the tool boundary is one of four categories. Lower layers
//! (environment loading, the HTTP transport) have their own error types; they are re-tagged into
//! [`AdapterError`] at the layer boundary, keeping the status code and message.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for the adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// A required operating parameter is missing or invalid (fixable by the operator).
    #[error("{message}")]
    Configuration { message: String },

    /// The caller's request is invalid or was rejected as such by the external API.
    #[error("{message}")]
    UserInput {
        status: Option<u16>,
        message: String,
    },

    /// The external API failed, refused the credential, or returned an unexpected payload.
    #[error("{message}")]
    ExternalService {
        status: Option<u16>,
        message: String,
    },

    /// The call never reached the external API (network, DNS, timeout).
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
}

/// Serializable tag for [`AdapterError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ConfigurationError,
    UserInputError,
    ExternalServiceError,
    TransportError,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::UserInputError => "user_input_error",
            Self::ExternalServiceError => "external_service_error",
            Self::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AdapterError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput {
            status: None,
            message: message.into(),
        }
    }

    pub fn external(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration { .. } => ErrorCategory::ConfigurationError,
            Self::UserInput { .. } => ErrorCategory::UserInputError,
            Self::ExternalService { .. } => ErrorCategory::ExternalServiceError,
            Self::Transport { .. } => ErrorCategory::TransportError,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Configuration { .. } => None,
            Self::UserInput { status, .. }
            | Self::ExternalService { status, .. }
            | Self::Transport { status, .. } => *status,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration { message }
            | Self::UserInput { message, .. }
            | Self::ExternalService { message, .. }
            | Self::Transport { message, .. } => message,
        }
    }
}

impl From<unrelated_env::EnvError> for AdapterError {
    fn from(e: unrelated_env::EnvError) -> Self {
        Self::configuration(e.to_string())
    }
}

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;
