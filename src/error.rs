//! Error types for the Brightbox reconciliation system.
//!
//! This module provides the error hierarchy for every layer of a lifecycle
//! call: field conversion, remote API calls, status polling, manifest
//! configuration and persisted state.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the reconciliation system.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Brightbox API errors.
    #[error("Brightbox API error: {0}")]
    Api(#[from] ApiError),

    /// Status polling errors.
    #[error("Wait error: {0}")]
    Wait(#[from] WaitError),

    /// Attribute conversion errors.
    #[error("Field error: {0}")]
    Field(#[from] FieldError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while reading or writing a declared attribute.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FieldError {
    /// The attribute is not part of the resource schema.
    #[error("unknown attribute: {name}")]
    UnknownField {
        /// Attribute name.
        name: String,
    },

    /// The value has the wrong shape for the attribute.
    #[error("attribute {name}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Attribute name.
        name: String,
        /// Expected value shape.
        expected: String,
        /// Shape that was supplied.
        found: String,
    },

    /// The value has the right shape but fails validation.
    #[error("attribute {name}: {message}")]
    InvalidValue {
        /// Attribute name.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The attribute is computed by the remote side and cannot be declared.
    #[error("attribute {name} is computed and cannot be set in a declaration")]
    ComputedField {
        /// Attribute name.
        name: String,
    },
}

/// Brightbox API errors.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The addressed resource does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Path or identifier of the missing resource.
        resource: String,
    },

    /// API request failed.
    #[error("API request failed: {status} - {message}")]
    Request {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Credentials were rejected.
    #[error("Authentication failed: {message}")]
    Unauthorized {
        /// Description of the auth failure.
        message: String,
    },

    /// Rate limited.
    #[error("API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with Brightbox: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from Brightbox API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The call was abandoned because its context ended.
    #[error("Request interrupted: {reason}")]
    Interrupted {
        /// Cancellation or deadline.
        reason: String,
    },
}

/// Errors from waiting on a remote status transition.
#[derive(Debug, Clone, Error)]
pub enum WaitError {
    /// The target status was not reached in time.
    #[error(
        "timeout after {timeout_secs}s waiting for {resource_id} to become {target} (last status: {})",
        .last_status.as_deref().unwrap_or("none")
    )]
    Timeout {
        /// Resource being polled.
        resource_id: String,
        /// Status that was expected.
        target: String,
        /// Last status observed before the deadline.
        last_status: Option<String>,
        /// Configured timeout.
        timeout_secs: u64,
    },

    /// The resource reported a status outside the pending/target pair.
    #[error("unexpected state '{status}' for {resource_id}, wanted target '{target}' (pending '{pending}')")]
    UnexpectedState {
        /// Resource being polled.
        resource_id: String,
        /// Status that was observed.
        status: String,
        /// Accepted intermediate status.
        pending: String,
        /// Expected final status.
        target: String,
    },

    /// The refresh call itself failed.
    #[error("error refreshing {resource_id}: {source}")]
    Refresh {
        /// Resource being polled.
        resource_id: String,
        /// Underlying API failure.
        #[source]
        source: ApiError,
    },

    /// The caller cancelled the wait.
    #[error("wait for {resource_id} was cancelled")]
    Cancelled {
        /// Resource being polled.
        resource_id: String,
    },
}

/// Manifest and provider configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Manifest validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Environment variable has an unusable value.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// Value that failed to parse.
        value: String,
    },

    /// Duplicate resource definition.
    #[error("Duplicate resource name: {name}")]
    DuplicateName {
        /// The duplicated name.
        name: String,
    },

    /// Unknown resource kind.
    #[error("Unknown resource kind: {kind}")]
    UnknownKind {
        /// The kind string from the manifest.
        kind: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Result type alias for remote API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ReconcileError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Returns true if the remote side reported the resource missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the API client may transparently retry this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network { .. })
    }

    /// Returns the delay the server asked for before retrying, if any.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl WaitError {
    /// Returns true if the wait ran out of time rather than failing.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl FieldError {
    /// Creates an invalid-value error for the given attribute.
    #[must_use]
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the attribute this error refers to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::UnknownField { name }
            | Self::TypeMismatch { name, .. }
            | Self::InvalidValue { name, .. }
            | Self::ComputedField { name } => name,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}
