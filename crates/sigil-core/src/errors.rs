//! Unified error system for the Sigil authority
//!
//! The taxonomy is closed: every failure an operation can surface is a
//! variant here, and each variant maps to a stable textual code that crosses
//! service boundaries unchanged. Callers are expected to branch on
//! [`AuthorityError::code`], never on the display text.

use crate::access::AuthLevel;
use serde::{Deserialize, Serialize};

/// Result alias used throughout the Sigil crates
pub type AuthorityResult<T> = Result<T, AuthorityError>;

/// Unified error type for all authority operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum AuthorityError {
    /// Identity is not registered with the authority
    #[error("Unknown identity: {id}")]
    UnknownIdentity {
        /// Display form of the identity principal
        id: String,
    },

    /// Identity exists but has been disabled
    #[error("Identity disabled: {id}")]
    IdentityDisabled {
        /// Display form of the identity principal
        id: String,
    },

    /// An identity with this principal already exists
    #[error("Identity already exists: {id}")]
    AlreadyExists {
        /// Display form of the identity principal
        id: String,
    },

    /// No device matches the presented (device, pubkey, algo) triple
    #[error("Unknown device: {device}")]
    DeviceUnknown {
        /// Device identifier from the proof
        device: String,
    },

    /// The presented device has been revoked
    #[error("Device revoked: {device}")]
    DeviceRevoked {
        /// Device identifier from the proof
        device: String,
    },

    /// The (device, pubkey, algo) triple is already registered
    #[error("Duplicate device: {device}")]
    DuplicateDevice {
        /// Device identifier being added
        device: String,
    },

    /// Identity already carries the maximum number of devices
    #[error("Device limit exceeded: {limit} devices per identity")]
    DeviceLimitExceeded {
        /// Configured per-identity device cap
        limit: usize,
    },

    /// A device cannot authorize its own revocation
    #[error("Cannot revoke own device")]
    CannotRevokeOwnDevice,

    /// Caller is not authorized for this operation
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// What was attempted without authorization
        message: String,
    },

    /// Challenge or session lifetime has elapsed
    #[error("Expired: {message}")]
    Expired {
        /// What expired
        message: String,
    },

    /// A correlation token was presented twice
    #[error("Replayed: {message}")]
    Replayed {
        /// What was replayed
        message: String,
    },

    /// Challenge nonce has already been consumed
    #[error("Nonce reused")]
    NonceReused,

    /// Request rejected by the sliding-window limiter or an active lockout
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Which quota rejected the request
        message: String,
    },

    /// Proof verified below the required authentication level
    #[error("Insufficient auth level: required {required}, actual {actual}")]
    InsufficientAuthLevel {
        /// Minimum level the operation demands
        required: AuthLevel,
        /// Level the proof actually established
        actual: AuthLevel,
    },

    /// Cryptographic signature verification failed
    #[error("Signature invalid")]
    SignatureInvalid,

    /// Session is missing, revoked, or otherwise unusable
    #[error("Session invalid: {message}")]
    SessionInvalid {
        /// Why the session cannot be used
        message: String,
    },

    /// No session with the given identifier
    #[error("Session not found: {session}")]
    SessionNotFound {
        /// Display form of the session token
        session: String,
    },

    /// Caller lacks a required role or scope
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// The missing permission
        message: String,
    },

    /// Role is not present on the identity
    #[error("Role not found: {role}")]
    RoleNotFound {
        /// The role that was absent
        role: String,
    },

    /// Requested scope is outside the closed vocabulary
    #[error("Invalid scope: {scope}")]
    InvalidScope {
        /// The unparseable scope text
        scope: String,
    },

    /// Session risk score crossed the configured threshold
    #[error("Risk too high: score {score}")]
    RiskTooHigh {
        /// Computed risk score on the 0-10 scale
        score: u8,
    },

    /// Event queue is at capacity; the emitter must shed load
    #[error("Queue full: {priority}")]
    QueueFull {
        /// Priority lane that overflowed
        priority: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// What was invalid
        message: String,
    },
}

impl AuthorityError {
    /// Stable textual code for this error, as seen across service boundaries
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownIdentity { .. } => "unknown_identity",
            Self::IdentityDisabled { .. } => "identity_disabled",
            Self::AlreadyExists { .. } => "already_exists",
            Self::DeviceUnknown { .. } => "device_unknown",
            Self::DeviceRevoked { .. } => "device_revoked",
            Self::DuplicateDevice { .. } => "duplicate_device",
            Self::DeviceLimitExceeded { .. } => "device_limit_exceeded",
            Self::CannotRevokeOwnDevice => "cannot_revoke_own_device",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Expired { .. } => "expired",
            Self::Replayed { .. } => "replayed",
            Self::NonceReused => "nonce_reused",
            Self::RateLimited { .. } => "rate_limited",
            Self::InsufficientAuthLevel { .. } => "insufficient_auth_level",
            Self::SignatureInvalid => "signature_invalid",
            Self::SessionInvalid { .. } => "session_invalid",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::RoleNotFound { .. } => "role_not_found",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::RiskTooHigh { .. } => "risk_too_high",
            Self::QueueFull { .. } => "queue_full",
            Self::Invalid { .. } => "invalid",
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an expired error
    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    /// Create a rate-limited error
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Create a session-invalid error
    pub fn session_invalid(message: impl Into<String>) -> Self {
        Self::SessionInvalid {
            message: message.into(),
        }
    }

    /// Create a permission-denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create an invalid-input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
