//! Error types shared across the sync engine crates.

use thiserror::Error;

use crate::tables::Table;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Retry policy class for sync failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Transient transport failure; feed the circuit breaker and retry.
    Retryable,
    /// Constraint or grant violation scoped to individual rows.
    RowLevel,
    /// Nothing to be gained from retrying as-is.
    Permanent,
}

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network unreachable (offline, DNS failure)
    #[error("network unreachable: {0}")]
    Offline(String),

    /// Connection dropped mid-request
    #[error("network connection lost: {0}")]
    ConnectionLost(String),

    /// Request deadline exceeded
    #[error("request timed out")]
    Timeout,

    /// Error response from the remote table API
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Payload failed to decode
    #[error("decode error: {0}")]
    Decode(String),

    /// Realtime channel failure (subscribe, stream teardown)
    #[error("realtime channel error: {0}")]
    Channel(String),

    /// Object storage failure (avatar upload/download)
    #[error("object storage error: {0}")]
    Storage(String),

    /// Anything else
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Create an API error from status, optional server error code, and message.
    pub fn api(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn offline(message: impl Into<String>) -> Self {
        Self::Offline(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify for retry behavior.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Offline(_) | Self::ConnectionLost(_) | Self::Timeout => RetryClass::Retryable,
            Self::Api { status, .. } => match *status {
                408 | 429 | 500..=599 => RetryClass::Retryable,
                _ => RetryClass::RowLevel,
            },
            Self::Channel(_) | Self::Storage(_) => RetryClass::Retryable,
            Self::Decode(_) | Self::Internal(_) => RetryClass::Permanent,
        }
    }

    /// True when the server rejected the row for lack of a column/row grant.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Api { code, message, .. } => {
                code.as_deref() == Some("42501")
                    || message.to_ascii_lowercase().contains("permission denied")
            }
            _ => false,
        }
    }

    /// True when an INSERT hit an existing primary key.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Api { status, code, .. } => {
                *status == 409 || code.as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Map a low-level error to the message shown in the sync status UI.
pub fn user_facing_message(err: &Error, table: Table) -> String {
    if err.is_permission_denied() {
        return format!("Permission denied syncing {}", table);
    }
    match err {
        Error::Offline(_) => {
            "No internet connection. Your changes will sync when you're back online.".to_string()
        }
        Error::ConnectionLost(_) => {
            "The network connection was lost. Sync will retry automatically.".to_string()
        }
        Error::Timeout => "The sync request timed out. Sync will retry automatically.".to_string(),
        other => format!("Sync failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_by_code_and_by_text() {
        let by_code = Error::api(403, Some("42501".to_string()), "denied");
        assert!(by_code.is_permission_denied());

        let by_text = Error::api(400, None, "ERROR: permission denied for table notes");
        assert!(by_text.is_permission_denied());

        let other = Error::api(400, Some("23514".to_string()), "check violation");
        assert!(!other.is_permission_denied());
    }

    #[test]
    fn retry_class_splits_transport_from_row_level() {
        assert_eq!(Error::Timeout.retry_class(), RetryClass::Retryable);
        assert_eq!(
            Error::api(503, None, "unavailable").retry_class(),
            RetryClass::Retryable
        );
        assert_eq!(
            Error::api(409, Some("23505".to_string()), "duplicate").retry_class(),
            RetryClass::RowLevel
        );
        assert_eq!(
            Error::decode("bad payload").retry_class(),
            RetryClass::Permanent
        );
    }

    #[test]
    fn user_messages_match_error_kind() {
        assert_eq!(
            user_facing_message(
                &Error::api(403, Some("42501".to_string()), "denied"),
                Table::Notes
            ),
            "Permission denied syncing notes"
        );
        assert!(user_facing_message(&Error::offline("no route"), Table::Tasks)
            .contains("No internet connection"));
        assert!(user_facing_message(
            &Error::api(400, None, "bad request"),
            Table::Tasks
        )
        .starts_with("Sync failed:"));
    }
}
