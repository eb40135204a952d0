//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server closed the connection or sent nothing where a greeting was
    /// required.
    #[error("Connection aborted: {0}")]
    ConnectionAborted(String),

    /// Connect or greeting read did not finish in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Server rejected the credentials.
    #[error("Authentication failed {code}: {message}")]
    AuthFailed {
        /// Reply code (anything other than 235).
        code: u16,
        /// Reply text from server.
        message: String,
    },

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Invalid state for operation.
    #[error("Invalid state for operation: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Creates an authentication failure from a reply code and message.
    #[must_use]
    pub fn auth_failed(code: u16, message: impl Into<String>) -> Self {
        Self::AuthFailed {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the connection itself is gone or never came up.
    ///
    /// The session cannot continue after such an error.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ConnectionAborted(_) | Self::Timeout(_)
        )
    }

    /// Returns true if the server rejected the credentials.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailed { .. })
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self.reply_code(), Some(code) if code >= 500 && code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.reply_code(), Some(code) if code >= 400 && code < 500)
    }

    /// Returns the server reply code carried by this error, if any.
    #[must_use]
    pub const fn reply_code(&self) -> Option<u16> {
        match self {
            Self::SmtpError { code, .. } | Self::AuthFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = Error::smtp_error(550, "No such user");
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert!(!err.is_connection_failure());
        assert_eq!(err.reply_code(), Some(550));

        let err = Error::smtp_error(451, "Try later");
        assert!(err.is_transient());

        let err = Error::auth_failed(535, "Bad credentials");
        assert!(err.is_auth_failure());
        assert!(err.is_permanent());

        assert!(Error::Timeout(Duration::from_secs(1)).is_connection_failure());
        assert!(Error::ConnectionAborted("empty greeting".into()).is_connection_failure());
        assert_eq!(Error::Protocol("x".into()).reply_code(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::smtp_error(550, "No such user").to_string(),
            "SMTP error 550: No such user"
        );
        assert_eq!(
            Error::auth_failed(535, "Nope").to_string(),
            "Authentication failed 535: Nope"
        );
    }
}
