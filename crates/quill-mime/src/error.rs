//! Error types for MIME operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Boundary token is empty, too long, or contains characters outside
    /// the base64 alphabet.
    #[error("Invalid boundary token: {0}")]
    InvalidBoundary(String),
}
