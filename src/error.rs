//! Error types for emberkv.

use std::io;
use thiserror::Error;

/// Result type alias for emberkv operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for database and configuration operations.
///
/// Failures reported by the engine keep the engine's own message text; the
/// variant only records which family of operation produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A parameter was rejected before reaching the engine.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The engine refused to open the database.
    #[error("Open failed: {0}")]
    Open(String),

    /// A put or delete failed.
    #[error("Write failed: {0}")]
    Write(String),

    /// A get failed for a reason other than the key being absent.
    #[error("Read failed: {0}")]
    Read(String),

    /// Destroy or repair of a database directory failed.
    #[error("Maintenance failed: {0}")]
    Maintenance(String),

    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Data corruption detected.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a configuration error with the given message.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Create a corruption error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// The engine's message text, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::InvalidConfiguration(msg)
            | Error::Open(msg)
            | Error::Write(msg)
            | Error::Read(msg)
            | Error::Maintenance(msg)
            | Error::Io(msg)
            | Error::Corruption(msg)
            | Error::Internal(msg) => msg,
        }
    }

    /// Check if this error was rejected host-side as a bad parameter.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::InvalidConfiguration(_))
    }

    /// Check if this error indicates corruption.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::Corruption(_) => true,
            other => other.message().starts_with("Corruption"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("bad block");
        assert_eq!(format!("{}", err), "Corruption detected: bad block");

        let err = Error::Open("LOCK held".into());
        assert_eq!(format!("{}", err), "Open failed: LOCK held");
    }

    #[test]
    fn test_error_message_strips_prefix() {
        let err = Error::Write("I/O error: disk full".into());
        assert_eq!(err.message(), "I/O error: disk full");
    }

    #[test]
    fn test_error_is_corruption() {
        assert!(Error::corruption("bad").is_corruption());
        assert!(Error::Open("Corruption detected: table footer".into()).is_corruption());
        assert!(!Error::Write("I/O error: EIO".into()).is_corruption());
    }

    #[test]
    fn test_error_from_io() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, Error::Io(ref m) if m == "boom"));
    }
}
