//! Error types for the TCDB storage engine.

use std::io;
use thiserror::Error;

/// The result type used throughout TCDB.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for TCDB operations.
///
/// The first three variants form the engine's status taxonomy; the rest wrap
/// lower-level failures that callers may want to tell apart.
#[derive(Debug, Error)]
pub enum Error {
    /// A logic failure inside the engine, e.g. a malformed manifest rearrangement.
    #[error("Undefined error: {0}")]
    Undefined(String),

    /// A file could not be opened, read or written.
    #[error("File IO error: {0}")]
    FileIo(String),

    /// A caller supplied missing or invalid input.
    #[error("Bad argument: {0}")]
    BadArgument(String),

    /// An I/O error from the operating system.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// On-disk data could not be decoded.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A checksum mismatch was detected.
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// The checksum stored in the file.
        expected: u32,
        /// The checksum computed over the data.
        actual: u32,
    },

    /// The configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a new undefined (logic) error.
    pub fn undefined(msg: impl Into<String>) -> Self {
        Error::Undefined(msg.into())
    }

    /// Creates a new file I/O error.
    pub fn file_io(msg: impl Into<String>) -> Self {
        Error::FileIo(msg.into())
    }

    /// Creates a new bad argument error.
    pub fn bad_argument(msg: impl Into<String>) -> Self {
        Error::BadArgument(msg.into())
    }

    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Returns true for failures that originate in the file layer.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::FileIo(_) | Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("bad footer");
        assert_eq!(err.to_string(), "Data corruption: bad footer");

        let err = Error::ChecksumMismatch { expected: 0x12345678, actual: 0x87654321 };
        assert!(err.to_string().contains("0x12345678"));
        assert!(err.to_string().contains("0x87654321"));

        let err = Error::bad_argument("empty key");
        assert_eq!(err.to_string(), "Bad argument: empty key");
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(err.is_io());
        assert!(Error::file_io("No available reader").is_io());
        assert!(!Error::undefined("boundary").is_io());
    }

    #[test]
    fn test_json_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
