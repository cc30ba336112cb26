//! Error types for the Glaive library.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! [`GlaiveError`]. The variants follow the failure kinds the engine can raise:
//! generic I/O failures, missing files (kept distinct so callers can probe for
//! existence), reads past the end of a stream, operations a backend or role does
//! not support, invalid caller input, and operations invoked in the wrong state.
//!
//! # Examples
//!
//! ```
//! use glaive::error::{GlaiveError, Result};
//!
//! fn open_segment(name: &str) -> Result<()> {
//!     Err(GlaiveError::file_not_found(name))
//! }
//!
//! match open_segment("_0.seg") {
//!     Err(e) if e.is_file_not_found() => println!("no segment yet"),
//!     Err(e) => eprintln!("Error: {}", e),
//!     Ok(()) => {}
//! }
//! ```

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlaiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("End of file: {0}")]
    Eof(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GlaiveError>;

impl GlaiveError {
    pub fn file_not_found<S: Into<String>>(name: S) -> Self {
        GlaiveError::FileNotFound(name.into())
    }

    pub fn eof<S: Into<String>>(msg: S) -> Self {
        GlaiveError::Eof(msg.into())
    }

    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        GlaiveError::UnsupportedOperation(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        GlaiveError::InvalidArgument(msg.into())
    }

    pub fn state<S: Into<String>>(msg: S) -> Self {
        GlaiveError::State(msg.into())
    }

    /// Map an OS error raised while opening `name`, keeping "not found" distinct.
    pub fn from_open(err: io::Error, name: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => GlaiveError::FileNotFound(name.to_string()),
            _ => GlaiveError::Io(err),
        }
    }

    /// Map an OS error raised while reading, turning a short read into `Eof`.
    pub fn from_read(err: io::Error, what: &str) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => GlaiveError::Eof(what.to_string()),
            _ => GlaiveError::Io(err),
        }
    }

    pub fn is_file_not_found(&self) -> bool {
        matches!(self, GlaiveError::FileNotFound(_))
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, GlaiveError::Eof(_))
    }
}
