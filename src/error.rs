//! Error taxonomy for the codec and journal layers.
//!
//! The codec never performs I/O and never terminates the process; it
//! returns [`FormatError`]. The journal wraps codec errors plus the I/O
//! and locking failures it can itself produce in [`JournalError`]. Only
//! the `ts-load`/`ts-compact` binaries translate these into `sysexits`
//! exit codes and call `std::process::exit`.

use std::io;
use thiserror::Error;

/// BSD `sysexits.h` codes this crate's binaries exit with.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const USAGE: i32 = 64;
    pub const DATAERR: i32 = 65;
    pub const UNAVAILABLE: i32 = 69;
    pub const OSERR: i32 = 71;
    pub const IOERR: i32 = 74;
}

/// Errors from the pure codec layer (varint, RLE, integer-sequence,
/// offset/score format).
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("truncated input: expected more bytes while {context}")]
    Truncated { context: &'static str },

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("integer overflowed 64 bits while decoding a varint")]
    Overflow,

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl FormatError {
    pub fn truncated(context: &'static str) -> Self {
        FormatError::Truncated { context }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        FormatError::Malformed(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        FormatError::Invariant(msg.into())
    }

    /// The `sysexits` code this error class reports as, per the error
    /// handling design table: Truncated/Malformed/Invariant all exit 65.
    pub fn exit_code(&self) -> i32 {
        exit_code::DATAERR
    }
}

/// Errors from the journal layer.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error on {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("could not acquire exclusive lock on journal {path}: {source}")]
    LockUnavailable { path: String, source: io::Error },

    #[error("malformed journal record: {0}")]
    Malformed(String),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl JournalError {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        JournalError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn lock_unavailable(path: impl Into<String>, source: io::Error) -> Self {
        JournalError::LockUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        JournalError::Malformed(msg.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            JournalError::Io { .. } => exit_code::IOERR,
            JournalError::LockUnavailable { .. } => exit_code::UNAVAILABLE,
            JournalError::Malformed(_) => exit_code::DATAERR,
            JournalError::Format(e) => e.exit_code(),
        }
    }
}

/// The single error type `ts-load`/`ts-compact`'s `main()` reports
/// through — carries the `sysexits` code the process should exit with,
/// wrapping whichever layer's error produced it.
#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        CliError {
            code: exit_code::USAGE,
            message: msg.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.code
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<JournalError> for CliError {
    fn from(e: JournalError) -> Self {
        CliError {
            code: e.exit_code(),
            message: e.to_string(),
        }
    }
}

impl From<FormatError> for CliError {
    fn from(e: FormatError) -> Self {
        CliError {
            code: e.exit_code(),
            message: e.to_string(),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError {
            code: exit_code::IOERR,
            message: e.to_string(),
        }
    }
}
