//! Columnar offset/score storage engine: a binary codec for
//! monotonic-offset/float-score record blocks, plus the write-ahead
//! journal that keeps the files holding those blocks crash-consistent.

pub mod arena;
pub mod cli;
pub mod error;
pub mod format;
pub mod intseq;
pub mod io_util;
pub mod journal;
pub mod rle;
pub mod stats;
pub mod threadpool;
pub mod varint;

pub use error::{exit_code, CliError, FormatError, JournalError};
pub use format::{decode, encode, DecodeOptions, OffsetScore, PredictionBands};
pub use journal::Journal;
