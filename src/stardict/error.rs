//! Custom error types for the stardict-reader crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum StardictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An I/O error carrying the path that produced it.
    #[error("opening {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The dictionary path does not end in `.ifo` or `.IFO`.
    #[error("invalid .ifo file extension: {}", path.display())]
    IfoExtension { path: PathBuf },

    /// The first line of the `.ifo` file is not the StarDict magic string.
    #[error("invalid magic data: {}", path.display())]
    InvalidMagic { path: PathBuf },

    /// The `.ifo` file contains no keys, or its first key is not `version`.
    #[error("missing version")]
    MissingVersion,

    /// The format version is not one of the supported values.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("missing bookname")]
    MissingBookname,

    /// An `.ifo` key contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// An `.ifo` line has no `=` separator.
    #[error("malformed .ifo line: {0}")]
    InvalidLine(String),

    /// A numeric `.ifo` value failed to parse.
    #[error("invalid {key}: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },

    /// `idxoffsetbits` must be 32 or 64.
    #[error("invalid idxoffsetbits: {0}")]
    InvalidOffsetBits(u64),

    /// An unknown type tag in `sametypesequence`.
    #[error("invalid type: {0:?}")]
    InvalidType(char),

    /// A binary record ended before its fixed trailer was complete.
    #[error("truncated {context} record")]
    TruncatedRecord { context: &'static str },

    /// A `.dict` entry ended in the middle of a data block.
    #[error("truncated data block in .dict entry")]
    TruncatedData,

    /// No sibling file was found after trying every candidate extension.
    #[error("no {kind} file found for {}", base.display())]
    SiblingNotFound { kind: &'static str, base: PathBuf },

    /// A `.syn` record references an `.idx` entry that does not exist.
    #[error("synonym index {index} out of range ({len} index entries)")]
    SynIndexOutOfRange { index: u32, len: usize },

    /// A glob query must start with at least one literal character.
    #[error("glob pattern has no literal prefix: {0:?}")]
    EmptyGlobPrefix(String),

    /// The glob pattern could not be compiled.
    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// The `.dict` offset exceeds the signed 63-bit range.
    #[error("word offset too large: {0}")]
    OffsetTooLarge(u64),

    /// Fewer bytes than requested could be read from the `.dict` payload.
    #[error("short read: expected {expected} bytes")]
    ShortRead { expected: u64 },

    /// The file is structurally invalid (dictzip framing, chunk tables).
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// A mutex lock was poisoned, indicating a panic in another thread holding the lock.
    #[error("a lock was poisoned by a panic in another thread")]
    LockPoisoned,
}

/// A convenience `Result` type alias using the crate's `StardictError` type.
pub type Result<T> = std::result::Result<T, StardictError>;
