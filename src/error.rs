//! Error types for fsimage-walker
//!
//! This module defines the error hierarchy for loading and querying
//! namespace images:
//! - Format errors: the file cannot be understood at all
//! - Lookup errors: a path or name is simply not there
//! - Invariant violations: the file parsed but its internal references
//!   are inconsistent (corruption or reader/writer version mismatch)
//! - Configuration and worker-pool errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors should carry enough context to identify the failing record,
//!   section, or path without a debugger
//! - Format and invariant errors are fatal: no partial snapshot is ever
//!   returned

use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ImageError>;

/// Top-level error type for the fsimage-walker library
#[derive(Error, Debug)]
pub enum ImageError {
    /// The image file is malformed
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A path or name was not found
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// The image parsed but is internally inconsistent
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker pool errors
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (opening or mapping the image file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    /// Check if this error is an ordinary miss a caller may handle
    /// (as opposed to a fatal format or consistency problem).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ImageError::Lookup(_))
    }
}

/// Errors detected while decoding the image file itself.
///
/// All of these are fatal: loading aborts and no snapshot is returned.
#[derive(Error, Debug)]
pub enum FormatError {
    /// File does not start with the image magic
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 8], found: Vec<u8> },

    /// File too small to contain magic, footer, and trailing pointer
    #[error("file too short: {len} bytes")]
    FileTooShort { len: usize },

    /// Ran out of bytes in the middle of a value
    #[error("unexpected end of input while decoding {context}")]
    UnexpectedEof { context: &'static str },

    /// A varint used more than 64 bits
    #[error("varint overflow while decoding {context}")]
    VarintOverflow { context: &'static str },

    /// A protobuf wire type this reader does not understand
    #[error("unsupported wire type {wire_type} for field {field}")]
    UnsupportedWireType { field: u32, wire_type: u8 },

    /// A required field was absent from a record
    #[error("record is missing required field: {field}")]
    MissingField { field: &'static str },

    /// A declared length points outside the enclosing buffer
    #[error("length out of bounds while decoding {context}: {len} bytes at offset {offset}")]
    LengthOutOfBounds {
        context: &'static str,
        offset: usize,
        len: u64,
    },

    /// Footer pointer or a section range points outside the file
    #[error("section '{name}' range [{offset}, +{length}) exceeds file bounds")]
    SectionOutOfBounds {
        name: String,
        offset: u64,
        length: u64,
    },

    /// A section named in the footer more than once
    #[error("duplicate section '{name}' in footer")]
    DuplicateSection { name: String },

    /// A required section is absent from the footer
    #[error("missing required section '{name}'")]
    MissingSection { name: &'static str },

    /// The footer names a compression codec this reader does not support
    #[error("unknown compression codec '{name}'")]
    UnknownCodec { name: String },

    /// Decompression of a section failed
    #[error("failed to decompress section '{section}': {source}")]
    Decompression {
        section: String,
        source: std::io::Error,
    },

    /// An inode record declared an unknown type tag
    #[error("unknown inode type tag {tag}")]
    UnknownInodeType { tag: u64 },

    /// A string-table entry was not valid UTF-8
    #[error("string table entry {id} is not valid UTF-8")]
    InvalidUtf8 { id: u64 },
}

/// Ordinary misses: the image is fine, the thing asked for is not in it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Path resolution requires an absolute path
    #[error("path is not absolute: '{path}'")]
    NotAbsolute { path: String },

    /// No entry with this name under the given parent
    #[error("no such entry: '{path}'")]
    NotFound { path: String },
}

/// The image parsed, but an internal reference does not hold.
///
/// These indicate corruption or a reader/writer version mismatch; the
/// remaining data cannot be trusted, so they are not recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    /// An id referenced by the directory index or a caller has no record
    #[error("inode {id} is referenced but not present in the inode table")]
    UnknownInode { id: u64 },

    /// The root inode record is absent
    #[error("root inode {id} is not present in the inode table")]
    MissingRoot { id: u64 },

    /// A permission or name field pointed outside the string table
    #[error("string table has no entry for id {id}")]
    UnknownString { id: u64 },

    /// A string-table id exceeds the sanity cap
    #[error("string table id {id} exceeds maximum {max}")]
    StringIdTooLarge { id: u64, max: u64 },

    /// A directory entry referenced a reference-list slot that does not exist
    #[error("reference index {index} out of range (list has {len} entries)")]
    ReferenceOutOfRange { index: u64, len: usize },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Image path does not exist or is not a file
    #[error("invalid image path '{path}': {reason}")]
    InvalidImagePath { path: String, reason: String },
}

/// Worker pool errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to construct the traversal thread pool
    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_errors_are_recoverable() {
        let err = ImageError::from(LookupError::NotFound {
            path: "/a/b".into(),
        });
        assert!(err.is_recoverable());
    }

    #[test]
    fn format_and_invariant_errors_are_fatal() {
        let err = ImageError::from(FormatError::MissingSection { name: "INODE" });
        assert!(!err.is_recoverable());

        let err = ImageError::from(InvariantError::UnknownInode { id: 42 });
        assert!(!err.is_recoverable());
    }
}
