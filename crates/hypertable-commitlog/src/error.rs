//! Error types for the commit log subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for commit log operations.
pub type CommitLogResult<T> = Result<T, CommitLogError>;

/// Error variants for commit log reading.
#[derive(Debug, Error)]
pub enum CommitLogError {
    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fragment ended mid-block: torn write from a crashed log writer.
    #[error("truncated commit log fragment {fragment:?}")]
    TruncatedCommitLog {
        /// Path of the damaged fragment.
        fragment: PathBuf,
    },

    /// A trailer probe returned fewer bytes than the fragment length promised.
    #[error("short read probing trailer of fragment {fragment:?}")]
    ResponseTruncated {
        /// Path of the fragment being probed.
        fragment: PathBuf,
    },

    /// A block header carried neither the block magic nor the trailer magic.
    #[error("bad block header in fragment {fragment:?}: {reason}")]
    BadBlockHeader {
        /// Path of the fragment containing the header.
        fragment: PathBuf,
        /// Description of what was wrong.
        reason: String,
    },

    /// Data corruption detected: block checksum mismatch.
    #[error("block checksum mismatch: expected {expected:#x}, actual {actual:#x}")]
    ChecksumMismatch {
        /// The checksum recorded in the block header.
        expected: u32,
        /// The checksum computed over the payload that was read.
        actual: u32,
    },

    /// Compression or decompression failed.
    #[error("codec error: {reason}")]
    Codec {
        /// Description of the codec failure.
        reason: String,
    },

    /// A block header named a compression type this build does not know.
    #[error("unknown compression type {0}")]
    UnknownCompressionType(u16),
}
