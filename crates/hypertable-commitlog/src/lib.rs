#![warn(missing_docs)]

//! Hypertable commit log reader: recovery of a write-ahead log from
//! compressed, numbered fragment files.
//!
//! A commit log is a directory of fragment files named by decimal integer.
//! Each fragment is a sequence of compressed blocks, each preceded by a
//! fixed-length [`header::BlockHeader`]; a terminated fragment ends with a
//! trailer block recording the fragment's final timestamp and codec.
//! [`reader::CommitLogReader`] replays the directory in fragment order,
//! skipping fragments whose trailer timestamp falls before a cutoff.

pub mod compression;
pub mod error;
pub mod fragment;
pub mod header;
pub mod reader;

pub use compression::BlockCodec;
pub use error::{CommitLogError, CommitLogResult};
pub use fragment::{FragmentIndex, LogFragment, Trailer};
pub use header::{BlockHeader, MAGIC_BLOCK, MAGIC_TRAILER};
pub use reader::CommitLogReader;
