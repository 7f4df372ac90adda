//! Fragment discovery and trailer probing for a commit log directory.
//!
//! A log directory contains fragment files named by decimal integer, written
//! in sequence by the (out-of-process) log writer. Discovery tolerates
//! foreign files and torn fragments: non-numeric names are ignored, files
//! too short to hold even one block header are dropped, and a fragment whose
//! tail does not decode to a trailer is treated as unterminated.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{CommitLogError, CommitLogResult};
use crate::header::{BlockHeader, MAGIC_TRAILER};

/// Trailer metadata recorded at the tail of a terminated fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// The fragment's final timestamp (nanoseconds since the epoch).
    pub timestamp: u64,
    /// Wire id of the codec used for the fragment's blocks.
    pub compression_type: u16,
}

/// One fragment file of a commit log.
#[derive(Debug, Clone)]
pub struct LogFragment {
    /// The fragment's sequence number, parsed from its filename.
    pub number: u32,
    /// Absolute path of the fragment file.
    pub path: PathBuf,
    /// Trailer metadata, or `None` when the fragment is unterminated.
    pub trailer: Option<Trailer>,
}

impl LogFragment {
    /// The timestamp used for cutoff comparisons: the trailer timestamp for
    /// terminated fragments, 0 (always replayed) otherwise.
    pub fn effective_timestamp(&self) -> u64 {
        self.trailer.map(|t| t.timestamp).unwrap_or(0)
    }
}

/// Discovers and orders the fragments of a commit log directory.
pub struct FragmentIndex;

impl FragmentIndex {
    /// Scans `log_dir` and returns its fragments sorted ascending by number.
    ///
    /// Each fragment's trailer is probed; fragments shorter than one block
    /// header are dropped.
    pub fn scan(log_dir: &Path) -> CommitLogResult<Vec<LogFragment>> {
        let mut fragments = Vec::new();

        for entry in std::fs::read_dir(log_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = match file_name.to_str() {
                Some(name) => name,
                None => {
                    warn!(dir = %log_dir.display(), "non-UTF-8 file name in commit log directory");
                    continue;
                }
            };
            let number: u32 = match name.parse() {
                Ok(number) => number,
                Err(_) => {
                    warn!(
                        file = name,
                        dir = %log_dir.display(),
                        "invalid file in commit log directory"
                    );
                    continue;
                }
            };

            let path = entry.path();
            let len = entry.metadata()?.len();
            if len < BlockHeader::LENGTH as u64 {
                warn!(
                    file = name,
                    len,
                    "commit log fragment shorter than a block header, skipping"
                );
                continue;
            }

            let trailer = read_trailer(&path, len)?;
            debug!(
                file = name,
                timestamp = trailer.map(|t| t.timestamp).unwrap_or(0),
                terminated = trailer.is_some(),
                "found commit log fragment"
            );
            fragments.push(LogFragment {
                number,
                path,
                trailer,
            });
        }

        fragments.sort_by_key(|f| f.number);
        Ok(fragments)
    }
}

/// Reads the final block header of a fragment and interprets it as a
/// trailer. Returns `None` when the tail does not carry the trailer magic
/// (the writer crashed before sealing the fragment).
fn read_trailer(path: &Path, len: u64) -> CommitLogResult<Option<Trailer>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(len - BlockHeader::LENGTH as u64))?;

    let mut buf = [0u8; BlockHeader::LENGTH];
    if let Err(err) = file.read_exact(&mut buf) {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(CommitLogError::ResponseTruncated {
                fragment: path.to_path_buf(),
            });
        }
        return Err(err.into());
    }

    let header = BlockHeader::decode(&buf)?;
    if header.magic == MAGIC_TRAILER {
        Ok(Some(Trailer {
            timestamp: header.timestamp,
            compression_type: header.compression_type,
        }))
    } else {
        Ok(None)
    }
}
