//! Sequential block reader over a commit log directory.
//!
//! [`CommitLogReader`] replays the blocks of every eligible fragment in
//! (fragment number, intra-fragment) order. A cutoff timestamp passed to
//! [`CommitLogReader::initialize_read`] skips terminated fragments whose
//! trailer timestamp is older than the cutoff; unterminated fragments are
//! always replayed. Read failures are sticky: the damaged fragment is
//! abandoned, the error is recorded on the reader, and the next
//! `initialize_read` pass resumes from the following fragment.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::compression::{BlockCodec, COMPRESSION_NONE};
use crate::error::{CommitLogError, CommitLogResult};
use crate::fragment::{FragmentIndex, LogFragment};
use crate::header::BlockHeader;

const READAHEAD_BUFFER_SIZE: usize = 131072;

/// Reads a commit log directory block by block.
pub struct CommitLogReader {
    log_dir: PathBuf,
    fragments: Vec<LogFragment>,
    cursor: usize,
    current: Option<BufReader<File>>,
    codec: BlockCodec,
    codec_from_trailer: bool,
    cutoff: u64,
    error: Option<CommitLogError>,
}

impl CommitLogReader {
    /// Opens a commit log directory, discovering and ordering its fragments.
    ///
    /// The reader starts positioned at the first fragment with a cutoff of 0
    /// (replay everything); call [`Self::initialize_read`] to change that.
    pub fn open(log_dir: impl AsRef<Path>) -> CommitLogResult<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        info!(dir = %log_dir.display(), "opening commit log");
        let fragments = FragmentIndex::scan(&log_dir)?;
        Ok(Self {
            log_dir,
            fragments,
            cursor: 0,
            current: None,
            codec: BlockCodec::None,
            codec_from_trailer: false,
            cutoff: 0,
            error: None,
        })
    }

    /// Starts a read pass: fragments whose trailer timestamp is nonzero and
    /// strictly less than `cutoff` will be skipped. Clears any sticky error
    /// and rewinds to the first fragment.
    pub fn initialize_read(&mut self, cutoff: u64) {
        self.cutoff = cutoff;
        self.cursor = 0;
        self.current = None;
        self.error = None;
    }

    /// The sticky error from the most recent failed read, if any.
    pub fn error(&self) -> Option<&CommitLogError> {
        self.error.as_ref()
    }

    /// The discovered fragments, ascending by number.
    pub fn fragments(&self) -> &[LogFragment] {
        &self.fragments
    }

    /// Logs one line of metadata per fragment, for operator inspection.
    pub fn log_fragment_metadata(&self) {
        for fragment in &self.fragments {
            info!(
                number = fragment.number,
                path = %fragment.path.display(),
                timestamp = fragment.effective_timestamp(),
                terminated = fragment.trailer.is_some(),
                "commit log fragment"
            );
        }
    }

    /// Returns the next uncompressed block and its header, or `None` when
    /// the log is exhausted or a read failed (check [`Self::error`]).
    pub fn next_block(&mut self) -> Option<(Vec<u8>, BlockHeader)> {
        loop {
            if self.current.is_none() && !self.open_next_fragment()? {
                return None;
            }

            let fragment_path = self.fragments[self.cursor].path.clone();
            let reader = self.current.as_mut()?;

            // Block header. Zero bytes at a block boundary is the clean end
            // of an unterminated fragment, not a torn write.
            let mut header_buf = [0u8; BlockHeader::LENGTH];
            let nread = match read_fully(reader, &mut header_buf) {
                Ok(n) => n,
                Err(err) => return self.fail(err.into()),
            };
            if nread == 0 {
                self.advance_fragment();
                continue;
            }
            if nread < BlockHeader::LENGTH {
                warn!(fragment = %fragment_path.display(), "short read of commit log block header");
                return self.fail(CommitLogError::TruncatedCommitLog {
                    fragment: fragment_path,
                });
            }

            let header = match BlockHeader::decode(&header_buf) {
                Ok(header) => header,
                Err(err) => return self.fail(err),
            };
            if header.is_trailer() {
                self.advance_fragment();
                continue;
            }
            if !header.is_block() {
                return self.fail(CommitLogError::BadBlockHeader {
                    fragment: fragment_path,
                    reason: "unrecognized block magic".to_string(),
                });
            }

            // Compressed payload.
            let mut zbuf = vec![0u8; header.compressed_length as usize];
            let nread = match read_fully(reader, &mut zbuf) {
                Ok(n) => n,
                Err(err) => return self.fail(err.into()),
            };
            if nread < zbuf.len() {
                warn!(fragment = %fragment_path.display(), "short read of commit log block payload");
                return self.fail(CommitLogError::TruncatedCommitLog {
                    fragment: fragment_path,
                });
            }

            // An unterminated fragment has no trailer to name its codec;
            // the first compressed block header supplies it.
            if !self.codec_from_trailer && header.compression_type != COMPRESSION_NONE {
                match BlockCodec::from_wire(header.compression_type) {
                    Ok(codec) => {
                        self.codec = codec;
                        self.codec_from_trailer = true;
                    }
                    Err(err) => return self.fail(err),
                }
            }

            match self.codec.inflate(&zbuf, &header) {
                Ok(block) => {
                    debug!(
                        fragment = %fragment_path.display(),
                        len = block.len(),
                        timestamp = header.timestamp,
                        "read commit log block"
                    );
                    return Some((block, header));
                }
                Err(err) => return self.fail(err),
            }
        }
    }

    /// Positions the cursor on the next eligible fragment and opens it.
    /// Returns `Ok(false)` wrapped as `Some(false)` when the log is
    /// exhausted; `None` when opening failed (error recorded).
    fn open_next_fragment(&mut self) -> Option<bool> {
        while self.cursor < self.fragments.len() {
            let timestamp = self.fragments[self.cursor].effective_timestamp();
            if timestamp == 0 || timestamp >= self.cutoff {
                break;
            }
            debug!(
                number = self.fragments[self.cursor].number,
                timestamp,
                cutoff = self.cutoff,
                "skipping commit log fragment before cutoff"
            );
            self.cursor += 1;
        }
        if self.cursor >= self.fragments.len() {
            return Some(false);
        }

        let fragment = &self.fragments[self.cursor];
        match fragment.trailer {
            Some(trailer) => match BlockCodec::from_wire(trailer.compression_type) {
                Ok(codec) => {
                    self.codec = codec;
                    self.codec_from_trailer = true;
                }
                Err(err) => {
                    self.error = Some(err);
                    self.cursor += 1;
                    return None;
                }
            },
            None => {
                self.codec = BlockCodec::None;
                self.codec_from_trailer = false;
            }
        }

        match File::open(&fragment.path) {
            Ok(file) => {
                debug!(
                    number = fragment.number,
                    path = %fragment.path.display(),
                    "reading commit log fragment"
                );
                self.current = Some(BufReader::with_capacity(READAHEAD_BUFFER_SIZE, file));
                Some(true)
            }
            Err(err) => {
                self.error = Some(err.into());
                self.cursor += 1;
                None
            }
        }
    }

    /// Abandons the current fragment and moves to the next.
    fn advance_fragment(&mut self) {
        self.current = None;
        self.cursor += 1;
    }

    /// Records a sticky error, abandons the damaged fragment, and yields
    /// `None` to the caller.
    fn fail(&mut self, err: CommitLogError) -> Option<(Vec<u8>, BlockHeader)> {
        self.advance_fragment();
        self.error = Some(err);
        None
    }
}

impl std::fmt::Debug for CommitLogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLogReader")
            .field("log_dir", &self.log_dir)
            .field("fragments", &self.fragments.len())
            .field("cursor", &self.cursor)
            .field("cutoff", &self.cutoff)
            .finish()
    }
}

/// Reads until `buf` is full or EOF; returns the number of bytes read.
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}
