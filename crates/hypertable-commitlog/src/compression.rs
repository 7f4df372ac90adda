//! Pluggable block codecs for commit log fragments.
//!
//! The codec for a fragment is named by its trailer; unterminated fragments
//! fall back to [`BlockCodec::None`] until a data block header names one.

use crate::error::{CommitLogError, CommitLogResult};
use crate::header::{crc32c, BlockHeader};

/// Wire id for the no-op codec.
pub const COMPRESSION_NONE: u16 = 0;
/// Wire id for the LZ4 block codec.
pub const COMPRESSION_LZ4: u16 = 1;
/// Wire id for the Zstandard codec.
pub const COMPRESSION_ZSTD: u16 = 2;

const ZSTD_LEVEL: i32 = 3;

/// Block compression codec selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockCodec {
    /// No compression (passthrough).
    #[default]
    None,
    /// LZ4 block format — hot path, cheap to inflate during recovery.
    Lz4,
    /// Zstandard — higher ratio for cold fragments.
    Zstd,
}

impl BlockCodec {
    /// Resolves a wire compression type to a codec.
    pub fn from_wire(compression_type: u16) -> CommitLogResult<Self> {
        match compression_type {
            COMPRESSION_NONE => Ok(BlockCodec::None),
            COMPRESSION_LZ4 => Ok(BlockCodec::Lz4),
            COMPRESSION_ZSTD => Ok(BlockCodec::Zstd),
            other => Err(CommitLogError::UnknownCompressionType(other)),
        }
    }

    /// The wire id this codec writes into block headers.
    pub fn wire_type(&self) -> u16 {
        match self {
            BlockCodec::None => COMPRESSION_NONE,
            BlockCodec::Lz4 => COMPRESSION_LZ4,
            BlockCodec::Zstd => COMPRESSION_ZSTD,
        }
    }

    /// Compresses `data`, filling in the header's checksum and length fields.
    pub fn deflate(&self, data: &[u8], header: &mut BlockHeader) -> CommitLogResult<Vec<u8>> {
        let compressed = match self {
            BlockCodec::None => data.to_vec(),
            BlockCodec::Lz4 => lz4_flex::block::compress(data),
            BlockCodec::Zstd => zstd::encode_all(data, ZSTD_LEVEL).map_err(|e| {
                CommitLogError::Codec {
                    reason: format!("zstd compression failed: {e}"),
                }
            })?,
        };
        header.compression_type = self.wire_type();
        header.checksum = crc32c(&compressed);
        header.uncompressed_length = data.len() as u32;
        header.compressed_length = compressed.len() as u32;
        Ok(compressed)
    }

    /// Decompresses a block payload, verifying checksum and length against
    /// the header it was read with.
    pub fn inflate(&self, zbuf: &[u8], header: &BlockHeader) -> CommitLogResult<Vec<u8>> {
        let actual = crc32c(zbuf);
        if actual != header.checksum {
            return Err(CommitLogError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let out = match self {
            BlockCodec::None => zbuf.to_vec(),
            BlockCodec::Lz4 => {
                lz4_flex::block::decompress(zbuf, header.uncompressed_length as usize).map_err(
                    |e| CommitLogError::Codec {
                        reason: format!("lz4 decompression failed: {e}"),
                    },
                )?
            }
            BlockCodec::Zstd => zstd::decode_all(zbuf).map_err(|e| CommitLogError::Codec {
                reason: format!("zstd decompression failed: {e}"),
            })?,
        };

        if out.len() != header.uncompressed_length as usize {
            return Err(CommitLogError::Codec {
                reason: format!(
                    "inflated to {} bytes, header promised {}",
                    out.len(),
                    header.uncompressed_length
                ),
            });
        }
        Ok(out)
    }
}
