//! Fixed-length block headers for commit log fragments.
//!
//! Every block in a fragment begins with a [`BlockHeader`]: a 10-byte magic,
//! the codec id, a CRC32C of the compressed payload, the payload lengths,
//! and a timestamp. A header whose magic is [`MAGIC_TRAILER`] terminates the
//! fragment; its timestamp field records the newest cell timestamp the
//! fragment contains and its compression type names the fragment's codec.

use crate::error::{CommitLogError, CommitLogResult};

/// Magic prefix of an ordinary data block.
pub const MAGIC_BLOCK: [u8; 10] = *b"COMLOGBLK\0";

/// Magic prefix of the trailer block terminating a fragment.
pub const MAGIC_TRAILER: [u8; 10] = *b"COMLOGTRL\0";

/// Header preceding every block in a commit log fragment.
///
/// Encoded little-endian with a fixed layout; [`BlockHeader::LENGTH`] is the
/// exact on-disk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block magic: [`MAGIC_BLOCK`] for data, [`MAGIC_TRAILER`] for trailers.
    pub magic: [u8; 10],
    /// Codec id used to compress the payload (see [`crate::BlockCodec`]).
    pub compression_type: u16,
    /// CRC32C of the compressed payload bytes.
    pub checksum: u32,
    /// Payload length after decompression.
    pub uncompressed_length: u32,
    /// Payload length on disk.
    pub compressed_length: u32,
    /// Newest cell timestamp covered, in nanoseconds since the epoch.
    /// In a trailer this is the whole fragment's final timestamp.
    pub timestamp: u64,
}

impl BlockHeader {
    /// Exact encoded size in bytes.
    pub const LENGTH: usize = 32;

    /// Builds a data block header.
    pub fn new_block(compression_type: u16, timestamp: u64) -> Self {
        Self {
            magic: MAGIC_BLOCK,
            compression_type,
            checksum: 0,
            uncompressed_length: 0,
            compressed_length: 0,
            timestamp,
        }
    }

    /// Builds a trailer header for a fragment ending at `timestamp`.
    pub fn new_trailer(compression_type: u16, timestamp: u64) -> Self {
        Self {
            magic: MAGIC_TRAILER,
            compression_type,
            checksum: 0,
            uncompressed_length: 0,
            compressed_length: 0,
            timestamp,
        }
    }

    /// Returns true if this header carries the trailer magic.
    pub fn is_trailer(&self) -> bool {
        self.magic == MAGIC_TRAILER
    }

    /// Returns true if this header carries the data block magic.
    pub fn is_block(&self) -> bool {
        self.magic == MAGIC_BLOCK
    }

    /// Encodes the header into its fixed 32-byte representation.
    pub fn encode(&self) -> [u8; Self::LENGTH] {
        let mut buf = [0u8; Self::LENGTH];
        buf[0..10].copy_from_slice(&self.magic);
        buf[10..12].copy_from_slice(&self.compression_type.to_le_bytes());
        buf[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf[16..20].copy_from_slice(&self.uncompressed_length.to_le_bytes());
        buf[20..24].copy_from_slice(&self.compressed_length.to_le_bytes());
        buf[24..32].copy_from_slice(&self.timestamp.to_le_bytes());
        buf
    }

    /// Decodes a header from the first [`Self::LENGTH`] bytes of `buf`.
    ///
    /// Magic bytes are not validated here; callers decide whether an
    /// unrecognized magic is a trailer probe miss or corruption.
    pub fn decode(buf: &[u8]) -> CommitLogResult<Self> {
        if buf.len() < Self::LENGTH {
            return Err(CommitLogError::Codec {
                reason: format!(
                    "block header needs {} bytes, got {}",
                    Self::LENGTH,
                    buf.len()
                ),
            });
        }
        let mut magic = [0u8; 10];
        magic.copy_from_slice(&buf[0..10]);
        Ok(Self {
            magic,
            compression_type: u16::from_le_bytes([buf[10], buf[11]]),
            checksum: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            uncompressed_length: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            compressed_length: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
            timestamp: u64::from_le_bytes([
                buf[24], buf[25], buf[26], buf[27], buf[28], buf[29], buf[30], buf[31],
            ]),
        })
    }
}

/// Generates the CRC32C lookup table at compile time.
const fn make_crc32c_table() -> [u32; 256] {
    const POLY: u32 = 0x82F63B78;
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
}

/// CRC32C over `data` using the standard Castagnoli polynomial.
pub fn crc32c(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = make_crc32c_table();
    let mut crc: u32 = !0;
    for &byte in data {
        let idx = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ TABLE[idx];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_length_matches_encoding() {
        let header = BlockHeader::new_block(1, 42);
        assert_eq!(header.encode().len(), BlockHeader::LENGTH);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let header = BlockHeader {
            magic: MAGIC_BLOCK,
            compression_type: 2,
            checksum: 0xDEADBEEF,
            uncompressed_length: 65536,
            compressed_length: 4711,
            timestamp: 1_700_000_000_000_000_000,
        };
        let decoded = BlockHeader::decode(&header.encode()).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_trailer_magic_detection() {
        let trailer = BlockHeader::new_trailer(1, 100);
        assert!(trailer.is_trailer());
        assert!(!trailer.is_block());

        let block = BlockHeader::new_block(1, 100);
        assert!(block.is_block());
        assert!(!block.is_trailer());
    }

    #[test]
    fn test_decode_short_buffer_fails() {
        let buf = [0u8; BlockHeader::LENGTH - 1];
        assert!(BlockHeader::decode(&buf).is_err());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let header = BlockHeader::new_block(0, 7);
        let mut buf = header.encode().to_vec();
        buf.extend_from_slice(b"payload follows");
        assert_eq!(BlockHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_crc32c_known_vector() {
        // "123456789" is the standard CRC32C check input.
        assert_eq!(crc32c(b"123456789"), 0xE3069283);
    }

    #[test]
    fn test_crc32c_empty() {
        assert_eq!(crc32c(b""), 0);
    }

    proptest! {
        #[test]
        fn prop_header_roundtrip(
            compression_type in any::<u16>(),
            checksum in any::<u32>(),
            uncompressed_length in any::<u32>(),
            compressed_length in any::<u32>(),
            timestamp in any::<u64>(),
        ) {
            let header = BlockHeader {
                magic: MAGIC_BLOCK,
                compression_type,
                checksum,
                uncompressed_length,
                compressed_length,
                timestamp,
            };
            let decoded = BlockHeader::decode(&header.encode()).unwrap();
            prop_assert_eq!(header, decoded);
        }
    }
}
