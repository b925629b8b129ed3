//! Journal frame format.
//!
//! ```text
//! +-------+---------+--------+---------+-------+
//! | magic | version | length | payload | crc32 |
//! |  4 B  |  2 B LE | 4 B LE |  len B  | 4 B LE|
//! +-------+---------+--------+---------+-------+
//! ```
//!
//! The CRC covers header and payload. A frame cut short at the end of the
//! journal (a crash during append) ends iteration silently; any other
//! damage is reported as an error.

use crate::error::{StorageError, StorageResult};

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"ESJL";

/// Current frame format version.
pub const FRAME_VERSION: u16 = 1;

const HEADER_SIZE: usize = 4 + 2 + 4;
const CRC_SIZE: usize = 4;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

/// Wraps a payload in a frame.
///
/// # Errors
///
/// Returns [`StorageError::FrameTooLarge`] if the payload does not fit the
/// 4-byte length field.
pub fn encode_frame(payload: &[u8]) -> StorageResult<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(StorageError::FrameTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    buf.extend_from_slice(&FRAME_MAGIC);
    buf.extend_from_slice(&FRAME_VERSION.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    let crc = compute_crc32(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

/// Iterates over the payloads of a framed journal.
#[derive(Debug)]
pub struct FrameReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    finished: bool,
}

impl<'a> FrameReader<'a> {
    /// Creates a reader over the full journal contents.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            finished: false,
        }
    }

    /// Offset of the next unread frame.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos as u64
    }

    fn read_frame(&mut self) -> StorageResult<Option<Vec<u8>>> {
        let offset = self.pos as u64;
        let rest = &self.bytes[self.pos..];

        if rest.len() < HEADER_SIZE {
            return Ok(None);
        }

        if rest[..4] != FRAME_MAGIC {
            return Err(StorageError::corrupted(offset, "invalid magic"));
        }

        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version > FRAME_VERSION {
            return Err(StorageError::corrupted(
                offset,
                format!("unsupported frame version {version}"),
            ));
        }

        let len = u32::from_le_bytes([rest[6], rest[7], rest[8], rest[9]]) as usize;
        let total = HEADER_SIZE + len + CRC_SIZE;
        if rest.len() < total {
            // Torn write at the tail.
            return Ok(None);
        }

        let body_end = HEADER_SIZE + len;
        let stored = u32::from_le_bytes([
            rest[body_end],
            rest[body_end + 1],
            rest[body_end + 2],
            rest[body_end + 3],
        ]);
        let computed = compute_crc32(&rest[..body_end]);
        if stored != computed {
            return Err(StorageError::ChecksumMismatch {
                offset,
                expected: stored,
                actual: computed,
            });
        }

        self.pos += total;
        Ok(Some(rest[HEADER_SIZE..body_end].to_vec()))
    }
}

impl Iterator for FrameReader<'_> {
    type Item = StorageResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(payload)) => Some(Ok(payload)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// CRC32 (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ TABLE[index];
    }
    !crc
}
