//! Chunk planning.
//!
//! Pure logic for splitting an object into the ordered byte ranges the
//! workers process. No I/O - just range math.

use crate::error::ArchiveError;

/// One planned byte range of the source object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Zero-based chunk index.
    pub index: u32,
    /// First byte of the range.
    pub start: u64,
    /// One past the last byte of the range.
    pub end: u64,
}

impl ChunkDescriptor {
    /// Length of the range in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// True for the zero-length chunk of an empty object.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The 1-based multipart part number for this chunk.
    pub fn part_number(&self) -> i32 {
        self.index as i32 + 1
    }
}

/// Compute the ordered chunk ranges covering `[0, total_size)`.
///
/// Ranges are contiguous and non-overlapping, every range is
/// `chunk_size` bytes except possibly the last, and indices increase
/// from 0. A zero-byte object yields a single zero-length chunk so that
/// empty objects still produce a valid (empty) archive.
///
/// Deterministic and side-effect free: the same inputs always produce
/// the same plan.
pub fn plan_chunks(total_size: u64, chunk_size: u64) -> Result<Vec<ChunkDescriptor>, ArchiveError> {
    if chunk_size == 0 {
        return Err(ArchiveError::InvalidConfig {
            message: "chunk size must be positive".to_string(),
        });
    }

    if total_size == 0 {
        return Ok(vec![ChunkDescriptor {
            index: 0,
            start: 0,
            end: 0,
        }]);
    }

    let mut chunks = Vec::with_capacity(expected_chunk_count(total_size, chunk_size) as usize);
    let mut start = 0u64;
    let mut index = 0u32;

    while start < total_size {
        let end = std::cmp::min(start + chunk_size, total_size);
        chunks.push(ChunkDescriptor { index, start, end });
        start = end;
        index += 1;
    }

    Ok(chunks)
}

/// The number of chunks `plan_chunks` will produce:
/// `ceil(total_size / chunk_size)`, or 1 for an empty object.
pub fn expected_chunk_count(total_size: u64, chunk_size: u64) -> u64 {
    if total_size == 0 {
        return 1;
    }
    total_size.div_ceil(chunk_size)
}
