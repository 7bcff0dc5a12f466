//! Archive entry codec.
//!
//! Each chunk compresses into one complete gzip member whose FNAME header
//! carries the entry name. Concatenated gzip members form a single valid
//! gzip stream, so completing the multipart session in ascending part
//! order yields one archive that decompresses back to the source object.
//! The single-pass and multipart paths both go through [`compress_chunk`],
//! which keeps their one-chunk outputs byte-identical.

use std::io::Write;

use flate2::{Compression, GzBuilder};

use crate::error::ArchiveError;

/// Content type of the produced archive object.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

/// Suffix appended to the source key to form the archive key.
pub const ARCHIVE_SUFFIX: &str = ".gz";

/// Fixed compression level, applied identically on every path.
const COMPRESSION_LEVEL: u32 = 9;

/// Deterministic entry name for a chunk index.
///
/// Derived from the index alone, never from the source object's layout,
/// so re-processing a chunk is name-stable and archive order is index
/// order.
pub fn entry_name(index: u32) -> String {
    format!("chunk_{index}")
}

/// Destination key for a source key: `<prefix><key>.gz`.
pub fn destination_key(output_prefix: &str, source_key: &str) -> String {
    format!("{output_prefix}{source_key}{ARCHIVE_SUFFIX}")
}

/// Compress one chunk's bytes into a self-contained gzip member.
///
/// A zero-length input produces a valid empty member, so empty objects
/// still archive cleanly. The member's mtime field is left at zero,
/// keeping the output deterministic for identical input.
pub fn compress_chunk(index: u32, data: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let mut encoder = GzBuilder::new()
        .filename(entry_name(index))
        .write(Vec::new(), Compression::new(COMPRESSION_LEVEL));

    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| ArchiveError::Compression {
            index,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    #[test]
    fn test_entry_name_from_index() {
        assert_eq!(entry_name(0), "chunk_0");
        assert_eq!(entry_name(42), "chunk_42");
    }

    #[test]
    fn test_destination_key() {
        assert_eq!(
            destination_key("processed/", "uploads/data.bin"),
            "processed/uploads/data.bin.gz"
        );
    }

    #[test]
    fn test_member_roundtrips_and_carries_entry_name() {
        let data = b"some chunk payload".repeat(10);
        let member = compress_chunk(7, &data).unwrap();

        let mut decoder = GzDecoder::new(member.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();

        assert_eq!(decompressed, data);
        assert_eq!(decoder.header().unwrap().filename(), Some(b"chunk_7".as_slice()));
    }

    #[test]
    fn test_empty_chunk_is_valid_member() {
        let member = compress_chunk(0, b"").unwrap();

        let mut decoder = GzDecoder::new(member.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();

        assert!(decompressed.is_empty());
        assert_eq!(decoder.header().unwrap().filename(), Some(b"chunk_0".as_slice()));
    }

    #[test]
    fn test_compression_is_deterministic() {
        let data = vec![3u8; 4096];
        assert_eq!(compress_chunk(1, &data).unwrap(), compress_chunk(1, &data).unwrap());
    }

    #[test]
    fn test_concatenated_members_decode_as_one_stream() {
        let mut archive = Vec::new();
        archive.extend(compress_chunk(0, b"hello ").unwrap());
        archive.extend(compress_chunk(1, b"world").unwrap());

        let mut decoder = flate2::read::MultiGzDecoder::new(archive.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();

        assert_eq!(decompressed, b"hello world");
    }
}
