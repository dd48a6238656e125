use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{DocsliceError, DocsliceResult};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// How the host should hand out the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// The whole document as opaque binary (the only kind a presentation supports)
    #[default]
    Compressed,
    /// UTF-8 text content
    Text,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Compressed => f.write_str("compressed"),
            FileKind::Text => f.write_str("text"),
        }
    }
}

/// Upper bound on the size of one slice, in bytes. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ChunkSize(u64);

impl ChunkSize {
    pub fn from_bytes(bytes: u64) -> DocsliceResult<Self> {
        if bytes == 0 {
            return Err(DocsliceError::InvalidChunkSize(
                "chunk size must be at least one byte".into(),
            ));
        }
        Ok(Self(bytes))
    }

    /// Convert a UI value in megabytes to a byte-sized chunk.
    pub fn from_megabytes(mb: f64) -> DocsliceResult<Self> {
        if !mb.is_finite() || mb <= 0.0 {
            return Err(DocsliceError::InvalidChunkSize(format!(
                "{mb} MB is not a positive size"
            )));
        }
        let bytes = (mb * BYTES_PER_MB).floor();
        if bytes > u64::MAX as f64 {
            return Err(DocsliceError::InvalidChunkSize(format!(
                "{mb} MB is too large"
            )));
        }
        Self::from_bytes(bytes as u64)
    }

    pub fn bytes(self) -> u64 {
        self.0
    }
}

/// What the host reports once a document is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub size_bytes: u64,
    pub slice_count: u64,
}

impl FileInfo {
    /// Info for a document of `size_bytes` partitioned at `chunk`.
    pub fn partitioned(size_bytes: u64, chunk: ChunkSize) -> Self {
        Self {
            size_bytes,
            slice_count: expected_slice_count(size_bytes, chunk),
        }
    }
}

/// One contiguous fragment of an open document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// Zero-based index, echoed back by the host
    pub index: u64,
    pub size_bytes: u64,
    pub payload: Bytes,
}

impl Slice {
    pub fn new(index: u64, payload: Bytes) -> Self {
        Self {
            index,
            size_bytes: payload.len() as u64,
            payload,
        }
    }

    /// Standard base64 of the payload, for display or transport
    pub fn encoded(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.payload)
    }
}

/// Number of slices a document of `size_bytes` splits into. Never zero:
/// an empty document is still one (empty) slice.
pub fn expected_slice_count(size_bytes: u64, chunk: ChunkSize) -> u64 {
    size_bytes.div_ceil(chunk.bytes()).max(1)
}

/// Byte length of slice `index`, or `None` if the index is out of range.
///
/// Every slice is `chunk` bytes except the last, which holds the remainder.
pub fn expected_slice_len(size_bytes: u64, chunk: ChunkSize, index: u64) -> Option<u64> {
    if index >= expected_slice_count(size_bytes, chunk) {
        return None;
    }
    let start = index * chunk.bytes();
    Some((size_bytes - start).min(chunk.bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_chunk_rejected() {
        assert!(ChunkSize::from_bytes(0).is_err());
        assert!(ChunkSize::from_megabytes(0.0).is_err());
        assert!(ChunkSize::from_megabytes(-1.0).is_err());
        assert!(ChunkSize::from_megabytes(f64::NAN).is_err());
    }

    #[test]
    fn megabytes_convert_to_bytes() {
        assert_eq!(ChunkSize::from_megabytes(4.0).unwrap().bytes(), 4_194_304);
        assert_eq!(ChunkSize::from_megabytes(0.25).unwrap().bytes(), 262_144);
    }

    #[test]
    fn four_mb_over_ten_million_bytes() {
        let chunk = ChunkSize::from_bytes(4_194_304).unwrap();
        let info = FileInfo::partitioned(10_000_000, chunk);
        assert_eq!(info.slice_count, 3);

        let lens: Vec<u64> = (0..3)
            .map(|i| expected_slice_len(10_000_000, chunk, i).unwrap())
            .collect();
        assert_eq!(lens, vec![4_194_304, 4_194_304, 1_611_392]);
        assert_eq!(expected_slice_len(10_000_000, chunk, 3), None);
    }

    #[test]
    fn empty_document_is_one_slice() {
        let chunk = ChunkSize::from_bytes(1024).unwrap();
        assert_eq!(expected_slice_count(0, chunk), 1);
        assert_eq!(expected_slice_len(0, chunk, 0), Some(0));
    }

    #[test]
    fn slice_encodes_base64() {
        let slice = Slice::new(0, Bytes::from_static(b"hello"));
        assert_eq!(slice.size_bytes, 5);
        assert_eq!(slice.encoded(), "aGVsbG8=");
    }

    #[test]
    fn file_kind_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: FileKind,
        }
        let w: Wrapper = toml::from_str("kind = \"text\"").unwrap();
        assert_eq!(w.kind, FileKind::Text);
    }

    proptest! {
        #[test]
        fn slice_lengths_sum_to_size(size in 0u64..=10_000_000, chunk in 1024u64..=5_000_000) {
            let chunk = ChunkSize::from_bytes(chunk).unwrap();
            let count = expected_slice_count(size, chunk);
            prop_assert!(count >= 1);
            let total: u64 = (0..count)
                .map(|i| expected_slice_len(size, chunk, i).unwrap())
                .sum();
            prop_assert_eq!(total, size);
        }

        #[test]
        fn no_slice_exceeds_chunk(size in 0u64..=1_000_000, chunk in 256u64..=100_000) {
            let chunk = ChunkSize::from_bytes(chunk).unwrap();
            for i in 0..expected_slice_count(size, chunk) {
                prop_assert!(expected_slice_len(size, chunk, i).unwrap() <= chunk.bytes());
            }
        }
    }
}
