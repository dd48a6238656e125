//! Rebuild a document from slices received in any order

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use bytes::{Bytes, BytesMut};
use docslice_core::types::expected_slice_len;
use docslice_core::{ChunkSize, FileInfo, Slice};

/// A fully reassembled document
#[derive(Debug, Clone)]
pub struct Reassembled {
    pub data: Bytes,
    pub blake3: blake3::Hash,
}

impl Reassembled {
    pub fn blake3_hex(&self) -> String {
        self.blake3.to_hex().to_string()
    }
}

#[derive(Debug)]
pub struct Reassembler {
    info: FileInfo,
    chunk: ChunkSize,
    slices: BTreeMap<u64, Bytes>,
}

impl Reassembler {
    pub fn new(info: FileInfo, chunk: ChunkSize) -> Self {
        Self {
            info,
            chunk,
            slices: BTreeMap::new(),
        }
    }

    /// Accept one slice. Rejects out-of-range indices, unexpected lengths,
    /// and duplicates.
    pub fn accept(&mut self, slice: &Slice) -> Result<()> {
        let Some(expected) = expected_slice_len(self.info.size_bytes, self.chunk, slice.index)
        else {
            bail!(
                "slice {} is out of range (slice count {})",
                slice.index,
                self.info.slice_count
            );
        };
        if slice.payload.len() as u64 != expected {
            bail!(
                "slice {} has {} bytes, expected {}",
                slice.index,
                slice.payload.len(),
                expected
            );
        }
        if self.slices.contains_key(&slice.index) {
            bail!("slice {} received twice", slice.index);
        }
        self.slices.insert(slice.index, slice.payload.clone());
        Ok(())
    }

    /// Indices not yet accepted, ascending
    pub fn missing(&self) -> Vec<u64> {
        (0..self.info.slice_count)
            .filter(|i| !self.slices.contains_key(i))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slices.len() as u64 == self.info.slice_count
    }

    /// Concatenate every slice in index order.
    pub fn finish(self) -> Result<Reassembled> {
        let missing = self.missing();
        if !missing.is_empty() {
            bail!("cannot reassemble: missing slices {:?}", missing);
        }

        let mut data = BytesMut::with_capacity(self.info.size_bytes as usize);
        for payload in self.slices.values() {
            data.extend_from_slice(payload);
        }
        let data = data.freeze();
        let blake3 = blake3::hash(&data);
        Ok(Reassembled { data, blake3 })
    }
}
