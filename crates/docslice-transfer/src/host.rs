//! Host document API
//!
//! The host owns the document and only hands it out in slices. Every call is
//! asynchronous and settles with either a value or a host-provided message.

use std::future::Future;

use docslice_core::{ChunkSize, FileInfo, FileKind, Slice};
use thiserror::Error;

/// Failure reported by the host, carrying its message verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Options for `DocumentHost::get_file`
#[derive(Debug, Clone, Copy)]
pub struct GetFileOptions {
    /// Upper bound for each slice
    pub slice_size: ChunkSize,
}

/// A document the host has opened for slicing.
///
/// Shared read-only by every in-flight slice request; `close` releases the
/// host-side resources.
pub trait HostFile {
    fn info(&self) -> FileInfo;

    fn get_slice(&self, index: u64) -> impl Future<Output = Result<Slice, HostError>> + Send;

    fn close(&self) -> impl Future<Output = Result<(), HostError>> + Send;
}

/// The application hosting the document
pub trait DocumentHost {
    type File: HostFile;

    fn get_file(
        &self,
        kind: FileKind,
        options: GetFileOptions,
    ) -> impl Future<Output = Result<Self::File, HostError>> + Send;
}
