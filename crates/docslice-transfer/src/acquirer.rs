//! File Acquirer: open / close lifecycle of the host document handle

use docslice_core::{ChunkSize, DocsliceError, DocsliceResult, FileInfo, FileKind};
use tracing::{debug, info, warn};

use crate::host::{DocumentHost, GetFileOptions, HostFile};

/// Opens documents on a host, sliced at a caller-chosen chunk size
#[derive(Debug, Clone)]
pub struct FileAcquirer<H> {
    host: H,
    kind: FileKind,
}

impl<H: DocumentHost> FileAcquirer<H> {
    pub fn new(host: H, kind: FileKind) -> Self {
        Self { host, kind }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Open the document. No retry is attempted on failure.
    pub async fn open(&self, chunk: ChunkSize) -> DocsliceResult<OpenFile<H::File>> {
        debug!(kind = %self.kind, chunk_bytes = chunk.bytes(), "requesting document");

        let file = self
            .host
            .get_file(self.kind, GetFileOptions { slice_size: chunk })
            .await
            .map_err(|e| DocsliceError::Acquisition { message: e.message })?;

        let info = file.info();
        if info.slice_count == 0 {
            // Release what the host allocated before rejecting it.
            if let Err(e) = file.close().await {
                warn!(error = %e, "closing rejected document failed");
            }
            return Err(DocsliceError::Acquisition {
                message: "host reported a document with no slices".into(),
            });
        }

        info!(
            size = info.size_bytes,
            slices = info.slice_count,
            chunk_bytes = chunk.bytes(),
            "document opened"
        );
        Ok(OpenFile {
            file,
            info,
            chunk,
            closed: false,
        })
    }
}

/// An open document handle, owned by the operation that opened it.
///
/// `close` consumes the handle, so it can be released at most once. Dropping
/// it without closing leaks the host-side resources and is logged.
#[derive(Debug)]
pub struct OpenFile<F: HostFile> {
    file: F,
    info: FileInfo,
    chunk: ChunkSize,
    closed: bool,
}

impl<F: HostFile> OpenFile<F> {
    pub fn info(&self) -> FileInfo {
        self.info
    }

    pub fn chunk(&self) -> ChunkSize {
        self.chunk
    }

    pub(crate) fn host_file(&self) -> &F {
        &self.file
    }

    /// Release the host resources held for this document.
    pub async fn close(mut self) -> DocsliceResult<()> {
        self.closed = true;
        match self.file.close().await {
            Ok(()) => {
                debug!(size = self.info.size_bytes, "document closed");
                Ok(())
            }
            Err(e) => Err(DocsliceError::Release { message: e.message }),
        }
    }
}

impl<F: HostFile> Drop for OpenFile<F> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                size = self.info.size_bytes,
                slices = self.info.slice_count,
                "open document dropped without close; host resources leaked"
            );
        }
    }
}
