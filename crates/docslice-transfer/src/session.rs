//! One end-to-end transfer: wait for the host, open, collect, close
//!
//! The session never aborts early on a slice error. The document is closed
//! exactly once, after every slice request has settled.

use docslice_core::config::ReportOrder;
use docslice_core::{ChunkSize, DocsliceError, FileInfo, FileKind, Slice};
use tracing::{info, warn};

use crate::acquirer::FileAcquirer;
use crate::collector::SliceCollector;
use crate::completion::Completion;
use crate::host::DocumentHost;
use crate::readiness::Readiness;
use crate::reassembly::{Reassembled, Reassembler};
use crate::report::{Report, TransferEvents};
use crate::viewer::ViewerRegistry;

/// Progress callback type (slices_settled, slices_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    pub kind: FileKind,
    pub chunk: ChunkSize,
    pub order: ReportOrder,
    /// Rebuild the document from the received slices
    pub reassemble: bool,
}

impl TransferOptions {
    pub fn new(chunk: ChunkSize) -> Self {
        Self {
            kind: FileKind::Compressed,
            chunk,
            order: ReportOrder::Arrival,
            reassemble: false,
        }
    }
}

/// Result of one transfer
#[derive(Debug)]
pub struct TransferSummary {
    pub report: Report,
    /// `None` when the document could not be opened
    pub info: Option<FileInfo>,
    /// Slice indices in arrival order
    pub received: Vec<u64>,
    /// Failed slice indices with the host message
    pub failed: Vec<(u64, String)>,
    /// Whether the completion marker was emitted
    pub completed: bool,
    /// Whether the document was released successfully
    pub released: bool,
    pub reassembled: Option<Reassembled>,
}

impl TransferSummary {
    pub fn acquired(&self) -> bool {
        self.info.is_some()
    }

    fn not_acquired(report: Report) -> Self {
        Self {
            report,
            info: None,
            received: Vec::new(),
            failed: Vec::new(),
            completed: false,
            released: false,
            reassembled: None,
        }
    }
}

pub struct TransferSession<H> {
    acquirer: FileAcquirer<H>,
    host_ready: Readiness,
    options: TransferOptions,
    progress: Option<ProgressFn>,
}

impl<H: DocumentHost> TransferSession<H> {
    /// A session that starts once `host_ready` is open.
    pub fn new(host: H, host_ready: Readiness, options: TransferOptions) -> Self {
        Self {
            acquirer: FileAcquirer::new(host, options.kind),
            host_ready,
            options,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Run one transfer. Received slices are registered with `viewer` when given.
    pub async fn run(&self, viewer: Option<&ViewerRegistry>) -> TransferSummary {
        self.host_ready.wait().await;

        let mut report = Report::new(self.options.order);
        let file = match self.acquirer.open(self.options.chunk).await {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "transfer not started");
                report.notify(&e);
                return TransferSummary::not_acquired(report);
            }
        };
        let info = file.info();

        let (outcome, reassembler, rejected) = {
            let mut events = SessionEvents {
                report: &mut report,
                viewer,
                reassembler: self
                    .options
                    .reassemble
                    .then(|| Reassembler::new(info, self.options.chunk)),
                rejected: None,
                progress: self.progress.as_ref(),
                total: info.slice_count,
                settled: 0,
            };
            events.on_opened(&info);
            let outcome = SliceCollector::new(&file).collect(&mut events).await;
            (outcome, events.reassembler, events.rejected)
        };

        let released = match file.close().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "releasing document failed");
                report.notify(&e);
                false
            }
        };

        let reassembled = match (reassembler, rejected) {
            (_, Some(e)) => {
                report.notify(&DocsliceError::Other(e));
                None
            }
            (Some(asm), None) if outcome.is_success() => match asm.finish() {
                Ok(doc) => Some(doc),
                Err(e) => {
                    report.notify(&DocsliceError::Other(e));
                    None
                }
            },
            _ => None,
        };

        info!(
            received = outcome.received.len(),
            failed = outcome.failed.len(),
            released,
            "transfer finished"
        );

        TransferSummary {
            completed: report.is_completed(),
            report,
            info: Some(info),
            received: outcome.received,
            failed: outcome.failed,
            released,
            reassembled,
        }
    }
}

/// Fans protocol events out to the report, viewer, reassembler, and progress.
struct SessionEvents<'a> {
    report: &'a mut Report,
    viewer: Option<&'a ViewerRegistry>,
    reassembler: Option<Reassembler>,
    rejected: Option<anyhow::Error>,
    progress: Option<&'a ProgressFn>,
    total: u64,
    settled: u64,
}

impl SessionEvents<'_> {
    fn tick(&mut self, message: &str) {
        self.settled += 1;
        if let Some(progress) = self.progress {
            progress(self.settled, self.total, message);
        }
    }
}

impl TransferEvents for SessionEvents<'_> {
    fn on_opened(&mut self, info: &FileInfo) {
        self.report.on_opened(info);
    }

    fn on_slice(&mut self, slice: &Slice) {
        self.report.on_slice(slice);
        if let Some(viewer) = self.viewer {
            viewer.register(slice);
        }
        if let Some(asm) = self.reassembler.as_mut() {
            if let Err(e) = asm.accept(slice) {
                warn!(index = slice.index, error = %e, "slice rejected for reassembly");
                if self.rejected.is_none() {
                    self.rejected = Some(e);
                }
            }
        }
        self.tick(&format!("slice {}", slice.index + 1));
    }

    fn on_error(&mut self, error: &DocsliceError) {
        self.report.on_error(error);
        self.tick("slice failed");
    }

    fn on_complete(&mut self, completion: &Completion) {
        self.report.on_complete(completion);
    }
}
