//! Slice Collector: fetches every slice of an open document
//!
//! All requests are issued up front in increasing index order and polled
//! concurrently on the current task; responses are handled in whatever order
//! they settle. Each request carries its own index, so a response is always
//! matched to the request that produced it.

use docslice_core::{DocsliceError, DocsliceResult, Slice};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use crate::acquirer::OpenFile;
use crate::completion::CompletionTally;
use crate::host::HostFile;
use crate::report::TransferEvents;

/// What happened to every slice request of one collection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectOutcome {
    /// Indices in the order they arrived
    pub received: Vec<u64>,
    /// Failed indices with the host message, in the order they failed
    pub failed: Vec<(u64, String)>,
    /// Whether the completion tally fired
    pub completed: bool,
}

impl CollectOutcome {
    pub fn is_success(&self) -> bool {
        self.completed && self.failed.is_empty()
    }
}

pub struct SliceCollector<'a, F: HostFile> {
    file: &'a OpenFile<F>,
}

impl<'a, F: HostFile> SliceCollector<'a, F> {
    pub fn new(file: &'a OpenFile<F>) -> Self {
        Self { file }
    }

    /// Fetch one slice. Indices outside `[0, slice_count)` are rejected
    /// without calling the host.
    pub async fn fetch(&self, index: u64) -> DocsliceResult<Slice> {
        let count = self.file.info().slice_count;
        if index >= count {
            return Err(DocsliceError::Slice {
                index,
                message: format!("slice index {index} is out of range (slice count {count})"),
            });
        }

        let slice = self
            .file
            .host_file()
            .get_slice(index)
            .await
            .map_err(|e| DocsliceError::Slice {
                index,
                message: e.message,
            })?;

        if slice.index != index {
            return Err(DocsliceError::Slice {
                index,
                message: format!("host answered request for slice {index} with slice {}", slice.index),
            });
        }
        Ok(slice)
    }

    /// Fetch every slice, reporting each response to `events` as it settles.
    ///
    /// Returns only once every request has settled, successfully or not, so
    /// the caller may close the document afterwards without racing any fetch.
    /// A failed slice never cancels the others.
    pub async fn collect<E: TransferEvents + ?Sized>(&self, events: &mut E) -> CollectOutcome {
        let total = self.file.info().slice_count;
        let mut tally = CompletionTally::new(total);
        let mut outcome = CollectOutcome::default();

        let mut pending: FuturesUnordered<_> = (0..total)
            .map(move |index| async move { (index, self.fetch(index).await) })
            .collect();
        debug!(requests = total, "slice requests issued");

        while let Some((index, result)) = pending.next().await {
            let ok = result.is_ok();
            match result {
                Ok(slice) => {
                    debug!(index, size = slice.size_bytes, "slice received");
                    outcome.received.push(index);
                    events.on_slice(&slice);
                }
                Err(e) => {
                    warn!(index, error = %e, "slice fetch failed");
                    let (_, message) = e.notification();
                    outcome.failed.push((index, message));
                    events.on_error(&e);
                }
            }

            if let Some(completion) = tally.record(index, ok) {
                info!(
                    succeeded = completion.succeeded.len(),
                    failed = completion.failed.len(),
                    "all slice requests settled"
                );
                outcome.completed = true;
                events.on_complete(&completion);
            }
        }

        outcome
    }
}
