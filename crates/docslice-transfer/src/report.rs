//! Transfer report: the ordered, human-readable record of one transfer
//!
//! Entries are appended only by successful protocol callbacks. Errors go to
//! a separate notification list, one per failure, carrying the host message.

use std::collections::BTreeMap;
use std::fmt;

use docslice_core::config::ReportOrder;
use docslice_core::units::{format_kb, format_mb};
use docslice_core::{DocsliceError, FileInfo, Slice};
use serde::Serialize;

use crate::completion::Completion;

/// Receiver of protocol events, in the order the protocol produces them
pub trait TransferEvents {
    fn on_opened(&mut self, _info: &FileInfo) {}

    fn on_slice(&mut self, _slice: &Slice) {}

    fn on_error(&mut self, _error: &DocsliceError) {}

    fn on_complete(&mut self, _completion: &Completion) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum ReportEntry {
    FileSize { bytes: u64 },
    SliceCount { count: u64 },
    SliceSent { index: u64, size_bytes: u64 },
    Completed,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportEntry::FileSize { bytes } => {
                write!(f, "Total file size: {} MB", format_mb(*bytes))
            }
            ReportEntry::SliceCount { count } => write!(f, "Number of slices: {count}"),
            ReportEntry::SliceSent { index, size_bytes } => {
                write!(f, "Sending slice {}: {} KB", index + 1, format_kb(*size_bytes))
            }
            ReportEntry::Completed => f.write_str("File has been sent!"),
        }
    }
}

/// A user-visible error notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl From<&DocsliceError> for Notification {
    fn from(error: &DocsliceError) -> Self {
        let (title, message) = error.notification();
        Self {
            title: title.to_string(),
            message,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Holds early slices back until every lower index has been released or
/// has failed, so slice entries come out in index order.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next: u64,
    pending: BTreeMap<u64, Option<u64>>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept slice `index` of `size_bytes`; returns `(index, size)` pairs now
    /// releasable, in index order.
    pub fn push(&mut self, index: u64, size_bytes: u64) -> Vec<(u64, u64)> {
        self.pending.insert(index, Some(size_bytes));
        self.drain()
    }

    /// Mark `index` as failed so it no longer holds back later slices.
    pub fn skip(&mut self, index: u64) -> Vec<(u64, u64)> {
        self.pending.insert(index, None);
        self.drain()
    }

    /// Number of slices waiting on a lower index
    pub fn held(&self) -> usize {
        self.pending.values().filter(|v| v.is_some()).count()
    }

    fn drain(&mut self) -> Vec<(u64, u64)> {
        let mut released = Vec::new();
        while let Some(entry) = self.pending.remove(&self.next) {
            if let Some(size) = entry {
                released.push((self.next, size));
            }
            self.next += 1;
        }
        released
    }
}

/// Append-only report of one transfer
#[derive(Debug, Default)]
pub struct Report {
    entries: Vec<ReportEntry>,
    notifications: Vec<Notification>,
    reorder: Option<ReorderBuffer>,
}

impl Report {
    pub fn new(order: ReportOrder) -> Self {
        Self {
            entries: Vec::new(),
            notifications: Vec::new(),
            reorder: match order {
                ReportOrder::Arrival => None,
                ReportOrder::Index => Some(ReorderBuffer::new()),
            },
        }
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Display lines of every entry, in report order
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    /// Slice indices in the order their entries were written
    pub fn slice_order(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                ReportEntry::SliceSent { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn is_completed(&self) -> bool {
        self.entries.contains(&ReportEntry::Completed)
    }

    /// Record a notification that is not tied to a protocol event.
    pub fn notify(&mut self, error: &DocsliceError) {
        self.notifications.push(Notification::from(error));
    }

    fn push_slices(&mut self, released: Vec<(u64, u64)>) {
        self.entries.extend(
            released
                .into_iter()
                .map(|(index, size_bytes)| ReportEntry::SliceSent { index, size_bytes }),
        );
    }
}

impl TransferEvents for Report {
    fn on_opened(&mut self, info: &FileInfo) {
        self.entries.push(ReportEntry::FileSize {
            bytes: info.size_bytes,
        });
        self.entries.push(ReportEntry::SliceCount {
            count: info.slice_count,
        });
    }

    fn on_slice(&mut self, slice: &Slice) {
        let released = match self.reorder.as_mut() {
            Some(buffer) => buffer.push(slice.index, slice.size_bytes),
            None => vec![(slice.index, slice.size_bytes)],
        };
        self.push_slices(released);
    }

    fn on_error(&mut self, error: &DocsliceError) {
        if let (Some(buffer), DocsliceError::Slice { index, .. }) = (self.reorder.as_mut(), error) {
            let released = buffer.skip(*index);
            self.push_slices(released);
        }
        self.notify(error);
    }

    fn on_complete(&mut self, completion: &Completion) {
        if completion.is_success() {
            self.entries.push(ReportEntry::Completed);
        }
    }
}
