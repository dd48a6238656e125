//! docslice-transfer: the slicing protocol between a document host and its consumer
//!
//! Control flow of one transfer:
//!   trigger → `FileAcquirer::open(chunk)` → for each index `SliceCollector`
//!   fetches the slice → every arrival is reported → once every request has
//!   settled the completion marker fires → the open file is closed.
//!
//! # Overview
//! - `host`: the host document API seam (`DocumentHost`, `HostFile`)
//! - `memory`: in-process host serving a byte buffer, with fault injection
//! - `acquirer`: open / close lifecycle of the document handle
//! - `collector`: concurrent slice fetches and the settle barrier
//! - `completion`: counted completion tally
//! - `report`: report entries, notifications, and index-order buffering
//! - `viewer`: per-slice raw data views
//! - `readiness`: one-shot readiness gate
//! - `reassembly`: rebuilds the document from slices in any order
//! - `session`: one end-to-end transfer

pub mod acquirer;
pub mod collector;
pub mod completion;
pub mod host;
pub mod memory;
pub mod readiness;
pub mod reassembly;
pub mod report;
pub mod session;
pub mod viewer;

pub use acquirer::{FileAcquirer, OpenFile};
pub use collector::{CollectOutcome, SliceCollector};
pub use completion::{Completion, CompletionTally};
pub use host::{DocumentHost, GetFileOptions, HostError, HostFile};
pub use memory::{HostStats, MemoryHost};
pub use readiness::Readiness;
pub use reassembly::{Reassembled, Reassembler};
pub use report::{Notification, ReorderBuffer, Report, ReportEntry, TransferEvents};
pub use session::{ProgressFn, TransferOptions, TransferSession, TransferSummary};
pub use viewer::{RawDataView, ViewerRegistry};
