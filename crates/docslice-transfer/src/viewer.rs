//! Raw data views for received slices
//!
//! Each received slice registers a view handler keyed by its index. Opening a
//! view waits for the renderer to become ready, then replaces whatever view
//! was open before. Only one view is open at a time.

use std::collections::BTreeMap;
use std::sync::Mutex;

use docslice_core::Slice;
use tracing::debug;

use crate::readiness::Readiness;

pub const VIEW_TITLE: &str = "Chunk Data";

/// The content shown for one slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataView {
    pub title: &'static str,
    pub index: u64,
    /// Base64 of the slice payload
    pub content: String,
}

#[derive(Debug)]
struct ViewHandler {
    encoded: String,
}

/// Registry of per-slice view handlers
#[derive(Debug)]
pub struct ViewerRegistry {
    handlers: Mutex<BTreeMap<u64, ViewHandler>>,
    open: Mutex<Option<RawDataView>>,
    renderer: Readiness,
}

impl ViewerRegistry {
    /// A registry whose views wait on `renderer` before opening.
    pub fn new(renderer: Readiness) -> Self {
        Self {
            handlers: Mutex::new(BTreeMap::new()),
            open: Mutex::new(None),
            renderer,
        }
    }

    /// Register the view handler for `slice`, replacing any earlier one.
    pub fn register(&self, slice: &Slice) {
        let handler = ViewHandler {
            encoded: slice.encoded(),
        };
        self.handlers.lock().unwrap().insert(slice.index, handler);
    }

    /// Indices that have a view handler, ascending
    pub fn registered(&self) -> Vec<u64> {
        self.handlers.lock().unwrap().keys().copied().collect()
    }

    /// Open the view for slice `index`. Returns `None` if no slice with that
    /// index was registered.
    pub async fn view(&self, index: u64) -> Option<RawDataView> {
        let content = self
            .handlers
            .lock()
            .unwrap()
            .get(&index)
            .map(|h| h.encoded.clone())?;

        self.renderer.wait().await;

        let view = RawDataView {
            title: VIEW_TITLE,
            index,
            content,
        };
        let replaced = self.open.lock().unwrap().replace(view.clone());
        if let Some(previous) = replaced {
            debug!(previous = previous.index, index, "replacing open view");
        }
        Some(view)
    }

    pub fn current(&self) -> Option<RawDataView> {
        self.open.lock().unwrap().clone()
    }

    /// Close the open view, returning it.
    pub fn close_view(&self) -> Option<RawDataView> {
        self.open.lock().unwrap().take()
    }
}
