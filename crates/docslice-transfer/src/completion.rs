//! Counted completion detection
//!
//! A transfer is complete when every issued slice request has settled,
//! whatever order the responses arrive in. The tally fires exactly once.

use std::collections::BTreeSet;

use tracing::warn;

/// Outcome of a transfer once every request has settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Indices that arrived successfully, ascending
    pub succeeded: Vec<u64>,
    /// Indices whose fetch failed, ascending
    pub failed: Vec<u64>,
}

impl Completion {
    /// True when every slice was retrieved
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
pub struct CompletionTally {
    expected: u64,
    succeeded: BTreeSet<u64>,
    failed: BTreeSet<u64>,
    fired: bool,
}

impl CompletionTally {
    pub fn new(expected: u64) -> Self {
        Self {
            expected,
            succeeded: BTreeSet::new(),
            failed: BTreeSet::new(),
            fired: false,
        }
    }

    /// Record that the request for `index` settled.
    ///
    /// Returns the completion when this response settles the last outstanding
    /// request, and `None` otherwise (including for every later call).
    pub fn record(&mut self, index: u64, ok: bool) -> Option<Completion> {
        if index >= self.expected {
            warn!(index, expected = self.expected, "ignoring response for unknown slice");
            return None;
        }
        if self.succeeded.contains(&index) || self.failed.contains(&index) {
            warn!(index, "ignoring duplicate response for slice");
            return None;
        }

        if ok {
            self.succeeded.insert(index);
        } else {
            self.failed.insert(index);
        }

        if self.fired || self.settled() < self.expected {
            return None;
        }
        self.fired = true;
        Some(Completion {
            succeeded: self.succeeded.iter().copied().collect(),
            failed: self.failed.iter().copied().collect(),
        })
    }

    pub fn settled(&self) -> u64 {
        (self.succeeded.len() + self.failed.len()) as u64
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    pub fn is_complete(&self) -> bool {
        self.fired
    }
}
