//! In-process document host
//!
//! Serves a byte buffer through the host API with the host's slicing rules:
//! every slice is `slice_size` bytes except the last. Slice requests settle
//! after a configurable latency, so completions can arrive in any order.
//! Faults can be injected per operation and per slice index, and every call
//! is counted in `HostStats`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use docslice_core::config::HostConfig;
use docslice_core::{ChunkSize, FileInfo, FileKind, Slice};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::host::{DocumentHost, GetFileOptions, HostError, HostFile};

/// Default upper bound for one slice: 4 MiB
pub const DEFAULT_MAX_SLICE_BYTES: u64 = 4 * 1024 * 1024;

/// Call counters shared between a host and the files it opened
#[derive(Debug, Default)]
pub struct HostStats {
    opens: AtomicU64,
    closes: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
    in_flight_at_close: Mutex<Option<u64>>,
    slice_requests: Mutex<BTreeMap<u64, u64>>,
    issue_order: Mutex<Vec<u64>>,
}

impl HostStats {
    /// Number of successful `get_file` calls
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of `close` calls, successful or not
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    /// Requests per slice index
    pub fn slice_requests(&self) -> BTreeMap<u64, u64> {
        self.slice_requests.lock().unwrap().clone()
    }

    pub fn total_slice_requests(&self) -> u64 {
        self.slice_requests.lock().unwrap().values().sum()
    }

    /// Slice indices in the order the requests reached the host
    pub fn issue_order(&self) -> Vec<u64> {
        self.issue_order.lock().unwrap().clone()
    }

    /// Most slice requests that were unsettled at the same time
    pub fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Slice requests still unsettled when the last `close` was called
    pub fn in_flight_at_close(&self) -> Option<u64> {
        *self.in_flight_at_close.lock().unwrap()
    }

    /// Count a slice request as in flight until the returned guard drops.
    fn begin_slice(&self, index: u64) -> InFlight<'_> {
        *self.slice_requests.lock().unwrap().entry(index).or_insert(0) += 1;
        self.issue_order.lock().unwrap().push(index);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(self)
    }

    fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        *self.in_flight_at_close.lock().unwrap() = Some(self.in_flight.load(Ordering::SeqCst));
    }
}

/// Settles one in-flight slice request on drop, including when the request
/// future is cancelled mid-latency.
struct InFlight<'a>(&'a HostStats);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
struct Faults {
    open: Option<String>,
    close: Option<String>,
    slices: HashMap<u64, String>,
}

#[derive(Debug)]
struct Latency {
    base: Duration,
    per_index: HashMap<u64, Duration>,
    jitter: Duration,
    rng: Mutex<StdRng>,
}

impl Latency {
    fn for_index(&self, index: u64) -> Duration {
        let base = self.per_index.get(&index).copied().unwrap_or(self.base);
        if self.jitter.is_zero() {
            return base;
        }
        let extra_ms = self
            .rng
            .lock()
            .unwrap()
            .gen_range(0..=self.jitter.as_millis() as u64);
        base + Duration::from_millis(extra_ms)
    }
}

impl Clone for Latency {
    fn clone(&self) -> Self {
        Self {
            base: self.base,
            per_index: self.per_index.clone(),
            jitter: self.jitter,
            rng: Mutex::new(self.rng.lock().unwrap().clone()),
        }
    }
}

impl Default for Latency {
    fn default() -> Self {
        Self {
            base: Duration::ZERO,
            per_index: HashMap::new(),
            jitter: Duration::ZERO,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
        }
    }
}

/// A host holding one document in memory
#[derive(Debug, Clone)]
pub struct MemoryHost {
    document: Bytes,
    max_slice_bytes: u64,
    faults: Arc<Faults>,
    latency: Arc<Latency>,
    stats: Arc<HostStats>,
}

impl MemoryHost {
    pub fn new(document: impl Into<Bytes>) -> Self {
        Self {
            document: document.into(),
            max_slice_bytes: DEFAULT_MAX_SLICE_BYTES,
            faults: Arc::default(),
            latency: Arc::default(),
            stats: Arc::default(),
        }
    }

    /// Read a document from disk and host it.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading document: {}", path.display()))?;
        Ok(Self::new(data))
    }

    /// Apply the `[host]` section of the configuration.
    pub fn configured(self, config: &HostConfig) -> Self {
        self.with_max_slice_bytes(config.max_slice_bytes)
            .with_latency(Duration::from_millis(config.slice_latency_ms))
            .with_jitter(Duration::from_millis(config.latency_jitter_ms), config.seed)
    }

    pub fn with_max_slice_bytes(mut self, max: u64) -> Self {
        self.max_slice_bytes = max;
        self
    }

    /// Fail every `get_file` call with `message`.
    pub fn fail_open(mut self, message: impl Into<String>) -> Self {
        self.faults_mut().open = Some(message.into());
        self
    }

    /// Fail requests for slice `index` with `message`.
    pub fn fail_slice(mut self, index: u64, message: impl Into<String>) -> Self {
        self.faults_mut().slices.insert(index, message.into());
        self
    }

    /// Fail `close` with `message`.
    pub fn fail_close(mut self, message: impl Into<String>) -> Self {
        self.faults_mut().close = Some(message.into());
        self
    }

    /// Latency applied to every slice request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_mut().base = latency;
        self
    }

    /// Latency for one slice index, replacing the base latency.
    pub fn with_slice_latency(mut self, index: u64, latency: Duration) -> Self {
        self.latency_mut().per_index.insert(index, latency);
        self
    }

    /// Random extra latency up to `jitter`, drawn from an RNG seeded with `seed`.
    pub fn with_jitter(mut self, jitter: Duration, seed: u64) -> Self {
        let latency = self.latency_mut();
        latency.jitter = jitter;
        latency.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn stats(&self) -> Arc<HostStats> {
        Arc::clone(&self.stats)
    }

    pub fn document(&self) -> &Bytes {
        &self.document
    }

    fn faults_mut(&mut self) -> &mut Faults {
        Arc::make_mut(&mut self.faults)
    }

    fn latency_mut(&mut self) -> &mut Latency {
        Arc::make_mut(&mut self.latency)
    }
}

impl DocumentHost for MemoryHost {
    type File = MemoryFile;

    async fn get_file(
        &self,
        kind: FileKind,
        options: GetFileOptions,
    ) -> Result<MemoryFile, HostError> {
        if let Some(message) = &self.faults.open {
            return Err(HostError::new(message.clone()));
        }

        let slice_size = options.slice_size;
        if slice_size.bytes() > self.max_slice_bytes {
            return Err(HostError::new(format!(
                "slice size exceeds the host maximum of {} bytes",
                self.max_slice_bytes
            )));
        }

        if kind == FileKind::Text && std::str::from_utf8(&self.document).is_err() {
            return Err(HostError::new("document is not valid UTF-8 text"));
        }

        let info = FileInfo::partitioned(self.document.len() as u64, slice_size);
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        debug!(
            kind = %kind,
            size = info.size_bytes,
            slices = info.slice_count,
            "host opened document"
        );

        Ok(MemoryFile {
            document: self.document.clone(),
            slice_size,
            info,
            faults: Arc::clone(&self.faults),
            latency: Arc::clone(&self.latency),
            stats: Arc::clone(&self.stats),
        })
    }
}

/// A document opened by `MemoryHost`
#[derive(Debug)]
pub struct MemoryFile {
    document: Bytes,
    slice_size: ChunkSize,
    info: FileInfo,
    faults: Arc<Faults>,
    latency: Arc<Latency>,
    stats: Arc<HostStats>,
}

impl HostFile for MemoryFile {
    fn info(&self) -> FileInfo {
        self.info
    }

    async fn get_slice(&self, index: u64) -> Result<Slice, HostError> {
        let _in_flight = self.stats.begin_slice(index);
        let delay = self.latency.for_index(index);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.read_slice(index)
    }

    async fn close(&self) -> Result<(), HostError> {
        self.stats.record_close();
        match &self.faults.close {
            Some(message) => Err(HostError::new(message.clone())),
            None => Ok(()),
        }
    }
}

impl MemoryFile {
    fn read_slice(&self, index: u64) -> Result<Slice, HostError> {
        if let Some(message) = self.faults.slices.get(&index) {
            return Err(HostError::new(message.clone()));
        }
        if index >= self.info.slice_count {
            return Err(HostError::new(format!(
                "slice index {index} is out of range (slice count {})",
                self.info.slice_count
            )));
        }

        let start = (index * self.slice_size.bytes()) as usize;
        let end = (start as u64 + self.slice_size.bytes()).min(self.info.size_bytes) as usize;
        Ok(Slice::new(index, self.document.slice(start..end)))
    }
}
