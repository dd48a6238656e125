//! Integration test: end-to-end transfers against the in-process host
//!
//! Covers the observable protocol contract: slice counts and sizes, one
//! request per index, a single completion marker regardless of arrival order,
//! error notifications, and a close that never races in-flight fetches.

use std::time::Duration;

use docslice_core::config::ReportOrder;
use docslice_core::ChunkSize;
use docslice_transfer::{
    MemoryHost, Readiness, ReportEntry, TransferOptions, TransferSession, ViewerRegistry,
};
use proptest::prelude::*;
use tokio_test::{assert_pending, assert_ready};

const FOUR_MB: u64 = 4 * 1024 * 1024;

fn options(chunk_bytes: u64) -> TransferOptions {
    TransferOptions::new(ChunkSize::from_bytes(chunk_bytes).unwrap())
}

fn completion_markers(entries: &[ReportEntry]) -> usize {
    entries
        .iter()
        .filter(|e| **e == ReportEntry::Completed)
        .count()
}

#[tokio::test(start_paused = true)]
async fn four_mb_chunks_over_ten_million_bytes() {
    let host = MemoryHost::new(vec![0x5Au8; 10_000_000])
        .with_latency(Duration::from_millis(5))
        .with_jitter(Duration::from_millis(50), 7);
    let stats = host.stats();

    let summary = TransferSession::new(host, Readiness::ready(), options(FOUR_MB))
        .run(None)
        .await;

    let info = summary.info.expect("document opened");
    assert_eq!(info.slice_count, 3);
    assert_eq!(info.size_bytes, 10_000_000);

    let mut sizes: Vec<(u64, u64)> = summary
        .report
        .entries()
        .iter()
        .filter_map(|e| match e {
            ReportEntry::SliceSent { index, size_bytes } => Some((*index, *size_bytes)),
            _ => None,
        })
        .collect();
    sizes.sort();
    assert_eq!(
        sizes,
        vec![(0, 4_194_304), (1, 4_194_304), (2, 1_611_392)]
    );

    assert_eq!(completion_markers(summary.report.entries()), 1);
    assert_eq!(summary.report.entries().last(), Some(&ReportEntry::Completed));
    assert!(summary.report.notifications().is_empty());
    assert_eq!(stats.closes(), 1);
    assert_eq!(stats.in_flight_at_close(), Some(0));
    assert!(summary.released);
}

#[tokio::test(start_paused = true)]
async fn requests_issued_in_index_order_before_any_settles() {
    let host = MemoryHost::new(vec![2u8; 12 * 256])
        .with_latency(Duration::from_millis(5))
        .with_jitter(Duration::from_millis(80), 11);
    let stats = host.stats();

    let summary = TransferSession::new(host, Readiness::ready(), options(256))
        .run(None)
        .await;

    assert!(summary.completed);
    assert_eq!(stats.issue_order(), (0..12).collect::<Vec<u64>>());
    assert_eq!(stats.peak_in_flight(), 12);
}

#[tokio::test]
async fn report_lines_in_index_order() {
    let host = MemoryHost::new(vec![0u8; 600 * 1024]);
    let mut opts = options(256 * 1024);
    opts.order = ReportOrder::Index;

    let summary = TransferSession::new(host, Readiness::ready(), opts)
        .run(None)
        .await;

    assert_eq!(
        summary.report.lines(),
        vec![
            "Total file size: 0.58 MB",
            "Number of slices: 3",
            "Sending slice 1: 256.00 KB",
            "Sending slice 2: 256.00 KB",
            "Sending slice 3: 88.00 KB",
            "File has been sent!",
        ]
    );
}

#[tokio::test]
async fn open_failure_notifies_once_and_fetches_nothing() {
    let host = MemoryHost::new(vec![0u8; 1024]).fail_open("file locked");
    let stats = host.stats();

    let summary = TransferSession::new(host, Readiness::ready(), options(FOUR_MB))
        .run(None)
        .await;

    assert!(!summary.acquired());
    assert_eq!(summary.report.notifications().len(), 1);
    assert_eq!(summary.report.notifications()[0].title, "Error");
    assert_eq!(summary.report.notifications()[0].message, "file locked");
    assert!(summary.report.entries().is_empty());
    assert_eq!(stats.total_slice_requests(), 0);
    assert_eq!(stats.closes(), 0);
}

#[tokio::test(start_paused = true)]
async fn one_failed_slice_does_not_abort_transfer() {
    let host = MemoryHost::new(vec![1u8; 5 * 1024])
        .with_latency(Duration::from_millis(10))
        .with_slice_latency(4, Duration::from_millis(1))
        .fail_slice(2, "slice 3 could not be read");
    let stats = host.stats();

    let summary = TransferSession::new(host, Readiness::ready(), options(1024))
        .run(None)
        .await;

    assert_eq!(summary.info.unwrap().slice_count, 5);
    assert_eq!(summary.report.slice_order().len(), 4);
    assert_eq!(summary.received.len(), 4);
    assert_eq!(
        summary.failed,
        vec![(2, "slice 3 could not be read".to_string())]
    );
    assert_eq!(summary.report.notifications().len(), 1);
    assert!(!summary.completed);
    assert_eq!(completion_markers(summary.report.entries()), 0);
    assert_eq!(stats.closes(), 1);
    assert_eq!(stats.in_flight_at_close(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn highest_index_first_still_completes_once_at_the_end() {
    let host = MemoryHost::new(vec![3u8; 4 * 100])
        .with_latency(Duration::from_millis(40))
        .with_slice_latency(3, Duration::from_millis(1));

    let summary = TransferSession::new(host, Readiness::ready(), options(100))
        .run(None)
        .await;

    assert_eq!(summary.received.first(), Some(&3));
    assert_eq!(completion_markers(summary.report.entries()), 1);
    assert_eq!(summary.report.entries().last(), Some(&ReportEntry::Completed));
}

#[tokio::test(start_paused = true)]
async fn index_order_report_hides_arrival_order() {
    let host = MemoryHost::new(vec![0u8; 4000]).with_jitter(Duration::from_millis(100), 3);
    let mut opts = options(500);
    opts.order = ReportOrder::Index;

    let summary = TransferSession::new(host, Readiness::ready(), opts)
        .run(None)
        .await;

    assert_eq!(summary.report.slice_order(), (0..8).collect::<Vec<u64>>());
    assert!(summary.completed);
}

#[tokio::test]
async fn transfer_waits_for_host_initialization() {
    let host = MemoryHost::new(vec![0u8; 64]);
    let stats = host.stats();
    let host_ready = Readiness::new();
    let session = TransferSession::new(host, host_ready.clone(), options(16));

    let mut run = tokio_test::task::spawn(session.run(None));
    assert_pending!(run.poll());
    assert_eq!(stats.opens(), 0);

    host_ready.mark_ready();
    let summary = assert_ready!(run.poll());
    assert!(summary.completed);
    assert_eq!(stats.opens(), 1);
}

#[tokio::test]
async fn received_slices_can_be_viewed() {
    let host = MemoryHost::new(b"abcdef".to_vec());
    let renderer = Readiness::new();
    let viewer = ViewerRegistry::new(renderer.clone());

    let summary = TransferSession::new(host, Readiness::ready(), options(4))
        .run(Some(&viewer))
        .await;
    assert!(summary.completed);
    assert_eq!(viewer.registered(), vec![0, 1]);

    renderer.mark_ready();
    let view = viewer.view(1).await.expect("slice 1 registered");
    assert_eq!(view.content, "ZWY=");
}

#[tokio::test]
async fn oversized_chunk_is_an_acquisition_error() {
    let host = MemoryHost::new(vec![0u8; 32]);
    let summary = TransferSession::new(host, Readiness::ready(), options(FOUR_MB + 1))
        .run(None)
        .await;

    assert!(!summary.acquired());
    assert_eq!(
        summary.report.notifications()[0].message,
        "slice size exceeds the host maximum of 4194304 bytes"
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every index is requested exactly once and the slices cover the document.
    #[test]
    fn one_request_per_index(size in 0usize..20_000, chunk in 64u64..4096, seed in any::<u64>()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let host = MemoryHost::new(vec![7u8; size])
            .with_jitter(Duration::from_millis(20), seed);
        let stats = host.stats();
        let mut opts = options(chunk);
        opts.reassemble = true;

        let summary = runtime.block_on(async {
            TransferSession::new(host, Readiness::ready(), opts).run(None).await
        });

        let info = summary.info.unwrap();
        prop_assert!(info.slice_count >= 1);
        let requests = stats.slice_requests();
        prop_assert_eq!(requests.len() as u64, info.slice_count);
        prop_assert!(requests.values().all(|&n| n == 1));

        let total: u64 = summary
            .report
            .entries()
            .iter()
            .filter_map(|e| match e {
                ReportEntry::SliceSent { size_bytes, .. } => Some(*size_bytes),
                _ => None,
            })
            .sum();
        prop_assert_eq!(total, size as u64);
        prop_assert_eq!(completion_markers(summary.report.entries()), 1);
        prop_assert_eq!(summary.reassembled.unwrap().data.len(), size);
        prop_assert_eq!(stats.closes(), 1);
    }
}
