use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

/// Events emitted by [`super::StreamEngine`].
#[derive(Debug, Clone)]
pub enum StreamEvent {
    RunStarted,
    ChunkRead { index: u64, rows: usize },
    ChunkWritten { index: u64, rows: usize },
    RunFinished {
        elapsed: Duration,
        metrics: StreamMetricsSnapshot,
    },
    RunFailed {
        error: String,
        metrics: StreamMetricsSnapshot,
    },
}

/// Observer hook for stream events.
pub trait StreamObserver: Send + Sync {
    fn on_event(&self, event: &StreamEvent);
}

/// Forwards stream events to `tracing`.
#[derive(Debug, Default)]
pub struct LogStreamObserver;

impl StreamObserver for LogStreamObserver {
    fn on_event(&self, event: &StreamEvent) {
        match event {
            StreamEvent::RunStarted => debug!("stream run started"),
            StreamEvent::ChunkRead { index, rows } => debug!(index, rows, "chunk read"),
            StreamEvent::ChunkWritten { index, rows } => debug!(index, rows, "chunk written"),
            StreamEvent::RunFinished { elapsed, metrics } => {
                info!(elapsed_ms = elapsed.as_millis() as u64, %metrics, "stream run finished")
            }
            StreamEvent::RunFailed { error, metrics } => {
                warn!(%error, %metrics, "stream run failed")
            }
        }
    }
}

/// Live counters for a stream run.
///
/// The engine updates these while it runs; any thread may snapshot them at any time.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    rows_read: AtomicU64,
    rows_written: AtomicU64,
    chunks_read: AtomicU64,
    chunks_written: AtomicU64,

    max_chunk_rows: AtomicUsize,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_run(&self) {
        self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.rows_read.store(0, Ordering::SeqCst);
        self.rows_written.store(0, Ordering::SeqCst);
        self.chunks_read.store(0, Ordering::SeqCst);
        self.chunks_written.store(0, Ordering::SeqCst);
        self.max_chunk_rows.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns
            .store(elapsed.as_nanos().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    pub fn on_chunk_read(&self, rows: usize) {
        self.chunks_read.fetch_add(1, Ordering::SeqCst);
        self.rows_read.fetch_add(rows as u64, Ordering::SeqCst);
        update_max_usize(&self.max_chunk_rows, rows);
    }

    pub fn on_chunk_written(&self, rows: usize) {
        self.chunks_written.fetch_add(1, Ordering::SeqCst);
        self.rows_written.fetch_add(rows as u64, Ordering::SeqCst);
    }

    /// Rows written so far in the current run.
    pub fn rows_written(&self) -> u64 {
        self.rows_written.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StreamMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        StreamMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
            rows_read: self.rows_read.load(Ordering::SeqCst),
            rows_written: self.rows_written.load(Ordering::SeqCst),
            chunks_read: self.chunks_read.load(Ordering::SeqCst),
            chunks_written: self.chunks_written.load(Ordering::SeqCst),
            max_chunk_rows: self.max_chunk_rows.load(Ordering::SeqCst),
        }
    }
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    let mut cur = dst.load(Ordering::SeqCst);
    while now > cur {
        match dst.compare_exchange(cur, now, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => break,
            Err(actual) => cur = actual,
        }
    }
}

/// Immutable snapshot of [`StreamMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetricsSnapshot {
    pub run_id: u64,
    /// Set once the run has ended.
    pub elapsed: Option<Duration>,
    pub rows_read: u64,
    pub rows_written: u64,
    pub chunks_read: u64,
    pub chunks_written: u64,
    pub max_chunk_rows: usize,
}

impl fmt::Display for StreamMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, rows={}/{}, chunks={}/{}, max_chunk_rows={}, elapsed={:?}",
            self.run_id,
            self.rows_written,
            self.rows_read,
            self.chunks_written,
            self.chunks_read,
            self.max_chunk_rows,
            self.elapsed
        )
    }
}
