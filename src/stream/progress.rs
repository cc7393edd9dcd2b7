//! Throughput reporting for long stream runs.
//!
//! The stream runs on a scoped worker thread; the calling thread samples the engine's atomic
//! [`StreamMetrics`](super::StreamMetrics) on a fixed interval and hands each sample to a callback.

use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::context::RunContext;
use crate::error::JanitorResult;
use crate::pipeline::Pipeline;

use super::{ChunkSink, ChunkSource, StreamEngine, StreamSummary};

/// How often progress is sampled and how many rows to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressOptions {
    pub interval: Duration,
    /// Total input rows, when known. Enables [`ProgressUpdate::eta`].
    pub expected_rows: Option<u64>,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            expected_rows: None,
        }
    }
}

/// One progress sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Rows written so far.
    pub rows: u64,
    /// Chunks written so far.
    pub chunks: u64,
    pub elapsed: Duration,
    pub rows_per_sec: f64,
    pub eta: Option<Duration>,
    /// `true` for the last sample of a run.
    pub done: bool,
}

impl ProgressUpdate {
    fn sample(rows: u64, chunks: u64, elapsed: Duration, expected: Option<u64>, done: bool) -> Self {
        let secs = elapsed.as_secs_f64();
        let rows_per_sec = if secs > 0.0 { rows as f64 / secs } else { 0.0 };
        let eta = expected.and_then(|total| {
            if done || rows >= total {
                Some(Duration::ZERO)
            } else if rows_per_sec > 0.0 {
                Some(Duration::from_secs_f64((total - rows) as f64 / rows_per_sec))
            } else {
                None
            }
        });
        Self {
            rows,
            chunks,
            elapsed,
            rows_per_sec,
            eta,
            done,
        }
    }
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows in {} chunks, {:.0} rows/s, elapsed {:.1}s",
            self.rows,
            self.chunks,
            self.rows_per_sec,
            self.elapsed.as_secs_f64()
        )?;
        if let Some(eta) = self.eta {
            write!(f, ", eta {:.1}s", eta.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Run a stream while reporting progress every `options.interval`.
///
/// The callback runs on the calling thread. It always receives a final update with
/// `done == true` once the run ends, successfully or not.
pub fn run_with_progress<S, K, F>(
    engine: &StreamEngine,
    ctx: &RunContext,
    pipeline: &mut Pipeline,
    source: &mut S,
    sink: &mut K,
    options: ProgressOptions,
    mut on_progress: F,
) -> JanitorResult<StreamSummary>
where
    S: ChunkSource + Send + ?Sized,
    K: ChunkSink + Send + ?Sized,
    F: FnMut(&ProgressUpdate),
{
    let metrics = engine.metrics();
    let start = Instant::now();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let result = thread::scope(|scope| {
        let worker = scope.spawn(move || {
            let result = engine.run(ctx, pipeline, source, sink);
            let _ = done_tx.send(());
            result
        });

        loop {
            match done_rx.recv_timeout(options.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let s = metrics.snapshot();
                    on_progress(&ProgressUpdate::sample(
                        s.rows_written,
                        s.chunks_written,
                        start.elapsed(),
                        options.expected_rows,
                        false,
                    ));
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        match worker.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    let s = metrics.snapshot();
    on_progress(&ProgressUpdate::sample(
        s.rows_written,
        s.chunks_written,
        start.elapsed(),
        options.expected_rows,
        true,
    ));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::stream::{FrameSource, MemorySink};
    use crate::types::{ColumnSchema, Kind, Schema, Value};

    #[test]
    fn eta_from_rate() {
        let u = ProgressUpdate::sample(50, 5, Duration::from_secs(5), Some(150), false);
        assert_eq!(u.rows_per_sec, 10.0);
        assert_eq!(u.eta, Some(Duration::from_secs(10)));

        let u = ProgressUpdate::sample(0, 0, Duration::ZERO, Some(10), false);
        assert_eq!(u.eta, None);
        assert!(ProgressUpdate::sample(1, 1, Duration::from_secs(1), None, false).eta.is_none());
    }

    #[test]
    fn final_update_reports_all_rows() {
        let schema = Schema::new(vec![ColumnSchema::new("n", Kind::Int)]).unwrap();
        let mut frame = Frame::new(schema);
        for i in 0..100 {
            frame.append_row(vec![Value::Int(i)]).unwrap();
        }
        let mut source = FrameSource::new(frame, 7);
        let mut sink = MemorySink::default();
        let mut updates = Vec::new();
        let summary = run_with_progress(
            &StreamEngine::new(),
            &RunContext::new(),
            &mut Pipeline::new(),
            &mut source,
            &mut sink,
            ProgressOptions {
                interval: Duration::from_millis(1),
                expected_rows: Some(100),
            },
            |u| updates.push(*u),
        )
        .unwrap();

        assert_eq!(summary.rows_written, 100);
        let last = updates.last().unwrap();
        assert!(last.done);
        assert_eq!(last.rows, 100);
        assert_eq!(last.chunks, 15);
        assert_eq!(last.eta, Some(Duration::ZERO));
        assert!(updates.windows(2).all(|w| w[0].rows <= w[1].rows));
    }
}
