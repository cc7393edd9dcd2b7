//! Chunked streaming execution.
//!
//! A [`ChunkSource`] yields bounded [`Frame`] chunks, each chunk runs through a [`Pipeline`], and
//! the result goes to a [`ChunkSink`]. At most one chunk is in flight, so memory stays bounded by
//! the source's chunk size regardless of input size.
//!
//! The sink is finalized exactly once on every exit path: end of input, source error, pipeline
//! error, write error and cancellation.
//!
//! ```rust
//! use rust_data_janitor::context::RunContext;
//! use rust_data_janitor::frame::Frame;
//! use rust_data_janitor::pipeline::Pipeline;
//! use rust_data_janitor::stream::{FrameSource, MemorySink, StreamEngine};
//! use rust_data_janitor::transform::Lower;
//! use rust_data_janitor::types::{ColumnSchema, Kind, Schema, Value};
//!
//! # fn main() -> Result<(), rust_data_janitor::JanitorError> {
//! let schema = Schema::new(vec![ColumnSchema::new("city", Kind::String)])?;
//! let mut frame = Frame::new(schema);
//! for city in ["Paris", "LYON", "Nice"] {
//!     frame.append_row(vec![Value::from(city)])?;
//! }
//!
//! let mut source = FrameSource::new(frame, 2);
//! let mut sink = MemorySink::default();
//! let mut pipeline = Pipeline::new().add(Lower::new("city"));
//!
//! let summary = StreamEngine::new().run(&RunContext::new(), &mut pipeline, &mut source, &mut sink)?;
//! assert_eq!(summary.chunks, 2);
//! assert_eq!(sink.to_frame()?.unwrap().cell(1, "city")?, Some(Value::from("lyon")));
//! # Ok(())
//! # }
//! ```

mod observer;
mod progress;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::context::RunContext;
use crate::error::{JanitorError, JanitorResult};
use crate::frame::Frame;
use crate::inference::ShapeReport;
use crate::pipeline::Pipeline;
use crate::types::Schema;

pub use observer::{
    LogStreamObserver, StreamEvent, StreamMetrics, StreamMetricsSnapshot, StreamObserver,
};
pub use progress::{ProgressOptions, ProgressUpdate, run_with_progress};

/// Default number of rows per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 4_096;

/// Pull-based producer of row chunks.
///
/// Implementations return chunks with `0 < rows <= chunk_size` and report end of input as
/// `Ok(None)`, never as an empty chunk.
pub trait ChunkSource {
    /// Schema shared by every chunk.
    fn schema(&self) -> &Arc<Schema>;

    /// The next chunk, or `None` at end of input.
    fn next_chunk(&mut self) -> JanitorResult<Option<Frame>>;

    /// Record-shape repairs made so far (delimited-text sources only).
    fn shape_report(&self) -> Option<ShapeReport> {
        None
    }
}

/// Push-based consumer of row chunks.
pub trait ChunkSink {
    /// Accept one chunk. Called once per chunk, in arrival order.
    fn write(&mut self, chunk: Frame) -> JanitorResult<()>;

    /// Flush buffered state. Called exactly once at the end of a run, whatever its outcome.
    fn finalize(&mut self) -> JanitorResult<()>;
}

impl<T: ChunkSource + ?Sized> ChunkSource for Box<T> {
    fn schema(&self) -> &Arc<Schema> {
        (**self).schema()
    }

    fn next_chunk(&mut self) -> JanitorResult<Option<Frame>> {
        (**self).next_chunk()
    }

    fn shape_report(&self) -> Option<ShapeReport> {
        (**self).shape_report()
    }
}

impl<T: ChunkSink + ?Sized> ChunkSink for Box<T> {
    fn write(&mut self, chunk: Frame) -> JanitorResult<()> {
        (**self).write(chunk)
    }

    fn finalize(&mut self) -> JanitorResult<()> {
        (**self).finalize()
    }
}

/// Totals for one completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub chunks: u64,
    pub rows_read: u64,
    pub rows_written: u64,
    pub elapsed: Duration,
}

/// Drives sources through a pipeline into sinks, one chunk at a time.
#[derive(Clone, Default)]
pub struct StreamEngine {
    observer: Option<Arc<dyn StreamObserver>>,
    metrics: Arc<StreamMetrics>,
}

impl std::fmt::Debug for StreamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEngine")
            .field("observer_set", &self.observer.is_some())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

impl StreamEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer for stream events.
    pub fn with_observer(mut self, observer: Arc<dyn StreamObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Handle to the live counters of the current (or last) run.
    pub fn metrics(&self) -> Arc<StreamMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run `source` through `pipeline` into `sink` until end of input or the first error.
    ///
    /// Cancellation is checked between chunks. A pipeline that still has an unfitted statistic
    /// step is rejected before any chunk is read (see [`Pipeline::fit`]).
    ///
    /// When the run fails, its error is returned even if finalizing also failed; otherwise a
    /// finalize error is returned.
    pub fn run<S, K>(
        &self,
        ctx: &RunContext,
        pipeline: &mut Pipeline,
        source: &mut S,
        sink: &mut K,
    ) -> JanitorResult<StreamSummary>
    where
        S: ChunkSource + ?Sized,
        K: ChunkSink + ?Sized,
    {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(StreamEvent::RunStarted);

        let body = self.drive(ctx, pipeline, source, sink);
        let finalized = sink.finalize();
        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);

        let result = match (body, finalized) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(fin)) => {
                warn!(error = %fin, "sink finalize failed after run error");
                Err(e)
            }
        };

        let snapshot = self.metrics.snapshot();
        match result {
            Ok(()) => {
                self.emit(StreamEvent::RunFinished {
                    elapsed,
                    metrics: snapshot.clone(),
                });
                Ok(StreamSummary {
                    chunks: snapshot.chunks_written,
                    rows_read: snapshot.rows_read,
                    rows_written: snapshot.rows_written,
                    elapsed,
                })
            }
            Err(e) => {
                self.emit(StreamEvent::RunFailed {
                    error: e.to_string(),
                    metrics: snapshot,
                });
                Err(e)
            }
        }
    }

    fn drive<S, K>(
        &self,
        ctx: &RunContext,
        pipeline: &mut Pipeline,
        source: &mut S,
        sink: &mut K,
    ) -> JanitorResult<()>
    where
        S: ChunkSource + ?Sized,
        K: ChunkSink + ?Sized,
    {
        if let Some((step, name)) = pipeline.needs_fit() {
            return Err(JanitorError::config(format!(
                "step {step} ({name}) needs a dataset-wide statistic; call Pipeline::fit before streaming"
            )));
        }

        let mut index = 0u64;
        loop {
            ctx.check()?;
            let Some(mut chunk) = source.next_chunk()? else {
                break;
            };
            if chunk.is_empty() {
                debug!(index, "skipping empty chunk");
                continue;
            }

            let rows_in = chunk.rows();
            self.metrics.on_chunk_read(rows_in);
            self.emit(StreamEvent::ChunkRead {
                index,
                rows: rows_in,
            });

            pipeline.run(ctx, &mut chunk)?;

            let rows_out = chunk.rows();
            sink.write(chunk)?;
            self.metrics.on_chunk_written(rows_out);
            self.emit(StreamEvent::ChunkWritten {
                index,
                rows: rows_out,
            });
            index += 1;
        }
        Ok(())
    }

    fn emit(&self, event: StreamEvent) {
        if let Some(o) = &self.observer {
            o.on_event(&event);
        }
    }
}

/// Run one stream with a fresh [`StreamEngine`].
pub fn run_stream<S, K>(
    ctx: &RunContext,
    pipeline: &mut Pipeline,
    source: &mut S,
    sink: &mut K,
) -> JanitorResult<StreamSummary>
where
    S: ChunkSource + ?Sized,
    K: ChunkSink + ?Sized,
{
    StreamEngine::new().run(ctx, pipeline, source, sink)
}

/// Serves an in-memory frame as chunks of at most `chunk_size` rows.
#[derive(Debug, Clone)]
pub struct FrameSource {
    frame: Frame,
    chunk_size: usize,
    offset: usize,
}

impl FrameSource {
    /// A `chunk_size` of zero is treated as one.
    pub fn new(frame: Frame, chunk_size: usize) -> Self {
        Self {
            frame,
            chunk_size: chunk_size.max(1),
            offset: 0,
        }
    }
}

impl ChunkSource for FrameSource {
    fn schema(&self) -> &Arc<Schema> {
        self.frame.schema()
    }

    fn next_chunk(&mut self) -> JanitorResult<Option<Frame>> {
        if self.offset >= self.frame.rows() {
            return Ok(None);
        }
        let end = (self.offset + self.chunk_size).min(self.frame.rows());
        let chunk = self.frame.slice(self.offset, end);
        self.offset = end;
        Ok(Some(chunk))
    }
}

/// Collects written chunks in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    chunks: Vec<Frame>,
    finalize_calls: usize,
}

impl MemorySink {
    pub fn chunks(&self) -> &[Frame] {
        &self.chunks
    }

    /// Number of times [`ChunkSink::finalize`] was called.
    pub fn finalize_calls(&self) -> usize {
        self.finalize_calls
    }

    /// Total rows received.
    pub fn rows(&self) -> usize {
        self.chunks.iter().map(Frame::rows).sum()
    }

    /// All chunks concatenated, or `None` when nothing was written.
    pub fn to_frame(&self) -> JanitorResult<Option<Frame>> {
        let Some(first) = self.chunks.first() else {
            return Ok(None);
        };
        let mut out = Frame::new(Arc::clone(first.schema()));
        for c in &self.chunks {
            out.extend_from(c)?;
        }
        Ok(Some(out))
    }
}

impl ChunkSink for MemorySink {
    fn write(&mut self, chunk: Frame) -> JanitorResult<()> {
        self.chunks.push(chunk);
        Ok(())
    }

    fn finalize(&mut self) -> JanitorResult<()> {
        self.finalize_calls += 1;
        Ok(())
    }
}
