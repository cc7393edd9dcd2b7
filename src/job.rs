//! File-to-file cleaning jobs.
//!
//! A [`CleaningJob`] expands its inputs, runs them through a [`Pipeline`] and writes the result
//! to one output file or, with [`JobOptions::partition_by`], to one file per partition.
//!
//! In [`JobMode::Streaming`] statistic steps are fitted with extra passes over the inputs
//! before the write pass; in [`JobMode::Batch`] the whole input is loaded as one frame and
//! statistics come from that frame.
//!
//! ```no_run
//! use rust_data_janitor::context::RunContext;
//! use rust_data_janitor::job::CleaningJob;
//! use rust_data_janitor::pipeline::Pipeline;
//! use rust_data_janitor::transform::{ImputeMean, Trim};
//!
//! # fn main() -> Result<(), rust_data_janitor::JanitorError> {
//! let pipeline = Pipeline::new()
//!     .add(Trim::new("city"))
//!     .add(ImputeMean::new("price"));
//! let stats = CleaningJob::new("raw/*.csv", "clean/listings.parquet", pipeline)
//!     .run(&RunContext::new())?;
//! println!("rows={}", stats.rows_out);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::context::RunContext;
use crate::error::JanitorResult;
use crate::inference::ShapeReport;
use crate::io::{
    FileSinkFactory, MultiSource, SinkOptions, SourceOptions, create_sink, drain, expand_inputs,
};
use crate::observability::{JobContext, JobObserver, Severity, severity_for_error};
use crate::partition::PartitionRouter;
use crate::pipeline::Pipeline;
use crate::stream::{ChunkSource, FrameSource, StreamEngine, StreamObserver, StreamSummary};

/// How a job moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobMode {
    /// Chunks of [`SourceOptions::chunk_size`] rows.
    #[default]
    Streaming,
    /// The whole input as one frame.
    Batch,
}

/// Options for a [`CleaningJob`].
#[derive(Clone)]
pub struct JobOptions {
    pub mode: JobMode,
    pub source: SourceOptions,
    pub sink: SinkOptions,
    /// Partition columns. When set, the job output is a path template such as
    /// `out/{col:country}.csv`.
    pub partition_by: Vec<String>,
    /// Optional observer for job outcomes.
    pub observer: Option<Arc<dyn JobObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: Severity,
    /// Optional observer for per-chunk stream events.
    pub stream_observer: Option<Arc<dyn StreamObserver>>,
}

impl fmt::Debug for JobOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobOptions")
            .field("mode", &self.mode)
            .field("source", &self.source)
            .field("sink", &self.sink)
            .field("partition_by", &self.partition_by)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .field("stream_observer_set", &self.stream_observer.is_some())
            .finish()
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            mode: JobMode::default(),
            source: SourceOptions::default(),
            sink: SinkOptions::default(),
            partition_by: Vec::new(),
            observer: None,
            alert_at_or_above: Severity::Critical,
            stream_observer: None,
        }
    }
}

/// Totals for one successful job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    pub rows_in: u64,
    pub rows_out: u64,
    /// Chunks written (1 for a non-empty batch job).
    pub chunks: u64,
    /// Partition files written; 0 when the job is not partitioned.
    pub partitions: usize,
    /// Extra passes over the inputs made to fit statistic steps.
    pub fit_passes: usize,
    /// Record-shape repairs, for delimited-text inputs.
    pub shape: Option<ShapeReport>,
    pub elapsed: Duration,
}

impl JobStats {
    pub fn shape_warning(&self) -> Option<String> {
        self.shape.and_then(|s| s.warning_summary())
    }
}

/// One input set, one pipeline, one output.
#[derive(Debug)]
pub struct CleaningJob {
    /// Files, directories or glob patterns (see [`expand_inputs`]).
    pub inputs: Vec<String>,
    /// Output path, or a path template when partitioning.
    pub output: String,
    pub pipeline: Pipeline,
    pub options: JobOptions,
}

impl CleaningJob {
    pub fn new(input: impl Into<String>, output: impl Into<String>, pipeline: Pipeline) -> Self {
        Self {
            inputs: vec![input.into()],
            output: output.into(),
            pipeline,
            options: JobOptions::default(),
        }
    }

    /// Add another input file, directory or pattern.
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the job to completion.
    ///
    /// When an observer is configured, this reports:
    ///
    /// - `on_warning` when delimited input needed shape repairs
    /// - `on_success` with the job's [`JobStats`]
    /// - `on_failure` on failure, with a computed severity
    /// - `on_alert` on failure when that severity is >= `options.alert_at_or_above`
    ///
    /// Output already written when a job fails is left in place.
    pub fn run(&mut self, ctx: &RunContext) -> JanitorResult<JobStats> {
        let start = Instant::now();
        let expanded = expand_inputs(&self.inputs);
        let job_ctx = JobContext {
            inputs: match &expanded {
                Ok(paths) => paths.clone(),
                Err(_) => self.inputs.iter().map(PathBuf::from).collect(),
            },
            output: self.output.clone(),
            mode: self.options.mode,
        };

        let result = expanded
            .and_then(|paths| self.execute(ctx, paths))
            .map(|mut stats| {
                stats.elapsed = start.elapsed();
                stats
            });

        if let Ok(stats) = &result {
            info!(
                output = %self.output,
                rows_in = stats.rows_in,
                rows_out = stats.rows_out,
                partitions = stats.partitions,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                "job finished"
            );
        }

        if let Some(obs) = self.options.observer.as_ref() {
            match &result {
                Ok(stats) => {
                    if let Some(message) = stats.shape_warning() {
                        obs.on_warning(&job_ctx, &message);
                    }
                    obs.on_success(&job_ctx, stats);
                }
                Err(e) => {
                    let sev = severity_for_error(e);
                    obs.on_failure(&job_ctx, sev, e);
                    if sev >= self.options.alert_at_or_above {
                        obs.on_alert(&job_ctx, sev, e);
                    }
                }
            }
        }

        result
    }

    fn execute(&mut self, ctx: &RunContext, inputs: Vec<PathBuf>) -> JanitorResult<JobStats> {
        let Self {
            output,
            pipeline,
            options,
            ..
        } = self;
        let engine = match &options.stream_observer {
            Some(o) => StreamEngine::new().with_observer(Arc::clone(o)),
            None => StreamEngine::new(),
        };
        let mut stats = JobStats::default();

        match options.mode {
            JobMode::Streaming => {
                if pipeline.needs_fit().is_some() {
                    stats.fit_passes =
                        pipeline.fit(ctx, || MultiSource::open(inputs.clone(), &options.source))?;
                }
                let mut source = MultiSource::open(inputs, &options.source)?;
                let (summary, partitions) =
                    write_output(&engine, ctx, pipeline, &mut source, output, options)?;
                stats.rows_in = summary.rows_read;
                stats.rows_out = summary.rows_written;
                stats.chunks = summary.chunks;
                stats.partitions = partitions;
                stats.shape = source.shape_report();
            }
            JobMode::Batch => {
                let mut source = MultiSource::open(inputs, &options.source)?;
                let mut frame = drain(&mut source)?;
                stats.rows_in = frame.rows() as u64;
                stats.shape = source.shape_report();
                pipeline.run(ctx, &mut frame)?;

                let chunk_size = frame.rows().max(1);
                let mut frames = FrameSource::new(frame, chunk_size);
                let (summary, partitions) =
                    write_output(&engine, ctx, &mut Pipeline::new(), &mut frames, output, options)?;
                stats.rows_out = summary.rows_written;
                stats.chunks = summary.chunks;
                stats.partitions = partitions;
            }
        }
        Ok(stats)
    }
}

fn write_output<S: ChunkSource + ?Sized>(
    engine: &StreamEngine,
    ctx: &RunContext,
    pipeline: &mut Pipeline,
    source: &mut S,
    output: &str,
    options: &JobOptions,
) -> JanitorResult<(StreamSummary, usize)> {
    if options.partition_by.is_empty() {
        let mut sink = create_sink(output, Arc::clone(source.schema()), &options.sink)?;
        let summary = engine.run(ctx, pipeline, source, &mut sink)?;
        return Ok((summary, 0));
    }
    let factory = FileSinkFactory::new(options.sink.clone());
    let mut router = PartitionRouter::new(&options.partition_by, output, factory)?;
    let summary = engine.run(ctx, pipeline, source, &mut router)?;
    Ok((summary, router.partitions()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JanitorError;
    use crate::transform::{ImputeMean, Trim};
    use std::fs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl JobObserver for Recorder {
        fn on_success(&self, _ctx: &JobContext, stats: &JobStats) {
            self.events
                .lock()
                .unwrap()
                .push(format!("success rows={}", stats.rows_out));
        }

        fn on_warning(&self, _ctx: &JobContext, message: &str) {
            self.events.lock().unwrap().push(format!("warning {message}"));
        }

        fn on_failure(&self, _ctx: &JobContext, severity: Severity, _error: &JanitorError) {
            self.events.lock().unwrap().push(format!("failure {severity}"));
        }

        fn on_alert(&self, _ctx: &JobContext, severity: Severity, _error: &JanitorError) {
            self.events.lock().unwrap().push(format!("alert {severity}"));
        }
    }

    fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn streaming_job_fits_mean_over_whole_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.csv", "id,x\n1,1.5\n2,\n3,4.5\n");
        let output = dir.path().join("out.csv");

        let options = JobOptions {
            source: SourceOptions {
                chunk_size: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let stats = CleaningJob::new(input, output.to_string_lossy(), Pipeline::new().add(ImputeMean::new("x")))
            .with_options(options)
            .run(&RunContext::new())
            .unwrap();

        assert_eq!(stats.fit_passes, 1);
        assert_eq!(stats.rows_in, 3);
        assert_eq!(stats.rows_out, 3);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.partitions, 0);
        assert_eq!(fs::read_to_string(output).unwrap(), "id,x\n1,1.5\n2,3\n3,4.5\n");
    }

    #[test]
    fn batch_job_partitions_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.csv", "country,city\nUS, nyc\nFR,paris \nUS,boston\n");
        let template = format!("{}/out/{{col:country}}.csv", dir.path().display());

        let options = JobOptions {
            mode: JobMode::Batch,
            partition_by: vec!["country".into()],
            ..Default::default()
        };
        let stats = CleaningJob::new(input, template, Pipeline::new().add(Trim::new("city")))
            .with_options(options)
            .run(&RunContext::new())
            .unwrap();

        assert_eq!(stats.partitions, 2);
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.fit_passes, 0);
        let us = fs::read_to_string(dir.path().join("out/US.csv")).unwrap();
        let fr = fs::read_to_string(dir.path().join("out/FR.csv")).unwrap();
        assert_eq!(us, "country,city\nUS,nyc\nUS,boston\n");
        assert_eq!(fr, "country,city\nFR,paris\n");
    }

    #[test]
    fn shape_repairs_are_reported_as_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.csv", "a,b,c\n1,2,3\n4,5\n");
        let output = dir.path().join("out.jsonl");
        let recorder = Arc::new(Recorder::default());

        let options = JobOptions {
            observer: Some(recorder.clone()),
            ..Default::default()
        };
        let stats = CleaningJob::new(input, output.to_string_lossy(), Pipeline::new())
            .with_options(options)
            .run(&RunContext::new())
            .unwrap();

        assert_eq!(stats.shape.map(|s| s.short_records), Some(1));
        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "warning 1 short record(s) padded with nulls".to_string(),
                "success rows=2".to_string(),
            ]
        );
        assert_eq!(
            fs::read_to_string(output).unwrap(),
            "{\"a\":1,\"b\":2,\"c\":3}\n{\"a\":4,\"b\":5}\n"
        );
    }

    #[test]
    fn missing_input_alerts_as_critical() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let options = JobOptions {
            observer: Some(recorder.clone()),
            ..Default::default()
        };
        let missing = dir.path().join("nope.csv");
        let out = dir.path().join("out.csv");
        let err = CleaningJob::new(missing.to_string_lossy(), out.to_string_lossy(), Pipeline::new())
            .with_options(options)
            .run(&RunContext::new())
            .unwrap_err();

        assert!(matches!(err, JanitorError::Io(_)));
        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events, vec!["failure critical".to_string(), "alert critical".to_string()]);
    }

    #[test]
    fn cancelled_job_is_below_default_alert_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(&dir, "in.csv", "a\n1\n");
        let out = dir.path().join("out.csv");
        let recorder = Arc::new(Recorder::default());
        let options = JobOptions {
            observer: Some(recorder.clone()),
            ..Default::default()
        };
        let ctx = RunContext::new();
        ctx.cancel();

        let err = CleaningJob::new(input, out.to_string_lossy(), Pipeline::new())
            .with_options(options)
            .run(&ctx)
            .unwrap_err();

        assert!(matches!(err, JanitorError::Cancelled));
        assert_eq!(*recorder.events.lock().unwrap(), vec!["failure warning".to_string()]);
    }
}
