//! Job outcome observers.
//!
//! [`crate::job::CleaningJob`] reports every run to an optional [`JobObserver`]:
//!
//! - `on_success` with the run's [`JobStats`]
//! - `on_warning` for non-fatal findings such as repaired record shapes
//! - `on_failure` with a [`Severity`] computed from the error
//! - `on_alert` as well when that severity is at or above the job's alert threshold

use std::error::Error as StdError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use crate::error::JanitorError;
use crate::job::{JobMode, JobStats};

/// Severity used for observer callbacks and alert thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    /// Non-fatal finding.
    Warning,
    /// The run failed.
    Error,
    /// The run failed for an infrastructure reason (typically I/O).
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        })
    }
}

/// Classify a run error.
///
/// I/O failures anywhere in the error chain are critical; cancellation and deadlines are
/// warnings; everything else is an error.
pub fn severity_for_error(e: &JanitorError) -> Severity {
    match e.root() {
        JanitorError::Io(_) => Severity::Critical,
        JanitorError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => Severity::Critical,
            _ => Severity::Error,
        },
        JanitorError::Parquet(err) if error_chain_contains_io(err) => Severity::Critical,
        JanitorError::Json(err) if err.is_io() => Severity::Critical,
        JanitorError::Walk(err) if err.io_error().is_some() => Severity::Critical,
        JanitorError::Cancelled | JanitorError::DeadlineExceeded => Severity::Warning,
        _ => Severity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

/// What a job was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobContext {
    /// Input files after glob and directory expansion (the raw arguments if expansion failed).
    pub inputs: Vec<PathBuf>,
    /// Output path, or path template when partitioning.
    pub output: String,
    pub mode: JobMode,
}

/// Observer interface for job outcomes.
pub trait JobObserver: Send + Sync {
    fn on_success(&self, _ctx: &JobContext, _stats: &JobStats) {}

    fn on_warning(&self, _ctx: &JobContext, _message: &str) {}

    fn on_failure(&self, _ctx: &JobContext, _severity: Severity, _error: &JanitorError) {}

    /// Called when a failure meets the alert threshold. Defaults to [`Self::on_failure`].
    fn on_alert(&self, ctx: &JobContext, severity: Severity, error: &JanitorError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans callbacks out to several observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn JobObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn JobObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl JobObserver for CompositeObserver {
    fn on_success(&self, ctx: &JobContext, stats: &JobStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_warning(&self, ctx: &JobContext, message: &str) {
        for o in &self.observers {
            o.on_warning(ctx, message);
        }
    }

    fn on_failure(&self, ctx: &JobContext, severity: Severity, error: &JanitorError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &JobContext, severity: Severity, error: &JanitorError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards job outcomes to `tracing`.
#[derive(Debug, Default)]
pub struct LogObserver;

impl JobObserver for LogObserver {
    fn on_success(&self, ctx: &JobContext, stats: &JobStats) {
        info!(
            inputs = ctx.inputs.len(),
            output = %ctx.output,
            rows_in = stats.rows_in,
            rows_out = stats.rows_out,
            partitions = stats.partitions,
            "job finished"
        );
    }

    fn on_warning(&self, ctx: &JobContext, message: &str) {
        warn!(output = %ctx.output, %message, "job warning");
    }

    fn on_failure(&self, ctx: &JobContext, severity: Severity, error: &JanitorError) {
        error!(output = %ctx.output, %severity, %error, "job failed");
    }

    fn on_alert(&self, ctx: &JobContext, severity: Severity, error: &JanitorError) {
        error!(output = %ctx.output, %severity, %error, alert = true, "job failed");
    }
}

/// Appends job outcomes to a local log file, one line per event.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Writes are best effort; failures to open or write the log are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl JobObserver for FileObserver {
    fn on_success(&self, ctx: &JobContext, stats: &JobStats) {
        self.append_line(&format!(
            "{} ok mode={:?} output={} rows_in={} rows_out={} partitions={}",
            unix_ts(),
            ctx.mode,
            ctx.output,
            stats.rows_in,
            stats.rows_out,
            stats.partitions
        ));
    }

    fn on_warning(&self, ctx: &JobContext, message: &str) {
        self.append_line(&format!("{} warn output={} msg={message}", unix_ts(), ctx.output));
    }

    fn on_failure(&self, ctx: &JobContext, severity: Severity, error: &JanitorError) {
        self.append_line(&format!(
            "{} fail severity={severity} output={} err={error}",
            unix_ts(),
            ctx.output
        ));
    }

    fn on_alert(&self, ctx: &JobContext, severity: Severity, error: &JanitorError) {
        self.append_line(&format!(
            "{} ALERT severity={severity} output={} err={error}",
            unix_ts(),
            ctx.output
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
