//! Transform contract and ordered pipelines.
//!
//! A [`Transform`] rewrites a [`Frame`] in place (or replaces it wholesale through the
//! `&mut Frame` handle). A [`Pipeline`] applies transforms strictly in order and stops at the
//! first failure; effects of earlier steps stay visible on the frame.
//!
//! ```rust
//! use rust_data_janitor::context::RunContext;
//! use rust_data_janitor::frame::Frame;
//! use rust_data_janitor::pipeline::Pipeline;
//! use rust_data_janitor::transform::{ImputeMean, Trim};
//! use rust_data_janitor::types::{ColumnSchema, Kind, Schema, Value};
//!
//! # fn main() -> Result<(), rust_data_janitor::JanitorError> {
//! let schema = Schema::new(vec![ColumnSchema::new("x", Kind::Float)])?;
//! let mut frame = Frame::new(schema);
//! for v in [Value::Float(1.0), Value::Null, Value::Float(3.0)] {
//!     frame.append_row(vec![v])?;
//! }
//!
//! let mut pipeline = Pipeline::new()
//!     .add(Trim::new("name"))
//!     .add(ImputeMean::new("x"));
//! pipeline.run(&RunContext::new(), &mut frame)?;
//! assert_eq!(frame.cell(1, "x")?, Some(Value::Float(2.0)));
//! # Ok(())
//! # }
//! ```

use std::fmt;

use tracing::debug;

use crate::context::RunContext;
use crate::error::{JanitorError, JanitorResult};
use crate::frame::Frame;
use crate::stream::ChunkSource;

/// A named column-level operation over a [`Frame`].
///
/// A transform whose target column is absent from the frame succeeds without changes.
pub trait Transform: Send {
    /// Name used in diagnostics and step descriptions.
    fn name(&self) -> &str;

    /// Apply the transform to `frame`.
    fn apply(&mut self, ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()>;

    /// `true` for statistic steps (mean/median/mode imputation) that have not yet been fitted
    /// over a whole dataset.
    ///
    /// Unfitted statistic steps compute their statistic from the frame they are applied to,
    /// which is only correct when that frame is the whole dataset.
    fn needs_fit(&self) -> bool {
        false
    }

    /// Accumulate statistics from one chunk of the dataset. Called only while fitting.
    fn observe(&mut self, _ctx: &RunContext, _frame: &Frame) -> JanitorResult<()> {
        Ok(())
    }

    /// Freeze the statistic accumulated by [`Transform::observe`].
    fn seal(&mut self) {}
}

/// Ordered list of transforms.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Transform>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn add(mut self, step: impl Transform + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Transform>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// The first step that still needs a fitting pass, as `(1-based position, name)`.
    pub fn needs_fit(&self) -> Option<(usize, &str)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.needs_fit())
            .map(|(i, s)| (i + 1, s.name()))
    }

    /// Apply every step in order, stopping at the first failure.
    ///
    /// The returned [`JanitorError::Step`] identifies the failing step; steps after it never run
    /// and steps before it are not rolled back.
    pub fn run(&mut self, ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        for (i, step) in self.steps.iter_mut().enumerate() {
            ctx.check()?;
            debug!(step = i + 1, name = step.name(), rows = frame.rows(), "applying step");
            step.apply(ctx, frame).map_err(|e| JanitorError::Step {
                step: i + 1,
                name: step.name().to_string(),
                source: Box::new(e),
            })?;
        }
        Ok(())
    }

    /// Fit every statistic step over a whole dataset delivered as chunks.
    ///
    /// Each unfitted step gets its own pass: `open` is called once per pass, every chunk is run
    /// through the steps before it, and the step observes the result. Returns the number of
    /// passes made (zero when nothing needed fitting).
    pub fn fit<S, F>(&mut self, ctx: &RunContext, mut open: F) -> JanitorResult<usize>
    where
        S: ChunkSource,
        F: FnMut() -> JanitorResult<S>,
    {
        let mut passes = 0;
        while let Some(target) = self.steps.iter().position(|s| s.needs_fit()) {
            let mut source = open()?;
            let (before, rest) = self.steps.split_at_mut(target);
            let step = &mut rest[0];
            debug!(step = target + 1, name = step.name(), "fitting pass");

            while let Some(mut chunk) = source.next_chunk()? {
                ctx.check()?;
                for (i, prior) in before.iter_mut().enumerate() {
                    prior.apply(ctx, &mut chunk).map_err(|e| JanitorError::Step {
                        step: i + 1,
                        name: prior.name().to_string(),
                        source: Box::new(e),
                    })?;
                }
                step.observe(ctx, &chunk).map_err(|e| JanitorError::Step {
                    step: target + 1,
                    name: step.name().to_string(),
                    source: Box::new(e),
                })?;
            }
            step.seal();
            passes += 1;
        }
        Ok(passes)
    }
}
