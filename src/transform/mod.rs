//! Column-level transforms.
//!
//! Every transform targets one column by name and is a no-op when that column is absent or of a
//! kind the transform does not handle.
//!
//! - [`standardize`]: string cleanup ([`Trim`], [`Lower`], [`RegexReplace`], [`MapValues`])
//! - [`impute`]: null filling ([`ImputeConstant`], [`ImputeMean`], [`ImputeMedian`], [`ImputeMode`])
//! - [`validate`]: domain checks ([`ValidateRange`], [`ValidateInSet`])
//! - [`outliers`]: clamping ([`CapRange`])
//! - [`spec`]: serde step descriptions ([`StepSpec`])

pub mod impute;
pub mod outliers;
pub mod spec;
pub mod standardize;
pub mod validate;

pub use impute::{ImputeConstant, ImputeMean, ImputeMedian, ImputeMode, Statistic, StatImputer};
pub use outliers::CapRange;
pub use spec::StepSpec;
pub use standardize::{Lower, MapValues, RegexReplace, Trim};
pub use validate::{ValidateInSet, ValidateRange};

use crate::context::RunContext;
use crate::error::{JanitorError, JanitorResult};
use crate::frame::{Column, Frame, Mismatch};
use crate::types::Value;

/// Rows scanned between cancellation checks in per-row loops.
pub(crate) const CANCEL_CHECK_INTERVAL: usize = 4096;

pub(crate) fn check_every(ctx: &RunContext, row: usize) -> JanitorResult<()> {
    if row % CANCEL_CHECK_INTERVAL == 0 {
        ctx.check()?;
    }
    Ok(())
}

/// Fill the nulls of `column` with `value`, mapping a kind mismatch to a typed error.
pub(crate) fn fill_nulls(frame: &mut Frame, column: &str, value: Value) -> JanitorResult<usize> {
    let Some(mut col) = frame.column_mut(column) else {
        return Ok(0);
    };
    let expected = col.kind();
    col.fill_nulls(value).map_err(|Mismatch(found)| JanitorError::TypeMismatch {
        column: column.to_string(),
        expected,
        found: found.to_string(),
    })
}

/// Iterate the non-null values of a numeric column as `f64`.
pub(crate) fn numeric_values(col: &Column) -> Option<Box<dyn Iterator<Item = f64> + '_>> {
    match col {
        Column::Float(c) => Some(Box::new(c.present().copied())),
        Column::Int(c) => Some(Box::new(c.present().map(|&v| v as f64))),
        _ => None,
    }
}
