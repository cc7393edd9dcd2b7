//! Outlier capping.

use crate::context::RunContext;
use crate::error::JanitorResult;
use crate::frame::{ColumnMut, Frame};
use crate::pipeline::Transform;

/// Clamp numeric values into `[min, max]` (either bound optional).
///
/// For Int columns the bounds are rounded inward (min up, max down) so clamped values stay in range.
#[derive(Debug, Clone)]
pub struct CapRange {
    column: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl CapRange {
    pub fn new(column: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            column: column.into(),
            min,
            max,
        }
    }
}

impl Transform for CapRange {
    fn name(&self) -> &str {
        "cap_range"
    }

    fn apply(&mut self, _ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        let (min, max) = (self.min, self.max);
        match frame.column_mut(&self.column) {
            Some(ColumnMut::Float(mut c)) => c.update_present(|v| {
                if let Some(lo) = min.filter(|lo| *v < *lo) {
                    *v = lo;
                }
                if let Some(hi) = max.filter(|hi| *v > *hi) {
                    *v = hi;
                }
            }),
            Some(ColumnMut::Int(mut c)) => c.update_present(|v| {
                if let Some(lo) = min.filter(|lo| (*v as f64) < *lo) {
                    *v = lo.ceil() as i64;
                }
                if let Some(hi) = max.filter(|hi| (*v as f64) > *hi) {
                    *v = hi.floor() as i64;
                }
            }),
            _ => {}
        }
        Ok(())
    }
}
