//! Domain validation. A failing check aborts the pipeline with [`JanitorError::Validation`].

use std::collections::HashSet;

use crate::context::RunContext;
use crate::error::{JanitorError, JanitorResult};
use crate::frame::{Column, Frame};
use crate::pipeline::Transform;

use super::numeric_values;

/// Require every non-null numeric value to lie in `[min, max]` (either bound optional).
#[derive(Debug, Clone)]
pub struct ValidateRange {
    column: String,
    min: Option<f64>,
    max: Option<f64>,
}

impl ValidateRange {
    pub fn new(column: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            column: column.into(),
            min,
            max,
        }
    }

    fn describe(&self) -> String {
        let lo = self.min.map_or_else(|| "-inf".to_string(), |v| v.to_string());
        let hi = self.max.map_or_else(|| "+inf".to_string(), |v| v.to_string());
        format!("outside range [{lo}, {hi}]")
    }
}

impl Transform for ValidateRange {
    fn name(&self) -> &str {
        "validate_range"
    }

    fn apply(&mut self, _ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        let Some(values) = frame.column(&self.column).and_then(numeric_values) else {
            return Ok(());
        };
        let offending = values
            .filter(|&v| self.min.is_some_and(|m| v < m) || self.max.is_some_and(|m| v > m))
            .count();
        if offending > 0 {
            return Err(JanitorError::Validation {
                step: self.name().to_string(),
                column: self.column.clone(),
                offending,
                message: self.describe(),
            });
        }
        Ok(())
    }
}

/// Require every non-null string value to be one of an allowed set.
#[derive(Debug, Clone)]
pub struct ValidateInSet {
    column: String,
    allowed: HashSet<String>,
}

impl ValidateInSet {
    pub fn new<I, S>(column: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column: column.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for ValidateInSet {
    fn name(&self) -> &str {
        "validate_in"
    }

    fn apply(&mut self, _ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        let Some(Column::Str(c)) = frame.column(&self.column) else {
            return Ok(());
        };
        let offending = c.present().filter(|v| !self.allowed.contains(*v)).count();
        if offending > 0 {
            return Err(JanitorError::Validation {
                step: self.name().to_string(),
                column: self.column.clone(),
                offending,
                message: "outside allowed set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, Kind, Schema, Value};

    fn frame() -> Frame {
        let schema = Schema::new(vec![
            ColumnSchema::new("age", Kind::Int),
            ColumnSchema::new("country", Kind::String),
        ])
        .unwrap();
        let mut f = Frame::new(schema);
        for (age, country) in [(Some(5_i64), "US"), (Some(130), "FR"), (None, "XX"), (Some(-1), "US")] {
            f.append_row(vec![Value::from(age), country.into()]).unwrap();
        }
        f
    }

    #[test]
    fn range_counts_offending_values() {
        let mut f = frame();
        let err = ValidateRange::new("age", Some(0.0), Some(120.0))
            .apply(&RunContext::new(), &mut f)
            .unwrap_err();
        match err {
            JanitorError::Validation { offending, column, .. } => {
                assert_eq!(offending, 2);
                assert_eq!(column, "age");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn range_with_open_bound_passes() {
        let mut f = frame();
        ValidateRange::new("age", None, Some(200.0))
            .apply(&RunContext::new(), &mut f)
            .unwrap();
        ValidateRange::new("age", Some(-10.0), None)
            .apply(&RunContext::new(), &mut f)
            .unwrap();
    }

    #[test]
    fn in_set_reports_count() {
        let mut f = frame();
        let err = ValidateInSet::new("country", ["US", "FR"])
            .apply(&RunContext::new(), &mut f)
            .unwrap_err();
        assert!(err.to_string().contains("1 value(s) in column 'country' outside allowed set"));
        ValidateInSet::new("missing", ["US"])
            .apply(&RunContext::new(), &mut f)
            .unwrap();
    }
}
