//! Null imputation.
//!
//! [`ImputeConstant`] fills nulls with a fixed value. Mean, median and mode imputation are
//! [`StatImputer`]s: they fill nulls with a statistic of the whole dataset. Applied to a frame
//! without fitting, the frame itself is taken as the dataset (batch mode). For chunked runs,
//! [`crate::pipeline::Pipeline::fit`] accumulates the statistic over every chunk first, so the
//! result does not depend on the chunk size.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::context::RunContext;
use crate::error::JanitorResult;
use crate::frame::{Column, Frame};
use crate::pipeline::Transform;
use crate::types::{Kind, Value};

use super::{check_every, fill_nulls};

/// Fill nulls with a constant, coerced to the column's kind.
///
/// A constant that cannot be coerced (e.g. a string for an `Int` column) fails the step.
#[derive(Debug, Clone)]
pub struct ImputeConstant {
    column: String,
    value: Value,
}

impl ImputeConstant {
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl Transform for ImputeConstant {
    fn name(&self) -> &str {
        "impute_constant"
    }

    fn apply(&mut self, _ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        let filled = fill_nulls(frame, &self.column, self.value.clone())?;
        debug!(column = %self.column, filled, "impute_constant");
        Ok(())
    }
}

/// A dataset statistic used to fill nulls.
pub trait Statistic: Default + Send + fmt::Debug {
    /// Step name reported by the owning [`StatImputer`].
    const NAME: &'static str;

    /// Accumulate the non-null values of `column`. Unsupported kinds are ignored.
    fn observe(&mut self, ctx: &RunContext, column: &Column) -> JanitorResult<()>;

    /// The fill value, or `None` when nothing usable was observed.
    fn finish(&mut self) -> Option<Value>;
}

/// Fills nulls in one column with a [`Statistic`].
#[derive(Debug)]
pub struct StatImputer<S> {
    column: String,
    stat: S,
    fitted: Option<Option<Value>>,
}

/// Fill nulls with the mean. Int columns get the mean rounded to the nearest integer.
pub type ImputeMean = StatImputer<MeanStat>;
/// Fill nulls with the median. Int columns use the integer average of the two middle values.
///
/// Fitting keeps every non-null value of the column until sealed, so memory during
/// [`Pipeline::fit`](crate::pipeline::Pipeline::fit) grows with the dataset, not the chunk size.
pub type ImputeMedian = StatImputer<MedianStat>;
/// Fill nulls with the most frequent value (String, Int, Bool); the earliest value to reach the
/// highest count wins ties.
pub type ImputeMode = StatImputer<ModeStat>;

impl<S: Statistic> StatImputer<S> {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            stat: S::default(),
            fitted: None,
        }
    }

    /// The sealed fill value. `None` until fitted, `Some(None)` when the dataset had no usable
    /// values.
    pub fn fitted_value(&self) -> Option<Option<&Value>> {
        self.fitted.as_ref().map(Option::as_ref)
    }
}

impl<S: Statistic> Transform for StatImputer<S> {
    fn name(&self) -> &str {
        S::NAME
    }

    fn apply(&mut self, ctx: &RunContext, frame: &mut Frame) -> JanitorResult<()> {
        let fill = match &self.fitted {
            Some(v) => v.clone(),
            None => {
                let Some(col) = frame.column(&self.column) else {
                    return Ok(());
                };
                let mut stat = S::default();
                stat.observe(ctx, col)?;
                stat.finish()
            }
        };
        if let Some(value) = fill {
            let filled = fill_nulls(frame, &self.column, value)?;
            debug!(step = S::NAME, column = %self.column, filled, "imputed nulls");
        }
        Ok(())
    }

    fn needs_fit(&self) -> bool {
        self.fitted.is_none()
    }

    fn observe(&mut self, ctx: &RunContext, frame: &Frame) -> JanitorResult<()> {
        match frame.column(&self.column) {
            Some(col) => self.stat.observe(ctx, col),
            None => Ok(()),
        }
    }

    fn seal(&mut self) {
        let mut stat = std::mem::take(&mut self.stat);
        self.fitted = Some(stat.finish());
    }
}

#[derive(Debug, Default)]
pub struct MeanStat {
    kind: Option<Kind>,
    float_sum: f64,
    int_sum: i128,
    count: u64,
}

impl Statistic for MeanStat {
    const NAME: &'static str = "impute_mean";

    fn observe(&mut self, ctx: &RunContext, column: &Column) -> JanitorResult<()> {
        match column {
            Column::Float(c) => {
                self.kind = Some(Kind::Float);
                for (i, v) in c.present().enumerate() {
                    check_every(ctx, i)?;
                    self.float_sum += v;
                    self.count += 1;
                }
            }
            Column::Int(c) => {
                self.kind = Some(Kind::Int);
                for (i, v) in c.present().enumerate() {
                    check_every(ctx, i)?;
                    self.int_sum += i128::from(*v);
                    self.count += 1;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Option<Value> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        match self.kind? {
            Kind::Float => Some(Value::Float(self.float_sum / n)),
            Kind::Int => Some(Value::Int((self.int_sum as f64 / n).round() as i64)),
            _ => None,
        }
    }
}

/// Exact median. Buffers all observed values.
#[derive(Debug, Default)]
pub struct MedianStat {
    floats: Vec<f64>,
    ints: Vec<i64>,
    kind: Option<Kind>,
}

impl Statistic for MedianStat {
    const NAME: &'static str = "impute_median";

    fn observe(&mut self, ctx: &RunContext, column: &Column) -> JanitorResult<()> {
        match column {
            Column::Float(c) => {
                self.kind = Some(Kind::Float);
                for (i, v) in c.present().enumerate() {
                    check_every(ctx, i)?;
                    self.floats.push(*v);
                }
            }
            Column::Int(c) => {
                self.kind = Some(Kind::Int);
                for (i, v) in c.present().enumerate() {
                    check_every(ctx, i)?;
                    self.ints.push(*v);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Option<Value> {
        match self.kind? {
            Kind::Float => {
                let v = &mut self.floats;
                if v.is_empty() {
                    return None;
                }
                v.sort_by(f64::total_cmp);
                let mid = v.len() / 2;
                let med = if v.len() % 2 == 0 {
                    (v[mid - 1] + v[mid]) / 2.0
                } else {
                    v[mid]
                };
                Some(Value::Float(med))
            }
            Kind::Int => {
                let v = &mut self.ints;
                if v.is_empty() {
                    return None;
                }
                v.sort_unstable();
                let mid = v.len() / 2;
                let med = if v.len() % 2 == 0 {
                    ((i128::from(v[mid - 1]) + i128::from(v[mid])) / 2) as i64
                } else {
                    v[mid]
                };
                Some(Value::Int(med))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ModeKey {
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Default)]
pub struct ModeStat {
    counts: HashMap<ModeKey, usize>,
    best: Option<(ModeKey, usize)>,
}

impl ModeStat {
    fn add(&mut self, key: ModeKey) {
        let count = self.counts.entry(key.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        if self.best.as_ref().is_none_or(|(_, best)| count > *best) {
            self.best = Some((key, count));
        }
    }
}

impl Statistic for ModeStat {
    const NAME: &'static str = "impute_mode";

    fn observe(&mut self, ctx: &RunContext, column: &Column) -> JanitorResult<()> {
        match column {
            Column::Str(c) => {
                for (i, v) in c.present().enumerate() {
                    check_every(ctx, i)?;
                    self.add(ModeKey::Str(v.clone()));
                }
            }
            Column::Int(c) => {
                for (i, v) in c.present().enumerate() {
                    check_every(ctx, i)?;
                    self.add(ModeKey::Int(*v));
                }
            }
            Column::Bool(c) => {
                for (i, v) in c.present().enumerate() {
                    check_every(ctx, i)?;
                    self.add(ModeKey::Bool(*v));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self) -> Option<Value> {
        self.best.take().map(|(key, _)| match key {
            ModeKey::Bool(b) => Value::Bool(b),
            ModeKey::Int(i) => Value::Int(i),
            ModeKey::Str(s) => Value::Str(s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, Schema};

    fn single(kind: Kind, values: Vec<Value>) -> Frame {
        let schema = Schema::new(vec![ColumnSchema::new("x", kind)]).unwrap();
        let mut f = Frame::new(schema);
        for v in values {
            f.append_row(vec![v]).unwrap();
        }
        f
    }

    fn column(f: &Frame) -> Vec<Option<Value>> {
        (0..f.rows()).map(|r| f.cell(r, "x").unwrap()).collect()
    }

    #[test]
    fn mean_fills_float_nulls() {
        let mut f = single(
            Kind::Float,
            vec![Value::Float(1.0), Value::Null, Value::Float(3.0), Value::Null],
        );
        ImputeMean::new("x").apply(&RunContext::new(), &mut f).unwrap();
        assert_eq!(
            column(&f),
            vec![
                Some(Value::Float(1.0)),
                Some(Value::Float(2.0)),
                Some(Value::Float(3.0)),
                Some(Value::Float(2.0)),
            ]
        );
    }

    #[test]
    fn mean_rounds_for_int_columns() {
        let mut f = single(Kind::Int, vec![Value::Int(1), Value::Int(2), Value::Null]);
        ImputeMean::new("x").apply(&RunContext::new(), &mut f).unwrap();
        assert_eq!(f.cell(2, "x").unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn median_int_uses_integer_average() {
        let mut f = single(
            Kind::Int,
            vec![Value::Int(4), Value::Null, Value::Int(1), Value::Int(2), Value::Int(9)],
        );
        ImputeMedian::new("x").apply(&RunContext::new(), &mut f).unwrap();
        assert_eq!(f.cell(1, "x").unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn median_float_odd_count() {
        let mut f = single(
            Kind::Float,
            vec![Value::Float(5.0), Value::Float(1.0), Value::Null, Value::Float(2.5)],
        );
        ImputeMedian::new("x").apply(&RunContext::new(), &mut f).unwrap();
        assert_eq!(f.cell(2, "x").unwrap(), Some(Value::Float(2.5)));
    }

    #[test]
    fn mode_prefers_first_value_to_reach_max() {
        let mut f = single(
            Kind::String,
            vec!["b".into(), "a".into(), Value::Null, "a".into(), "b".into()],
        );
        ImputeMode::new("x").apply(&RunContext::new(), &mut f).unwrap();
        assert_eq!(f.cell(2, "x").unwrap(), Some(Value::Str("a".into())));
    }

    #[test]
    fn all_null_column_is_left_unchanged() {
        let mut f = single(Kind::Float, vec![Value::Null, Value::Null]);
        ImputeMean::new("x").apply(&RunContext::new(), &mut f).unwrap();
        ImputeMedian::new("x").apply(&RunContext::new(), &mut f).unwrap();
        assert_eq!(column(&f), vec![None, None]);
    }

    #[test]
    fn fitted_statistic_spans_chunks() {
        let ctx = RunContext::new();
        let a = single(Kind::Float, vec![Value::Float(10.0), Value::Null]);
        let b = single(Kind::Float, vec![Value::Float(0.0), Value::Float(2.0)]);

        let mut step = ImputeMean::new("x");
        assert!(step.needs_fit());
        step.observe(&ctx, &a).unwrap();
        step.observe(&ctx, &b).unwrap();
        step.seal();
        assert!(!step.needs_fit());
        assert_eq!(step.fitted_value(), Some(Some(&Value::Float(4.0))));

        let mut chunk = a.clone();
        step.apply(&ctx, &mut chunk).unwrap();
        assert_eq!(chunk.cell(1, "x").unwrap(), Some(Value::Float(4.0)));
    }

    #[test]
    fn constant_coerces_and_rejects_mismatch() {
        let ctx = RunContext::new();
        let mut f = single(Kind::Float, vec![Value::Null]);
        ImputeConstant::new("x", 7_i64).apply(&ctx, &mut f).unwrap();
        assert_eq!(f.cell(0, "x").unwrap(), Some(Value::Float(7.0)));

        let mut f = single(Kind::Int, vec![Value::Null]);
        assert!(ImputeConstant::new("x", "zero").apply(&ctx, &mut f).is_err());
        ImputeConstant::new("absent", "zero").apply(&ctx, &mut f).unwrap();
    }
}
