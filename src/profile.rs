//! Column profiling.
//!
//! [`Profiler`] accumulates per-column statistics over any number of frames. It is also a
//! [`ChunkSink`], so a stream can be profiled by running it into a profiler.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{JanitorError, JanitorResult};
use crate::frame::{Column, Frame};
use crate::io::format_time;
use crate::partition::format_significant;
use crate::stream::ChunkSink;
use crate::types::{Kind, Schema};

/// Default number of most frequent values reported for string and time columns.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
enum Accumulator {
    Numeric {
        count: u64,
        nulls: u64,
        min: f64,
        max: f64,
        sum: f64,
    },
    Bool {
        count: u64,
        nulls: u64,
        trues: u64,
    },
    Text {
        count: u64,
        nulls: u64,
        freqs: HashMap<String, u64>,
    },
}

impl Accumulator {
    fn for_kind(kind: Kind) -> Self {
        match kind {
            Kind::Int | Kind::Float => Self::Numeric {
                count: 0,
                nulls: 0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
                sum: 0.0,
            },
            Kind::Bool => Self::Bool {
                count: 0,
                nulls: 0,
                trues: 0,
            },
            Kind::String | Kind::Time => Self::Text {
                count: 0,
                nulls: 0,
                freqs: HashMap::new(),
            },
        }
    }
}

fn add_numeric(count: &mut u64, nulls: &mut u64, min: &mut f64, max: &mut f64, sum: &mut f64, v: Option<f64>) {
    match v {
        None => *nulls += 1,
        Some(v) => {
            *count += 1;
            *min = min.min(v);
            *max = max.max(v);
            *sum += v;
        }
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    name: String,
    kind: Kind,
    acc: Accumulator,
}

/// Streaming column profiler.
#[derive(Debug, Clone)]
pub struct Profiler {
    columns: Vec<Tracked>,
    index: HashMap<String, usize>,
    top_k: usize,
    rows: u64,
}

impl Profiler {
    /// Profile the columns of `schema`, keeping the `top_k` most frequent string/time values.
    /// A `top_k` of zero disables frequency tracking.
    pub fn new(schema: &Schema, top_k: usize) -> Self {
        let columns: Vec<Tracked> = schema
            .columns()
            .iter()
            .map(|c| Tracked {
                name: c.name.clone(),
                kind: c.kind,
                acc: Accumulator::for_kind(c.kind),
            })
            .collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            columns,
            index,
            top_k,
            rows: 0,
        }
    }

    /// Rows consumed so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Add one frame. Its columns must be a subset of the profiled schema, with matching kinds.
    pub fn consume(&mut self, frame: &Frame) -> JanitorResult<()> {
        for (schema_col, column) in frame.schema().columns().iter().zip(frame.columns()) {
            let &i = self
                .index
                .get(&schema_col.name)
                .ok_or_else(|| JanitorError::UnknownColumn {
                    column: schema_col.name.clone(),
                })?;
            let tracked = &mut self.columns[i];
            if tracked.kind != column.kind() {
                return Err(JanitorError::TypeMismatch {
                    column: tracked.name.clone(),
                    expected: tracked.kind,
                    found: column.kind().to_string(),
                });
            }
            observe(&mut tracked.acc, column, self.top_k > 0);
        }
        self.rows += frame.rows() as u64;
        Ok(())
    }

    /// Structured report, suitable for serializing.
    pub fn report(&self) -> ProfileReport {
        ProfileReport {
            rows: self.rows,
            columns: self
                .columns
                .iter()
                .map(|c| ColumnReport {
                    name: c.name.clone(),
                    kind: c.kind,
                    stats: self.stats(&c.acc),
                })
                .collect(),
        }
    }

    fn stats(&self, acc: &Accumulator) -> ColumnStats {
        match acc {
            Accumulator::Numeric {
                count,
                nulls,
                min,
                max,
                sum,
            } => ColumnStats::Numeric(NumericStats {
                count: *count,
                nulls: *nulls,
                min: (*count > 0).then_some(*min),
                max: (*count > 0).then_some(*max),
                sum: *sum,
                mean: (*count > 0).then(|| sum / *count as f64),
            }),
            Accumulator::Bool {
                count,
                nulls,
                trues,
            } => ColumnStats::Bool(BoolStats {
                count: *count,
                nulls: *nulls,
                true_count: *trues,
                false_count: count - trues,
            }),
            Accumulator::Text {
                count,
                nulls,
                freqs,
            } => {
                let mut top: Vec<Frequency> = freqs
                    .iter()
                    .map(|(value, count)| Frequency {
                        value: value.clone(),
                        count: *count,
                    })
                    .collect();
                top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
                top.truncate(self.top_k);
                ColumnStats::Text(TextStats {
                    count: *count,
                    nulls: *nulls,
                    top,
                })
            }
        }
    }

    /// Human-readable summary, one line per column plus top values.
    pub fn report_text(&self) -> String {
        let report = self.report();
        let mut out = format!("Profile summary ({} rows)\n", report.rows);
        for col in &report.columns {
            let _ = write!(out, "- {} ({}): ", col.name, col.kind);
            match &col.stats {
                ColumnStats::Numeric(s) => {
                    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), format_significant);
                    let _ = writeln!(
                        out,
                        "count={} nulls={} min={} max={} mean={}",
                        s.count,
                        s.nulls,
                        fmt(s.min),
                        fmt(s.max),
                        fmt(s.mean)
                    );
                }
                ColumnStats::Bool(s) => {
                    let _ = writeln!(
                        out,
                        "count={} nulls={} true={} false={}",
                        s.count, s.nulls, s.true_count, s.false_count
                    );
                }
                ColumnStats::Text(s) => {
                    let _ = writeln!(out, "count={} nulls={}", s.count, s.nulls);
                    for f in &s.top {
                        let _ = writeln!(out, "  {:?}: {}", f.value, f.count);
                    }
                }
            }
        }
        out
    }
}

fn observe(acc: &mut Accumulator, column: &Column, track_freqs: bool) {
    match (acc, column) {
        (
            Accumulator::Numeric {
                count,
                nulls,
                min,
                max,
                sum,
            },
            Column::Int(c),
        ) => {
            for v in c.iter() {
                add_numeric(count, nulls, min, max, sum, v.map(|v| *v as f64));
            }
        }
        (
            Accumulator::Numeric {
                count,
                nulls,
                min,
                max,
                sum,
            },
            Column::Float(c),
        ) => {
            for v in c.iter() {
                add_numeric(count, nulls, min, max, sum, v.copied());
            }
        }
        (Accumulator::Bool { count, nulls, trues }, Column::Bool(c)) => {
            for v in c.iter() {
                match v {
                    None => *nulls += 1,
                    Some(b) => {
                        *count += 1;
                        if *b {
                            *trues += 1;
                        }
                    }
                }
            }
        }
        (Accumulator::Text { count, nulls, freqs }, Column::Str(c)) => {
            for v in c.iter() {
                match v {
                    None => *nulls += 1,
                    Some(s) => {
                        *count += 1;
                        if track_freqs {
                            *freqs.entry(s.clone()).or_default() += 1;
                        }
                    }
                }
            }
        }
        (Accumulator::Text { count, nulls, freqs }, Column::Time(c)) => {
            for v in c.iter() {
                match v {
                    None => *nulls += 1,
                    Some(t) => {
                        *count += 1;
                        if track_freqs {
                            *freqs.entry(format_time(t)).or_default() += 1;
                        }
                    }
                }
            }
        }
        // Kinds are checked by the caller.
        _ => {}
    }
}

impl ChunkSink for Profiler {
    fn write(&mut self, chunk: Frame) -> JanitorResult<()> {
        self.consume(&chunk)
    }

    fn finalize(&mut self) -> JanitorResult<()> {
        Ok(())
    }
}

/// Profile of every column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileReport {
    pub rows: u64,
    pub columns: Vec<ColumnReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnReport {
    pub name: String,
    pub kind: Kind,
    #[serde(flatten)]
    pub stats: ColumnStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnStats {
    Numeric(NumericStats),
    Bool(BoolStats),
    Text(TextStats),
}

/// Int and Float columns. Min/max/mean are `None` when every value is null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    pub count: u64,
    pub nulls: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub sum: f64,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoolStats {
    pub count: u64,
    pub nulls: u64,
    #[serde(rename = "true")]
    pub true_count: u64,
    #[serde(rename = "false")]
    pub false_count: u64,
}

/// String and Time columns; times are counted by their RFC 3339 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub count: u64,
    pub nulls: u64,
    /// Most frequent values, by descending count then value.
    pub top: Vec<Frequency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frequency {
    pub value: String,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, Value};

    fn frame() -> Frame {
        let schema = Schema::new(vec![
            ColumnSchema::new("n", Kind::Int),
            ColumnSchema::new("ok", Kind::Bool),
            ColumnSchema::new("city", Kind::String),
        ])
        .unwrap();
        let mut f = Frame::new(schema);
        f.append_row(vec![Value::Int(1), Value::Bool(true), Value::from("paris")]).unwrap();
        f.append_row(vec![Value::Int(4), Value::Null, Value::from("lyon")]).unwrap();
        f.append_row(vec![Value::Null, Value::Bool(false), Value::from("paris")]).unwrap();
        f
    }

    #[test]
    fn accumulates_across_frames() {
        let f = frame();
        let mut p = Profiler::new(f.schema(), 1);
        p.consume(&f).unwrap();
        p.consume(&f).unwrap();
        let report = p.report();
        assert_eq!(report.rows, 6);
        assert_eq!(
            report.columns[0].stats,
            ColumnStats::Numeric(NumericStats {
                count: 4,
                nulls: 2,
                min: Some(1.0),
                max: Some(4.0),
                sum: 10.0,
                mean: Some(2.5),
            })
        );
        assert_eq!(
            report.columns[1].stats,
            ColumnStats::Bool(BoolStats {
                count: 4,
                nulls: 2,
                true_count: 2,
                false_count: 2
            })
        );
        let ColumnStats::Text(city) = &report.columns[2].stats else {
            panic!("expected text stats");
        };
        assert_eq!(
            city.top,
            vec![Frequency {
                value: "paris".into(),
                count: 4
            }]
        );
    }

    #[test]
    fn text_report_lists_columns() {
        let f = frame();
        let mut p = Profiler::new(f.schema(), 5);
        p.consume(&f).unwrap();
        assert_eq!(
            p.report_text(),
            "Profile summary (3 rows)\n\
             - n (int): count=2 nulls=1 min=1 max=4 mean=2.5\n\
             - ok (bool): count=2 nulls=1 true=1 false=1\n\
             - city (string): count=3 nulls=0\n  \"paris\": 2\n  \"lyon\": 1\n"
        );
    }

    #[test]
    fn report_serializes_with_kind_tags() {
        let f = frame();
        let mut p = Profiler::new(f.schema(), 0);
        p.consume(&f).unwrap();
        let json = serde_json::to_value(p.report()).unwrap();
        assert_eq!(json["columns"][0]["kind"], "int");
        assert_eq!(json["columns"][0]["numeric"]["count"], 2);
        assert_eq!(json["columns"][1]["bool"]["true"], 1);
        assert_eq!(json["columns"][2]["text"]["top"], serde_json::json!([]));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let f = frame();
        let other = Schema::new(vec![ColumnSchema::new("n", Kind::Int)]).unwrap();
        let mut p = Profiler::new(&other, 3);
        assert!(matches!(
            p.consume(&f),
            Err(JanitorError::UnknownColumn { .. })
        ));
    }
}
