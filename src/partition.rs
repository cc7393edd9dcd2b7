//! Partitioned output.
//!
//! [`PartitionRouter`] is a [`ChunkSink`] that splits every chunk by the values of its partition
//! columns and forwards each group to a sink chosen by expanding a path template:
//!
//! - `{col:<name>}` becomes the group's sanitized value of partition column `<name>`
//! - `{basename}` becomes the whole partition key (values joined with `/`)
//!
//! Sinks are opened lazily through a [`SinkFactory`], at most once per expanded path, and all of
//! them are finalized when the router is finalized.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{JanitorError, JanitorResult};
use crate::frame::{Column, Frame};
use crate::stream::ChunkSink;
use crate::types::{Schema, Value};

/// Partition value of a null cell.
pub const NULL_TOKEN: &str = "__null__";
/// Partition value of an empty string.
pub const EMPTY_TOKEN: &str = "__empty__";

/// Opens the sink for one expanded output path.
pub trait SinkFactory {
    fn make_sink(&mut self, path: &str, schema: &Arc<Schema>) -> JanitorResult<Box<dyn ChunkSink + Send>>;
}

impl<F> SinkFactory for F
where
    F: FnMut(&str, &Arc<Schema>) -> JanitorResult<Box<dyn ChunkSink + Send>>,
{
    fn make_sink(&mut self, path: &str, schema: &Arc<Schema>) -> JanitorResult<Box<dyn ChunkSink + Send>> {
        self(path, schema)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// Index into the router's partition columns.
    Column(usize),
    Basename,
}

/// A parsed output path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse `template` against the ordered partition `columns`.
    ///
    /// Braces that are not a recognized placeholder are kept literally. A template without any
    /// placeholder, or with a `{col:..}` naming a non-partition column, is a config error.
    pub fn parse(template: &str, columns: &[String]) -> JanitorResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                literal.push_str(&rest[open..]);
                rest = "";
                break;
            };
            let inner = &after[..close];
            let placeholder = if inner == "basename" {
                Some(Segment::Basename)
            } else if let Some(name) = inner.strip_prefix("col:") {
                let i = columns.iter().position(|c| c == name).ok_or_else(|| {
                    JanitorError::config(format!(
                        "template '{template}' references '{name}', which is not a partition column"
                    ))
                })?;
                Some(Segment::Column(i))
            } else {
                None
            };
            match placeholder {
                Some(seg) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(seg);
                }
                None => literal.push_str(&rest[open..open + close + 2]),
            }
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.iter().any(|s| !matches!(s, Segment::Literal(_))) {
            return Err(JanitorError::config(format!(
                "template '{template}' has no {{col:<name>}} or {{basename}} placeholder"
            )));
        }
        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Expand with one group's sanitized partition values, in partition-column order.
    pub fn expand(&self, values: &[String]) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Column(i) => out.push_str(&values[*i]),
                Segment::Basename => out.push_str(&values.join("/")),
            }
        }
        out
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Replace path separators and whitespace with `_`; map `.`, `..` to `_` and `""` to
/// [`EMPTY_TOKEN`].
pub fn sanitize(raw: &str) -> String {
    if raw.is_empty() {
        return EMPTY_TOKEN.to_string();
    }
    let s: String = raw
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_whitespace() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if s == "." || s == ".." { "_".to_string() } else { s }
}

/// Sanitized partition value of one cell.
pub fn partition_value(column: &Column, row: usize) -> String {
    let raw = match column.value(row) {
        Value::Null => return NULL_TOKEN.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_significant(f),
        Value::Str(s) => s,
        Value::Time(t) => t.format("%Y-%m-%d").to_string(),
    };
    sanitize(&raw)
}

// Six significant digits, switching to exponent form outside 1e-4..1e6 like `%g`.
pub(crate) fn format_significant(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }
    let sci = format!("{v:.5e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        let decimals = (5 - exp).max(0) as usize;
        trim_fraction(&format!("{v:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

struct OpenSink {
    path: String,
    sink: Box<dyn ChunkSink + Send>,
    rows: u64,
}

/// Fans chunks out to per-partition sinks.
pub struct PartitionRouter<F> {
    columns: Vec<String>,
    template: PathTemplate,
    factory: F,
    sinks: Vec<OpenSink>,
    by_path: HashMap<String, usize>,
    finalized: bool,
}

impl<F> fmt::Debug for PartitionRouter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionRouter")
            .field("columns", &self.columns)
            .field("template", &self.template.source)
            .field("open_sinks", &self.sinks.len())
            .finish()
    }
}

impl<F: SinkFactory> PartitionRouter<F> {
    pub fn new<I, S>(columns: I, template: &str, factory: F) -> JanitorResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(JanitorError::config("partitioning needs at least one column"));
        }
        let template = PathTemplate::parse(template, &columns)?;
        Ok(Self {
            columns,
            template,
            factory,
            sinks: Vec::new(),
            by_path: HashMap::new(),
            finalized: false,
        })
    }

    /// Expanded paths in the order their sinks were opened.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(|s| s.path.as_str())
    }

    /// Rows written per expanded path, in opening order.
    pub fn rows_per_path(&self) -> Vec<(&str, u64)> {
        self.sinks.iter().map(|s| (s.path.as_str(), s.rows)).collect()
    }

    pub fn partitions(&self) -> usize {
        self.sinks.len()
    }

    fn sink_for(&mut self, path: String, schema: &Arc<Schema>) -> JanitorResult<usize> {
        if let Some(&i) = self.by_path.get(&path) {
            return Ok(i);
        }
        let sink = self.factory.make_sink(&path, schema)?;
        info!(path = %path, "opened partition sink");
        let i = self.sinks.len();
        self.by_path.insert(path.clone(), i);
        self.sinks.push(OpenSink { path, sink, rows: 0 });
        Ok(i)
    }
}

impl<F: SinkFactory> ChunkSink for PartitionRouter<F> {
    fn write(&mut self, chunk: Frame) -> JanitorResult<()> {
        let positions = self
            .columns
            .iter()
            .map(|c| {
                chunk
                    .schema()
                    .index_of(c)
                    .ok_or_else(|| JanitorError::UnknownColumn { column: c.clone() })
            })
            .collect::<JanitorResult<Vec<_>>>()?;

        let mut groups: Vec<(Vec<String>, Vec<usize>)> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();
        for row in 0..chunk.rows() {
            let values: Vec<String> = positions
                .iter()
                .map(|&i| partition_value(chunk.column_at(i), row))
                .collect();
            let key = values.join("/");
            match by_key.get(&key) {
                Some(&g) => groups[g].1.push(row),
                None => {
                    by_key.insert(key, groups.len());
                    groups.push((values, vec![row]));
                }
            }
        }

        for (values, rows) in groups {
            let path = self.template.expand(&values);
            let slot = self.sink_for(path, chunk.schema())?;
            let part = chunk.take_rows(&rows);
            let open = &mut self.sinks[slot];
            open.sink.write(part)?;
            open.rows += rows.len() as u64;
        }
        Ok(())
    }

    /// Finalize every opened sink in opening order. All sinks are attempted; the first error is
    /// returned.
    fn finalize(&mut self) -> JanitorResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        let mut first = None;
        for open in &mut self.sinks {
            if let Err(e) = open.sink.finalize() {
                if first.is_none() {
                    first = Some(e);
                } else {
                    warn!(path = %open.path, error = %e, "partition sink finalize failed");
                }
            }
        }
        first.map_or(Ok(()), Err)
    }
}
