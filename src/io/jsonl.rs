//! JSON lines.
//!
//! Supported inputs:
//! - newline-delimited JSON objects (`{"a":1}\n{"a":2}\n`)
//! - a top-level array of objects (`[{"a":1}, {"a":2}]`); the array is decoded as a whole
//!
//! With a supplied schema, column names may be dot paths into nested objects (`user.name`).

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::DateTime;
use serde_json::de::IoRead;
use serde_json::{Deserializer, Map, Number, StreamDeserializer, Value as JsonValue};

use crate::error::{JanitorError, JanitorResult};
use crate::frame::Frame;
use crate::inference::infer_json_schema;
use crate::stream::{ChunkSink, ChunkSource};
use crate::types::{Kind, Schema, Value};

use super::csv::check_schema;
use super::{SourceOptions, format_time, parse_bool, parse_time};

type Object = Map<String, JsonValue>;

/// Chunked reader over JSON lines.
pub struct JsonlSource<R: Read> {
    stream: StreamDeserializer<'static, IoRead<R>, JsonValue>,
    array_items: VecDeque<JsonValue>,
    replay: VecDeque<(u64, Object)>,
    records: u64,
    schema: Arc<Schema>,
    chunk_size: usize,
    strict: bool,
}

impl JsonlSource<BufReader<File>> {
    pub fn open(path: &Path, options: &SourceOptions) -> JanitorResult<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), options)
    }
}

impl<R: Read> JsonlSource<R> {
    /// Decode the inference sample (unless `options.schema` is set) and settle the schema.
    pub fn new(input: R, options: &SourceOptions) -> JanitorResult<Self> {
        let mut source = Self {
            stream: Deserializer::from_reader(input).into_iter(),
            array_items: VecDeque::new(),
            replay: VecDeque::new(),
            records: 0,
            schema: Arc::new(Schema::new(Vec::new())?),
            chunk_size: options.chunk_size.max(1),
            strict: options.inference.strict,
        };

        source.schema = match &options.schema {
            Some(schema) => Arc::clone(schema),
            None => {
                let mut sample = Vec::new();
                while sample.len() < options.inference.sample_rows {
                    let next = source.next_object().map_err(|e| {
                        JanitorError::inference(format!("failed to decode sample: {e}"))
                    })?;
                    match next {
                        Some(record) => sample.push(record),
                        None => break,
                    }
                }
                if sample.is_empty() {
                    return Err(JanitorError::inference("input has no records"));
                }
                let objects: Vec<Object> = sample.iter().map(|(_, o)| o.clone()).collect();
                let schema = infer_json_schema(&objects)?;
                source.replay = sample.into();
                Arc::new(schema)
            }
        };
        Ok(source)
    }

    fn next_object(&mut self) -> JanitorResult<Option<(u64, Object)>> {
        loop {
            if let Some(item) = self.array_items.pop_front() {
                return self.expect_object(item).map(Some);
            }
            match self.stream.next() {
                None => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(JsonValue::Array(items))) => self.array_items.extend(items),
                Some(Ok(value)) => return self.expect_object(value).map(Some),
            }
        }
    }

    fn expect_object(&mut self, value: JsonValue) -> JanitorResult<(u64, Object)> {
        self.records += 1;
        match value {
            JsonValue::Object(map) => Ok((self.records, map)),
            other => Err(JanitorError::SchemaMismatch {
                message: format!(
                    "json record {} is {}, expected an object",
                    self.records,
                    json_type(&other)
                ),
            }),
        }
    }

    fn next_record(&mut self) -> JanitorResult<Option<(u64, Object)>> {
        match self.replay.pop_front() {
            Some(r) => Ok(Some(r)),
            None => self.next_object(),
        }
    }

    fn to_row(&self, record: u64, object: &Object) -> JanitorResult<Vec<Value>> {
        let mut row = Vec::with_capacity(self.schema.len());
        for col in self.schema.columns() {
            let value = match lookup(object, &col.name) {
                None => Value::Null,
                Some(v) => match json_to_value(col.kind, v) {
                    Ok(v) => v,
                    Err(message) if self.strict => {
                        return Err(JanitorError::ParseError {
                            row: record as usize,
                            column: col.name.clone(),
                            raw: v.to_string(),
                            message,
                        });
                    }
                    Err(_) => Value::Null,
                },
            };
            row.push(value);
        }
        Ok(row)
    }
}

impl<R: Read> ChunkSource for JsonlSource<R> {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn next_chunk(&mut self) -> JanitorResult<Option<Frame>> {
        let mut chunk = Frame::new(Arc::clone(&self.schema));
        while chunk.rows() < self.chunk_size {
            let Some((record, object)) = self.next_record()? else {
                break;
            };
            chunk.append_row(self.to_row(record, &object)?)?;
        }
        Ok((!chunk.is_empty()).then_some(chunk))
    }
}

/// Exact key first, then a dot path through nested objects.
fn lookup<'a>(object: &'a Object, name: &str) -> Option<&'a JsonValue> {
    if let Some(v) = object.get(name) {
        return Some(v);
    }
    if !name.contains('.') {
        return None;
    }
    let mut parts = name.split('.');
    let mut cur = object.get(parts.next()?)?;
    for part in parts {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

fn json_type(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a bool",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Convert one decoded JSON value to `kind`.
///
/// Numbers and numeric strings both read as Int/Float (floats truncate into Int columns);
/// String columns keep strings as-is and store any other value as its JSON text.
fn json_to_value(kind: Kind, v: &JsonValue) -> Result<Value, String> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || format!("cannot read {} as {kind}", json_type(v));
    match kind {
        Kind::String => Ok(Value::Str(match v {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })),
        Kind::Float => match v {
            JsonValue::Number(n) => n.as_f64().map(Value::Float).ok_or_else(mismatch),
            JsonValue::String(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
            _ => Err(mismatch()),
        },
        Kind::Int => match v {
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Value::Int(i));
                }
                let f = n.as_f64().ok_or_else(mismatch)?.trunc();
                if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Ok(Value::Int(f as i64))
                } else {
                    Err(format!("{n} is out of range for an integer"))
                }
            }
            JsonValue::String(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|e| e.to_string()),
            _ => Err(mismatch()),
        },
        Kind::Bool => match v {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::String(s) => parse_bool(s.trim()).map(Value::Bool),
            _ => Err(mismatch()),
        },
        Kind::Time => match v {
            JsonValue::String(s) => parse_time(s.trim()).map(Value::Time),
            JsonValue::Number(n) => n
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(Value::Time)
                .ok_or_else(|| format!("{n} is not a unix timestamp in seconds")),
            _ => Err(mismatch()),
        },
    }
}

fn value_to_json(v: Value) -> Option<JsonValue> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(JsonValue::Bool(b)),
        Value::Int(i) => Some(JsonValue::Number(i.into())),
        Value::Float(f) => Number::from_f64(f).map(JsonValue::Number),
        Value::Str(s) => Some(JsonValue::String(s)),
        Value::Time(t) => Some(JsonValue::String(format_time(&t))),
    }
}

/// Writes one JSON object per row, keys in schema order, null cells omitted.
pub struct JsonlSink<W: Write> {
    out: W,
    schema: Arc<Schema>,
}

impl JsonlSink<BufWriter<File>> {
    pub fn create(path: &Path, schema: Arc<Schema>) -> JanitorResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), schema))
    }
}

impl<W: Write> JsonlSink<W> {
    pub fn new(out: W, schema: Arc<Schema>) -> Self {
        Self { out, schema }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ChunkSink for JsonlSink<W> {
    fn write(&mut self, chunk: Frame) -> JanitorResult<()> {
        check_schema(&self.schema, &chunk)?;
        for row in 0..chunk.rows() {
            let mut object = Object::with_capacity(chunk.cols());
            for (col, column) in self.schema.columns().iter().zip(chunk.columns()) {
                if let Some(v) = value_to_json(column.value(row)) {
                    object.insert(col.name.clone(), v);
                }
            }
            serde_json::to_writer(&mut self.out, &object)?;
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> JanitorResult<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceOptions;
    use crate::io::drain;
    use crate::types::ColumnSchema;

    fn source(text: &str, options: SourceOptions) -> JanitorResult<JsonlSource<&[u8]>> {
        JsonlSource::new(text.as_bytes(), &options)
    }

    #[test]
    fn infers_from_lines_and_replays_sample() {
        let text = "{\"id\": 1, \"score\": \"2.5\", \"ok\": true}\n{\"id\": 2, \"name\": \"b\"}\n";
        let mut s = source(text, SourceOptions::default()).unwrap();
        assert_eq!(
            s.schema().names().collect::<Vec<_>>(),
            vec!["id", "score", "ok", "name"]
        );
        assert_eq!(s.schema().column("score").unwrap().kind, Kind::Float);
        let frame = drain(&mut s).unwrap();
        assert_eq!(frame.rows(), 2);
        assert_eq!(frame.cell(0, "score").unwrap(), Some(Value::Float(2.5)));
        assert_eq!(frame.cell(1, "ok").unwrap(), None);
        assert_eq!(frame.cell(1, "name").unwrap(), Some(Value::from("b")));
    }

    #[test]
    fn accepts_top_level_array() {
        let options = SourceOptions {
            chunk_size: 2,
            inference: InferenceOptions {
                sample_rows: 1,
                ..InferenceOptions::default()
            },
            ..SourceOptions::default()
        };
        let mut s = source("[{\"a\": 1}, {\"a\": 2}, {\"a\": 3}]", options).unwrap();
        assert_eq!(s.next_chunk().unwrap().unwrap().rows(), 2);
        assert_eq!(s.next_chunk().unwrap().unwrap().rows(), 1);
        assert!(s.next_chunk().unwrap().is_none());
    }

    #[test]
    fn non_object_records_are_rejected() {
        let err = source("{\"a\": 1}\n42\n", SourceOptions::default()).err().unwrap();
        assert!(matches!(err, JanitorError::Inference { .. }));
    }

    #[test]
    fn supplied_schema_reads_dot_paths_and_converts() {
        let schema = Arc::new(
            Schema::new(vec![
                ColumnSchema::new("user.name", Kind::String),
                ColumnSchema::new("n", Kind::Int),
                ColumnSchema::new("tags", Kind::String),
            ])
            .unwrap(),
        );
        let options = SourceOptions {
            schema: Some(schema),
            ..SourceOptions::default()
        };
        let text = "{\"user\": {\"name\": \"ann\"}, \"n\": 2.9, \"tags\": [1, 2]}\n{\"n\": \"x\"}\n";
        let frame = drain(&mut source(text, options).unwrap()).unwrap();
        assert_eq!(
            frame.row_values(0),
            vec![Value::from("ann"), Value::Int(2), Value::from("[1,2]")]
        );
        assert_eq!(frame.row_values(1), vec![Value::Null, Value::Null, Value::Null]);
    }

    #[test]
    fn strict_mode_reports_record_number() {
        let schema = Arc::new(Schema::new(vec![ColumnSchema::new("n", Kind::Int)]).unwrap());
        let options = SourceOptions {
            schema: Some(schema),
            inference: InferenceOptions {
                strict: true,
                ..InferenceOptions::default()
            },
            ..SourceOptions::default()
        };
        let err = drain(&mut source("{\"n\": 1}\n{\"n\": true}\n", options).unwrap()).unwrap_err();
        assert!(matches!(err, JanitorError::ParseError { row: 2, .. }));
    }

    #[test]
    fn sink_omits_nulls_and_keeps_schema_order() {
        let schema = Arc::new(
            Schema::new(vec![
                ColumnSchema::new("z", Kind::Int),
                ColumnSchema::new("a", Kind::Float),
                ColumnSchema::new("s", Kind::String),
            ])
            .unwrap(),
        );
        let mut chunk = Frame::new(Arc::clone(&schema));
        chunk
            .append_row(vec![Value::Int(1), Value::Null, Value::from("x")])
            .unwrap();
        chunk
            .append_row(vec![Value::Null, Value::Float(0.5), Value::Null])
            .unwrap();
        let mut sink = JsonlSink::new(Vec::new(), schema);
        sink.write(chunk).unwrap();
        sink.finalize().unwrap();
        assert_eq!(
            String::from_utf8(sink.into_inner()).unwrap(),
            "{\"z\":1,\"s\":\"x\"}\n{\"a\":0.5}\n"
        );
    }
}
