//! Delimited text.
//!
//! The source sniffs the delimiter from the first [`SNIFF_PREFIX`] bytes, infers a schema from
//! the header and a bounded sample of records, then replays the sample before streaming the rest.
//! Records with the wrong number of fields are padded with nulls or truncated (and counted in
//! the [`ShapeReport`]), unless strict mode turns them into [`JanitorError::Shape`].

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Chain, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use ::csv::{ByteRecord, Reader, ReaderBuilder, Writer, WriterBuilder};
use tracing::warn;

use crate::error::{JanitorError, JanitorResult};
use crate::frame::Frame;
use crate::inference::{SNIFF_PREFIX, ShapeReport, infer_text_schema, sniff};
use crate::stream::{ChunkSink, ChunkSource};
use crate::types::{Schema, Value};

use super::{SourceOptions, format_text_cell, parse_text_cell};

type Line = (u64, Vec<String>);

/// Chunked reader over delimited text.
pub struct CsvSource<R: Read> {
    reader: Reader<Chain<Cursor<Vec<u8>>, R>>,
    record: ByteRecord,
    schema: Arc<Schema>,
    /// Record field index for each schema column.
    positions: Vec<usize>,
    expected_fields: usize,
    pending: VecDeque<Line>,
    chunk_size: usize,
    strict: bool,
    lossy_utf8: bool,
    shape: ShapeReport,
    reported: bool,
}

impl CsvSource<BufReader<File>> {
    pub fn open(path: &Path, options: &SourceOptions) -> JanitorResult<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), options)
    }
}

impl<R: Read> CsvSource<R> {
    /// Sniff, read the header and sample, and settle the schema.
    ///
    /// With `options.schema` set, no inference happens: header names are matched to schema
    /// columns (a missing column is a [`JanitorError::SchemaMismatch`]), or without a header the
    /// schema columns are taken positionally.
    pub fn new(mut input: R, options: &SourceOptions) -> JanitorResult<Self> {
        let mut prefix = Vec::with_capacity(SNIFF_PREFIX);
        (&mut input).take(SNIFF_PREFIX as u64).read_to_end(&mut prefix)?;
        let sniffed = sniff(&prefix);
        let delimiter = options.inference.delimiter.unwrap_or(sniffed.delimiter);

        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(Cursor::new(prefix).chain(input));

        let mut source = Self {
            reader,
            record: ByteRecord::new(),
            schema: Arc::new(Schema::new(Vec::new())?),
            positions: Vec::new(),
            expected_fields: 0,
            pending: VecDeque::new(),
            chunk_size: options.chunk_size.max(1),
            strict: options.inference.strict,
            lossy_utf8: sniffed.lenient_quotes,
            shape: ShapeReport::default(),
            reported: false,
        };

        let header = if options.inference.has_header {
            source
                .read_line()
                .map_err(|e| JanitorError::inference(format!("failed to read header: {e}")))?
                .map(|(_, names)| names)
        } else {
            None
        };

        match &options.schema {
            Some(schema) => {
                source.positions = match &header {
                    Some(names) => schema
                        .columns()
                        .iter()
                        .map(|c| {
                            names.iter().position(|n| n.trim() == c.name).ok_or_else(|| {
                                JanitorError::SchemaMismatch {
                                    message: format!("missing required column '{}'", c.name),
                                }
                            })
                        })
                        .collect::<JanitorResult<_>>()?,
                    None => (0..schema.len()).collect(),
                };
                source.expected_fields = header.as_ref().map_or(schema.len(), Vec::len);
                source.schema = Arc::clone(schema);
            }
            None => {
                let mut lines = Vec::new();
                let mut sample = Vec::new();
                while sample.len() < options.inference.sample_rows {
                    let next = source
                        .read_line()
                        .map_err(|e| JanitorError::inference(format!("failed to read sample: {e}")))?;
                    let Some((line, fields)) = next else { break };
                    lines.push(line);
                    sample.push(fields);
                }
                let schema = infer_text_schema(header.as_deref(), &sample)?;
                source.expected_fields = schema.len();
                source.positions = (0..schema.len()).collect();
                source.schema = Arc::new(schema);
                source.pending = lines.into_iter().zip(sample).collect();
            }
        }
        Ok(source)
    }

    fn read_line(&mut self) -> JanitorResult<Option<Line>> {
        if !self.reader.read_byte_record(&mut self.record)? {
            return Ok(None);
        }
        let line = self.record.position().map_or(0, |p| p.line());
        let mut fields = Vec::with_capacity(self.record.len());
        for raw in self.record.iter() {
            let field = if self.lossy_utf8 {
                String::from_utf8_lossy(raw).into_owned()
            } else {
                String::from_utf8(raw.to_vec()).map_err(|_| {
                    JanitorError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("record {line} is not valid UTF-8"),
                    ))
                })?
            };
            fields.push(field);
        }
        Ok(Some((line, fields)))
    }

    fn next_line(&mut self) -> JanitorResult<Option<Line>> {
        match self.pending.pop_front() {
            Some(l) => Ok(Some(l)),
            None => self.read_line(),
        }
    }

    fn to_row(&mut self, line: u64, fields: &[String]) -> JanitorResult<Vec<Value>> {
        let actual = fields.len();
        if actual != self.expected_fields {
            if self.strict {
                return Err(JanitorError::Shape {
                    line,
                    expected: self.expected_fields,
                    actual,
                });
            }
            if actual < self.expected_fields {
                self.shape.short_records += 1;
            } else {
                self.shape.long_records += 1;
            }
        }

        let mut row = Vec::with_capacity(self.positions.len());
        for (col, &pos) in self.schema.columns().iter().zip(&self.positions) {
            let raw = fields.get(pos).map_or("", String::as_str);
            let value = match parse_text_cell(col.kind, raw) {
                Ok(v) => v,
                Err(message) if self.strict => {
                    return Err(JanitorError::ParseError {
                        row: line as usize,
                        column: col.name.clone(),
                        raw: raw.to_owned(),
                        message,
                    });
                }
                Err(_) => Value::Null,
            };
            row.push(value);
        }
        Ok(row)
    }
}

impl<R: Read> ChunkSource for CsvSource<R> {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn next_chunk(&mut self) -> JanitorResult<Option<Frame>> {
        let mut chunk = Frame::new(Arc::clone(&self.schema));
        while chunk.rows() < self.chunk_size {
            let Some((line, fields)) = self.next_line()? else {
                break;
            };
            let row = self.to_row(line, &fields)?;
            chunk.append_row(row)?;
        }
        if chunk.is_empty() {
            if !self.reported {
                self.reported = true;
                if let Some(summary) = self.shape.warning_summary() {
                    warn!(%summary, "repaired malformed records");
                }
            }
            return Ok(None);
        }
        Ok(Some(chunk))
    }

    fn shape_report(&self) -> Option<ShapeReport> {
        Some(self.shape)
    }
}

/// Writes chunks as delimited text with a single header row.
pub struct CsvSink<W: Write> {
    writer: Writer<W>,
    schema: Arc<Schema>,
    wrote_header: bool,
}

impl CsvSink<BufWriter<File>> {
    pub fn create(path: &Path, schema: Arc<Schema>, delimiter: u8) -> JanitorResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file), schema, delimiter))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(out: W, schema: Arc<Schema>, delimiter: u8) -> Self {
        Self {
            writer: WriterBuilder::new().delimiter(delimiter).from_writer(out),
            schema,
            wrote_header: false,
        }
    }

    /// Recover the underlying writer after flushing.
    pub fn into_inner(self) -> JanitorResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| JanitorError::Io(e.into_error()))
    }

    fn ensure_header(&mut self) -> JanitorResult<()> {
        if !self.wrote_header {
            self.writer.write_record(self.schema.names())?;
            self.wrote_header = true;
        }
        Ok(())
    }
}

impl<W: Write> ChunkSink for CsvSink<W> {
    fn write(&mut self, chunk: Frame) -> JanitorResult<()> {
        check_schema(&self.schema, &chunk)?;
        self.ensure_header()?;
        let mut fields = Vec::with_capacity(chunk.cols());
        for row in 0..chunk.rows() {
            fields.clear();
            fields.extend(chunk.columns().iter().map(|c| format_text_cell(&c.value(row))));
            self.writer.write_record(&fields)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> JanitorResult<()> {
        self.ensure_header()?;
        self.writer.flush()?;
        Ok(())
    }
}

/// A sink accepts only chunks of the schema it was created for.
pub(crate) fn check_schema(expected: &Arc<Schema>, chunk: &Frame) -> JanitorResult<()> {
    if Arc::ptr_eq(expected, chunk.schema()) || **expected == **chunk.schema() {
        Ok(())
    } else {
        Err(JanitorError::SchemaMismatch {
            message: format!(
                "sink expects columns [{}], chunk has [{}]",
                expected.names().collect::<Vec<_>>().join(", "),
                chunk.schema().names().collect::<Vec<_>>().join(", ")
            ),
        })
    }
}
