//! File-backed sources and sinks.
//!
//! Most callers should use [`open_source`] and [`create_sink`], which pick the codec from the
//! file extension unless a [`Format`] is pinned:
//!
//! - [`csv`]: delimited text with sniffing, inference and record-shape repair
//! - [`jsonl`]: JSON lines, plus a top-level array of objects on the read side
//! - [`parquet`]: one row group per written chunk
//!
//! [`expand_inputs`] turns globs and directories into a sorted file list, and [`MultiSource`]
//! streams several files as one input.

pub mod csv;
pub mod jsonl;
pub mod parquet;

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{JanitorError, JanitorResult};
use crate::frame::Frame;
use crate::inference::{InferenceOptions, ShapeReport};
use crate::partition::SinkFactory;
use crate::stream::{ChunkSink, ChunkSource, DEFAULT_CHUNK_SIZE};
use crate::types::{Kind, Schema, Value};

pub use self::csv::{CsvSink, CsvSource};
pub use self::jsonl::{JsonlSink, JsonlSource};
pub use self::parquet::{ParquetSink, ParquetSource};

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Delimited text (comma, tab, semicolon or pipe).
    Csv,
    /// One JSON object per line; a top-level array of objects is also accepted when reading.
    Jsonl,
    /// Apache Parquet.
    Parquet,
}

impl Format {
    /// Parse a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Csv),
            "jsonl" | "ndjson" | "json" => Some(Self::Jsonl),
            "parquet" | "pq" => Some(Self::Parquet),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

fn resolve_format(path: &Path, pinned: Option<Format>) -> JanitorResult<Format> {
    pinned.or_else(|| Format::from_path(path)).ok_or_else(|| {
        JanitorError::config(format!(
            "cannot infer a format from the extension of '{}'",
            path.display()
        ))
    })
}

/// Options for opening a source.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// If `None`, detect the format from the file extension.
    pub format: Option<Format>,
    pub inference: InferenceOptions,
    /// Maximum rows per chunk.
    pub chunk_size: usize,
    /// Read with this schema instead of inferring one. Columns are matched by name.
    pub schema: Option<Arc<Schema>>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            format: None,
            inference: InferenceOptions::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            schema: None,
        }
    }
}

/// Options for creating a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkOptions {
    /// If `None`, detect the format from the file extension.
    pub format: Option<Format>,
    /// Delimited-text separator. If `None`, tab for `.tsv` files and comma otherwise.
    pub delimiter: Option<u8>,
    /// Create missing parent directories.
    pub create_dirs: bool,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            format: None,
            delimiter: None,
            create_dirs: true,
        }
    }
}

/// Open a file as a chunked source.
pub fn open_source(
    path: impl AsRef<Path>,
    options: &SourceOptions,
) -> JanitorResult<Box<dyn ChunkSource + Send>> {
    let path = path.as_ref();
    let source: Box<dyn ChunkSource + Send> = match resolve_format(path, options.format)? {
        Format::Csv => Box::new(CsvSource::open(path, options)?),
        Format::Jsonl => Box::new(JsonlSource::open(path, options)?),
        Format::Parquet => Box::new(ParquetSource::open(path, options)?),
    };
    debug!(path = %path.display(), columns = source.schema().len(), "opened source");
    Ok(source)
}

/// Create a file sink for `schema`.
pub fn create_sink(
    path: impl AsRef<Path>,
    schema: Arc<Schema>,
    options: &SinkOptions,
) -> JanitorResult<Box<dyn ChunkSink + Send>> {
    let path = path.as_ref();
    if options.create_dirs {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }
    let sink: Box<dyn ChunkSink + Send> = match resolve_format(path, options.format)? {
        Format::Csv => {
            let delimiter = options.delimiter.unwrap_or_else(|| default_delimiter(path));
            Box::new(CsvSink::create(path, schema, delimiter)?)
        }
        Format::Jsonl => Box::new(JsonlSink::create(path, schema)?),
        Format::Parquet => Box::new(ParquetSink::create(path, schema)?),
    };
    debug!(path = %path.display(), "created sink");
    Ok(sink)
}

fn default_delimiter(path: &Path) -> u8 {
    let tsv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    if tsv { b'\t' } else { b',' }
}

/// Read a whole file into one frame.
pub fn read_frame(path: impl AsRef<Path>, options: &SourceOptions) -> JanitorResult<Frame> {
    let mut source = open_source(path, options)?;
    drain(&mut source)
}

/// Collect every remaining chunk of `source` into one frame.
pub fn drain<S: ChunkSource + ?Sized>(source: &mut S) -> JanitorResult<Frame> {
    let mut out = Frame::new(Arc::clone(source.schema()));
    while let Some(chunk) = source.next_chunk()? {
        out.extend_from(&chunk)?;
    }
    Ok(out)
}

/// Write one frame to a file and finalize it.
pub fn write_frame(path: impl AsRef<Path>, frame: Frame, options: &SinkOptions) -> JanitorResult<()> {
    let mut sink = create_sink(path, Arc::clone(frame.schema()), options)?;
    let written = sink.write(frame);
    let finalized = sink.finalize();
    written.and(finalized)
}

/// Creates file sinks for a [`crate::partition::PartitionRouter`].
#[derive(Debug, Clone, Default)]
pub struct FileSinkFactory {
    pub options: SinkOptions,
}

impl FileSinkFactory {
    pub fn new(options: SinkOptions) -> Self {
        Self { options }
    }
}

impl SinkFactory for FileSinkFactory {
    fn make_sink(&mut self, path: &str, schema: &Arc<Schema>) -> JanitorResult<Box<dyn ChunkSink + Send>> {
        create_sink(path, Arc::clone(schema), &self.options)
    }
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expand input arguments into a file list.
///
/// - glob patterns expand to matching files, sorted; a pattern matching nothing is an error
/// - directories are walked recursively for files with a supported extension, sorted by name
/// - anything else is taken as a file path as-is
///
/// Duplicates are removed, keeping the first occurrence.
pub fn expand_inputs<I, P>(inputs: I) -> JanitorResult<Vec<PathBuf>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |p: PathBuf, out: &mut Vec<PathBuf>| {
        if seen.insert(p.clone()) {
            out.push(p);
        }
    };

    for input in inputs {
        let input = input.as_ref();
        let path = Path::new(input);
        if has_glob_meta(input) {
            let mut matched = Vec::new();
            for entry in glob::glob(input)? {
                let p = entry.map_err(|e| JanitorError::Io(e.into()))?;
                if p.is_file() {
                    matched.push(p);
                }
            }
            if matched.is_empty() {
                return Err(JanitorError::config(format!("pattern '{input}' matched no files")));
            }
            matched.sort();
            for p in matched {
                push(p, &mut out);
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && Format::from_path(entry.path()).is_some() {
                    push(entry.into_path(), &mut out);
                }
            }
        } else {
            push(path.to_path_buf(), &mut out);
        }
    }
    Ok(out)
}

/// Streams several files as one source.
///
/// The first file fixes the schema; later files are opened lazily with that schema and their
/// columns are matched by name. Chunks never span two files, so the last chunk of each file may
/// be short.
pub struct MultiSource {
    pending: VecDeque<PathBuf>,
    options: SourceOptions,
    current: Box<dyn ChunkSource + Send>,
    schema: Arc<Schema>,
    finished_shape: ShapeReport,
    saw_shape: bool,
}

impl std::fmt::Debug for MultiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiSource")
            .field("pending", &self.pending)
            .field("schema", &self.schema)
            .finish()
    }
}

impl MultiSource {
    pub fn open(paths: Vec<PathBuf>, options: &SourceOptions) -> JanitorResult<Self> {
        let mut pending: VecDeque<PathBuf> = paths.into();
        let first = pending
            .pop_front()
            .ok_or_else(|| JanitorError::config("no input files"))?;
        let current = open_source(&first, options)?;
        let schema = Arc::clone(current.schema());
        let mut options = options.clone();
        options.schema = Some(Arc::clone(&schema));
        Ok(Self {
            pending,
            options,
            current,
            schema,
            finished_shape: ShapeReport::default(),
            saw_shape: false,
        })
    }

    fn absorb_shape(&mut self) {
        if let Some(r) = self.current.shape_report() {
            self.finished_shape.short_records += r.short_records;
            self.finished_shape.long_records += r.long_records;
            self.saw_shape = true;
        }
    }
}

impl ChunkSource for MultiSource {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn next_chunk(&mut self) -> JanitorResult<Option<Frame>> {
        loop {
            if let Some(chunk) = self.current.next_chunk()? {
                return Ok(Some(chunk));
            }
            let Some(next) = self.pending.pop_front() else {
                return Ok(None);
            };
            self.absorb_shape();
            self.current = open_source(&next, &self.options)?;
        }
    }

    fn shape_report(&self) -> Option<ShapeReport> {
        let current = self.current.shape_report();
        if !self.saw_shape && current.is_none() {
            return None;
        }
        let mut total = self.finished_shape;
        if let Some(r) = current {
            total.short_records += r.short_records;
            total.long_records += r.long_records;
        }
        Some(total)
    }
}

/// Boolean spellings accepted in text input.
pub(crate) fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare `YYYY-MM-DD` (midnight UTC).
pub(crate) fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(t.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .ok_or_else(|| "expected RFC 3339 timestamp or YYYY-MM-DD date".to_string())
}

/// Parse one text cell into `kind`. Blank (after trimming) is null.
pub(crate) fn parse_text_cell(kind: Kind, raw: &str) -> Result<Value, String> {
    let v = raw.trim();
    if v.is_empty() {
        return Ok(Value::Null);
    }
    match kind {
        Kind::String => Ok(Value::Str(v.to_owned())),
        Kind::Int => v.parse::<i64>().map(Value::Int).map_err(|e| e.to_string()),
        Kind::Float => v.parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
        Kind::Bool => parse_bool(v).map(Value::Bool),
        Kind::Time => parse_time(v).map(Value::Time),
    }
}

/// Text form of a value for delimited output. Null is the empty string.
pub(crate) fn format_text_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.clone(),
        Value::Time(t) => format_time(t),
    }
}

pub(crate) fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(Format::from_extension("CSV"), Some(Format::Csv));
        assert_eq!(Format::from_extension("tsv"), Some(Format::Csv));
        assert_eq!(Format::from_extension("ndjson"), Some(Format::Jsonl));
        assert_eq!(Format::from_extension("pq"), Some(Format::Parquet));
        assert_eq!(Format::from_extension("xlsx"), None);
        assert_eq!(Format::from_path(Path::new("a/b.Parquet")), Some(Format::Parquet));
    }

    #[test]
    fn unknown_extension_is_a_config_error() {
        let err = open_source("data.bin", &SourceOptions::default()).err().unwrap();
        assert!(matches!(err, JanitorError::Config { .. }));
    }

    #[test]
    fn text_cells_parse_per_kind() {
        assert_eq!(parse_text_cell(Kind::Int, " 42 "), Ok(Value::Int(42)));
        assert_eq!(parse_text_cell(Kind::Float, "1e3"), Ok(Value::Float(1000.0)));
        assert_eq!(parse_text_cell(Kind::Bool, "Yes"), Ok(Value::Bool(true)));
        assert_eq!(parse_text_cell(Kind::String, "  "), Ok(Value::Null));
        assert!(parse_text_cell(Kind::Int, "1.5").is_err());

        let t = parse_text_cell(Kind::Time, "2024-03-01").unwrap();
        let Value::Time(t) = t else { panic!("expected time") };
        assert_eq!(format_time(&t), "2024-03-01T00:00:00Z");
        assert!(parse_time("2024-03-01T10:00:00+02:00").is_ok());
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn floats_format_shortest() {
        assert_eq!(format_text_cell(&Value::Float(2.5)), "2.5");
        assert_eq!(format_text_cell(&Value::Float(3.0)), "3");
        assert_eq!(format_text_cell(&Value::Null), "");
    }

    #[test]
    fn expand_inputs_walks_directories_and_globs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("b.csv"), "a\n1\n").unwrap();
        fs::write(root.join("a.jsonl"), "{}\n").unwrap();
        fs::write(root.join("notes.md"), "skip").unwrap();
        fs::write(root.join("nested/c.csv"), "a\n1\n").unwrap();

        let walked = expand_inputs([root.to_str().unwrap()]).unwrap();
        let names: Vec<_> = walked
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.jsonl", "b.csv", "nested/c.csv"]);

        let pattern = format!("{}/*.csv", root.display());
        let globbed = expand_inputs([pattern.as_str(), pattern.as_str()]).unwrap();
        assert_eq!(globbed, vec![root.join("b.csv")]);

        let missing = format!("{}/*.parquet", root.display());
        assert!(matches!(
            expand_inputs([missing.as_str()]),
            Err(JanitorError::Config { .. })
        ));
    }

    #[test]
    fn multi_source_uses_first_schema() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        fs::write(&a, "id,name\n1,x\n2,y\n").unwrap();
        fs::write(&b, "name,id\nz,3\n").unwrap();

        let options = SourceOptions {
            chunk_size: 10,
            ..SourceOptions::default()
        };
        let mut source = MultiSource::open(vec![a, b], &options).unwrap();
        let frame = drain(&mut source).unwrap();
        assert_eq!(frame.rows(), 3);
        assert_eq!(frame.cell(2, "id").unwrap(), Some(Value::Int(3)));
        assert_eq!(frame.cell(2, "name").unwrap(), Some(Value::from("z")));
        assert_eq!(source.shape_report(), Some(ShapeReport::default()));
    }

    #[test]
    fn write_then_read_frame_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/data.tsv");
        let schema = Schema::new(vec![crate::types::ColumnSchema::new("n", Kind::Int)]).unwrap();
        let mut frame = Frame::new(schema);
        frame.append_row(vec![Value::Int(7)]).unwrap();
        frame.append_row(vec![Value::Null]).unwrap();
        write_frame(&path, frame, &SinkOptions::default()).unwrap();
        // A lone empty field is quoted so the record is not read back as a blank line.
        assert_eq!(fs::read_to_string(&path).unwrap(), "n\n7\n\"\"\n");

        let back = read_frame(&path, &SourceOptions::default()).unwrap();
        assert_eq!(back.rows(), 2);
        assert_eq!(back.cell(0, "n").unwrap(), Some(Value::Int(7)));
    }
}
