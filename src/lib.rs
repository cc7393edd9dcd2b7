//! `rust-data-janitor` cleans tabular data: it infers a schema for delimited text, JSON lines or
//! Parquet input, loads it into typed nullable [`frame::Frame`]s, runs an ordered
//! [`pipeline::Pipeline`] of column transforms and writes the result, either whole or streamed
//! in bounded chunks, optionally fanned out to one file per partition.
//!
//! ## Inputs and outputs
//!
//! **File formats (auto-detected by extension, see [`io::Format`]):**
//!
//! - **Delimited text**: `.csv`, `.tsv`, `.txt` (delimiter sniffed from the first 4 KiB)
//! - **JSON lines**: `.jsonl`, `.ndjson`, `.json` (objects, or arrays of objects)
//! - **Parquet**: `.parquet`, `.pq`
//!
//! **Column kinds:** [`types::Kind::Int`], [`types::Kind::Float`], [`types::Kind::Bool`],
//! [`types::Kind::String`] and [`types::Kind::Time`]. Every column is nullable; blank text cells
//! and JSON `null` load as nulls.
//!
//! ## Quick example: clean in memory
//!
//! ```rust
//! use std::io::Cursor;
//!
//! use rust_data_janitor::context::RunContext;
//! use rust_data_janitor::io::{CsvSource, SourceOptions, drain};
//! use rust_data_janitor::pipeline::Pipeline;
//! use rust_data_janitor::types::{Kind, Value};
//!
//! # fn main() -> Result<(), rust_data_janitor::JanitorError> {
//! let data = "city,price\nPARIS,10.0\nlyon,\nNice,30.0\n";
//! let mut source = CsvSource::new(Cursor::new(data), &SourceOptions::default())?;
//! let mut frame = drain(&mut source)?;
//! assert_eq!(frame.schema().column("price").map(|c| c.kind), Some(Kind::Float));
//!
//! let mut pipeline = Pipeline::from_json(
//!     r#"[{"lower": {"column": "city"}}, {"impute_mean": {"column": "price"}}]"#,
//! )?;
//! pipeline.run(&RunContext::new(), &mut frame)?;
//!
//! assert_eq!(frame.cell(0, "city")?, Some(Value::from("paris")));
//! assert_eq!(frame.cell(1, "price")?, Some(Value::Float(20.0)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Quick example: file-to-file job
//!
//! ```no_run
//! use rust_data_janitor::context::RunContext;
//! use rust_data_janitor::job::{CleaningJob, JobOptions};
//! use rust_data_janitor::pipeline::Pipeline;
//! use rust_data_janitor::transform::ImputeMedian;
//!
//! # fn main() -> Result<(), rust_data_janitor::JanitorError> {
//! let options = JobOptions {
//!     partition_by: vec!["country".into()],
//!     ..Default::default()
//! };
//! let stats = CleaningJob::new("raw/", "clean/{col:country}/{basename}.jsonl",
//!     Pipeline::new().add(ImputeMedian::new("age")))
//!     .with_options(options)
//!     .run(&RunContext::new())?;
//! println!("rows={} partitions={}", stats.rows_out, stats.partitions);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: kinds, schemas and cell values
//! - [`frame`]: the columnar nullable frame
//! - [`inference`]: delimiter sniffing and schema inference
//! - [`transform`] and [`pipeline`]: column transforms and ordered pipelines
//! - [`io`]: file sources and sinks, format detection, input expansion
//! - [`stream`]: chunked execution, stream metrics and progress reporting
//! - [`partition`]: routing rows to per-partition sinks
//! - [`profile`]: per-column summary statistics
//! - [`job`] and [`observability`]: file-to-file jobs and their outcome observers
//! - [`context`]: cancellation and deadlines
//! - [`error`]: the crate error type

pub mod context;
pub mod error;
pub mod frame;
pub mod inference;
pub mod io;
pub mod job;
pub mod observability;
pub mod partition;
pub mod pipeline;
pub mod profile;
pub mod stream;
pub mod transform;
pub mod types;

pub use error::{JanitorError, JanitorResult};
