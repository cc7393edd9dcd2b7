//! Apache Parquet.
//!
//! Reading pulls rows lazily through the record API, at most `chunk_size` rows per
//! [`ChunkSource::next_chunk`] call, crossing row group boundaries as needed. Writing produces
//! one row group per chunk with OPTIONAL columns: BOOLEAN, INT64, DOUBLE, UTF8 byte arrays, and
//! INT64 `TIMESTAMP_MICROS` for times.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use ::parquet::basic::{ConvertedType, LogicalType, Repetition, Type as PhysicalType};
use ::parquet::column::writer::ColumnWriterImpl;
use ::parquet::data_type::{BoolType, ByteArray, ByteArrayType, DataType, DoubleType, Int64Type};
use ::parquet::file::properties::WriterProperties;
use ::parquet::file::reader::FileReader;
use ::parquet::file::serialized_reader::SerializedFileReader;
use ::parquet::file::writer::SerializedFileWriter;
use ::parquet::record::reader::RowIter;
use ::parquet::record::{Field, Row};
use ::parquet::schema::types::{Type, TypePtr};
use chrono::DateTime;
use tracing::debug;

use crate::error::{JanitorError, JanitorResult};
use crate::frame::{Column, ColumnData, Frame};
use crate::stream::{ChunkSink, ChunkSource};
use crate::types::{ColumnSchema, Kind, Schema, Value};

use super::SourceOptions;
use super::csv::check_schema;

/// Chunked reader over a Parquet file.
pub struct ParquetSource {
    rows: RowIter<'static>,
    schema: Arc<Schema>,
    row_groups: usize,
    chunk_size: usize,
    strict: bool,
    rows_read: usize,
}

impl ParquetSource {
    /// Open `path`. The schema comes from the file footer unless `options.schema` is set, in
    /// which case every schema column must exist as a top-level field.
    pub fn open(path: &Path, options: &SourceOptions) -> JanitorResult<Self> {
        let reader = SerializedFileReader::try_from(path)?;
        let file_schema = file_schema(&reader)?;

        let schema = match &options.schema {
            Some(schema) => {
                for col in schema.columns() {
                    if file_schema.index_of(&col.name).is_none() {
                        return Err(JanitorError::SchemaMismatch {
                            message: format!("missing required column '{}'", col.name),
                        });
                    }
                }
                Arc::clone(schema)
            }
            None => Arc::new(file_schema),
        };

        let row_groups = reader.metadata().num_row_groups();
        debug!(path = %path.display(), row_groups, "opened parquet file");
        Ok(Self {
            rows: reader.into_iter(),
            schema,
            row_groups,
            chunk_size: options.chunk_size.max(1),
            strict: options.inference.strict,
            rows_read: 0,
        })
    }

    fn row_values(&self, row: &Row) -> JanitorResult<Vec<Value>> {
        let fields: HashMap<&str, &Field> =
            row.get_column_iter().map(|(n, f)| (n.as_str(), f)).collect();

        let mut values = Vec::with_capacity(self.schema.len());
        for col in self.schema.columns() {
            let value = match fields.get(col.name.as_str()) {
                None => Value::Null,
                Some(f) => match field_to_value(col.kind, f) {
                    Ok(v) => v,
                    Err(message) if self.strict => {
                        return Err(JanitorError::ParseError {
                            row: self.rows_read,
                            column: col.name.clone(),
                            raw: f.to_string(),
                            message,
                        });
                    }
                    Err(_) => Value::Null,
                },
            };
            values.push(value);
        }
        Ok(values)
    }
}

impl ChunkSource for ParquetSource {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn next_chunk(&mut self) -> JanitorResult<Option<Frame>> {
        let mut chunk = Frame::new(Arc::clone(&self.schema));
        while chunk.rows() < self.chunk_size {
            let Some(row) = self.rows.next() else {
                break;
            };
            let row = row?;
            self.rows_read += 1;
            let values = self.row_values(&row)?;
            chunk.append_row(values)?;
        }
        Ok((!chunk.is_empty()).then_some(chunk))
    }
}

fn file_schema(reader: &SerializedFileReader<File>) -> JanitorResult<Schema> {
    let root = reader.metadata().file_metadata().schema();
    Schema::new(
        root.get_fields()
            .iter()
            .map(|f| ColumnSchema::new(f.name(), kind_of(f)))
            .collect(),
    )
}

fn kind_of(t: &Type) -> Kind {
    if !t.is_primitive() {
        return Kind::String;
    }
    let info = t.get_basic_info();
    if matches!(
        info.logical_type(),
        Some(LogicalType::Timestamp { .. } | LogicalType::Date)
    ) || matches!(
        info.converted_type(),
        ConvertedType::DATE | ConvertedType::TIMESTAMP_MILLIS | ConvertedType::TIMESTAMP_MICROS
    ) {
        return Kind::Time;
    }
    if info.converted_type() == ConvertedType::DECIMAL {
        return Kind::Float;
    }
    match t.get_physical_type() {
        PhysicalType::BOOLEAN => Kind::Bool,
        PhysicalType::INT32 | PhysicalType::INT64 => Kind::Int,
        PhysicalType::INT96 => Kind::Time,
        PhysicalType::FLOAT | PhysicalType::DOUBLE => Kind::Float,
        _ => Kind::String,
    }
}

fn field_to_value(kind: Kind, f: &Field) -> Result<Value, String> {
    let mismatch = || format!("cannot read {f} as {kind}");
    match kind {
        _ if matches!(f, Field::Null) => Ok(Value::Null),
        Kind::Bool => match f {
            Field::Bool(b) => Ok(Value::Bool(*b)),
            _ => Err(mismatch()),
        },
        Kind::Int => match f {
            Field::Byte(v) => Ok(Value::Int(i64::from(*v))),
            Field::Short(v) => Ok(Value::Int(i64::from(*v))),
            Field::Int(v) => Ok(Value::Int(i64::from(*v))),
            Field::Long(v) => Ok(Value::Int(*v)),
            Field::UByte(v) => Ok(Value::Int(i64::from(*v))),
            Field::UShort(v) => Ok(Value::Int(i64::from(*v))),
            Field::UInt(v) => Ok(Value::Int(i64::from(*v))),
            Field::ULong(v) => i64::try_from(*v)
                .map(Value::Int)
                .map_err(|_| "u64 out of range for i64".to_string()),
            _ => Err(mismatch()),
        },
        Kind::Float => match f {
            Field::Float(v) => Ok(Value::Float(f64::from(*v))),
            Field::Double(v) => Ok(Value::Float(*v)),
            Field::Int(v) => Ok(Value::Float(f64::from(*v))),
            Field::Long(v) => Ok(Value::Float(*v as f64)),
            Field::Decimal(_) => f.to_string().parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
            _ => Err(mismatch()),
        },
        Kind::Time => {
            let t = match f {
                Field::TimestampMillis(ms) => DateTime::from_timestamp_millis(*ms),
                Field::TimestampMicros(us) => DateTime::from_timestamp_micros(*us),
                Field::Date(days) => DateTime::from_timestamp(i64::from(*days) * 86_400, 0),
                _ => return Err(mismatch()),
            };
            t.map(Value::Time).ok_or_else(|| "timestamp out of range".to_string())
        }
        Kind::String => Ok(Value::Str(match f {
            Field::Str(s) => s.clone(),
            other => other.to_string(),
        })),
    }
}

/// Writes each chunk as one row group.
pub struct ParquetSink {
    writer: Option<SerializedFileWriter<File>>,
    schema: Arc<Schema>,
}

impl ParquetSink {
    pub fn create(path: &Path, schema: Arc<Schema>) -> JanitorResult<Self> {
        let file = File::create(path)?;
        let message = Arc::new(message_type(&schema)?);
        let props = Arc::new(WriterProperties::builder().build());
        let writer = SerializedFileWriter::new(file, message, props)?;
        Ok(Self {
            writer: Some(writer),
            schema,
        })
    }
}

fn message_type(schema: &Schema) -> JanitorResult<Type> {
    let mut fields: Vec<TypePtr> = Vec::with_capacity(schema.len());
    for col in schema.columns() {
        let (physical, converted) = match col.kind {
            Kind::Bool => (PhysicalType::BOOLEAN, ConvertedType::NONE),
            Kind::Int => (PhysicalType::INT64, ConvertedType::NONE),
            Kind::Float => (PhysicalType::DOUBLE, ConvertedType::NONE),
            Kind::String => (PhysicalType::BYTE_ARRAY, ConvertedType::UTF8),
            Kind::Time => (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS),
        };
        let field = Type::primitive_type_builder(&col.name, physical)
            .with_converted_type(converted)
            .with_repetition(Repetition::OPTIONAL)
            .build()?;
        fields.push(Arc::new(field));
    }
    Ok(Type::group_type_builder("schema").with_fields(fields).build()?)
}

/// Present values plus definition levels (1 = present, 0 = null).
fn levels<T, U>(data: &ColumnData<T>, convert: impl Fn(&T) -> U) -> (Vec<U>, Vec<i16>) {
    let mut values = Vec::with_capacity(data.len() - data.null_count());
    let mut defs = Vec::with_capacity(data.len());
    for v in data.iter() {
        match v {
            Some(v) => {
                values.push(convert(v));
                defs.push(1);
            }
            None => defs.push(0),
        }
    }
    (values, defs)
}

fn write_levels<T: DataType>(
    writer: &mut ColumnWriterImpl<'_, T>,
    (values, defs): (Vec<T::T>, Vec<i16>),
) -> JanitorResult<()> {
    writer.write_batch(&values, Some(&defs), None)?;
    Ok(())
}

impl ChunkSink for ParquetSink {
    fn write(&mut self, chunk: Frame) -> JanitorResult<()> {
        check_schema(&self.schema, &chunk)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| JanitorError::config("parquet sink written after finalize"))?;

        let mut group = writer.next_row_group()?;
        let mut columns = chunk.columns().iter();
        while let Some(mut out) = group.next_column()? {
            let column = columns.next().ok_or_else(|| JanitorError::SchemaMismatch {
                message: "parquet writer expects more columns than the chunk has".to_string(),
            })?;
            match column {
                Column::Bool(c) => write_levels(out.typed::<BoolType>(), levels(c, |v| *v))?,
                Column::Int(c) => write_levels(out.typed::<Int64Type>(), levels(c, |v| *v))?,
                Column::Float(c) => write_levels(out.typed::<DoubleType>(), levels(c, |v| *v))?,
                Column::Str(c) => write_levels(
                    out.typed::<ByteArrayType>(),
                    levels(c, |s| ByteArray::from(s.as_str())),
                )?,
                Column::Time(c) => write_levels(
                    out.typed::<Int64Type>(),
                    levels(c, |t| t.timestamp_micros()),
                )?,
            }
            out.close()?;
        }
        group.close()?;
        Ok(())
    }

    fn finalize(&mut self) -> JanitorResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{drain, parse_time};

    fn sample_schema() -> Arc<Schema> {
        Arc::new(
            Schema::new(vec![
                ColumnSchema::new("id", Kind::Int),
                ColumnSchema::new("score", Kind::Float),
                ColumnSchema::new("ok", Kind::Bool),
                ColumnSchema::new("name", Kind::String),
                ColumnSchema::new("at", Kind::Time),
            ])
            .unwrap(),
        )
    }

    fn write_sample(path: &Path) -> Arc<Schema> {
        let schema = sample_schema();
        let at = parse_time("2024-05-06T07:08:09.123456Z").unwrap();
        let mut sink = ParquetSink::create(path, Arc::clone(&schema)).unwrap();
        for base in [0i64, 10] {
            let mut chunk = Frame::new(Arc::clone(&schema));
            chunk
                .append_row(vec![
                    Value::Int(base + 1),
                    Value::Float(1.5),
                    Value::Bool(true),
                    Value::from("a"),
                    Value::Time(at),
                ])
                .unwrap();
            chunk
                .append_row(vec![Value::Int(base + 2), Value::Null, Value::Null, Value::Null, Value::Null])
                .unwrap();
            sink.write(chunk).unwrap();
        }
        sink.finalize().unwrap();
        schema
    }

    #[test]
    fn writes_one_row_group_per_chunk_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        let schema = write_sample(&path);

        let options = SourceOptions {
            chunk_size: 3,
            ..SourceOptions::default()
        };
        let mut source = ParquetSource::open(&path, &options).unwrap();
        assert_eq!(source.row_groups, 2);
        assert_eq!(**source.schema(), *schema);

        let frame = drain(&mut source).unwrap();
        assert_eq!(frame.rows(), 4);
        assert_eq!(frame.cell(2, "id").unwrap(), Some(Value::Int(11)));
        assert_eq!(frame.cell(0, "score").unwrap(), Some(Value::Float(1.5)));
        assert_eq!(frame.cell(1, "ok").unwrap(), None);
        assert_eq!(
            frame.cell(0, "at").unwrap(),
            Some(Value::Time(parse_time("2024-05-06T07:08:09.123456Z").unwrap()))
        );
    }

    #[test]
    fn reads_at_most_one_chunk_of_rows_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.parquet");
        let schema = Arc::new(Schema::new(vec![ColumnSchema::new("n", Kind::Int)]).unwrap());
        let mut group = Frame::new(Arc::clone(&schema));
        for n in 0..25_i64 {
            group.append_row(vec![Value::Int(n)]).unwrap();
        }
        let mut sink = ParquetSink::create(&path, schema).unwrap();
        sink.write(group).unwrap();
        sink.finalize().unwrap();

        let options = SourceOptions {
            chunk_size: 10,
            ..SourceOptions::default()
        };
        let mut source = ParquetSource::open(&path, &options).unwrap();
        assert_eq!(source.row_groups, 1);

        let first = source.next_chunk().unwrap().unwrap();
        assert_eq!(first.rows(), 10);
        assert_eq!(source.rows_read, 10);
        assert_eq!(first.cell(9, "n").unwrap(), Some(Value::Int(9)));

        let sizes: Vec<usize> = std::iter::from_fn(|| source.next_chunk().unwrap())
            .map(|c| c.rows())
            .collect();
        assert_eq!(sizes, vec![10, 5]);
        assert_eq!(source.rows_read, 25);
        assert!(source.next_chunk().unwrap().is_none());
    }

    #[test]
    fn supplied_schema_must_exist_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        write_sample(&path);

        let projected = Arc::new(
            Schema::new(vec![
                ColumnSchema::new("name", Kind::String),
                ColumnSchema::new("id", Kind::Float),
            ])
            .unwrap(),
        );
        let options = SourceOptions {
            schema: Some(projected),
            ..SourceOptions::default()
        };
        let frame = drain(&mut ParquetSource::open(&path, &options).unwrap()).unwrap();
        assert_eq!(frame.row_values(0), vec![Value::from("a"), Value::Float(1.0)]);

        let missing = Arc::new(Schema::new(vec![ColumnSchema::new("nope", Kind::Int)]).unwrap());
        let options = SourceOptions {
            schema: Some(missing),
            ..SourceOptions::default()
        };
        assert!(matches!(
            ParquetSource::open(&path, &options).err().unwrap(),
            JanitorError::SchemaMismatch { .. }
        ));
    }

    #[test]
    fn field_conversion_rules() {
        assert_eq!(field_to_value(Kind::Int, &Field::Short(7)), Ok(Value::Int(7)));
        assert_eq!(field_to_value(Kind::Float, &Field::Int(2)), Ok(Value::Float(2.0)));
        assert_eq!(field_to_value(Kind::String, &Field::Long(5)), Ok(Value::from("5")));
        assert_eq!(field_to_value(Kind::Bool, &Field::Null), Ok(Value::Null));
        assert!(field_to_value(Kind::Bool, &Field::Int(1)).is_err());
        assert!(field_to_value(Kind::Int, &Field::ULong(u64::MAX)).is_err());
    }
}
