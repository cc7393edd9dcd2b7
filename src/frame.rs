//! Columnar, nullable, typed row container.
//!
//! A [`Frame`] stores one dense value vector plus a parallel null mask per column. Only the
//! frame's own append path grows columns, so every value vector and mask always has exactly
//! [`Frame::rows`] entries. [`Frame::column_mut`] hands out a [`ColumnMut`] view whose
//! [`CellsMut`] handles rewrite cells in place; neither can replace, resize or retype a column.

use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{JanitorError, JanitorResult};
use crate::types::{Kind, Schema, Value};

/// Dense values plus a null mask of identical length.
///
/// The value stored under a null cell is unspecified; always go through [`ColumnData::get`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnData<T> {
    values: Vec<T>,
    nulls: Vec<bool>,
}

impl<T> ColumnData<T> {
    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when the column holds no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `true` when the cell at `row` is null.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.len()`.
    pub fn is_null(&self, row: usize) -> bool {
        self.nulls[row]
    }

    /// The cell at `row`, or `None` when it is null or out of range.
    pub fn get(&self, row: usize) -> Option<&T> {
        match self.nulls.get(row) {
            Some(false) => self.values.get(row),
            _ => None,
        }
    }

    /// Overwrite the cell at `row` and clear its null flag.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.len()`.
    pub fn set(&mut self, row: usize, value: T) {
        self.values[row] = value;
        self.nulls[row] = false;
    }

    /// Mark the cell at `row` null.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.len()`.
    pub fn set_null(&mut self, row: usize) {
        self.nulls[row] = true;
    }

    /// Iterate all cells in row order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        self.values
            .iter()
            .zip(self.nulls.iter())
            .map(|(v, &null)| if null { None } else { Some(v) })
    }

    /// Iterate the non-null cells in row order.
    pub fn present(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().flatten()
    }

    /// Number of null cells.
    pub fn null_count(&self) -> usize {
        self.nulls.iter().filter(|&&n| n).count()
    }

    /// Rewrite every non-null cell in place.
    pub fn update_present(&mut self, mut f: impl FnMut(&mut T)) {
        for (v, &null) in self.values.iter_mut().zip(self.nulls.iter()) {
            if !null {
                f(v);
            }
        }
    }
}

impl<T: Clone + Default> ColumnData<T> {
    /// Replace every null cell with `value`, returning how many were filled.
    pub fn fill_nulls(&mut self, value: &T) -> usize {
        let mut filled = 0;
        for (v, null) in self.values.iter_mut().zip(self.nulls.iter_mut()) {
            if *null {
                *v = value.clone();
                *null = false;
                filled += 1;
            }
        }
        filled
    }

    pub(crate) fn push(&mut self, value: Option<T>) {
        match value {
            Some(v) => {
                self.values.push(v);
                self.nulls.push(false);
            }
            None => {
                self.values.push(T::default());
                self.nulls.push(true);
            }
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
        self.nulls.truncate(len);
    }

    fn take(&self, rows: &[usize]) -> Self {
        Self {
            values: rows.iter().map(|&r| self.values[r].clone()).collect(),
            nulls: rows.iter().map(|&r| self.nulls[r]).collect(),
        }
    }

    fn extend(&mut self, other: &Self) {
        self.values.extend_from_slice(&other.values);
        self.nulls.extend_from_slice(&other.nulls);
    }
}

/// The kind of a value that could not be stored in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mismatch(pub(crate) &'static str);

/// One typed column. Every per-kind operation is a single exhaustive match here.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Bool(ColumnData<bool>),
    Int(ColumnData<i64>),
    Float(ColumnData<f64>),
    Str(ColumnData<String>),
    Time(ColumnData<DateTime<Utc>>),
}

impl Column {
    /// An empty column of the given kind.
    pub fn new(kind: Kind) -> Self {
        match kind {
            Kind::Bool => Column::Bool(ColumnData::default()),
            Kind::Int => Column::Int(ColumnData::default()),
            Kind::Float => Column::Float(ColumnData::default()),
            Kind::String => Column::Str(ColumnData::default()),
            Kind::Time => Column::Time(ColumnData::default()),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Column::Bool(_) => Kind::Bool,
            Column::Int(_) => Kind::Int,
            Column::Float(_) => Kind::Float,
            Column::Str(_) => Kind::String,
            Column::Time(_) => Kind::Time,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Bool(c) => c.len(),
            Column::Int(c) => c.len(),
            Column::Float(c) => c.len(),
            Column::Str(c) => c.len(),
            Column::Time(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when the cell at `row` is null.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    pub fn is_null(&self, row: usize) -> bool {
        match self {
            Column::Bool(c) => c.is_null(row),
            Column::Int(c) => c.is_null(row),
            Column::Float(c) => c.is_null(row),
            Column::Str(c) => c.is_null(row),
            Column::Time(c) => c.is_null(row),
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Bool(c) => c.null_count(),
            Column::Int(c) => c.null_count(),
            Column::Float(c) => c.null_count(),
            Column::Str(c) => c.null_count(),
            Column::Time(c) => c.null_count(),
        }
    }

    /// The cell at `row` as an owned [`Value`] ([`Value::Null`] when null or out of range).
    pub fn value(&self, row: usize) -> Value {
        match self {
            Column::Bool(c) => c.get(row).map_or(Value::Null, |v| Value::Bool(*v)),
            Column::Int(c) => c.get(row).map_or(Value::Null, |v| Value::Int(*v)),
            Column::Float(c) => c.get(row).map_or(Value::Null, |v| Value::Float(*v)),
            Column::Str(c) => c.get(row).map_or(Value::Null, |v| Value::Str(v.clone())),
            Column::Time(c) => c.get(row).map_or(Value::Null, |v| Value::Time(*v)),
        }
    }

    /// Coerce `value` to this column's kind and store it at `row`. Null sets the mask.
    pub(crate) fn set(&mut self, row: usize, value: Value) -> Result<(), Mismatch> {
        match self {
            Column::Bool(c) => store(c, row, coerce_bool(value)?),
            Column::Int(c) => store(c, row, coerce_int(value)?),
            Column::Float(c) => store(c, row, coerce_float(value)?),
            Column::Str(c) => store(c, row, coerce_str(value)?),
            Column::Time(c) => store(c, row, coerce_time(value)?),
        }
        Ok(())
    }

    /// Check that `value` could be stored without storing it.
    pub(crate) fn check(&self, value: &Value) -> Result<(), Mismatch> {
        let v = value.clone();
        match self {
            Column::Bool(_) => coerce_bool(v).map(drop),
            Column::Int(_) => coerce_int(v).map(drop),
            Column::Float(_) => coerce_float(v).map(drop),
            Column::Str(_) => coerce_str(v).map(drop),
            Column::Time(_) => coerce_time(v).map(drop),
        }
    }

    pub(crate) fn push(&mut self, value: Value) -> Result<(), Mismatch> {
        match self {
            Column::Bool(c) => c.push(coerce_bool(value)?),
            Column::Int(c) => c.push(coerce_int(value)?),
            Column::Float(c) => c.push(coerce_float(value)?),
            Column::Str(c) => c.push(coerce_str(value)?),
            Column::Time(c) => c.push(coerce_time(value)?),
        }
        Ok(())
    }

    fn push_null(&mut self) {
        match self {
            Column::Bool(c) => c.push(None),
            Column::Int(c) => c.push(None),
            Column::Float(c) => c.push(None),
            Column::Str(c) => c.push(None),
            Column::Time(c) => c.push(None),
        }
    }

    fn truncate(&mut self, len: usize) {
        match self {
            Column::Bool(c) => c.truncate(len),
            Column::Int(c) => c.truncate(len),
            Column::Float(c) => c.truncate(len),
            Column::Str(c) => c.truncate(len),
            Column::Time(c) => c.truncate(len),
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Bool(c) => Column::Bool(c.take(rows)),
            Column::Int(c) => Column::Int(c.take(rows)),
            Column::Float(c) => Column::Float(c.take(rows)),
            Column::Str(c) => Column::Str(c.take(rows)),
            Column::Time(c) => Column::Time(c.take(rows)),
        }
    }

    fn extend(&mut self, other: &Column) -> Result<(), Mismatch> {
        match (self, other) {
            (Column::Bool(a), Column::Bool(b)) => a.extend(b),
            (Column::Int(a), Column::Int(b)) => a.extend(b),
            (Column::Float(a), Column::Float(b)) => a.extend(b),
            (Column::Str(a), Column::Str(b)) => a.extend(b),
            (Column::Time(a), Column::Time(b)) => a.extend(b),
            (_, b) => return Err(Mismatch(b.kind().as_str())),
        }
        Ok(())
    }
}

/// Cell-level write access to one column inside a [`Frame`].
///
/// Reads go through [`Deref`] to [`ColumnData`]; writes are limited to existing cells.
#[derive(Debug)]
pub struct CellsMut<'a, T>(&'a mut ColumnData<T>);

impl<T> Deref for CellsMut<'_, T> {
    type Target = ColumnData<T>;

    fn deref(&self) -> &ColumnData<T> {
        self.0
    }
}

impl<T> CellsMut<'_, T> {
    /// Overwrite the cell at `row` and clear its null flag.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.len()`.
    pub fn set(&mut self, row: usize, value: T) {
        self.0.set(row, value);
    }

    /// # Panics
    ///
    /// Panics if `row >= self.len()`.
    pub fn set_null(&mut self, row: usize) {
        self.0.set_null(row);
    }

    pub fn update_present(&mut self, f: impl FnMut(&mut T)) {
        self.0.update_present(f);
    }
}

impl<T: Clone + Default> CellsMut<'_, T> {
    /// Replace every null cell with `value`, returning how many were filled.
    pub fn fill_nulls(&mut self, value: &T) -> usize {
        self.0.fill_nulls(value)
    }
}

/// Mutable view of one typed column, returned by [`Frame::column_mut`].
#[derive(Debug)]
pub enum ColumnMut<'a> {
    Bool(CellsMut<'a, bool>),
    Int(CellsMut<'a, i64>),
    Float(CellsMut<'a, f64>),
    Str(CellsMut<'a, String>),
    Time(CellsMut<'a, DateTime<Utc>>),
}

impl ColumnMut<'_> {
    pub fn kind(&self) -> Kind {
        match self {
            ColumnMut::Bool(_) => Kind::Bool,
            ColumnMut::Int(_) => Kind::Int,
            ColumnMut::Float(_) => Kind::Float,
            ColumnMut::Str(_) => Kind::String,
            ColumnMut::Time(_) => Kind::Time,
        }
    }

    /// Replace every null with `value` (coerced to this column's kind).
    ///
    /// Returns the number of cells filled.
    pub(crate) fn fill_nulls(&mut self, value: Value) -> Result<usize, Mismatch> {
        let filled = match self {
            ColumnMut::Bool(c) => coerce_bool(value)?.map(|v| c.fill_nulls(&v)),
            ColumnMut::Int(c) => coerce_int(value)?.map(|v| c.fill_nulls(&v)),
            ColumnMut::Float(c) => coerce_float(value)?.map(|v| c.fill_nulls(&v)),
            ColumnMut::Str(c) => coerce_str(value)?.map(|v| c.fill_nulls(&v)),
            ColumnMut::Time(c) => coerce_time(value)?.map(|v| c.fill_nulls(&v)),
        };
        Ok(filled.unwrap_or(0))
    }
}

fn store<T>(c: &mut ColumnData<T>, row: usize, value: Option<T>) {
    match value {
        Some(v) => c.set(row, v),
        None => c.set_null(row),
    }
}

fn coerce_bool(value: Value) -> Result<Option<bool>, Mismatch> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        other => Err(Mismatch(other.type_name())),
    }
}

// Floats truncate toward zero; non-finite or out-of-range floats are rejected.
fn coerce_int(value: Value) -> Result<Option<i64>, Mismatch> {
    match value {
        Value::Null => Ok(None),
        Value::Int(i) => Ok(Some(i)),
        Value::Float(f) => {
            let t = f.trunc();
            if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
                Ok(Some(t as i64))
            } else {
                Err(Mismatch("non-finite or out-of-range float"))
            }
        }
        other => Err(Mismatch(other.type_name())),
    }
}

fn coerce_float(value: Value) -> Result<Option<f64>, Mismatch> {
    match value {
        Value::Null => Ok(None),
        Value::Float(f) => Ok(Some(f)),
        Value::Int(i) => Ok(Some(i as f64)),
        other => Err(Mismatch(other.type_name())),
    }
}

fn coerce_str(value: Value) -> Result<Option<String>, Mismatch> {
    match value {
        Value::Null => Ok(None),
        Value::Str(s) => Ok(Some(s)),
        other => Err(Mismatch(other.type_name())),
    }
}

fn coerce_time(value: Value) -> Result<Option<DateTime<Utc>>, Mismatch> {
    match value {
        Value::Null => Ok(None),
        Value::Time(t) => Ok(Some(t)),
        other => Err(Mismatch(other.type_name())),
    }
}

/// The columnar store for one [`Schema`].
#[derive(Debug, Clone)]
pub struct Frame {
    schema: Arc<Schema>,
    columns: Vec<Column>,
    nrows: usize,
}

impl Frame {
    /// An empty frame with one zero-length column per schema column.
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        let schema = schema.into();
        let columns = schema.columns().iter().map(|c| Column::new(c.kind)).collect();
        Self {
            schema,
            columns,
            nrows: 0,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    /// Columns in schema order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.schema.index_of(name).map(|i| &self.columns[i])
    }

    /// Cell-level write access to one column. The view cannot change the column's length or kind.
    pub fn column_mut(&mut self, name: &str) -> Option<ColumnMut<'_>> {
        let i = self.schema.index_of(name)?;
        Some(match &mut self.columns[i] {
            Column::Bool(c) => ColumnMut::Bool(CellsMut(c)),
            Column::Int(c) => ColumnMut::Int(CellsMut(c)),
            Column::Float(c) => ColumnMut::Float(CellsMut(c)),
            Column::Str(c) => ColumnMut::Str(CellsMut(c)),
            Column::Time(c) => ColumnMut::Time(CellsMut(c)),
        })
    }

    /// # Panics
    ///
    /// Panics if `index >= self.cols()`.
    pub fn column_at(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    /// Append one all-null row.
    pub fn append_null_row(&mut self) {
        for c in &mut self.columns {
            c.push_null();
        }
        self.nrows += 1;
    }

    /// Append one row of values in schema order.
    ///
    /// All-or-nothing: if any value cannot be coerced, the frame is left unchanged.
    pub fn append_row(&mut self, values: Vec<Value>) -> JanitorResult<()> {
        if values.len() != self.columns.len() {
            return Err(JanitorError::SchemaMismatch {
                message: format!(
                    "row has {} values but schema has {} columns",
                    values.len(),
                    self.columns.len()
                ),
            });
        }
        for (i, (col, v)) in self.columns.iter().zip(values.iter()).enumerate() {
            if let Err(Mismatch(found)) = col.check(v) {
                return Err(self.mismatch(i, found));
            }
        }
        for (i, v) in values.into_iter().enumerate() {
            if let Err(Mismatch(found)) = self.columns[i].push(v) {
                // Unreachable after `check`, but keep the length invariant regardless.
                for c in &mut self.columns {
                    c.truncate(self.nrows);
                }
                return Err(self.mismatch(i, found));
            }
        }
        self.nrows += 1;
        Ok(())
    }

    /// Set one cell, coercing `value` to the column's kind.
    ///
    /// Int and Float widen into each other (floats truncate toward zero); [`Value::Null`]
    /// sets the null mask. Any other kind mismatch is a [`JanitorError::TypeMismatch`].
    pub fn set_cell(&mut self, row: usize, column: &str, value: impl Into<Value>) -> JanitorResult<()> {
        let idx = self.index(column)?;
        if row >= self.nrows {
            return Err(JanitorError::RowOutOfBounds {
                row,
                rows: self.nrows,
            });
        }
        self.columns[idx]
            .set(row, value.into())
            .map_err(|Mismatch(found)| self.mismatch(idx, found))
    }

    /// Read one cell; `Ok(None)` means the cell is null.
    pub fn cell(&self, row: usize, column: &str) -> JanitorResult<Option<Value>> {
        let idx = self.index(column)?;
        if row >= self.nrows {
            return Err(JanitorError::RowOutOfBounds {
                row,
                rows: self.nrows,
            });
        }
        Ok(match self.columns[idx].value(row) {
            Value::Null => None,
            v => Some(v),
        })
    }

    /// Values of one row in schema order.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.rows()`.
    pub fn row_values(&self, row: usize) -> Vec<Value> {
        assert!(row < self.nrows, "row {row} out of bounds ({} rows)", self.nrows);
        self.columns.iter().map(|c| c.value(row)).collect()
    }

    /// A new frame holding the listed rows, in the listed order.
    ///
    /// # Panics
    ///
    /// Panics if any index is `>= self.rows()`.
    pub fn take_rows(&self, rows: &[usize]) -> Frame {
        Frame {
            schema: Arc::clone(&self.schema),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            nrows: rows.len(),
        }
    }

    /// A new frame holding rows `start..end` (clamped to the frame).
    pub fn slice(&self, start: usize, end: usize) -> Frame {
        let end = end.min(self.nrows);
        let start = start.min(end);
        let rows: Vec<usize> = (start..end).collect();
        self.take_rows(&rows)
    }

    /// Append every row of `other`, which must have an equal schema.
    pub fn extend_from(&mut self, other: &Frame) -> JanitorResult<()> {
        if self.schema != other.schema {
            return Err(JanitorError::SchemaMismatch {
                message: "cannot append rows from a frame with a different schema".to_string(),
            });
        }
        for (i, (a, b)) in self.columns.iter_mut().zip(other.columns.iter()).enumerate() {
            if let Err(Mismatch(found)) = a.extend(b) {
                return Err(JanitorError::TypeMismatch {
                    column: self.schema.columns()[i].name.clone(),
                    expected: a.kind(),
                    found: found.to_string(),
                });
            }
        }
        self.nrows += other.nrows;
        Ok(())
    }

    fn index(&self, column: &str) -> JanitorResult<usize> {
        self.schema
            .index_of(column)
            .ok_or_else(|| JanitorError::UnknownColumn {
                column: column.to_string(),
            })
    }

    fn mismatch(&self, idx: usize, found: &str) -> JanitorError {
        JanitorError::TypeMismatch {
            column: self.schema.columns()[idx].name.clone(),
            expected: self.columns[idx].kind(),
            found: found.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnSchema;

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnSchema::new("id", Kind::Int),
            ColumnSchema::new("score", Kind::Float),
            ColumnSchema::new("name", Kind::String),
        ])
        .unwrap()
    }

    #[test]
    fn append_null_row_grows_every_column() {
        let mut f = Frame::new(schema());
        for _ in 0..3 {
            f.append_null_row();
        }
        assert_eq!(f.rows(), 3);
        for c in f.columns() {
            assert_eq!(c.len(), 3);
            assert_eq!(c.null_count(), 3);
        }
    }

    #[test]
    fn set_cell_coerces_between_numeric_kinds() {
        let mut f = Frame::new(schema());
        f.append_null_row();
        f.set_cell(0, "id", 3.9).unwrap();
        f.set_cell(0, "score", 2_i64).unwrap();
        assert_eq!(f.cell(0, "id").unwrap(), Some(Value::Int(3)));
        assert_eq!(f.cell(0, "score").unwrap(), Some(Value::Float(2.0)));
    }

    #[test]
    fn set_cell_rejects_mismatch_and_leaves_cell_untouched() {
        let mut f = Frame::new(schema());
        f.append_null_row();
        f.set_cell(0, "id", 7_i64).unwrap();
        let err = f.set_cell(0, "id", "seven").unwrap_err();
        assert!(matches!(err, JanitorError::TypeMismatch { ref column, .. } if column == "id"));
        assert_eq!(f.cell(0, "id").unwrap(), Some(Value::Int(7)));
        assert!(f.set_cell(0, "id", f64::NAN).is_err());
    }

    #[test]
    fn set_cell_null_sets_mask_and_value_clears_it() {
        let mut f = Frame::new(schema());
        f.append_null_row();
        f.set_cell(0, "name", "ada").unwrap();
        f.set_cell(0, "name", Value::Null).unwrap();
        assert_eq!(f.cell(0, "name").unwrap(), None);
        f.set_cell(0, "name", "bob").unwrap();
        assert_eq!(f.cell(0, "name").unwrap(), Some(Value::Str("bob".into())));
    }

    #[test]
    fn cell_access_errors() {
        let mut f = Frame::new(schema());
        f.append_null_row();
        assert!(matches!(
            f.set_cell(1, "id", 1_i64),
            Err(JanitorError::RowOutOfBounds { row: 1, rows: 1 })
        ));
        assert!(matches!(
            f.cell(0, "missing"),
            Err(JanitorError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn append_row_is_all_or_nothing() {
        let mut f = Frame::new(schema());
        f.append_row(vec![1_i64.into(), 1.5.into(), "a".into()]).unwrap();
        let err = f
            .append_row(vec![2_i64.into(), "oops".into(), "b".into()])
            .unwrap_err();
        assert!(matches!(err, JanitorError::TypeMismatch { .. }));
        assert_eq!(f.rows(), 1);
        for c in f.columns() {
            assert_eq!(c.len(), 1);
        }
    }

    #[test]
    fn column_mut_rewrites_cells_but_keeps_length_and_kind() {
        let mut f = Frame::new(schema());
        f.append_row(vec![1_i64.into(), Value::Null, "a".into()]).unwrap();
        f.append_row(vec![2_i64.into(), 2.5.into(), Value::Null]).unwrap();

        match f.column_mut("id") {
            Some(ColumnMut::Int(mut c)) => {
                assert_eq!(c.len(), 2);
                c.update_present(|v| *v *= 10);
                c.set_null(0);
            }
            other => panic!("unexpected view: {other:?}"),
        }
        let mut name = f.column_mut("name").unwrap();
        assert_eq!(name.kind(), Kind::String);
        assert_eq!(name.fill_nulls(Value::from("z")), Ok(1));
        assert!(f.column_mut("missing").is_none());

        assert_eq!(f.rows(), 2);
        for c in f.columns() {
            assert_eq!(c.len(), 2);
        }
        assert_eq!(f.column("id").map(Column::kind), Some(Kind::Int));
        assert_eq!(f.cell(0, "id").unwrap(), None);
        assert_eq!(f.cell(1, "id").unwrap(), Some(Value::Int(20)));
        assert_eq!(f.cell(1, "name").unwrap(), Some(Value::from("z")));
        assert_eq!(f.take_rows(&[1, 0]).cell(0, "id").unwrap(), Some(Value::Int(20)));
    }

    #[test]
    fn take_rows_and_extend() {
        let mut f = Frame::new(schema());
        for i in 0..4_i64 {
            f.append_row(vec![i.into(), Value::Null, format!("r{i}").into()])
                .unwrap();
        }
        let sub = f.take_rows(&[3, 1]);
        assert_eq!(sub.rows(), 2);
        assert_eq!(sub.cell(0, "id").unwrap(), Some(Value::Int(3)));
        assert_eq!(sub.cell(1, "name").unwrap(), Some(Value::Str("r1".into())));

        let mut acc = Frame::new(Arc::clone(f.schema()));
        acc.extend_from(&sub).unwrap();
        acc.extend_from(&f.slice(0, 1)).unwrap();
        assert_eq!(acc.rows(), 3);
        assert_eq!(acc.cell(2, "id").unwrap(), Some(Value::Int(0)));
    }
}
