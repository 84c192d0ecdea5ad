//! Minimal in-memory relational table.
//!
//! The synchronization engine operates on fully materialized tables with a
//! small set of relational operations: column selection, row filtering, hash
//! joins, outer row concatenation, and group/first-non-null aggregation. This
//! module provides exactly that surface; see [`ops`] for the multi-table
//! operations.

pub mod ops;

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Result, SyncError};

/// A single nullable cell value.
///
/// Equality and hashing are total (floats compare by bit pattern) so values
/// can key hash maps during joins and grouping. Join and equality-constraint
/// code must treat [`Value::Null`] specially: null never matches anything,
/// including another null.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Render a non-null value as text for similarity matching.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.clone()),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Int(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "<null>"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A column-oriented table with named, equally sized columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
    columns: Vec<Vec<Value>>,
}

impl Frame {
    /// Create an empty table with no columns and no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from (name, values) pairs, validating shape.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut frame = Frame::new();
        for (name, values) in columns {
            let name: String = name.into();
            frame.add_column(&name, values)?;
        }
        Ok(frame)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&[Value]> {
        match self.index.get(name) {
            Some(&i) => Ok(&self.columns[i]),
            None => Err(SyncError::MissingColumn {
                column: name.to_string(),
            }),
        }
    }

    pub fn value(&self, name: &str, row: usize) -> Result<&Value> {
        Ok(&self.column(name)?[row])
    }

    /// Append a column. Its length must match the current row count unless
    /// the table has no columns yet.
    pub fn add_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if self.index.contains_key(name) {
            return Err(SyncError::DuplicateColumn {
                column: name.to_string(),
            });
        }
        if !self.names.is_empty() && values.len() != self.len() {
            return Err(SyncError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        self.index.insert(name.to_string(), self.columns.len());
        self.names.push(name.to_string());
        self.columns.push(values);
        Ok(())
    }

    /// Append an all-null column.
    pub fn add_null_column(&mut self, name: &str) -> Result<()> {
        let nulls = vec![Value::Null; self.len()];
        self.add_column(name, nulls)
    }

    /// Replace an existing column's values; the length must match.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        let i = *self.index.get(name).ok_or_else(|| SyncError::MissingColumn {
            column: name.to_string(),
        })?;
        if values.len() != self.len() {
            return Err(SyncError::LengthMismatch {
                column: name.to_string(),
                expected: self.len(),
                actual: values.len(),
            });
        }
        self.columns[i] = values;
        Ok(())
    }

    /// Overwrite every cell of a column with the same value, creating the
    /// column if absent.
    pub fn set_constant_column(&mut self, name: &str, value: Value) -> Result<()> {
        let filled = vec![value; self.len()];
        match self.index.get(name) {
            Some(&i) => {
                self.columns[i] = filled;
                Ok(())
            }
            None => self.add_column(name, filled),
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        let i = *self.index.get(from).ok_or_else(|| SyncError::MissingColumn {
            column: from.to_string(),
        })?;
        if self.index.contains_key(to) {
            return Err(SyncError::DuplicateColumn {
                column: to.to_string(),
            });
        }
        self.index.remove(from);
        self.index.insert(to.to_string(), i);
        self.names[i] = to.to_string();
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        let i = *self.index.get(name).ok_or_else(|| SyncError::MissingColumn {
            column: name.to_string(),
        })?;
        self.names.remove(i);
        self.columns.remove(i);
        self.index.remove(name);
        for v in self.index.values_mut() {
            if *v > i {
                *v -= 1;
            }
        }
        Ok(())
    }

    /// Project onto the given columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Frame> {
        let mut frame = Frame::new();
        for name in names {
            frame.add_column(name, self.column(name)?.to_vec())?;
        }
        Ok(frame)
    }

    /// Keep the rows whose mask entry is `true`.
    pub fn filter(&self, mask: &[bool]) -> Frame {
        debug_assert_eq!(mask.len(), self.len());
        let mut out = self.empty_like();
        for (c, column) in self.columns.iter().enumerate() {
            out.columns[c] = column
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| v.clone())
                .collect();
        }
        out
    }

    /// Keep the rows at the given indices, in order.
    pub fn take(&self, rows: &[usize]) -> Frame {
        let mut out = self.empty_like();
        for (c, column) in self.columns.iter().enumerate() {
            out.columns[c] = rows.iter().map(|&r| column[r].clone()).collect();
        }
        out
    }

    /// Drop rows that are null in any of the listed columns.
    pub fn drop_nulls(&self, subset: &[&str]) -> Result<Frame> {
        let mut mask = vec![true; self.len()];
        for name in subset {
            for (r, v) in self.column(name)?.iter().enumerate() {
                if v.is_null() {
                    mask[r] = false;
                }
            }
        }
        Ok(self.filter(&mask))
    }

    /// Distinct non-null values of a column.
    pub fn unique_non_null(&self, name: &str) -> Result<FxHashSet<Value>> {
        Ok(self
            .column(name)?
            .iter()
            .filter(|v| !v.is_null())
            .cloned()
            .collect())
    }

    pub fn non_null_count(&self, name: &str) -> Result<usize> {
        Ok(self.column(name)?.iter().filter(|v| !v.is_null()).count())
    }

    /// Clone one row as a name-ordered vector of values.
    pub fn row(&self, r: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c[r].clone()).collect()
    }

    /// Append a row; the value count must match the column count.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.width() {
            return Err(SyncError::LengthMismatch {
                column: "<row>".to_string(),
                expected: self.width(),
                actual: values.len(),
            });
        }
        for (c, v) in values.into_iter().enumerate() {
            self.columns[c].push(v);
        }
        Ok(())
    }

    /// Same schema, zero rows.
    pub fn empty_like(&self) -> Frame {
        Frame {
            names: self.names.clone(),
            index: self.index.clone(),
            columns: vec![Vec::new(); self.columns.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_columns([
            (
                "team_name",
                vec![
                    Value::from("Arsenal"),
                    Value::from("Chelsea"),
                    Value::Null,
                ],
            ),
            ("team_id", vec![Value::from(1), Value::from(2), Value::from(3)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_and_lookup() {
        let f = sample();
        assert_eq!(f.len(), 3);
        assert_eq!(f.width(), 2);
        assert!(f.has_column("team_name"));
        assert_eq!(f.value("team_id", 1).unwrap(), &Value::from(2));
    }

    #[test]
    fn test_add_column_length_mismatch() {
        let mut f = sample();
        let err = f.add_column("extra", vec![Value::Null]).unwrap_err();
        assert!(matches!(err, SyncError::LengthMismatch { .. }));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut f = sample();
        let err = f.add_column("team_id", Vec::new()).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_drop_nulls() {
        let f = sample();
        let kept = f.drop_nulls(&["team_name"]).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.value("team_id", 1).unwrap(), &Value::from(2));
    }

    #[test]
    fn test_drop_column_reindexes() {
        let mut f = sample();
        f.drop_column("team_name").unwrap();
        assert_eq!(f.column_names(), &["team_id".to_string()]);
        assert_eq!(f.value("team_id", 0).unwrap(), &Value::from(1));
    }

    #[test]
    fn test_select_order() {
        let f = sample();
        let sel = f.select(&["team_id", "team_name"]).unwrap();
        assert_eq!(
            sel.column_names(),
            &["team_id".to_string(), "team_name".to_string()]
        );
    }

    #[test]
    fn test_unique_non_null_skips_nulls() {
        let f = sample();
        let names = f.unique_non_null("team_name").unwrap();
        assert_eq!(names.len(), 2);
        assert!(!names.contains(&Value::Null));
    }

    #[test]
    fn test_float_values_hash_by_bits() {
        let mut set = FxHashSet::default();
        set.insert(Value::from(0.75));
        assert!(set.contains(&Value::from(0.75)));
        assert!(!set.contains(&Value::from(0.5)));
    }
}
