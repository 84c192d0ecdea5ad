//! Multi-table operations: joins, suffix coalescing, concatenation, grouping.

use rustc_hash::FxHashMap;

use super::{Frame, Value};
use crate::error::{Result, SyncError};

/// How unmatched left rows are treated by [`join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Keep only rows with a key match on both sides.
    Inner,
    /// Keep every left row; unmatched rows get nulls for the right columns.
    Left,
}

/// Hash join of two tables on equality of the `on` columns.
///
/// Rows with a null in any key column never match (SQL semantics). Duplicate
/// keys multiply rows (cartesian product of the matching groups). Key columns
/// appear once in the output; any other column name present on both sides is
/// suffixed `_x` (left) and `_y` (right).
pub fn join(left: &Frame, right: &Frame, on: &[&str], kind: JoinKind) -> Result<Frame> {
    for key in on {
        left.column(key)?;
        right.column(key)?;
    }

    let right_extra: Vec<&String> = right
        .column_names()
        .iter()
        .filter(|n| !on.contains(&n.as_str()))
        .collect();

    // Pandas-style suffixes on colliding non-key names.
    let colliding: Vec<&String> = left
        .column_names()
        .iter()
        .filter(|n| !on.contains(&n.as_str()) && right_extra.iter().any(|r| r == n))
        .collect();

    let mut out = Frame::new();
    for name in left.column_names() {
        let out_name = if colliding.iter().any(|c| *c == name) {
            format!("{name}_x")
        } else {
            name.clone()
        };
        out.add_column(&out_name, Vec::new())?;
    }
    for name in &right_extra {
        let out_name = if colliding.iter().any(|c| c == name) {
            format!("{name}_y")
        } else {
            (*name).clone()
        };
        out.add_column(&out_name, Vec::new())?;
    }

    // Index the right side by key tuple, skipping null keys.
    let mut by_key: FxHashMap<Vec<Value>, Vec<usize>> = FxHashMap::default();
    'rows: for r in 0..right.len() {
        let mut key = Vec::with_capacity(on.len());
        for k in on {
            let v = right.value(k, r)?;
            if v.is_null() {
                continue 'rows;
            }
            key.push(v.clone());
        }
        by_key.entry(key).or_default().push(r);
    }

    let right_null_tail = vec![Value::Null; right_extra.len()];
    for l in 0..left.len() {
        let mut key = Some(Vec::with_capacity(on.len()));
        for k in on {
            let v = left.value(k, l)?;
            if v.is_null() {
                key = None;
                break;
            }
            if let Some(key) = key.as_mut() {
                key.push(v.clone());
            }
        }

        let matches = key.as_ref().and_then(|k| by_key.get(k));
        match matches {
            Some(rows) => {
                for &r in rows {
                    let mut row = left.row(l);
                    for name in &right_extra {
                        row.push(right.value(name, r)?.clone());
                    }
                    out.push_row(row)?;
                }
            }
            None => {
                if kind == JoinKind::Left {
                    let mut row = left.row(l);
                    row.extend(right_null_tail.iter().cloned());
                    out.push_row(row)?;
                }
            }
        }
    }

    Ok(out)
}

/// SQL-style COALESCE of suffixed column pairs left behind by [`join`].
///
/// For each name `c` with both `c_x` and `c_y` present, null `c_x` cells are
/// filled from `c_y` (non-null `c_x` cells are never overwritten), `c_x` is
/// renamed to `c`, and `c_y` is dropped. Names without both suffixed columns
/// are ignored.
pub fn coalesce(frame: &mut Frame, columns: &[&str]) -> Result<()> {
    for name in columns {
        let x = format!("{name}_x");
        let y = format!("{name}_y");
        if !(frame.has_column(&x) && frame.has_column(&y)) {
            continue;
        }
        let fill: Vec<Value> = frame.column(&y)?.to_vec();
        let xi = frame.index[&x];
        for (r, v) in frame.columns[xi].iter_mut().enumerate() {
            if v.is_null() {
                *v = fill[r].clone();
            }
        }
        frame.rename_column(&x, name)?;
        frame.drop_column(&y)?;
    }
    Ok(())
}

/// Outer row concatenation: the result schema is the union of all input
/// schemas in first-seen order, with absent cells null.
pub fn concat_rows(frames: &[&Frame]) -> Result<Frame> {
    let mut out = Frame::new();
    for frame in frames {
        for name in frame.column_names() {
            if !out.has_column(name) {
                let nulls = vec![Value::Null; out.len()];
                out.add_column(name, nulls)?;
            }
        }
        for r in 0..frame.len() {
            let row: Vec<Value> = out
                .column_names()
                .iter()
                .map(|name| {
                    if frame.has_column(name) {
                        frame.value(name, r).cloned()
                    } else {
                        Ok(Value::Null)
                    }
                })
                .collect::<Result<_>>()?;
            out.push_row(row)?;
        }
    }
    Ok(out)
}

/// Group by exact equality on `keys` and aggregate each column in `agg` to
/// its first non-null value within the group.
///
/// Groups are emitted in order of first appearance, and "first non-null"
/// follows input row order, so the operation is deterministic for a given row
/// order and idempotent. Rows with a null in any key column form their own
/// singleton groups, kept in position.
pub fn group_first_non_null(frame: &Frame, keys: &[&str], agg: &[&str]) -> Result<Frame> {
    for name in keys.iter().chain(agg) {
        frame.column(name)?;
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_key: FxHashMap<Vec<Value>, usize> = FxHashMap::default();
    for r in 0..frame.len() {
        let mut key = Some(Vec::with_capacity(keys.len()));
        for k in keys {
            let v = frame.value(k, r)?;
            if v.is_null() {
                key = None;
                break;
            }
            if let Some(key) = key.as_mut() {
                key.push(v.clone());
            }
        }
        match key {
            Some(key) => {
                let slot = *by_key.entry(key).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[slot].push(r);
            }
            None => groups.push(vec![r]),
        }
    }

    let mut out = Frame::new();
    for name in keys.iter().chain(agg) {
        out.add_column(name, Vec::new())?;
    }
    for group in &groups {
        let first = group[0];
        let mut row: Vec<Value> = keys
            .iter()
            .map(|k| frame.value(k, first).cloned())
            .collect::<Result<_>>()?;
        for name in agg {
            let column = frame.column(name)?;
            let v = group
                .iter()
                .map(|&r| &column[r])
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null);
            row.push(v);
        }
        out.push_row(row)?;
    }
    Ok(out)
}

/// Remove exact duplicate rows, keeping the first occurrence.
pub fn drop_duplicate_rows(frame: &Frame) -> Frame {
    let mut seen: FxHashMap<Vec<Value>, ()> = FxHashMap::default();
    let mut keep = Vec::new();
    for r in 0..frame.len() {
        if seen.insert(frame.row(r), ()).is_none() {
            keep.push(r);
        }
    }
    frame.take(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left() -> Frame {
        Frame::from_columns([
            ("k", vec![Value::from(1), Value::from(2), Value::Null]),
            (
                "a_id",
                vec![Value::from("a1"), Value::from("a2"), Value::from("a3")],
            ),
        ])
        .unwrap()
    }

    fn right() -> Frame {
        Frame::from_columns([
            ("k", vec![Value::from(2), Value::from(1)]),
            ("b_id", vec![Value::from("b2"), Value::from("b1")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_left_join_preserves_left_rows() {
        let joined = join(&left(), &right(), &["k"], JoinKind::Left).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.value("b_id", 0).unwrap(), &Value::from("b1"));
        assert_eq!(joined.value("b_id", 1).unwrap(), &Value::from("b2"));
        // null key never matches
        assert_eq!(joined.value("b_id", 2).unwrap(), &Value::Null);
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let joined = join(&left(), &right(), &["k"], JoinKind::Inner).unwrap();
        assert_eq!(joined.len(), 2);
    }

    #[test]
    fn test_join_suffixes_colliding_columns() {
        let mut r = right();
        r.add_column(
            "a_id",
            vec![Value::from("other2"), Value::from("other1")],
        )
        .unwrap();
        let joined = join(&left(), &r, &["k"], JoinKind::Left).unwrap();
        assert!(joined.has_column("a_id_x"));
        assert!(joined.has_column("a_id_y"));
        assert!(!joined.has_column("a_id"));
    }

    #[test]
    fn test_join_duplicate_keys_multiply() {
        let mut r = right();
        r.push_row(vec![Value::from(1), Value::from("b1-dup")]).unwrap();
        let joined = join(&left(), &r, &["k"], JoinKind::Left).unwrap();
        assert_eq!(joined.len(), 4);
    }

    #[test]
    fn test_coalesce_fills_nulls_only() {
        let mut frame = Frame::from_columns([
            ("id_x", vec![Value::from("kept"), Value::Null]),
            ("id_y", vec![Value::from("ignored"), Value::from("filled")]),
        ])
        .unwrap();
        coalesce(&mut frame, &["id"]).unwrap();
        assert!(frame.has_column("id"));
        assert!(!frame.has_column("id_y"));
        assert_eq!(frame.value("id", 0).unwrap(), &Value::from("kept"));
        assert_eq!(frame.value("id", 1).unwrap(), &Value::from("filled"));
    }

    #[test]
    fn test_coalesce_ignores_absent_pairs() {
        let mut frame = left();
        coalesce(&mut frame, &["missing"]).unwrap();
        assert_eq!(frame.width(), 2);
    }

    #[test]
    fn test_concat_rows_outer_union() {
        let extra = Frame::from_columns([
            ("k", vec![Value::from(9)]),
            ("c_id", vec![Value::from("c9")]),
        ])
        .unwrap();
        let l = left();
        let out = concat_rows(&[&l, &extra]).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out.value("a_id", 3).unwrap(), &Value::Null);
        assert_eq!(out.value("c_id", 3).unwrap(), &Value::from("c9"));
        assert_eq!(out.value("c_id", 0).unwrap(), &Value::Null);
    }

    #[test]
    fn test_group_first_non_null() {
        let frame = Frame::from_columns([
            (
                "name",
                vec![
                    Value::from("x"),
                    Value::from("x"),
                    Value::from("y"),
                    Value::Null,
                ],
            ),
            (
                "a_id",
                vec![Value::Null, Value::from("a2"), Value::from("a3"), Value::Null],
            ),
            (
                "b_id",
                vec![Value::from("b1"), Value::Null, Value::Null, Value::from("b4")],
            ),
        ])
        .unwrap();
        let grouped = group_first_non_null(&frame, &["name"], &["a_id", "b_id"]).unwrap();
        assert_eq!(grouped.len(), 3);
        // first-appearance order, first non-null per column
        assert_eq!(grouped.value("name", 0).unwrap(), &Value::from("x"));
        assert_eq!(grouped.value("a_id", 0).unwrap(), &Value::from("a2"));
        assert_eq!(grouped.value("b_id", 0).unwrap(), &Value::from("b1"));
        // null key forms its own group
        assert_eq!(grouped.value("name", 2).unwrap(), &Value::Null);
        assert_eq!(grouped.value("b_id", 2).unwrap(), &Value::from("b4"));
    }

    #[test]
    fn test_group_first_non_null_idempotent() {
        let frame = Frame::from_columns([
            ("name", vec![Value::from("x"), Value::from("y")]),
            ("a_id", vec![Value::from("a1"), Value::from("a2")]),
        ])
        .unwrap();
        let once = group_first_non_null(&frame, &["name"], &["a_id"]).unwrap();
        let twice = group_first_non_null(&once, &["name"], &["a_id"]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_drop_duplicate_rows() {
        let frame = Frame::from_columns([
            ("a", vec![Value::from(1), Value::from(1), Value::from(2)]),
            ("b", vec![Value::from("x"), Value::from("x"), Value::from("x")]),
        ])
        .unwrap();
        let out = drop_duplicate_rows(&frame);
        assert_eq!(out.len(), 2);
    }
}
