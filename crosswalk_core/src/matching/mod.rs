//! Pairwise matching strategies.
//!
//! The engine is entity-kind-agnostic; everything kind-specific lives behind
//! the [`PairMatcher`] trait. The concrete strategies share the helpers here:
//! the empty-side carry contract, identifier-pair resolution from string
//! similarity results, date-column shifting, and COALESCE-style gap filling
//! that can never overwrite an existing match.

pub mod fixture;
pub mod player;
pub mod team;

use std::fmt;

use chrono::{Duration, NaiveDate};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::content::EntityContent;
use crate::error::{Result, SyncError};
use crate::frame::{ops, Frame, Value};
use crate::text::similarity::{
    cosine_similarity_match_with, fuzzy_similarity_match, naive_token_match, Normalizer,
};

/// A pluggable pairwise matching strategy for one entity kind.
///
/// Contract: if one side is empty, return the other side's rows plus a null
/// column for the empty side's identifier (schema preservation, not a match);
/// otherwise return a new wrapper whose table carries both identifier columns.
/// Implementations must not mutate their inputs.
pub trait PairMatcher: Send + Sync {
    fn synchronize_pair(
        &self,
        input1: &EntityContent,
        input2: &EntityContent,
    ) -> Result<EntityContent>;
}

/// Name-similarity methodology for one cascade layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SimilarityMethod {
    /// Trigram TF-IDF cosine similarity with optimal assignment.
    Cosine { threshold: f64 },
    /// Normalized token-set equality/containment.
    Naive,
    /// Jaro-winkler with optimal assignment.
    Fuzzy { threshold: f64 },
}

impl fmt::Display for SimilarityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimilarityMethod::Cosine { threshold } => write!(f, "cosine(threshold={threshold})"),
            SimilarityMethod::Naive => write!(f, "naive"),
            SimilarityMethod::Fuzzy { threshold } => write!(f, "fuzzy(threshold={threshold})"),
        }
    }
}

/// Empty-side contract shared by every matcher: carry the non-empty side
/// through with a null column for the empty side's identifier.
pub(crate) fn carry_empty_side(
    input1: &EntityContent,
    input2: &EntityContent,
) -> Result<Option<EntityContent>> {
    let (carried, missing_id) = if input1.data.is_empty() {
        (input2, input1.id_field())
    } else if input2.data.is_empty() {
        (input1, input2.id_field())
    } else {
        return Ok(None);
    };

    let mut data = carried.data.clone();
    if !data.has_column(missing_id) {
        data.add_null_column(missing_id)?;
    }
    Ok(Some(EntityContent::from_parts(
        carried.kind(),
        carried.provider(),
        data,
    )))
}

/// Tier-one exact join: left-join `input1` with `input2` reduced to the join
/// columns plus its identifier, so the result is `input1`'s schema plus the
/// right identifier column.
pub(crate) fn exact_left_join(
    input1: &EntityContent,
    input2: &EntityContent,
    join_columns: &[String],
) -> Result<Frame> {
    let mut selected: Vec<&str> = join_columns.iter().map(String::as_str).collect();
    selected.push(input2.id_field());
    let right = input2.data.select(&selected)?;
    let on: Vec<&str> = join_columns.iter().map(String::as_str).collect();
    ops::join(&input1.data, &right, &on, ops::JoinKind::Left)
}

/// Rows of `input` whose identifier is absent from `synced`, wrapped again.
pub(crate) fn remaining_content(input: &EntityContent, synced: &Frame) -> Result<EntityContent> {
    let rest = input.remainder(synced)?;
    Ok(EntityContent::from_parts(
        input.kind(),
        input.provider(),
        rest,
    ))
}

/// Fill identifier gaps in `sync_result` from accepted `(id1, id2)` pairs.
///
/// Applied as a left join on `id1_field` followed by a COALESCE of
/// `id2_field`, so existing non-null identifiers are never overwritten. When
/// an `id1` value claims several counterparts the first pair wins; later
/// claims become no-ops against the filled cell.
pub(crate) fn fill_id_pairs(
    sync_result: Frame,
    id1_field: &str,
    id2_field: &str,
    pairs: &[(Value, Value)],
) -> Result<Frame> {
    if pairs.is_empty() {
        return Ok(sync_result);
    }

    let mut seen: FxHashSet<&Value> = FxHashSet::default();
    let mut col1 = Vec::new();
    let mut col2 = Vec::new();
    for (id1, id2) in pairs {
        if seen.insert(id1) {
            col1.push(id1.clone());
            col2.push(id2.clone());
        }
    }

    let pairs_frame = Frame::from_columns([
        (id1_field.to_string(), col1),
        (id2_field.to_string(), col2),
    ])?;
    let mut joined = ops::join(
        &sync_result,
        &pairs_frame,
        &[id1_field],
        ops::JoinKind::Left,
    )?;
    ops::coalesce(&mut joined, &[id2_field])?;
    Ok(joined)
}

/// Copy `frame` with `column` parsed as an ISO date, shifted by `days`, and
/// reformatted with `out_format`. Unparseable or non-string cells become
/// null.
pub(crate) fn shifted_date_frame(
    frame: &Frame,
    column: &str,
    days: i64,
    out_format: &str,
) -> Result<Frame> {
    let shifted: Vec<Value> = frame
        .column(column)?
        .iter()
        .map(|v| {
            v.as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(|d| Value::Str((d + Duration::days(days)).format(out_format).to_string()))
                .unwrap_or(Value::Null)
        })
        .collect();
    let mut out = frame.clone();
    out.set_column(column, shifted)?;
    Ok(out)
}

fn text_rows(frame: &Frame, column: &str) -> Result<FxHashMap<String, Vec<usize>>> {
    let mut map: FxHashMap<String, Vec<usize>> = FxHashMap::default();
    for (r, v) in frame.column(column)?.iter().enumerate() {
        if let Some(text) = v.to_text() {
            map.entry(text).or_default().push(r);
        }
    }
    Ok(map)
}

/// Run a similarity methodology over one string column per side and resolve
/// the matched strings back to candidate identifier pairs.
///
/// Every identifier carrying a matched string participates; ambiguity
/// handling (duplicate-claim rejection) is the caller's concern.
#[allow(clippy::too_many_arguments)]
pub(crate) fn similarity_id_pairs(
    method: &SimilarityMethod,
    normalizer: Normalizer,
    frame1: &Frame,
    id1_field: &str,
    field1: &str,
    frame2: &Frame,
    id2_field: &str,
    field2: &str,
) -> Result<Vec<(Value, Value)>> {
    if frame1.is_empty() || frame2.is_empty() {
        return Err(SyncError::EmptyInput {
            what: "similarity inputs".to_string(),
        });
    }
    if !frame1.has_column(field1) {
        return Err(SyncError::InvalidSimilarityField {
            field: field1.to_string(),
            side: "input1".to_string(),
        });
    }
    if !frame2.has_column(field2) {
        return Err(SyncError::InvalidSimilarityField {
            field: field2.to_string(),
            side: "input2".to_string(),
        });
    }

    let col1 = frame1.column(field1)?;
    let col2 = frame2.column(field2)?;
    let matches = match method {
        SimilarityMethod::Cosine { threshold } => {
            let mut all = cosine_similarity_match_with(normalizer, col1, col2)?;
            all.retain(|m| m.similarity >= *threshold);
            all
        }
        SimilarityMethod::Fuzzy { threshold } => {
            let mut all = fuzzy_similarity_match(col1, col2)?;
            all.retain(|m| m.similarity >= *threshold);
            all
        }
        SimilarityMethod::Naive => naive_token_match(col1, col2)?,
    };

    let rows1 = text_rows(frame1, field1)?;
    let rows2 = text_rows(frame2, field2)?;
    let ids1 = frame1.column(id1_field)?;
    let ids2 = frame2.column(id2_field)?;

    let mut pairs = Vec::new();
    for m in &matches {
        let (Some(r1s), Some(r2s)) = (rows1.get(&m.input1), rows2.get(&m.input2)) else {
            continue;
        };
        for &r1 in r1s {
            for &r2 in r2s {
                if !ids1[r1].is_null() && !ids2[r2].is_null() {
                    pairs.push((ids1[r1].clone(), ids2[r2].clone()));
                }
            }
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::EntityKind;
    use crate::text::normalize;

    fn teams(provider: &str, names: &[(&str, &str)]) -> EntityContent {
        let id_field = EntityKind::Team.id_field(provider);
        EntityContent::new(
            EntityKind::Team,
            provider,
            Frame::from_columns([
                (
                    id_field,
                    names.iter().map(|(id, _)| Value::from(*id)).collect(),
                ),
                (
                    "team_name".to_string(),
                    names.iter().map(|(_, n)| Value::from(*n)).collect(),
                ),
            ])
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_carry_empty_side() {
        let left = EntityContent::empty(EntityKind::Team, "provider_a");
        let right = teams("provider_b", &[("b1", "Arsenal")]);
        let carried = carry_empty_side(&left, &right).unwrap().unwrap();
        assert_eq!(carried.data.len(), 1);
        assert!(carried.data.has_column("provider_a_team_id"));
        assert_eq!(
            carried.data.value("provider_a_team_id", 0).unwrap(),
            &Value::Null
        );
    }

    #[test]
    fn test_carry_empty_side_none_when_both_populated() {
        let left = teams("provider_a", &[("a1", "Arsenal")]);
        let right = teams("provider_b", &[("b1", "Arsenal")]);
        assert!(carry_empty_side(&left, &right).unwrap().is_none());
    }

    #[test]
    fn test_fill_id_pairs_never_overwrites() {
        let sync_result = Frame::from_columns([
            ("a_id", vec![Value::from("a1"), Value::from("a2")]),
            ("b_id", vec![Value::from("b-existing"), Value::Null]),
        ])
        .unwrap();
        let pairs = vec![
            (Value::from("a1"), Value::from("b-late")),
            (Value::from("a2"), Value::from("b2")),
        ];
        let filled = fill_id_pairs(sync_result, "a_id", "b_id", &pairs).unwrap();
        assert_eq!(filled.value("b_id", 0).unwrap(), &Value::from("b-existing"));
        assert_eq!(filled.value("b_id", 1).unwrap(), &Value::from("b2"));
    }

    #[test]
    fn test_fill_id_pairs_first_claim_wins() {
        let sync_result = Frame::from_columns([
            ("a_id", vec![Value::from("a1")]),
            ("b_id", vec![Value::Null]),
        ])
        .unwrap();
        let pairs = vec![
            (Value::from("a1"), Value::from("b1")),
            (Value::from("a1"), Value::from("b2")),
        ];
        let filled = fill_id_pairs(sync_result, "a_id", "b_id", &pairs).unwrap();
        assert_eq!(filled.len(), 1);
        assert_eq!(filled.value("b_id", 0).unwrap(), &Value::from("b1"));
    }

    #[test]
    fn test_similarity_id_pairs_maps_strings_to_ids() {
        let left = teams("provider_a", &[("a1", "Arsenal"), ("a2", "Chelsea")]);
        let right = teams("provider_b", &[("b1", "Chelsea"), ("b2", "Arsenal")]);
        let pairs = similarity_id_pairs(
            &SimilarityMethod::Cosine { threshold: 0.75 },
            normalize,
            &left.data,
            "provider_a_team_id",
            "team_name",
            &right.data,
            "provider_b_team_id",
            "team_name",
        )
        .unwrap();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&(Value::from("a1"), Value::from("b2"))));
        assert!(pairs.contains(&(Value::from("a2"), Value::from("b1"))));
    }

    #[test]
    fn test_similarity_id_pairs_missing_field_fails() {
        let left = teams("provider_a", &[("a1", "Arsenal")]);
        let right = teams("provider_b", &[("b1", "Arsenal")]);
        let err = similarity_id_pairs(
            &SimilarityMethod::Naive,
            normalize,
            &left.data,
            "provider_a_team_id",
            "club_name",
            &right.data,
            "provider_b_team_id",
            "team_name",
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::InvalidSimilarityField { .. }));
    }

    #[test]
    fn test_shifted_date_frame() {
        let frame = Frame::from_columns([(
            "match_date",
            vec![Value::from("2025-01-01"), Value::from("not-a-date"), Value::Null],
        )])
        .unwrap();
        let shifted = shifted_date_frame(&frame, "match_date", -1, "%Y-%m-%d").unwrap();
        assert_eq!(
            shifted.value("match_date", 0).unwrap(),
            &Value::from("2024-12-31")
        );
        assert_eq!(shifted.value("match_date", 1).unwrap(), &Value::Null);
        assert_eq!(shifted.value("match_date", 2).unwrap(), &Value::Null);
    }
}
