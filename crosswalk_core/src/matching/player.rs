//! Player matching cascade.
//!
//! Player records are the noisiest: names are spelled differently per
//! provider, nicknames stand in for legal names, jersey numbers are missing,
//! and birth dates drift by a day (timezones) or arrive with day and month
//! swapped. Matching runs as an ordered cascade of layers, each pairing a
//! similarity methodology with equality constraints and an optional
//! birth-date perturbation; every layer only sees rows the earlier layers
//! left unmatched.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::content::EntityContent;
use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::text::normalize;
use crate::trace_log;

use super::{
    carry_empty_side, fill_id_pairs, remaining_content, shifted_date_frame, similarity_id_pairs,
    PairMatcher, SimilarityMethod,
};

/// Which name column a layer reads on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    Name,
    Nickname,
}

impl NameField {
    pub fn as_str(&self) -> &'static str {
        match self {
            NameField::Name => "player_name",
            NameField::Nickname => "player_nickname",
        }
    }
}

/// One configured attempt in the player matching cascade.
#[derive(Debug, Clone)]
pub struct PlayerLayer {
    pub title: String,
    pub method: SimilarityMethod,
    pub input_fields: (NameField, NameField),
    /// Days to shift the first input's birth dates by before equality checks.
    pub date_shift: Option<i64>,
    /// Reformat the first input's birth dates with day and month swapped.
    pub swap_birth_month_day: bool,
    /// Columns that must be exactly equal for a candidate pair to survive.
    pub other_equal_fields: Vec<String>,
}

impl PlayerLayer {
    pub fn new(
        title: impl Into<String>,
        method: SimilarityMethod,
        input_fields: (NameField, NameField),
        date_shift: Option<i64>,
        swap_birth_month_day: bool,
        other_equal_fields: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            method,
            input_fields,
            date_shift,
            swap_birth_month_day,
            other_equal_fields,
        }
    }
}

const NAME_FIELD_COMBOS: [(NameField, NameField); 4] = [
    (NameField::Name, NameField::Name),
    (NameField::Name, NameField::Nickname),
    (NameField::Nickname, NameField::Name),
    (NameField::Nickname, NameField::Nickname),
];

/// Pairwise matcher for the player entity kind.
pub struct PlayerMatcher {
    join_columns: Vec<String>,
    custom_layers: Option<Vec<PlayerLayer>>,
    verbose: bool,
}

impl PlayerMatcher {
    pub fn new(
        join_columns: Vec<String>,
        custom_layers: Option<Vec<PlayerLayer>>,
        verbose: bool,
    ) -> Self {
        Self {
            join_columns,
            custom_layers,
            verbose,
        }
    }

    /// Build the default five-tier cascade for one input pair. The
    /// birth-date tier only participates when both sides carry a fully
    /// populated `birth_date` column.
    fn default_cascade(&self, input1: &EntityContent, input2: &EntityContent) -> Vec<PlayerLayer> {
        let mut layers = vec![PlayerLayer::new(
            "Layer 1: cosine similarity x jersey number x team",
            SimilarityMethod::Cosine { threshold: 0.75 },
            (NameField::Name, NameField::Name),
            None,
            false,
            vec!["jersey_number".to_string(), "team_id".to_string()],
        )];

        let birth_date_reliable = [input1, input2].iter().all(|c| {
            c.data.has_column("birth_date")
                && c.data
                    .non_null_count("birth_date")
                    .map(|n| n == c.data.len())
                    .unwrap_or(false)
        });
        if birth_date_reliable {
            for combo in NAME_FIELD_COMBOS {
                for swap in [false, true] {
                    for shift in [-1i64, 0] {
                        layers.push(PlayerLayer::new(
                            "Layer 2: cosine similarity x birth date x team",
                            SimilarityMethod::Cosine { threshold: 0.75 },
                            combo,
                            Some(shift),
                            swap,
                            vec!["birth_date".to_string(), "team_id".to_string()],
                        ));
                    }
                }
            }
        } else {
            trace_log(
                self.verbose,
                format_args!(
                    "Skipping birth date matching strategies because `birth_date` field is not reliable"
                ),
            );
        }

        for combo in NAME_FIELD_COMBOS {
            layers.push(PlayerLayer::new(
                "Layer 3: cosine similarity x team",
                SimilarityMethod::Cosine { threshold: 0.75 },
                combo,
                None,
                false,
                vec!["team_id".to_string()],
            ));
        }

        for combo in NAME_FIELD_COMBOS {
            layers.push(PlayerLayer::new(
                "Layer 4: naive similarity x team",
                SimilarityMethod::Naive,
                combo,
                None,
                false,
                vec!["team_id".to_string()],
            ));
        }

        let mut final_fields = vec!["jersey_number".to_string(), "team_id".to_string()];
        let mut final_title = "Layer 5: jersey number x team";
        if !self.join_columns.iter().any(|c| c == "jersey_number") {
            trace_log(
                self.verbose,
                format_args!(
                    "Removing `jersey_number` from Layer 5 processing because it's been marked unreliable"
                ),
            );
            final_fields.retain(|c| c != "jersey_number");
            final_title = "Layer 5: team";
        }
        layers.push(PlayerLayer::new(
            final_title,
            SimilarityMethod::Cosine { threshold: 0.0 },
            (NameField::Name, NameField::Name),
            None,
            false,
            final_fields,
        ));

        layers
    }

    /// Run one layer against the still-unmatched rows and return accepted,
    /// unambiguous identifier pairs.
    fn layer_pairs(
        &self,
        input1: &EntityContent,
        input2: &EntityContent,
        layer: &PlayerLayer,
    ) -> Result<Vec<(Value, Value)>> {
        trace_log(
            self.verbose,
            format_args!(
                "Attempting layer-based pair synchronization for inputs {} (length {}) and {} (length {})",
                input1.provider(),
                input1.data.len(),
                input2.provider(),
                input2.data.len()
            ),
        );
        trace_log(
            self.verbose,
            format_args!(
                "Strategy: {} - methodology: {} - birth date shift: {:?} - swapped birth month/day: {} - fields: ({}, {}) - other equal fields: {:?}",
                layer.title,
                layer.method,
                layer.date_shift,
                layer.swap_birth_month_day,
                layer.input_fields.0.as_str(),
                layer.input_fields.1.as_str(),
                layer.other_equal_fields
            ),
        );

        // Perturbed layers work on a copy; inputs are never mutated, so no
        // state leaks across layers.
        let adjusted: Option<Frame> = match layer.date_shift {
            Some(days)
                if input1.data.has_column("birth_date")
                    && input2.data.has_column("birth_date") =>
            {
                let format = if layer.swap_birth_month_day {
                    "%Y-%d-%m"
                } else {
                    "%Y-%m-%d"
                };
                Some(shifted_date_frame(&input1.data, "birth_date", days, format)?)
            }
            _ => None,
        };
        let frame1 = adjusted.as_ref().unwrap_or(&input1.data);
        let frame2 = &input2.data;

        let field1 = layer.input_fields.0.as_str();
        let field2 = layer.input_fields.1.as_str();
        // The nickname column is optional; a layer reading an absent or
        // unpopulated column finds nothing rather than failing the cascade.
        if !frame1.has_column(field1) || !frame2.has_column(field2) {
            trace_log(
                self.verbose,
                format_args!("Skipping layer: field {field1}/{field2} not available on both sides"),
            );
            return Ok(Vec::new());
        }
        if frame1.non_null_count(field1)? == 0 || frame2.non_null_count(field2)? == 0 {
            trace_log(
                self.verbose,
                format_args!("Skipping layer: field {field1}/{field2} has no populated values"),
            );
            return Ok(Vec::new());
        }

        let mut candidates = similarity_id_pairs(
            &layer.method,
            normalize,
            frame1,
            input1.id_field(),
            field1,
            frame2,
            input2.id_field(),
            field2,
        )?;

        // Equality constraints, checked against the (possibly perturbed)
        // first side. Null never equals null.
        let equal_fields: Vec<&str> = layer
            .other_equal_fields
            .iter()
            .filter(|f| frame1.has_column(f) && frame2.has_column(f))
            .map(String::as_str)
            .collect();
        if !equal_fields.is_empty() {
            let rows1 = id_rows(frame1, input1.id_field())?;
            let rows2 = id_rows(frame2, input2.id_field())?;
            candidates.retain(|(id1, id2)| {
                let (Some(&r1), Some(&r2)) = (rows1.get(id1), rows2.get(id2)) else {
                    return false;
                };
                equal_fields.iter().all(|field| {
                    let v1 = frame1.column(field).map(|c| &c[r1]);
                    let v2 = frame2.column(field).map(|c| &c[r2]);
                    match (v1, v2) {
                        (Ok(v1), Ok(v2)) => !v1.is_null() && !v2.is_null() && v1 == v2,
                        _ => false,
                    }
                })
            });
        }

        // Ambiguity guard: an identifier claimed by more than one candidate
        // within this layer is excluded from it entirely.
        let mut forward: FxHashMap<&Value, FxHashSet<&Value>> = FxHashMap::default();
        let mut backward: FxHashMap<&Value, FxHashSet<&Value>> = FxHashMap::default();
        for (id1, id2) in &candidates {
            forward.entry(id1).or_default().insert(id2);
            backward.entry(id2).or_default().insert(id1);
        }
        let accepted: Vec<(Value, Value)> = candidates
            .iter()
            .filter(|(id1, id2)| forward[id1].len() == 1 && backward[id2].len() == 1)
            .cloned()
            .collect();

        trace_log(
            self.verbose,
            format_args!(
                "Using layer-based pair synchronization, found {} new rows",
                accepted.len()
            ),
        );
        Ok(accepted)
    }
}

/// Map identifier value -> row index (identifiers are unique per provider).
fn id_rows(frame: &Frame, id_field: &str) -> Result<FxHashMap<Value, usize>> {
    let mut map = FxHashMap::default();
    for (r, v) in frame.column(id_field)?.iter().enumerate() {
        if !v.is_null() {
            map.entry(v.clone()).or_insert(r);
        }
    }
    Ok(map)
}

impl PairMatcher for PlayerMatcher {
    fn synchronize_pair(
        &self,
        input1: &EntityContent,
        input2: &EntityContent,
    ) -> Result<EntityContent> {
        if let Some(carried) = carry_empty_side(input1, input2)? {
            return Ok(carried);
        }

        // Working table: the first side's matching attributes plus every
        // identifier column it carries, and a slot for the right identifier.
        let mut base: Vec<&str> = ["player_name", "player_nickname", "jersey_number", "team_id"]
            .into_iter()
            .filter(|c| input1.data.has_column(c))
            .collect();
        let id_columns = input1.id_columns();
        base.extend(id_columns.iter().map(String::as_str));
        let mut sync_result = input1.data.select(&base)?;
        if !sync_result.has_column(input2.id_field()) {
            sync_result.add_null_column(input2.id_field())?;
        }

        let layers = match &self.custom_layers {
            Some(layers) => layers.clone(),
            None => self.default_cascade(input1, input2),
        };
        trace_log(
            self.verbose,
            format_args!(
                "Collected {} possible sync strategies. Applying one by one until we run out of rows...",
                layers.len()
            ),
        );

        for (i, layer) in layers.iter().enumerate() {
            trace_log(
                self.verbose,
                format_args!("Applying pair synchronization strategy {i}: {}", layer.title),
            );
            let synced = sync_result.drop_nulls(&[input1.id_field(), input2.id_field()])?;
            let remaining_1 = remaining_content(input1, &synced)?;
            let remaining_2 = remaining_content(input2, &synced)?;
            if remaining_1.data.is_empty() || remaining_2.data.is_empty() {
                trace_log(
                    self.verbose,
                    format_args!("No more data to synchronize -- bailing out."),
                );
                break;
            }

            let pairs = self.layer_pairs(&remaining_1, &remaining_2, layer)?;
            if !pairs.is_empty() {
                sync_result = fill_id_pairs(
                    sync_result,
                    input1.id_field(),
                    input2.id_field(),
                    &pairs,
                )?;
            }
        }

        // Only fully matched rows survive a player pair; the engine's later
        // passes recover unmatched rows from the original inputs.
        let matched = sync_result.drop_nulls(&[input1.id_field(), input2.id_field()])?;
        trace_log(
            self.verbose,
            format_args!(
                "After all pair sync strategies, found {} unique synced rows",
                matched.len()
            ),
        );
        Ok(EntityContent::from_parts(
            input1.kind(),
            input1.provider(),
            matched,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::EntityKind;

    struct PlayerRow {
        id: &'static str,
        name: &'static str,
        nickname: Option<&'static str>,
        jersey: i64,
        team: i64,
        birth_date: Option<&'static str>,
    }

    fn players(provider: &str, rows: &[PlayerRow]) -> EntityContent {
        let id_field = EntityKind::Player.id_field(provider);
        EntityContent::new(
            EntityKind::Player,
            provider,
            Frame::from_columns([
                (
                    id_field,
                    rows.iter().map(|r| Value::from(r.id)).collect::<Vec<_>>(),
                ),
                (
                    "player_name".to_string(),
                    rows.iter().map(|r| Value::from(r.name)).collect(),
                ),
                (
                    "player_nickname".to_string(),
                    rows.iter().map(|r| Value::from(r.nickname)).collect(),
                ),
                (
                    "jersey_number".to_string(),
                    rows.iter().map(|r| Value::from(r.jersey)).collect(),
                ),
                (
                    "team_id".to_string(),
                    rows.iter().map(|r| Value::from(r.team)).collect(),
                ),
                (
                    "birth_date".to_string(),
                    rows.iter().map(|r| Value::from(r.birth_date)).collect(),
                ),
            ])
            .unwrap(),
        )
        .unwrap()
    }

    fn matcher() -> PlayerMatcher {
        PlayerMatcher::new(
            vec![
                "jersey_number".to_string(),
                "team_id".to_string(),
                "player_name".to_string(),
            ],
            None,
            false,
        )
    }

    #[test]
    fn test_identical_attributes_match_in_first_layer() {
        let left = players(
            "provider_a",
            &[PlayerRow {
                id: "1",
                name: "Alex Morgan",
                nickname: None,
                jersey: 13,
                team: 5,
                birth_date: Some("1989-07-02"),
            }],
        );
        let right = players(
            "provider_b",
            &[PlayerRow {
                id: "2",
                name: "Alex Morgan",
                nickname: None,
                jersey: 13,
                team: 5,
                birth_date: Some("1989-07-02"),
            }],
        );
        let result = matcher().synchronize_pair(&left, &right).unwrap();
        assert_eq!(result.data.len(), 1);
        assert_eq!(
            result.data.value("provider_a_player_id", 0).unwrap(),
            &Value::from("1")
        );
        assert_eq!(
            result.data.value("provider_b_player_id", 0).unwrap(),
            &Value::from("2")
        );
    }

    #[test]
    fn test_birth_date_off_by_one_matches_in_second_layer() {
        // jersey numbers differ, so layer 1 cannot match; birth dates are a
        // day apart, resolved by the shifted birth-date layer
        let left = players(
            "provider_a",
            &[PlayerRow {
                id: "1",
                name: "Sam Kerr",
                nickname: None,
                jersey: 20,
                team: 5,
                birth_date: Some("1993-09-10"),
            }],
        );
        let right = players(
            "provider_b",
            &[PlayerRow {
                id: "2",
                name: "Sam Kerr",
                nickname: None,
                jersey: 99,
                team: 5,
                birth_date: Some("1993-09-09"),
            }],
        );
        let result = matcher().synchronize_pair(&left, &right).unwrap();
        assert_eq!(result.data.len(), 1);
    }

    #[test]
    fn test_swapped_day_month_matches() {
        let left = players(
            "provider_a",
            &[PlayerRow {
                id: "1",
                name: "Marta Silva",
                nickname: None,
                jersey: 10,
                team: 7,
                birth_date: Some("1986-02-19"),
            }],
        );
        let right = players(
            "provider_b",
            &[PlayerRow {
                id: "2",
                name: "Marta Silva",
                nickname: None,
                jersey: 11,
                team: 7,
                birth_date: Some("1986-19-02"),
            }],
        );
        let result = matcher().synchronize_pair(&left, &right).unwrap();
        assert_eq!(result.data.len(), 1);
    }

    #[test]
    fn test_nickname_subset_matches_in_naive_layer() {
        // names disagree enough that cosine at 0.75 fails, but the token set
        // of the short form is contained in the full name
        let left = players(
            "provider_a",
            &[PlayerRow {
                id: "1",
                name: "Cristiano Ronaldo dos Santos Aveiro",
                nickname: None,
                jersey: 7,
                team: 3,
                birth_date: None,
            }],
        );
        let right = players(
            "provider_b",
            &[PlayerRow {
                id: "2",
                name: "Ronaldo",
                nickname: None,
                jersey: 17,
                team: 3,
                birth_date: None,
            }],
        );
        let result = matcher().synchronize_pair(&left, &right).unwrap();
        assert_eq!(result.data.len(), 1);
    }

    #[test]
    fn test_duplicate_names_disambiguated_by_jersey_constraint() {
        // two players share a name; the jersey equality constraint keeps the
        // similarity layer from cross-wiring them
        let left = players(
            "provider_a",
            &[
                PlayerRow {
                    id: "1",
                    name: "Kim Ji Soo",
                    nickname: None,
                    jersey: 4,
                    team: 9,
                    birth_date: None,
                },
                PlayerRow {
                    id: "2",
                    name: "Kim Ji Soo",
                    nickname: None,
                    jersey: 16,
                    team: 9,
                    birth_date: None,
                },
            ],
        );
        let right = players(
            "provider_b",
            &[
                PlayerRow {
                    id: "8",
                    name: "Kim Ji-Soo",
                    nickname: None,
                    jersey: 4,
                    team: 9,
                    birth_date: None,
                },
                PlayerRow {
                    id: "9",
                    name: "Kim Ji-Soo",
                    nickname: None,
                    jersey: 16,
                    team: 9,
                    birth_date: None,
                },
            ],
        );
        let result = matcher().synchronize_pair(&left, &right).unwrap();
        assert_eq!(result.data.len(), 2);
        let by_id1 = |want: &str| -> Value {
            for r in 0..result.data.len() {
                if result.data.value("provider_a_player_id", r).unwrap() == &Value::from(want) {
                    return result
                        .data
                        .value("provider_b_player_id", r)
                        .unwrap()
                        .clone();
                }
            }
            Value::Null
        };
        assert_eq!(by_id1("1"), Value::from("8"));
        assert_eq!(by_id1("2"), Value::from("9"));
    }

    #[test]
    fn test_truly_ambiguous_claims_are_rejected() {
        // two indistinguishable left rows claim the same right row; no layer
        // can tell them apart, so no confident match is made and the rows
        // surface later as partials
        let row = |id: &'static str| PlayerRow {
            id,
            name: "Kim Ji Soo",
            nickname: None,
            jersey: 4,
            team: 9,
            birth_date: None,
        };
        let left = players("provider_a", &[row("1"), row("2")]);
        let right = players("provider_b", &[row("8")]);
        let result = matcher().synchronize_pair(&left, &right).unwrap();
        assert_eq!(result.data.len(), 0);
    }

    #[test]
    fn test_unmatched_rows_are_dropped_from_pair_result() {
        let left = players(
            "provider_a",
            &[
                PlayerRow {
                    id: "1",
                    name: "Alexia Putellas",
                    nickname: None,
                    jersey: 11,
                    team: 2,
                    birth_date: None,
                },
                PlayerRow {
                    id: "2",
                    name: "Unmatched Player",
                    nickname: None,
                    jersey: 30,
                    team: 99,
                    birth_date: None,
                },
            ],
        );
        let right = players(
            "provider_b",
            &[PlayerRow {
                id: "8",
                name: "Alexia Putellas",
                nickname: None,
                jersey: 11,
                team: 2,
                birth_date: None,
            }],
        );
        let result = matcher().synchronize_pair(&left, &right).unwrap();
        assert_eq!(result.data.len(), 1);
        assert_eq!(
            result.data.value("provider_a_player_id", 0).unwrap(),
            &Value::from("1")
        );
    }
}
