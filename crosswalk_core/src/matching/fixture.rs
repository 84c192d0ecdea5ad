//! Date-tolerant fixture matching.
//!
//! Providers frequently disagree on kickoff dates (timezones, TV
//! rescheduling) and occasionally by much more (postponements). The cascade:
//! exact join on the configured columns, then date-shifted joins over
//! [-3, +3) days in both directions, then a matchday-keyed join for fixtures
//! moved outside that window.

use crate::content::EntityContent;
use crate::error::Result;
use crate::frame::{ops, Value};
use crate::trace_log;

use super::{
    carry_empty_side, exact_left_join, fill_id_pairs, remaining_content, shifted_date_frame,
    PairMatcher,
};

/// Pairwise matcher for the match entity kind.
pub struct FixtureMatcher {
    join_columns: Vec<String>,
    verbose: bool,
}

impl FixtureMatcher {
    pub fn new(join_columns: Vec<String>, verbose: bool) -> Self {
        Self {
            join_columns,
            verbose,
        }
    }

    /// Shift one side's `match_date` by `days` and inner-join against the
    /// other side on the configured columns, yielding `(shifted_id,
    /// other_id)` pairs.
    fn adjusted_date_pairs(
        &self,
        shifted_side: &EntityContent,
        other_side: &EntityContent,
        days: i64,
    ) -> Result<Vec<(Value, Value)>> {
        trace_log(
            self.verbose,
            format_args!(
                "Triggering date adjustment ({days} days) and sync for inputs {} (length {}) and {} (length {})",
                shifted_side.provider(),
                shifted_side.data.len(),
                other_side.provider(),
                other_side.data.len()
            ),
        );

        let shifted = shifted_date_frame(&shifted_side.data, "match_date", days, "%Y-%m-%d")?;
        let on: Vec<&str> = self.join_columns.iter().map(String::as_str).collect();
        let joined = ops::join(&other_side.data, &shifted, &on, ops::JoinKind::Inner)?;
        let complete = joined.drop_nulls(&[shifted_side.id_field(), other_side.id_field()])?;

        let shifted_ids = complete.column(shifted_side.id_field())?;
        let other_ids = complete.column(other_side.id_field())?;
        let pairs: Vec<(Value, Value)> = shifted_ids
            .iter()
            .cloned()
            .zip(other_ids.iter().cloned())
            .collect();
        trace_log(
            self.verbose,
            format_args!("via date adjustment ({days} days), found {} more synced rows", pairs.len()),
        );
        Ok(pairs)
    }

    /// Join on `matchday` substituted for `match_date`, for fixtures
    /// rescheduled outside the shift window.
    fn matchday_pairs(
        &self,
        input1: &EntityContent,
        input2: &EntityContent,
    ) -> Result<Vec<(Value, Value)>> {
        let substituted: Vec<String> = self
            .join_columns
            .iter()
            .map(|c| {
                if c == "match_date" {
                    "matchday".to_string()
                } else {
                    c.clone()
                }
            })
            .collect();
        let on: Vec<&str> = substituted.iter().map(String::as_str).collect();
        let joined = ops::join(&input1.data, &input2.data, &on, ops::JoinKind::Inner)?;
        let complete = joined.drop_nulls(&[input1.id_field(), input2.id_field()])?;

        let ids1 = complete.column(input1.id_field())?;
        let ids2 = complete.column(input2.id_field())?;
        let pairs: Vec<(Value, Value)> =
            ids1.iter().cloned().zip(ids2.iter().cloned()).collect();
        trace_log(
            self.verbose,
            format_args!("via matchday, found {} more synced rows", pairs.len()),
        );
        Ok(pairs)
    }
}

impl PairMatcher for FixtureMatcher {
    fn synchronize_pair(
        &self,
        input1: &EntityContent,
        input2: &EntityContent,
    ) -> Result<EntityContent> {
        if let Some(carried) = carry_empty_side(input1, input2)? {
            return Ok(carried);
        }

        // first tier: dates are equal
        trace_log(
            self.verbose,
            format_args!(
                "Attempting pair synchronization for inputs {} (length {}) and {} (length {})",
                input1.provider(),
                input1.data.len(),
                input2.provider(),
                input2.data.len()
            ),
        );
        let mut sync_result = exact_left_join(input1, input2, &self.join_columns)?;

        // second tier: dates are off by [-3, 3)
        let synced = sync_result.drop_nulls(&[input1.id_field(), input2.id_field()])?;
        let remaining_1 = remaining_content(input1, &synced)?;
        let remaining_2 = remaining_content(input2, &synced)?;

        let mut pairs: Vec<(Value, Value)> = Vec::new();
        if !remaining_1.data.is_empty() && !remaining_2.data.is_empty() {
            trace_log(
                self.verbose,
                format_args!(
                    "Attempting date-adjusted pair synchronization for inputs {} (length {}) and {} (length {})",
                    remaining_1.provider(),
                    remaining_1.data.len(),
                    remaining_2.provider(),
                    remaining_2.data.len()
                ),
            );
            for days in -3..3 {
                pairs.extend(self.adjusted_date_pairs(&remaining_1, &remaining_2, days)?);
            }
            for days in -3..3 {
                let flipped = self.adjusted_date_pairs(&remaining_2, &remaining_1, days)?;
                pairs.extend(flipped.into_iter().map(|(id2, id1)| (id1, id2)));
            }
        }
        if !pairs.is_empty() {
            trace_log(
                self.verbose,
                format_args!(
                    "Via date-adjusted pair synchronization for inputs, found {} new rows",
                    pairs.len()
                ),
            );
            sync_result = fill_id_pairs(
                sync_result,
                input1.id_field(),
                input2.id_field(),
                &pairs,
            )?;
        }

        // third tier: matchday instead of match_date, for fixtures postponed
        // outside the adjustment window
        let synced = sync_result.drop_nulls(&[input1.id_field(), input2.id_field()])?;
        let remaining_1 = remaining_content(input1, &synced)?;
        let remaining_2 = remaining_content(input2, &synced)?;
        if !remaining_1.data.is_empty()
            && !remaining_2.data.is_empty()
            && remaining_1.data.has_column("matchday")
            && remaining_2.data.has_column("matchday")
        {
            trace_log(
                self.verbose,
                format_args!(
                    "Attempting matchday pair synchronization for inputs {} (length {}) and {} (length {})",
                    remaining_1.provider(),
                    remaining_1.data.len(),
                    remaining_2.provider(),
                    remaining_2.data.len()
                ),
            );
            let pairs = self.matchday_pairs(&remaining_1, &remaining_2)?;
            if !pairs.is_empty() {
                sync_result = fill_id_pairs(
                    sync_result,
                    input1.id_field(),
                    input2.id_field(),
                    &pairs,
                )?;
            }
        }

        Ok(EntityContent::from_parts(
            input1.kind(),
            input1.provider(),
            sync_result,
        ))
    }
}
