//! Team matching.
//!
//! Club names vary mostly in qualifiers ("FC", "WFC", ", Women") rather than
//! substance, so the cascade is short: exact name join, cosine similarity at
//! the default threshold, then cosine with no threshold at all — by that
//! point only the optimal assignment's pairing is left to trust. Team names
//! are vectorized through the team-name normalizer so qualifier noise never
//! reaches the similarity scores.

use crate::content::EntityContent;
use crate::error::Result;
use crate::frame::Value;
use crate::text::normalize_team_name;
use crate::trace_log;

use super::{
    carry_empty_side, exact_left_join, fill_id_pairs, remaining_content, similarity_id_pairs,
    PairMatcher, SimilarityMethod,
};

/// Cosine threshold for the first similarity tier.
const DEFAULT_THRESHOLD: f64 = 0.75;

/// Pairwise matcher for the team entity kind.
pub struct TeamMatcher {
    join_columns: Vec<String>,
    verbose: bool,
}

impl TeamMatcher {
    pub fn new(join_columns: Vec<String>, verbose: bool) -> Self {
        Self {
            join_columns,
            verbose,
        }
    }

    fn cosine_pairs(
        &self,
        input1: &EntityContent,
        input2: &EntityContent,
        threshold: f64,
    ) -> Result<Vec<(Value, Value)>> {
        similarity_id_pairs(
            &SimilarityMethod::Cosine { threshold },
            normalize_team_name,
            &input1.data,
            input1.id_field(),
            "team_name",
            &input2.data,
            input2.id_field(),
            "team_name",
        )
    }
}

impl PairMatcher for TeamMatcher {
    fn synchronize_pair(
        &self,
        input1: &EntityContent,
        input2: &EntityContent,
    ) -> Result<EntityContent> {
        if let Some(carried) = carry_empty_side(input1, input2)? {
            return Ok(carried);
        }

        // first tier: names are equal
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

        // second tier: cosine similarity at the default threshold
        let synced = sync_result.drop_nulls(&[input1.id_field(), input2.id_field()])?;
        let remaining_1 = remaining_content(input1, &synced)?;
        let remaining_2 = remaining_content(input2, &synced)?;
        if !remaining_1.data.is_empty() && !remaining_2.data.is_empty() {
            let pairs = self.cosine_pairs(&remaining_1, &remaining_2, DEFAULT_THRESHOLD)?;
            trace_log(
                self.verbose,
                format_args!(
                    "Via cosine-similarity pair synchronization for inputs, found {} new rows",
                    pairs.len()
                ),
            );
            if !pairs.is_empty() {
                sync_result = fill_id_pairs(
                    sync_result,
                    input1.id_field(),
                    input2.id_field(),
                    &pairs,
                )?;
            }
        }

        // third tier: cosine similarity, any score accepted
        let synced = sync_result.drop_nulls(&[input1.id_field(), input2.id_field()])?;
        let remaining_1 = remaining_content(input1, &synced)?;
        let remaining_2 = remaining_content(input2, &synced)?;
        if !remaining_1.data.is_empty() && !remaining_2.data.is_empty() {
            trace_log(
                self.verbose,
                format_args!(
                    "Attempting less-stringent cosine-similarity pair synchronization for inputs {} (length {}) and {} (length {})",
                    remaining_1.provider(),
                    remaining_1.data.len(),
                    remaining_2.provider(),
                    remaining_2.data.len()
                ),
            );
            let pairs = self.cosine_pairs(&remaining_1, &remaining_2, 0.0)?;
            trace_log(
                self.verbose,
                format_args!(
                    "Via less-stringent cosine-similarity pair synchronization for inputs, found {} new rows",
                    pairs.len()
                ),
            );
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
