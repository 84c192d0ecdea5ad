//! The three-pass synchronization engine.
//!
//! Pass 1 chains adjacent provider pairs through the kind-specific matcher
//! and folds the pairwise results into one table, keeping only rows every
//! provider identified — maximum precision. Pass 2 reruns the same procedure
//! over each provider's leftovers, giving weaker two-way matches a second
//! chance without touching the Pass 1 basis. Pass 3 appends whatever is
//! still unmatched as partial rows, so no input record is ever silently
//! dropped. A final group/first-non-null step deduplicates on the join
//! columns.

use crate::content::{EntityContent, EntityKind};
use crate::error::{Result, SyncError};
use crate::frame::{ops, Value};
use crate::matching::fixture::FixtureMatcher;
use crate::matching::player::{PlayerLayer, PlayerMatcher};
use crate::matching::team::TeamMatcher;
use crate::matching::PairMatcher;
use crate::trace_log;

/// Drives synchronization of one entity kind across N providers.
pub struct SyncEngine {
    kind: EntityKind,
    content: Vec<EntityContent>,
    join_columns: Vec<String>,
    matcher: Box<dyn PairMatcher>,
    verbose: bool,
}

impl SyncEngine {
    /// Engine for match (fixture) content. `use_competition_context` adds
    /// `competition_id` and `season_id` (assumed universal across providers)
    /// to the join columns.
    pub fn matches(
        content: Vec<EntityContent>,
        use_competition_context: bool,
        verbose: bool,
    ) -> Result<Self> {
        check_kinds(EntityKind::Match, &content)?;
        let join_columns: Vec<String> = if use_competition_context {
            vec![
                "match_date",
                "competition_id",
                "season_id",
                "home_team_id",
                "away_team_id",
            ]
        } else {
            vec!["match_date", "home_team_id", "away_team_id"]
        }
        .into_iter()
        .map(String::from)
        .collect();
        let matcher = FixtureMatcher::new(join_columns.clone(), verbose);
        Ok(Self {
            kind: EntityKind::Match,
            content,
            join_columns,
            matcher: Box::new(matcher),
            verbose,
        })
    }

    /// Engine for team content.
    pub fn teams(
        content: Vec<EntityContent>,
        use_competition_context: bool,
        verbose: bool,
    ) -> Result<Self> {
        check_kinds(EntityKind::Team, &content)?;
        let join_columns: Vec<String> = if use_competition_context {
            vec!["team_name", "competition_id", "season_id"]
        } else {
            vec!["team_name"]
        }
        .into_iter()
        .map(String::from)
        .collect();
        let matcher = TeamMatcher::new(join_columns.clone(), verbose);
        Ok(Self {
            kind: EntityKind::Team,
            content,
            join_columns,
            matcher: Box::new(matcher),
            verbose,
        })
    }

    /// Engine for player content with the default layer cascade.
    ///
    /// Player join columns are not caller-configurable: the base set
    /// `[jersey_number, team_id, player_name]` is filtered down to columns
    /// every provider carries fully populated, and construction fails if
    /// nothing survives.
    pub fn players(content: Vec<EntityContent>, verbose: bool) -> Result<Self> {
        Self::players_inner(content, None, verbose)
    }

    /// Engine for player content with a caller-supplied layer cascade,
    /// replacing the default one.
    pub fn players_with_layers(
        content: Vec<EntityContent>,
        layers: Vec<PlayerLayer>,
        verbose: bool,
    ) -> Result<Self> {
        Self::players_inner(content, Some(layers), verbose)
    }

    fn players_inner(
        content: Vec<EntityContent>,
        layers: Option<Vec<PlayerLayer>>,
        verbose: bool,
    ) -> Result<Self> {
        check_kinds(EntityKind::Player, &content)?;

        let mut join_columns: Vec<String> = ["jersey_number", "team_id", "player_name"]
            .into_iter()
            .map(String::from)
            .collect();
        join_columns.retain(|column| {
            for c in &content {
                if !c.data.has_column(column) {
                    trace_log(
                        verbose,
                        format_args!(
                            "Removing column `{column}` from join logic because content from data provider {} does not include it",
                            c.provider()
                        ),
                    );
                    return false;
                }
                let populated = c
                    .data
                    .non_null_count(column)
                    .map(|n| n == c.data.len())
                    .unwrap_or(false);
                if !populated {
                    trace_log(
                        verbose,
                        format_args!(
                            "Removing column `{column}` from join logic because content from data provider {} does not have complete coverage",
                            c.provider()
                        ),
                    );
                    return false;
                }
            }
            true
        });
        if join_columns.is_empty() {
            return Err(SyncError::NoJoinColumns);
        }

        let matcher = PlayerMatcher::new(join_columns.clone(), layers, verbose);
        Ok(Self {
            kind: EntityKind::Player,
            content,
            join_columns,
            matcher: Box::new(matcher),
            verbose,
        })
    }

    pub fn join_columns(&self) -> &[String] {
        &self.join_columns
    }

    /// Reduce the provider tables into one deduplicated cross-reference
    /// table.
    pub fn synchronize(&self) -> Result<EntityContent> {
        if self.content.is_empty() {
            return Ok(EntityContent::empty(self.kind, "unknown"));
        }
        if self.content.len() == 1 {
            return Ok(self.content[0].clone());
        }

        trace_log(
            self.verbose,
            format_args!(
                "Starting {} synchronization across {} datasets",
                self.kind,
                self.content.len()
            ),
        );

        let id_columns: Vec<String> = self
            .content
            .iter()
            .map(|c| c.id_field().to_string())
            .collect();
        let id_refs: Vec<&str> = id_columns.iter().map(String::as_str).collect();

        // Pass 1: agglomeration over adjacent provider pairs.
        trace_log(self.verbose, format_args!("Pass 1: agglomeration"));
        let mut results = Vec::with_capacity(self.content.len() - 1);
        for pair in self.content.windows(2) {
            results.push(self.matcher.synchronize_pair(&pair[0], &pair[1])?);
        }
        let mut folded = results[0].clone();
        for result in &results[1..] {
            folded = folded.merge(result)?;
        }
        let basis = folded.data.drop_nulls(&id_refs)?;
        trace_log(
            self.verbose,
            format_args!(
                "Pass 1: Using {} as sync basis, found {} total rows and {} fully synced rows.",
                self.content[0].provider(),
                folded.data.len(),
                basis.len()
            ),
        );
        let mut synced = EntityContent::from_parts(self.kind, self.content[0].provider(), basis);

        // Pass 2: relate remainders to each other.
        let mut remainders = Vec::new();
        for c in &self.content {
            let missing = c.remainder(&synced.data)?;
            if !missing.is_empty() {
                trace_log(
                    self.verbose,
                    format_args!(
                        "Pass 2: Aggregating {} identified unsynced rows for {}",
                        missing.len(),
                        c.provider()
                    ),
                );
                remainders.push(EntityContent::from_parts(self.kind, c.provider(), missing));
            }
        }
        if remainders.len() > 1 {
            trace_log(
                self.verbose,
                format_args!(
                    "Pass 2: Agglomeration on remaining unsynced rows across {} datasets",
                    remainders.len()
                ),
            );
            let mut rem_results = Vec::with_capacity(remainders.len() - 1);
            for pair in remainders.windows(2) {
                rem_results.push(self.matcher.synchronize_pair(&pair[0], &pair[1])?);
            }
            let mut rem_folded = rem_results[0].clone();
            for result in &rem_results[1..] {
                rem_folded = rem_folded.merge(result)?;
            }
            let present: Vec<&str> = id_refs
                .iter()
                .copied()
                .filter(|c| rem_folded.data.has_column(c))
                .collect();
            let rem_synced = rem_folded.data.drop_nulls(&present)?;
            trace_log(
                self.verbose,
                format_args!(
                    "Pass 2: Using remainders as sync basis, found {} new fully synced rows.",
                    rem_synced.len()
                ),
            );
            if !rem_synced.is_empty() {
                synced.append_frame(&rem_synced)?;
            }
        }

        // Pass 3: add whatever is still unmatched to the end as partial rows.
        let mut tails = Vec::new();
        for c in &self.content {
            let rest = c.remainder(&synced.data)?;
            if rest.is_empty() {
                continue;
            }
            trace_log(
                self.verbose,
                format_args!(
                    "Pass 3: Aggregating {} identified unsynced rows for {}",
                    rest.len(),
                    c.provider()
                ),
            );
            let shared: Vec<&str> = synced
                .data
                .column_names()
                .iter()
                .filter(|n| rest.has_column(n))
                .map(String::as_str)
                .collect();
            let mut projected = rest.select(&shared)?;
            for name in synced.data.column_names() {
                if !projected.has_column(name) {
                    projected.add_null_column(name)?;
                }
            }
            projected.set_constant_column("provider", Value::from(c.provider()))?;
            tails.push(projected);
        }
        if !tails.is_empty() {
            let tail_refs: Vec<&crate::frame::Frame> = tails.iter().collect();
            let tail = ops::concat_rows(&tail_refs)?;
            trace_log(
                self.verbose,
                format_args!("Pass 3: Including {} unsynced rows", tail.len()),
            );
            synced.append_frame(&tail)?;
        }

        trace_log(
            self.verbose,
            format_args!(
                "Pre-deduplication: Found {} total rows",
                synced.data.len()
            ),
        );

        // Dedup/validation: one row per distinct join-column tuple, first
        // non-null identifier per provider.
        let key_refs: Vec<&str> = self.join_columns.iter().map(String::as_str).collect();
        let mut deduped = ops::group_first_non_null(&synced.data, &key_refs, &id_refs)?;
        deduped.set_constant_column("provider", Value::from(self.content[0].provider()))?;
        trace_log(
            self.verbose,
            format_args!(
                "After deduplication: Found {} total unique rows based on join_columns: {:?}",
                deduped.len(),
                self.join_columns
            ),
        );
        Ok(EntityContent::from_parts(
            self.kind,
            self.content[0].provider(),
            deduped,
        ))
    }
}

fn check_kinds(kind: EntityKind, content: &[EntityContent]) -> Result<()> {
    for c in content {
        if c.kind() != kind {
            return Err(SyncError::KindMismatch {
                left: kind,
                right: c.kind(),
            });
        }
    }
    Ok(())
}
