//! Crosswalk Core - cross-provider entity identifier reconciliation.
//!
//! This library provides:
//! - A three-pass synchronization engine that reduces N per-provider tables
//!   into one deduplicated identifier cross-reference table
//! - Pairwise matching strategies per entity kind: date-tolerant fixture
//!   matching, a five-tier player cascade, and team-name matching
//! - String normalization for names that disagree on accents, punctuation,
//!   and club/women's/youth qualifiers
//! - Trigram TF-IDF cosine similarity with optimal bipartite assignment,
//!   plus jaro-winkler and token-set methodologies
//! - A minimal in-memory relational table the whole pipeline runs on
//!
//! Every record from every provider appears in the output exactly once:
//! fully cross-referenced where matching succeeded, as a partial row where it
//! did not.

pub mod content;
pub mod engine;
pub mod error;
pub mod frame;
pub mod matching;
pub mod text;

pub use content::{EntityContent, EntityKind};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use matching::player::{NameField, PlayerLayer};
pub use matching::{PairMatcher, SimilarityMethod};
pub use text::similarity::SimilarityMatch;

/// Route a diagnostic through tracing. The `verbose` flag promotes the event
/// to INFO; it never changes computed results.
pub(crate) fn trace_log(verbose: bool, args: std::fmt::Arguments<'_>) {
    if verbose {
        tracing::info!(target: "crosswalk", "{args}");
    } else {
        tracing::debug!(target: "crosswalk", "{args}");
    }
}
