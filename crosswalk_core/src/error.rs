//! Error types for synchronization operations.

use crate::content::EntityKind;

/// Result type for crosswalk operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while building or running a synchronization
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Two wrappers of different entity kinds were combined
    #[error("entity kind mismatch: {left} vs {right}")]
    KindMismatch { left: EntityKind, right: EntityKind },

    /// A required column is missing from a table
    #[error("missing column: {column}")]
    MissingColumn { column: String },

    /// The identifier column for a wrapper is missing from its table
    #[error("identifier column {id_field} not present")]
    MissingIdColumn { id_field: String },

    /// The identifier column contains null values at construction time
    #[error("identifier column {id_field} contains null values")]
    NullIdValues { id_field: String },

    /// A required input was empty
    #[error("{what} must contain at least one non-null element")]
    EmptyInput { what: String },

    /// n-gram length must be greater than zero
    #[error("n-gram length must be greater than 0, got {n}")]
    InvalidNgramSize { n: usize },

    /// Reliability filtering removed every join column
    #[error("no join columns remaining to use for aggregation")]
    NoJoinColumns,

    /// A column's length does not match the table's row count
    #[error("column {column} has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// A column name was used twice in one table
    #[error("duplicate column: {column}")]
    DuplicateColumn { column: String },

    /// A similarity field pair referenced a column absent from its input
    #[error("similarity field {field} not present in {side}")]
    InvalidSimilarityField { field: String, side: String },
}
