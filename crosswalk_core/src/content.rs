//! Entity content wrappers.
//!
//! An [`EntityContent`] wraps one provider's table of records for one entity
//! kind, carrying just enough context (kind, provider, identifier column) for
//! the synchronization engine to combine tables from different providers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::frame::{ops, Frame};

/// The closed set of entity categories that can be reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Match,
    Team,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Player => "player",
            EntityKind::Match => "match",
            EntityKind::Team => "team",
        }
    }

    /// Provider-qualified identifier column name, e.g. `espn_player_id`.
    pub fn id_field(&self, provider: &str) -> String {
        format!("{provider}_{}_id", self.as_str())
    }

    /// The substring shared by every provider's identifier column for this
    /// kind, e.g. `_player_id`.
    pub(crate) fn id_suffix(&self) -> String {
        format!("_{}_id", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider's table of records for one entity kind.
#[derive(Debug, Clone)]
pub struct EntityContent {
    kind: EntityKind,
    provider: String,
    id_field: String,
    pub data: Frame,
}

impl EntityContent {
    /// Wrap a provider table, validating that its identifier column exists
    /// and is fully populated.
    pub fn new(kind: EntityKind, provider: impl Into<String>, data: Frame) -> Result<Self> {
        let provider = provider.into();
        let id_field = kind.id_field(&provider);
        if !data.has_column(&id_field) {
            return Err(SyncError::MissingIdColumn { id_field });
        }
        if data.non_null_count(&id_field)? != data.len() {
            return Err(SyncError::NullIdValues { id_field });
        }
        Ok(Self {
            kind,
            provider,
            id_field,
            data,
        })
    }

    /// A zero-row wrapper carrying just its identifier column.
    pub fn empty(kind: EntityKind, provider: impl Into<String>) -> Self {
        let provider = provider.into();
        let id_field = kind.id_field(&provider);
        let mut data = Frame::new();
        // Adding a column to a fresh frame cannot fail.
        let _ = data.add_column(&id_field, Vec::new());
        Self {
            kind,
            provider,
            id_field,
            data,
        }
    }

    /// Engine-internal constructor for intermediate results whose rows may
    /// legitimately hold null identifiers.
    pub(crate) fn from_parts(kind: EntityKind, provider: impl Into<String>, data: Frame) -> Self {
        let provider = provider.into();
        let id_field = kind.id_field(&provider);
        Self {
            kind,
            provider,
            id_field,
            data,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Names of every sibling identifier column present in this table.
    pub fn id_columns(&self) -> Vec<String> {
        let suffix = self.kind.id_suffix();
        self.data
            .column_names()
            .iter()
            .filter(|n| n.contains(&suffix))
            .cloned()
            .collect()
    }

    /// Left-join enrichment: bring `right`'s sibling identifier columns into
    /// this table, joined on `right`'s identifier column.
    ///
    /// Only identifier columns move; attribute columns never cross wrappers.
    /// The result keeps this wrapper's kind and provider.
    pub fn merge(&self, right: &EntityContent) -> Result<EntityContent> {
        if self.kind != right.kind {
            return Err(SyncError::KindMismatch {
                left: self.kind,
                right: right.kind,
            });
        }
        if !self.data.has_column(&right.id_field) {
            return Err(SyncError::MissingIdColumn {
                id_field: right.id_field.clone(),
            });
        }
        let id_columns = right.id_columns();
        if id_columns.is_empty() {
            return Err(SyncError::MissingColumn {
                column: format!("*{}", self.kind.id_suffix()),
            });
        }
        let names: Vec<&str> = id_columns.iter().map(String::as_str).collect();
        let subset = right.data.select(&names)?;
        let joined = ops::join(
            &self.data,
            &subset,
            &[right.id_field.as_str()],
            ops::JoinKind::Left,
        )?;
        Ok(EntityContent::from_parts(
            self.kind,
            self.provider.clone(),
            joined,
        ))
    }

    /// In-place row union with another wrapper of the same kind. An empty
    /// right side is a no-op.
    pub fn append(&mut self, right: &EntityContent) -> Result<()> {
        if self.kind != right.kind {
            return Err(SyncError::KindMismatch {
                left: self.kind,
                right: right.kind,
            });
        }
        self.append_frame(&right.data)
    }

    /// In-place row union with a raw table: outer concatenation, with cells
    /// for columns absent on either side filled with null. An empty table is
    /// a no-op.
    pub fn append_frame(&mut self, right: &Frame) -> Result<()> {
        if right.is_empty() {
            return Ok(());
        }
        self.data = ops::concat_rows(&[&self.data, right])?;
        Ok(())
    }

    /// Ingestion helper: rewrite a unified-schema table (generic
    /// `provider_{kind}_id` column plus a provider-label column) to this
    /// wrapper's provider-qualified identifier column. No-op unless both
    /// columns are present.
    pub fn transform_provider_fields(&mut self) -> Result<()> {
        let generic = format!("provider_{}_id", self.kind.as_str());
        let label_columns: Vec<&str> = ["data_provider", "provider"]
            .into_iter()
            .filter(|c| self.data.has_column(c))
            .collect();
        if label_columns.is_empty() || !self.data.has_column(&generic) {
            return Ok(());
        }
        self.data.rename_column(&generic, &self.id_field)?;
        for column in label_columns {
            self.data.drop_column(column)?;
        }
        Ok(())
    }

    /// Rows whose identifier does not appear in `synced`'s column for this
    /// provider.
    pub(crate) fn remainder(&self, synced: &Frame) -> Result<Frame> {
        let known = synced.unique_non_null(&self.id_field)?;
        let mask: Vec<bool> = self
            .data
            .column(&self.id_field)?
            .iter()
            .map(|v| !known.contains(v))
            .collect();
        Ok(self.data.filter(&mask))
    }
}
