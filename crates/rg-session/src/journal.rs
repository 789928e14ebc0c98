//! Command Journal
//!
//! Ordered record of the mutating operations the server acknowledged in this
//! session, with the entities each one created, modified and deleted.

use rg_proto::{EntityId, MutationResult};
use serde::{Deserialize, Serialize};

/// An acknowledged mutating operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Operation type name
    pub operation: String,
    /// Design the operation was applied to
    pub design: EntityId,
    /// Design revision after the operation
    pub revision: u64,
    /// Entities created by this operation
    pub created: Vec<EntityId>,
    /// Entities modified by this operation
    pub modified: Vec<EntityId>,
    /// Entities deleted by this operation
    pub deleted: Vec<EntityId>,
}

impl JournalEntry {
    /// Create an entry from the server's report
    pub fn new(
        operation: impl Into<String>,
        design: EntityId,
        revision: u64,
        result: &MutationResult,
    ) -> Self {
        Self {
            operation: operation.into(),
            design,
            revision,
            created: result.created.iter().map(|info| info.id.clone()).collect(),
            modified: result.modified.clone(),
            deleted: result.deleted.clone(),
        }
    }

    /// Whether the entry touched the entity in any way
    pub fn touches(&self, id: &EntityId) -> bool {
        self.created.contains(id) || self.modified.contains(id) || self.deleted.contains(id)
    }
}

/// Per-session operation journal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Create a new empty journal
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the journal is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get all entries, oldest first
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries applied to one design, oldest first
    pub fn entries_for<'a>(
        &'a self,
        design: &'a EntityId,
    ) -> impl Iterator<Item = &'a JournalEntry> + 'a {
        self.entries.iter().filter(move |e| &e.design == design)
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&JournalEntry> {
        self.entries.last()
    }
}
