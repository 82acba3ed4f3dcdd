use std::collections::BTreeMap;

use crate::error::{ModelError, Result};
use crate::relation::Relation;
use crate::schema::SourceKind;

/// The eight extracts of one run, keyed by [`SourceKind`].
#[derive(Debug, Clone)]
pub struct SourceTables {
    tables: BTreeMap<SourceKind, Relation>,
}

impl SourceTables {
    /// Builds the set, failing if any kind is absent.
    pub fn new(tables: BTreeMap<SourceKind, Relation>) -> Result<Self> {
        let missing: Vec<String> = SourceKind::ALL
            .into_iter()
            .filter(|kind| !tables.contains_key(kind))
            .map(|kind| kind.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ModelError::MissingSources { sources: missing });
        }
        Ok(Self { tables })
    }

    pub fn get(&self, kind: SourceKind) -> &Relation {
        // `new` guarantees every kind is present.
        &self.tables[&kind]
    }

    /// Returns a copy with one extract swapped out.
    #[must_use]
    pub fn with(mut self, kind: SourceKind, relation: Relation) -> Self {
        self.tables.insert(kind, relation);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, &Relation)> {
        self.tables.iter().map(|(kind, relation)| (*kind, relation))
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Relation::len).sum()
    }
}
