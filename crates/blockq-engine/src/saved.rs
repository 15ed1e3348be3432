use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub name: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
}

/// One owner's saved queries, unique by name and listed in name order.
/// Query text is stored as given and never validated here.
#[derive(Debug, Clone, Default)]
pub struct SavedQueries {
    by_name: BTreeMap<String, SavedQuery>,
}

impl SavedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `query` under `name`, replacing any previous entry.
    pub fn save(&mut self, name: impl Into<String>, query: impl Into<String>) -> SavedQuery {
        let saved = SavedQuery {
            name: name.into(),
            query: query.into(),
            created_at: Utc::now(),
        };
        self.by_name.insert(saved.name.clone(), saved.clone());
        saved
    }

    pub fn get(&self, name: &str) -> Option<&SavedQuery> {
        self.by_name.get(name)
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.by_name.remove(name).is_some()
    }

    pub fn list(&self) -> Vec<SavedQuery> {
        self.by_name.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
