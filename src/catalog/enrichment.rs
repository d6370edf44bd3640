//! Birth/death years keyed by upstream person id, produced by `enrich-people`.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::records::MovieRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDetails {
    pub born: Option<i32>,
    pub died: Option<i32>,
}

/// Upstream person id (as a string, matching the on-disk JSON object keys)
/// to its details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonDetailsMap {
    entries: HashMap<String, PersonDetails>,
}

impl PersonDetailsMap {
    /// Decode a `{id: {born, died}}` object. Entries that do not decode are
    /// skipped with a warning; only a document that is not an object is an
    /// error.
    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: HashMap<String, Value> =
            serde_json::from_str(raw).context("person details map is not a JSON object")?;
        let mut entries = HashMap::with_capacity(doc.len());
        for (id, value) in doc {
            match serde_json::from_value::<PersonDetails>(value) {
                Ok(details) => {
                    entries.insert(id, details);
                }
                Err(err) => warn!(person_id = %id, error = %err, "skipping malformed person details entry"),
            }
        }
        Ok(Self { entries })
    }

    /// Missing or unparseable files degrade to an empty map with a warning.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "person details unavailable; births default to 0");
                return Self::default();
            }
        };
        match Self::from_json(&raw) {
            Ok(map) => {
                info!(file = %path.display(), people = map.len(), "loaded person details");
                map
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "ignoring unreadable person details");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_string(self)?;
        fs::write(path, body).with_context(|| format!("writing {}", path.display()))
    }

    pub fn get(&self, source_id: i64) -> Option<PersonDetails> {
        self.entries.get(&source_id.to_string()).copied()
    }

    pub fn contains(&self, source_id: i64) -> bool {
        self.entries.contains_key(&source_id.to_string())
    }

    pub fn insert(&mut self, source_id: i64, details: PersonDetails) {
        self.entries.insert(source_id.to_string(), details);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy known birth/death years onto every credited person of `movie`.
    pub fn enrich(&self, movie: &mut MovieRecord) {
        for person in movie.people_mut() {
            let Some(details) = person.source_id.and_then(|id| self.get(id)) else {
                continue;
            };
            person.birth_year = details.born;
            person.death_year = details.died;
        }
    }
}
