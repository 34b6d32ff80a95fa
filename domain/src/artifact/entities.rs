//! Artifact and iteration entities
//!
//! An [`Artifact`] is the shared object under collaborative evolution. Its
//! history is an ordered sequence of immutable [`Iteration`] snapshots with
//! gapless, strictly increasing versions starting at 1. `current_state`
//! always equals the state of the last iteration.

use crate::core::error::DomainError;
use crate::core::ids::{ArtifactId, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::changeset::ChangeSet;

/// Artifact state: property name to JSON value
pub type StateMap = BTreeMap<String, Value>;

/// Descriptive metadata attached at creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactMetadata {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub creator: String,
}

impl Default for ArtifactMetadata {
    fn default() -> Self {
        Self {
            name: "Untitled Artifact".to_string(),
            description: String::new(),
            tags: Vec::new(),
            creator: "system".to_string(),
        }
    }
}

impl ArtifactMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Immutable snapshot of an artifact at a given version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    /// Full state snapshot after the changes were applied
    pub state: StateMap,
    /// The changeset that produced this iteration (empty for version 1)
    pub changes: ChangeSet,
    /// Participants credited with this iteration
    pub contributors: Vec<ParticipantId>,
}

/// One differing property between two iterations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDiff {
    pub property: String,
    pub value1: Option<Value>,
    pub value2: Option<Value>,
}

/// Shared versioned object under collaborative evolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub created: DateTime<Utc>,
    pub current_version: u64,
    pub iterations: Vec<Iteration>,
    pub current_state: StateMap,
    pub metadata: ArtifactMetadata,
}

impl Artifact {
    /// Create a new artifact at version 1 with the initial state recorded
    /// as its first iteration
    pub fn new(initial_state: StateMap, metadata: ArtifactMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: ArtifactId::generate(),
            created: now,
            current_version: 1,
            iterations: vec![Iteration {
                version: 1,
                timestamp: now,
                state: initial_state.clone(),
                changes: ChangeSet::new(),
                contributors: Vec::new(),
            }],
            current_state: initial_state,
            metadata,
        }
    }

    /// Look up the iteration holding a given version
    pub fn iteration(&self, version: u64) -> Option<&Iteration> {
        // Versions are gapless from 1, so the index is direct
        if version == 0 {
            return None;
        }
        self.iterations.get(version as usize - 1)
    }

    /// Verify the structural invariants this type maintains.
    ///
    /// A violation means the backing store handed us corrupted data; per
    /// the error contract it must halt the operation, never be repaired.
    pub fn check_integrity(&self) -> Result<(), DomainError> {
        if self.iterations.len() as u64 != self.current_version {
            return Err(DomainError::Corrupted(format!(
                "artifact {}: {} iterations for version {}",
                self.id,
                self.iterations.len(),
                self.current_version
            )));
        }
        match self.iterations.last() {
            Some(last) if last.state == self.current_state => Ok(()),
            Some(_) => Err(DomainError::Corrupted(format!(
                "artifact {}: current state diverges from last iteration",
                self.id
            ))),
            None => Err(DomainError::Corrupted(format!(
                "artifact {}: no iterations",
                self.id
            ))),
        }
    }

    /// Commit a changeset that was already normalized against
    /// `current_state`, appending the next iteration.
    ///
    /// Fails `Validation` for an empty changeset (callers decide whether an
    /// all-no-op proposal is an error or a quiet no-op before getting here)
    /// and `Conflict` if a normalized entry no longer matches the live
    /// state, which only happens when the single-writer discipline was
    /// broken.
    pub fn commit(
        &mut self,
        changes: ChangeSet,
        contributors: Vec<ParticipantId>,
    ) -> Result<u64, DomainError> {
        if changes.is_empty() {
            return Err(DomainError::validation("empty changeset"));
        }
        self.check_integrity()?;

        for change in changes.iter() {
            match self.current_state.get(&change.property) {
                Some(current) if *current == change.old_value => {}
                Some(_) => {
                    return Err(DomainError::Conflict(format!(
                        "property '{}' changed since the changeset was normalized",
                        change.property
                    )));
                }
                None => {
                    return Err(DomainError::validation(format!(
                        "unknown property '{}'",
                        change.property
                    )));
                }
            }
        }

        let mut state = self.current_state.clone();
        for change in changes.iter() {
            state.insert(change.property.clone(), change.new_value.clone());
        }

        let version = self.current_version + 1;
        self.iterations.push(Iteration {
            version,
            timestamp: Utc::now(),
            state: state.clone(),
            changes,
            contributors,
        });
        self.current_state = state;
        self.current_version = version;
        Ok(version)
    }

    /// Properties differing between two versions.
    ///
    /// Reflexive: `diff(v, v)` is empty. Fails `NotFound` if either version
    /// was never produced, `Corrupted` if a version within range is missing
    /// from the iteration list.
    pub fn diff(&self, v1: u64, v2: u64) -> Result<Vec<PropertyDiff>, DomainError> {
        let state1 = &self.diff_iteration(v1)?.state;
        let state2 = &self.diff_iteration(v2)?.state;

        let keys: BTreeSet<&String> = state1.keys().chain(state2.keys()).collect();
        Ok(keys
            .into_iter()
            .filter(|k| state1.get(*k) != state2.get(*k))
            .map(|k| PropertyDiff {
                property: k.clone(),
                value1: state1.get(k).cloned(),
                value2: state2.get(k).cloned(),
            })
            .collect())
    }

    fn diff_iteration(&self, version: u64) -> Result<&Iteration, DomainError> {
        if version == 0 || version > self.current_version {
            return Err(DomainError::NotFound(format!(
                "artifact {} has no version {}",
                self.id, version
            )));
        }
        self.iteration(version).ok_or_else(|| {
            DomainError::Corrupted(format!(
                "artifact {}: iteration {} missing",
                self.id, version
            ))
        })
    }
}
