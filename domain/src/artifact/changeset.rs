//! Property-level changesets
//!
//! A [`ChangeSet`] is an ordered list of proposed property replacements.
//! Before a changeset is committed it is normalized against the state it
//! targets: entries for unknown properties are dropped, entries whose new
//! value equals the current value are dropped, and `old_value` is refreshed
//! to the value actually being replaced.

use crate::core::ids::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entities::StateMap;

/// One proposed property replacement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Property name within the artifact state
    pub property: String,
    /// Value being replaced (refreshed during normalization)
    pub old_value: Value,
    /// Proposed replacement value
    pub new_value: Value,
    /// Participant who proposed this change
    pub proposer: ParticipantId,
}

impl Change {
    pub fn new(
        property: impl Into<String>,
        old_value: Value,
        new_value: Value,
        proposer: impl Into<ParticipantId>,
    ) -> Self {
        Self {
            property: property.into(),
            old_value,
            new_value,
            proposer: proposer.into(),
        }
    }

    /// Whether this entry would leave the state untouched
    pub fn is_noop(&self) -> bool {
        self.old_value == self.new_value
    }
}

/// Ordered set of proposed property replacements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a changeset proposing new values for named properties.
    ///
    /// `old_value` is left as `Null` and filled in by normalization, so
    /// proposal policies only need to know the values they want.
    pub fn proposing(
        proposer: impl Into<ParticipantId>,
        entries: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let proposer = proposer.into();
        Self {
            changes: entries
                .into_iter()
                .map(|(property, new_value)| Change {
                    property,
                    old_value: Value::Null,
                    new_value,
                    proposer: proposer.clone(),
                })
                .collect(),
        }
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Distinct proposers appearing in this changeset, in first-seen order
    pub fn proposers(&self) -> Vec<ParticipantId> {
        let mut seen = Vec::new();
        for change in &self.changes {
            if !seen.contains(&change.proposer) {
                seen.push(change.proposer.clone());
            }
        }
        seen
    }

    /// Normalize against a concrete state.
    ///
    /// Keeps only entries that target an existing property and actually
    /// change its value. Later entries for the same property win, and the
    /// surviving entry's `old_value` is set to the state's current value,
    /// so the returned changeset records exactly what a commit would
    /// replace. A property edited away and back to its original value
    /// collapses to nothing.
    pub fn normalize_against(&self, state: &StateMap) -> ChangeSet {
        let mut normalized: Vec<Change> = Vec::new();

        for change in &self.changes {
            let Some(current) = state.get(&change.property) else {
                continue;
            };
            normalized.retain(|c| c.property != change.property);
            if *current == change.new_value {
                continue;
            }
            normalized.push(Change {
                property: change.property.clone(),
                old_value: current.clone(),
                new_value: change.new_value.clone(),
                proposer: change.proposer.clone(),
            });
        }

        ChangeSet {
            changes: normalized,
        }
    }
}

impl From<Vec<Change>> for ChangeSet {
    fn from(changes: Vec<Change>) -> Self {
        Self { changes }
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
