//! Voting power and delegation
//!
//! Every participant starts from a base weight of 1.0, adjustable through a
//! pluggable [`WeightClassifier`]. Power can be transferred single-level via
//! a [`DelegationMap`]; the delegation graph must stay a forest, so
//! self-delegation and cycles are rejected outright rather than tolerated.

use crate::core::error::DomainError;
use crate::core::ids::ParticipantId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Default base voting weight
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Pluggable base-weight adjustment (role multipliers, reputation, ...)
pub trait WeightClassifier: Send + Sync {
    fn weight_for(&self, participant: &ParticipantId) -> f64;
}

/// Everyone weighs 1.0
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeight;

impl WeightClassifier for UniformWeight {
    fn weight_for(&self, _participant: &ParticipantId) -> f64 {
        DEFAULT_WEIGHT
    }
}

/// Single-level transfer of voting power: delegator to delegate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DelegationMap {
    edges: BTreeMap<ParticipantId, ParticipantId>,
}

impl DelegationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delegation. A delegator re-delegating overwrites the
    /// previous edge.
    ///
    /// Fails `Validation` on self-delegation or when the edge would close a
    /// cycle in the delegation graph.
    pub fn delegate(
        &mut self,
        delegator: ParticipantId,
        delegate: ParticipantId,
    ) -> Result<(), DomainError> {
        if delegator == delegate {
            return Err(DomainError::validation(format!(
                "participant '{delegator}' cannot delegate to itself"
            )));
        }

        // Walk forward from the delegate; reaching the delegator means the
        // new edge would close a loop. The prior edge of `delegator` (if
        // any) is about to be replaced, so it is skipped.
        let mut cursor = Some(&delegate);
        while let Some(current) = cursor {
            if *current == delegator {
                return Err(DomainError::validation(format!(
                    "delegation from '{delegator}' to '{delegate}' would create a cycle"
                )));
            }
            cursor = self.edges.get(current);
        }

        self.edges.insert(delegator, delegate);
        Ok(())
    }

    /// Who this participant delegated to, if anyone
    pub fn delegate_of(&self, delegator: &ParticipantId) -> Option<&ParticipantId> {
        self.edges.get(delegator)
    }

    pub fn has_delegated(&self, participant: &ParticipantId) -> bool {
        self.edges.contains_key(participant)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &ParticipantId)> {
        self.edges.iter()
    }

    /// Union of delegators and delegates
    pub fn participants(&self) -> BTreeSet<ParticipantId> {
        self.edges
            .iter()
            .flat_map(|(from, to)| [from.clone(), to.clone()])
            .collect()
    }
}

/// Computes per-participant ballot weight, including delegation
#[derive(Clone)]
pub struct VotingPowerAllocator {
    classifier: Arc<dyn WeightClassifier>,
}

impl VotingPowerAllocator {
    pub fn new(classifier: Arc<dyn WeightClassifier>) -> Self {
        Self { classifier }
    }

    /// Allocator with uniform 1.0 weights
    pub fn uniform() -> Self {
        Self::new(Arc::new(UniformWeight))
    }

    /// A participant's own weight before delegation
    pub fn base_weight(&self, participant: &ParticipantId) -> f64 {
        self.classifier.weight_for(participant).max(0.0)
    }

    /// Base weights for a whole participant set
    pub fn base_weights(
        &self,
        participants: impl IntoIterator<Item = ParticipantId>,
    ) -> BTreeMap<ParticipantId, f64> {
        participants
            .into_iter()
            .map(|p| {
                let w = self.base_weight(&p);
                (p, w)
            })
            .collect()
    }

    /// Effective weights after applying single-level delegation.
    ///
    /// A delegate's effective weight is its own base weight plus the base
    /// weights delegated onto it. A delegator's own power drops to zero;
    /// transfers are not chained, so a delegator who also receives power
    /// keeps what was delegated to it.
    pub fn effective_weights(
        &self,
        participants: impl IntoIterator<Item = ParticipantId>,
        delegations: &DelegationMap,
    ) -> BTreeMap<ParticipantId, f64> {
        let mut weights = self.base_weights(participants);

        // Make sure every delegation endpoint has a seat
        for (from, to) in delegations.iter() {
            for p in [from, to] {
                let w = self.base_weight(p);
                weights.entry(p.clone()).or_insert(w);
            }
        }

        for (from, to) in delegations.iter() {
            let transferred = self.base_weight(from);
            if let Some(own) = weights.get_mut(from) {
                *own -= transferred;
            }
            if let Some(target) = weights.get_mut(to) {
                *target += transferred;
            }
        }

        // Guard against classifier-driven negatives
        for w in weights.values_mut() {
            *w = w.max(0.0);
        }
        weights
    }
}
