//! Randomized evaluators for demos and load exercises
//!
//! [`SimulatedBallotPolicy`] votes approve/reject/abstain at 60/30/10 with
//! a confidence drawn from [0.7, 1.0]. [`SimulatedProposalPolicy`] mutates
//! a random known property toward a value from its candidate pool.

use async_trait::async_trait;
use coevolve_application::ports::policies::{BallotPolicy, PolicyError, ProposalPolicy};
use coevolve_domain::{Ballot, ChangeSet, ParticipantId, StateMap};
use rand::Rng;
use serde_json::{Value, json};

/// Weighted-random ballot caster
pub struct SimulatedBallotPolicy {
    /// Probability of an approve vote
    approve_rate: f64,
    /// Probability of a reject vote; the remainder abstains
    reject_rate: f64,
}

impl SimulatedBallotPolicy {
    pub fn new(approve_rate: f64, reject_rate: f64) -> Self {
        Self {
            approve_rate: approve_rate.clamp(0.0, 1.0),
            reject_rate: reject_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for SimulatedBallotPolicy {
    fn default() -> Self {
        Self::new(0.6, 0.3)
    }
}

#[async_trait]
impl BallotPolicy for SimulatedBallotPolicy {
    async fn cast(
        &self,
        participant: &ParticipantId,
        _proposal: &Value,
    ) -> Result<Ballot, PolicyError> {
        let mut rng = rand::rng();
        let roll: f64 = rng.random();
        let confidence: f64 = rng.random_range(0.7..=1.0);

        let ballot = if roll < self.approve_rate {
            Ballot::approve().with_reasoning(format!("{participant} finds the proposal sound"))
        } else if roll < self.approve_rate + self.reject_rate {
            Ballot::reject().with_reasoning(format!("{participant} objects to the direction"))
        } else {
            Ballot::abstain().with_reasoning(format!("{participant} has no strong opinion"))
        };
        Ok(ballot.with_confidence(confidence))
    }
}

/// Randomized proposer drawing replacement values from per-property pools
pub struct SimulatedProposalPolicy {
    candidates: Vec<(String, Vec<Value>)>,
}

impl SimulatedProposalPolicy {
    pub fn new(candidates: Vec<(String, Vec<Value>)>) -> Self {
        Self { candidates }
    }

    /// Candidate pools for the sample garment artifact
    pub fn garment() -> Self {
        Self::new(vec![
            (
                "body_color".to_string(),
                vec![
                    json!("#2C3E50"),
                    json!("#8E44AD"),
                    json!("#C0392B"),
                    json!("#16A085"),
                ],
            ),
            (
                "collar_type".to_string(),
                vec![json!("stand"), json!("notch"), json!("shawl")],
            ),
            (
                "pocket_count".to_string(),
                vec![json!(2), json!(3), json!(4), json!(6)],
            ),
        ])
    }
}

#[async_trait]
impl ProposalPolicy for SimulatedProposalPolicy {
    async fn propose(
        &self,
        participant: &ParticipantId,
        current_state: &StateMap,
    ) -> Result<ChangeSet, PolicyError> {
        let mut rng = rand::rng();

        // Only pools targeting a property the artifact actually has, with
        // at least one value differing from the current one
        let viable: Vec<(&String, Vec<&Value>)> = self
            .candidates
            .iter()
            .filter_map(|(property, pool)| {
                let current = current_state.get(property)?;
                let alternatives: Vec<&Value> = pool.iter().filter(|v| *v != current).collect();
                (!alternatives.is_empty()).then_some((property, alternatives))
            })
            .collect();

        if viable.is_empty() {
            return Ok(ChangeSet::new());
        }
        let (property, alternatives) = &viable[rng.random_range(0..viable.len())];
        let value = alternatives[rng.random_range(0..alternatives.len())];

        Ok(ChangeSet::proposing(
            participant.clone(),
            [((*property).clone(), value.clone())],
        ))
    }
}
