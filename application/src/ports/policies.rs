//! Proposal and ballot policy ports
//!
//! Proposals and ballots come from external evaluators: simulated agents,
//! AI-driven personas, or humans. Production implementations and
//! deterministic test doubles satisfy the same interfaces.

use async_trait::async_trait;
use coevolve_domain::{Ballot, ChangeSet, ParticipantId, StateMap};
use serde_json::Value;
use thiserror::Error;

/// Failure of an external evaluator
#[derive(Error, Debug)]
#[error("policy failure: {0}")]
pub struct PolicyError(pub String);

impl PolicyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Generates a changeset on behalf of a participant.
///
/// Evaluation may take arbitrarily long (an implementation may call out to
/// long-running analysis); the engine awaits without a deadline of its own.
#[async_trait]
pub trait ProposalPolicy: Send + Sync {
    async fn propose(
        &self,
        participant: &ParticipantId,
        current_state: &StateMap,
    ) -> Result<ChangeSet, PolicyError>;
}

/// Casts a ballot on behalf of a participant
#[async_trait]
pub trait BallotPolicy: Send + Sync {
    async fn cast(&self, participant: &ParticipantId, proposal: &Value)
    -> Result<Ballot, PolicyError>;
}
