//! Evolution events, round results, and the per-attempt state machine
//!
//! Every accepted or directly applied change is recorded in an append-only
//! evolution log of [`EvolutionEvent`]s. Multi-round consensus aggregates
//! per-round [`RoundResult`]s into a [`MultiRoundOutcome`].

use crate::artifact::changeset::ChangeSet;
use crate::core::ids::{ArtifactId, ParticipantId, SessionId};
use crate::voting::session::{LiveTally, SessionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How a change entered the artifact history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Direct system-override modification, no vote
    Modification,
    /// Change accepted by a concluded voting session
    ConsensusEvolution,
}

/// Append-only evolution log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub actor: ParticipantId,
    pub changes: ChangeSet,
    /// Voting session that accepted the change, for consensus evolutions
    pub session: Option<SessionId>,
    /// Artifact version the change produced
    pub version: u64,
}

impl EvolutionEvent {
    pub fn modification(actor: ParticipantId, changes: ChangeSet, version: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: EventKind::Modification,
            actor,
            changes,
            session: None,
            version,
        }
    }

    pub fn consensus(session: SessionId, changes: ChangeSet, version: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: EventKind::ConsensusEvolution,
            actor: ParticipantId::from("consensus"),
            changes,
            session: Some(session),
            version,
        }
    }
}

/// Phase of a single evolution attempt
///
/// Proposing -> Voting -> Applying -> (Stabilized | next-round Proposing),
/// or Aborted when the vote rejects the proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvolutionPhase {
    Proposing,
    Voting,
    Applying,
    Stabilized,
    Aborted,
}

impl std::fmt::Display for EvolutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvolutionPhase::Proposing => write!(f, "proposing"),
            EvolutionPhase::Voting => write!(f, "voting"),
            EvolutionPhase::Applying => write!(f, "applying"),
            EvolutionPhase::Stabilized => write!(f, "stabilized"),
            EvolutionPhase::Aborted => write!(f, "aborted"),
        }
    }
}

/// One concluded round of a multi-round consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Round number, 1-indexed
    pub round: usize,
    pub session_id: SessionId,
    pub tally: LiveTally,
    pub result: SessionResult,
}

/// Strength of an aggregated multi-round consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusStrength {
    Strong,
    Weak,
}

/// Aggregate over the executed rounds of a multi-round session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiRoundOutcome {
    /// Sum of approve weights over sum of total weights, across executed
    /// rounds
    pub overall_approval_rate: f64,
    pub passed: bool,
    pub rounds: usize,
    pub strength: ConsensusStrength,
}

impl MultiRoundOutcome {
    pub fn aggregate(rounds: &[RoundResult]) -> Self {
        let approve: f64 = rounds.iter().map(|r| r.result.approve_weight).sum();
        let total: f64 = rounds.iter().map(|r| r.result.total_weight).sum();

        let overall_approval_rate = if total == 0.0 { 0.0 } else { approve / total };
        Self {
            overall_approval_rate,
            passed: overall_approval_rate > 0.5,
            rounds: rounds.len(),
            strength: if overall_approval_rate > 0.66 {
                ConsensusStrength::Strong
            } else {
                ConsensusStrength::Weak
            },
        }
    }
}

/// A completed multi-round consensus session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiRoundSession {
    pub id: String,
    pub artifact_id: ArtifactId,
    pub proposal: Value,
    pub rounds: Vec<RoundResult>,
    pub outcome: MultiRoundOutcome,
}

impl MultiRoundSession {
    pub fn conclude(artifact_id: ArtifactId, proposal: Value, rounds: Vec<RoundResult>) -> Self {
        let outcome = MultiRoundOutcome::aggregate(&rounds);
        Self {
            id: format!("multiround-{}", Uuid::new_v4()),
            artifact_id,
            proposal,
            rounds,
            outcome,
        }
    }
}
