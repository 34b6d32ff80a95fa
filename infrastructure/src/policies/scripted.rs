//! Deterministic evaluators driven by a prewritten script
//!
//! Useful for demos and reproducible runs: each participant follows a
//! fixed sequence of decisions or proposals, falling back to a default
//! once the script runs out.

use async_trait::async_trait;
use coevolve_application::ports::policies::{BallotPolicy, PolicyError, ProposalPolicy};
use coevolve_domain::{Ballot, ChangeSet, Decision, ParticipantId, StateMap};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Ballot caster replaying scripted decisions per participant
pub struct ScriptedBallotPolicy {
    scripts: Mutex<HashMap<ParticipantId, VecDeque<Decision>>>,
    fallback: Decision,
}

impl ScriptedBallotPolicy {
    pub fn new(fallback: Decision) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
        }
    }

    /// Append decisions to a participant's script
    pub fn script(
        self,
        participant: impl Into<ParticipantId>,
        decisions: impl IntoIterator<Item = Decision>,
    ) -> Self {
        self.scripts
            .lock()
            .expect("script mutex poisoned")
            .entry(participant.into())
            .or_default()
            .extend(decisions);
        self
    }
}

#[async_trait]
impl BallotPolicy for ScriptedBallotPolicy {
    async fn cast(
        &self,
        participant: &ParticipantId,
        _proposal: &Value,
    ) -> Result<Ballot, PolicyError> {
        let decision = self
            .scripts
            .lock()
            .expect("script mutex poisoned")
            .get_mut(participant)
            .and_then(|script| script.pop_front())
            .unwrap_or(self.fallback);
        Ok(Ballot::new(decision))
    }
}

/// Proposer replaying scripted changesets per participant.
///
/// An exhausted script yields empty changesets, which iterative evolution
/// treats as the participant having nothing further to suggest.
#[derive(Default)]
pub struct ScriptedProposalPolicy {
    scripts: Mutex<HashMap<ParticipantId, VecDeque<ChangeSet>>>,
}

impl ScriptedProposalPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(
        self,
        participant: impl Into<ParticipantId>,
        changesets: impl IntoIterator<Item = ChangeSet>,
    ) -> Self {
        self.scripts
            .lock()
            .expect("script mutex poisoned")
            .entry(participant.into())
            .or_default()
            .extend(changesets);
        self
    }
}

#[async_trait]
impl ProposalPolicy for ScriptedProposalPolicy {
    async fn propose(
        &self,
        participant: &ParticipantId,
        _current_state: &StateMap,
    ) -> Result<ChangeSet, PolicyError> {
        Ok(self
            .scripts
            .lock()
            .expect("script mutex poisoned")
            .get_mut(participant)
            .and_then(|script| script.pop_front())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_ballots_replay_in_order() {
        let policy = ScriptedBallotPolicy::new(Decision::Abstain)
            .script("a", [Decision::Approve, Decision::Reject]);

        let first = policy.cast(&"a".into(), &json!({})).await.unwrap();
        let second = policy.cast(&"a".into(), &json!({})).await.unwrap();
        let third = policy.cast(&"a".into(), &json!({})).await.unwrap();

        assert_eq!(first.decision, Decision::Approve);
        assert_eq!(second.decision, Decision::Reject);
        assert_eq!(third.decision, Decision::Abstain); // fallback
    }

    #[tokio::test]
    async fn test_unscripted_participant_uses_fallback() {
        let policy = ScriptedBallotPolicy::new(Decision::Approve);
        let ballot = policy.cast(&"anyone".into(), &json!({})).await.unwrap();
        assert!(ballot.decision.is_approve());
    }

    #[tokio::test]
    async fn test_exhausted_proposal_script_yields_empty() {
        let policy = ScriptedProposalPolicy::new().script(
            "a",
            [ChangeSet::proposing(
                "a",
                [("pocket_count".to_string(), json!(4))],
            )],
        );

        let state = StateMap::new();
        assert_eq!(policy.propose(&"a".into(), &state).await.unwrap().len(), 1);
        assert!(policy.propose(&"a".into(), &state).await.unwrap().is_empty());
        assert!(policy.propose(&"b".into(), &state).await.unwrap().is_empty());
    }
}
