//! Voting session entity
//!
//! A [`VotingSession`] manages one consensus round over a proposal: a fixed
//! eligible-participant set, at most one ballot per participant (last write
//! wins while active), and a weighted tally against an approval threshold.
//!
//! Tally rule: weights are summed over cast ballots only. Uncast ballots
//! contribute zero weight and are not counted in `total_weight`. When
//! `total_weight` is zero the approval ratio is zero and the session cannot
//! pass. The threshold boundary is inclusive: `ratio >= threshold` passes.

use crate::core::error::DomainError;
use crate::core::ids::{ArtifactId, ParticipantId, SessionId};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::ballot::{Ballot, Decision};

/// Default approval threshold: 66% agreement required
pub const DEFAULT_THRESHOLD: f64 = 0.66;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// One participant's line in the concluded breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotRecord {
    pub participant: ParticipantId,
    pub decision: Decision,
    pub weight: f64,
    pub reasoning: Option<String>,
}

/// Aggregated outcome of a concluded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub passed: bool,
    /// `approve_weight / total_weight`, zero when nothing was cast
    pub approval_ratio: f64,
    pub approve_weight: f64,
    pub reject_weight: f64,
    pub abstain_weight: f64,
    /// Sum over cast ballots only
    pub total_weight: f64,
    pub breakdown: Vec<BallotRecord>,
}

impl SessionResult {
    /// Tally cast ballots against a threshold
    pub fn from_ballots(
        ballots: &BTreeMap<ParticipantId, Ballot>,
        threshold: f64,
    ) -> Self {
        let mut approve_weight = 0.0;
        let mut reject_weight = 0.0;
        let mut abstain_weight = 0.0;
        let mut breakdown = Vec::with_capacity(ballots.len());

        for (participant, ballot) in ballots {
            match ballot.decision {
                Decision::Approve => approve_weight += ballot.weight,
                Decision::Reject => reject_weight += ballot.weight,
                Decision::Abstain => abstain_weight += ballot.weight,
            }
            breakdown.push(BallotRecord {
                participant: participant.clone(),
                decision: ballot.decision,
                weight: ballot.weight,
                reasoning: ballot.reasoning.clone(),
            });
        }

        let total_weight = approve_weight + reject_weight + abstain_weight;
        let approval_ratio = if total_weight == 0.0 {
            0.0
        } else {
            approve_weight / total_weight
        };
        // Inclusive boundary, and an empty tally never passes
        let passed = total_weight > 0.0 && approval_ratio >= threshold;

        Self {
            passed,
            approval_ratio,
            approve_weight,
            reject_weight,
            abstain_weight,
            total_weight,
            breakdown,
        }
    }
}

/// Live or historical per-decision counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveTally {
    pub approve: usize,
    pub reject: usize,
    pub abstain: usize,
    /// Eligible voters who have not cast yet
    pub pending: usize,
}

/// A single consensus round over one proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingSession {
    pub id: SessionId,
    pub artifact_id: ArtifactId,
    /// Opaque proposal payload shown to evaluators
    pub proposal: Value,
    /// Fixed eligible set, immutable after creation
    participants: Vec<ParticipantId>,
    /// Subset of participants allowed to cast. Differs from `participants`
    /// only under delegation, where fully delegated participants keep their
    /// seat but lose their independent ballot.
    voters: BTreeSet<ParticipantId>,
    /// Per-participant voting power, default 1.0
    weights: BTreeMap<ParticipantId, f64>,
    ballots: BTreeMap<ParticipantId, Ballot>,
    pub status: SessionStatus,
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub result: Option<SessionResult>,
}

impl VotingSession {
    /// Open a new session over a proposal.
    ///
    /// Fails `Validation` if the threshold is outside [0, 1]. Duplicate
    /// participant ids are collapsed.
    pub fn open(
        artifact_id: ArtifactId,
        proposal: Value,
        participants: Vec<ParticipantId>,
        threshold: f64,
    ) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(DomainError::validation(format!(
                "threshold {threshold} outside [0, 1]"
            )));
        }

        let mut unique = Vec::new();
        for p in participants {
            if !unique.contains(&p) {
                unique.push(p);
            }
        }
        let voters: BTreeSet<ParticipantId> = unique.iter().cloned().collect();
        let weights = unique.iter().cloned().map(|p| (p, 1.0)).collect();

        Ok(Self {
            id: SessionId::generate(),
            artifact_id,
            proposal,
            participants: unique,
            voters,
            weights,
            ballots: BTreeMap::new(),
            status: SessionStatus::Active,
            threshold,
            created_at: Utc::now(),
            closed_at: None,
            result: None,
        })
    }

    /// Override the voting-power map (delegated consensus, role weights).
    /// Participants absent from the map keep weight 1.0.
    pub fn with_weights(mut self, weights: BTreeMap<ParticipantId, f64>) -> Self {
        for (p, w) in weights {
            self.weights.insert(p, w.max(0.0));
        }
        self
    }

    /// Restrict ballot casting to a subset of the eligible set.
    /// Unknown ids are ignored.
    pub fn restrict_voters(mut self, voters: impl IntoIterator<Item = ParticipantId>) -> Self {
        let allowed: BTreeSet<ParticipantId> = voters
            .into_iter()
            .filter(|p| self.participants.contains(p))
            .collect();
        self.voters = allowed;
        self
    }

    pub fn participants(&self) -> &[ParticipantId] {
        &self.participants
    }

    pub fn voters(&self) -> &BTreeSet<ParticipantId> {
        &self.voters
    }

    pub fn weight_of(&self, participant: &ParticipantId) -> f64 {
        self.weights.get(participant).copied().unwrap_or(1.0)
    }

    pub fn ballots_cast(&self) -> usize {
        self.ballots.len()
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Whether the session has outlived its bounded lifetime
    pub fn is_expired(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        now - self.created_at >= ttl
    }

    /// Record (or overwrite) a participant's ballot.
    ///
    /// The ballot's weight is stamped from the session's power map. Returns
    /// `true` when every eligible voter has cast, meaning the caller must
    /// conclude the session inside the same critical section it used for
    /// the submission.
    pub fn submit(
        &mut self,
        participant: &ParticipantId,
        ballot: Ballot,
    ) -> Result<bool, DomainError> {
        if !self.is_active() {
            return Err(DomainError::invalid_state(format!(
                "session {} is not active",
                self.id
            )));
        }
        if !self.voters.contains(participant) {
            return Err(DomainError::IneligibleParticipant(participant.to_string()));
        }

        let weight = self.weight_of(participant);
        self.ballots
            .insert(participant.clone(), ballot.with_weight(weight));

        Ok(self.ballots.len() == self.voters.len())
    }

    /// Tally cast ballots and complete the session.
    ///
    /// Uncast ballots are simply excluded; they are not abstentions. Fails
    /// `InvalidState` if the session already concluded.
    pub fn conclude(&mut self) -> Result<&SessionResult, DomainError> {
        if !self.is_active() {
            return Err(DomainError::invalid_state(format!(
                "session {} already concluded",
                self.id
            )));
        }

        let result = SessionResult::from_ballots(&self.ballots, self.threshold);
        self.status = SessionStatus::Completed;
        self.closed_at = Some(Utc::now());
        self.result = Some(result);
        Ok(self.result.as_ref().expect("result just set"))
    }

    /// Per-decision counts, live or historical
    pub fn tally(&self) -> LiveTally {
        let mut tally = LiveTally {
            approve: 0,
            reject: 0,
            abstain: 0,
            pending: self.voters.len().saturating_sub(self.ballots.len()),
        };
        for ballot in self.ballots.values() {
            match ballot.decision {
                Decision::Approve => tally.approve += 1,
                Decision::Reject => tally.reject += 1,
                Decision::Abstain => tally.abstain += 1,
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session(participants: &[&str], threshold: f64) -> VotingSession {
        VotingSession::open(
            ArtifactId::from("artifact-test"),
            json!({"kind": "test-proposal"}),
            participants.iter().map(|p| ParticipantId::from(*p)).collect(),
            threshold,
        )
        .unwrap()
    }

    #[test]
    fn test_threshold_outside_unit_interval_rejected() {
        let err = VotingSession::open(
            ArtifactId::from("artifact-test"),
            json!({}),
            vec![],
            1.5,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_two_approve_one_reject_passes_at_066() {
        // {approve, approve, reject} at threshold 0.66
        let mut s = session(&["a", "b", "c"], 0.66);
        assert!(!s.submit(&"a".into(), Ballot::approve()).unwrap());
        assert!(!s.submit(&"b".into(), Ballot::approve()).unwrap());
        assert!(s.submit(&"c".into(), Ballot::reject()).unwrap());

        let result = s.conclude().unwrap().clone();
        assert!(result.passed);
        assert!((result.approval_ratio - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.total_weight, 3.0);
    }

    #[test]
    fn test_one_approve_two_reject_fails_at_066() {
        let mut s = session(&["a", "b", "c"], 0.66);
        s.submit(&"a".into(), Ballot::approve()).unwrap();
        s.submit(&"b".into(), Ballot::reject()).unwrap();
        s.submit(&"c".into(), Ballot::reject()).unwrap();

        let result = s.conclude().unwrap().clone();
        assert!(!result.passed);
        assert!((result.approval_ratio - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let mut s = session(&["a", "b"], 0.5);
        s.submit(&"a".into(), Ballot::approve()).unwrap();
        s.submit(&"b".into(), Ballot::reject()).unwrap();

        let result = s.conclude().unwrap();
        assert_eq!(result.approval_ratio, 0.5);
        assert!(result.passed);
    }

    #[test]
    fn test_zero_total_weight_never_passes() {
        // Threshold 0.0 would otherwise pass vacuously
        let mut s = session(&["a", "b"], 0.0);
        let result = s.conclude().unwrap();
        assert_eq!(result.total_weight, 0.0);
        assert_eq!(result.approval_ratio, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_abstain_weight_counts_toward_total() {
        let mut s = session(&["a", "b", "c"], 0.5);
        s.submit(&"a".into(), Ballot::approve()).unwrap();
        s.submit(&"b".into(), Ballot::abstain()).unwrap();
        s.submit(&"c".into(), Ballot::abstain()).unwrap();

        let result = s.conclude().unwrap();
        assert_eq!(result.total_weight, 3.0);
        assert!((result.approval_ratio - 1.0 / 3.0).abs() < 1e-9);
        assert!(!result.passed);
    }

    #[test]
    fn test_last_ballot_wins_while_active() {
        let mut s = session(&["a", "b"], 0.5);
        s.submit(&"a".into(), Ballot::reject()).unwrap();
        s.submit(&"a".into(), Ballot::approve()).unwrap();
        assert_eq!(s.ballots_cast(), 1);

        s.submit(&"b".into(), Ballot::approve()).unwrap();
        assert!(s.conclude().unwrap().passed);
    }

    #[test]
    fn test_non_member_is_ineligible() {
        let mut s = session(&["a", "b"], 0.5);
        let err = s.submit(&"stranger".into(), Ballot::approve()).unwrap_err();
        assert!(matches!(err, DomainError::IneligibleParticipant(_)));
    }

    #[test]
    fn test_submit_after_conclusion_is_invalid_state() {
        let mut s = session(&["a"], 0.5);
        s.conclude().unwrap();
        let err = s.submit(&"a".into(), Ballot::approve()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn test_double_conclude_is_invalid_state() {
        let mut s = session(&["a"], 0.5);
        s.conclude().unwrap();
        assert!(matches!(s.conclude(), Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_weight_override_changes_outcome() {
        let mut s = session(&["a", "b"], 0.66).with_weights(
            [("a".into(), 3.0), ("b".into(), 1.0)].into_iter().collect(),
        );
        s.submit(&"a".into(), Ballot::approve()).unwrap();
        s.submit(&"b".into(), Ballot::reject()).unwrap();

        let result = s.conclude().unwrap();
        assert_eq!(result.approve_weight, 3.0);
        assert_eq!(result.total_weight, 4.0);
        assert!(result.passed); // 0.75 >= 0.66
    }

    #[test]
    fn test_restricted_voters_completion_count() {
        let mut s = session(&["delegator", "delegate"], 0.5)
            .restrict_voters([ParticipantId::from("delegate")]);

        let err = s
            .submit(&"delegator".into(), Ballot::approve())
            .unwrap_err();
        assert!(matches!(err, DomainError::IneligibleParticipant(_)));

        // Single remaining voter completes the session
        assert!(s.submit(&"delegate".into(), Ballot::approve()).unwrap());
    }

    #[test]
    fn test_approval_ratio_stays_in_unit_interval() {
        let mut s = session(&["a", "b", "c"], 0.66).with_weights(
            [("a".into(), 2.5), ("b".into(), 0.5), ("c".into(), 1.1)]
                .into_iter()
                .collect(),
        );
        s.submit(&"a".into(), Ballot::approve()).unwrap();
        s.submit(&"b".into(), Ballot::reject()).unwrap();
        s.submit(&"c".into(), Ballot::abstain()).unwrap();

        let result = s.conclude().unwrap();
        assert!(result.approval_ratio >= 0.0 && result.approval_ratio <= 1.0);
    }

    #[test]
    fn test_expiry_clock() {
        let s = session(&["a"], 0.5);
        let now = Utc::now();
        assert!(!s.is_expired(std::time::Duration::from_secs(3600), now));
        assert!(s.is_expired(std::time::Duration::ZERO, now));
    }

    #[test]
    fn test_tally_counts_and_pending() {
        let mut s = session(&["a", "b", "c", "d"], 0.5);
        s.submit(&"a".into(), Ballot::approve()).unwrap();
        s.submit(&"b".into(), Ballot::abstain()).unwrap();

        let tally = s.tally();
        assert_eq!(tally.approve, 1);
        assert_eq!(tally.abstain, 1);
        assert_eq!(tally.reject, 0);
        assert_eq!(tally.pending, 2);
    }
}
