//! Multi-round and delegated consensus protocols
//!
//! [`ConsensusOrchestrator`] composes voting sessions into the two advanced
//! protocols: iterative multi-round voting with early exit, and delegated
//! voting where transferred power restricts who may cast.

use crate::error::EngineError;
use crate::ports::event_sink::{EventSink, events};
use crate::ports::policies::BallotPolicy;
use crate::sessions::{BallotAck, SessionManager};
use coevolve_domain::{
    ArtifactId, DelegationMap, DomainError, MultiRoundSession, ParticipantId, RoundResult,
    SessionId, SessionResult, VotingPowerAllocator, VotingSession,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Default early-exit ratio for multi-round consensus
pub const DEFAULT_EARLY_EXIT_RATIO: f64 = 0.8;

/// Outcome of a delegated consensus
#[derive(Debug, Clone, Serialize)]
pub struct DelegatedOutcome {
    pub session_id: SessionId,
    pub effective_weights: BTreeMap<ParticipantId, f64>,
    pub result: SessionResult,
}

/// Runs multi-round and delegated consensus over voting sessions
pub struct ConsensusOrchestrator {
    sessions: Arc<SessionManager>,
    allocator: VotingPowerAllocator,
    ballots: Arc<dyn BallotPolicy>,
    events: Arc<dyn EventSink>,
}

impl ConsensusOrchestrator {
    pub fn new(
        sessions: Arc<SessionManager>,
        allocator: VotingPowerAllocator,
        ballots: Arc<dyn BallotPolicy>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            sessions,
            allocator,
            ballots,
            events,
        }
    }

    /// Iterative consensus: up to `max_rounds` voting sessions, each seeded
    /// with the previous round's result as context. Stops early once a
    /// round's approve weight per participant exceeds `early_exit_ratio`.
    pub async fn run_multi_round(
        &self,
        artifact_id: ArtifactId,
        proposal: Value,
        participants: Vec<ParticipantId>,
        max_rounds: usize,
        early_exit_ratio: f64,
    ) -> Result<MultiRoundSession, EngineError> {
        if max_rounds == 0 {
            return Err(DomainError::validation("max_rounds must be at least 1").into());
        }
        if !(0.0..=1.0).contains(&early_exit_ratio) {
            return Err(DomainError::validation(format!(
                "early_exit_ratio {early_exit_ratio} outside [0, 1]"
            ))
            .into());
        }
        if participants.is_empty() {
            return Err(DomainError::validation("no participants").into());
        }

        let weights = self.allocator.base_weights(participants.iter().cloned());
        let mut rounds: Vec<RoundResult> = Vec::new();
        let mut previous: Option<SessionResult> = None;

        for round in 1..=max_rounds {
            let round_proposal = json!({
                "round": round,
                "proposal": proposal,
                "previous_result": previous,
            });

            let session = VotingSession::open(
                artifact_id.clone(),
                round_proposal,
                participants.clone(),
                self.sessions.config().default_threshold,
            )?
            .with_weights(weights.clone());
            let session = self.sessions.open_prepared(session).await?;
            let session_id = session.id.clone();

            let result =
                collect_ballots(&self.sessions, Arc::clone(&self.ballots), &session).await?;
            let tally = self.sessions.status(&session_id).await?.tally;

            info!(
                round,
                session = %session_id,
                approve_weight = result.approve_weight,
                "multi-round consensus round concluded"
            );

            let approve_fraction = result.approve_weight / participants.len() as f64;
            rounds.push(RoundResult {
                round,
                session_id,
                tally,
                result: result.clone(),
            });

            if approve_fraction > early_exit_ratio {
                info!(round, approve_fraction, "early consensus reached, stopping");
                break;
            }
            previous = Some(result);
        }

        let session = MultiRoundSession::conclude(artifact_id, proposal, rounds);
        self.events.emit(
            events::CONSENSUS_CONCLUDED,
            json!({
                "multi_round_id": session.id,
                "artifact_id": session.artifact_id,
                "rounds": session.outcome.rounds,
                "passed": session.outcome.passed,
                "overall_approval_rate": session.outcome.overall_approval_rate,
            }),
        );
        Ok(session)
    }

    /// Delegated consensus: the participant set is the union of delegators
    /// and delegates, weights are the delegation-adjusted effective
    /// weights, and only participants holding power may cast.
    pub async fn run_delegated(
        &self,
        artifact_id: ArtifactId,
        proposal: Value,
        delegations: &DelegationMap,
    ) -> Result<DelegatedOutcome, EngineError> {
        if delegations.is_empty() {
            return Err(DomainError::validation("empty delegation map").into());
        }

        let participants: Vec<ParticipantId> = delegations.participants().into_iter().collect();
        let effective = self
            .allocator
            .effective_weights(participants.iter().cloned(), delegations);
        let voters: Vec<ParticipantId> = effective
            .iter()
            .filter(|(_, w)| **w > 0.0)
            .map(|(p, _)| p.clone())
            .collect();

        let session = VotingSession::open(
            artifact_id,
            proposal,
            participants,
            self.sessions.config().default_threshold,
        )?
        .with_weights(effective.clone())
        .restrict_voters(voters);
        let session = self.sessions.open_prepared(session).await?;
        let session_id = session.id.clone();

        let result = collect_ballots(&self.sessions, Arc::clone(&self.ballots), &session).await?;
        self.events.emit(
            events::CONSENSUS_CONCLUDED,
            json!({
                "session_id": session_id,
                "artifact_id": session.artifact_id,
                "delegated": true,
                "passed": result.passed,
            }),
        );

        Ok(DelegatedOutcome {
            session_id,
            effective_weights: effective,
            result,
        })
    }
}

/// Collect one ballot per eligible voter and conclude the session.
///
/// Ballots are gathered concurrently; a failing evaluator is logged and
/// simply never casts, leaving its weight out of the tally. Submission goes
/// through the session manager so the conclude-on-last-ballot path stays
/// atomic; if anyone failed to cast, the session is concluded explicitly.
pub(crate) async fn collect_ballots(
    sessions: &SessionManager,
    policy: Arc<dyn BallotPolicy>,
    session: &VotingSession,
) -> Result<SessionResult, EngineError> {
    let mut join_set = JoinSet::new();
    for voter in session.voters() {
        let policy = Arc::clone(&policy);
        let voter = voter.clone();
        let proposal = session.proposal.clone();
        join_set.spawn(async move {
            let ballot = policy.cast(&voter, &proposal).await;
            (voter, ballot)
        });
    }

    let mut concluded: Option<SessionResult> = None;
    while let Some(joined) = join_set.join_next().await {
        let (voter, ballot) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                warn!("ballot task join error: {e}");
                continue;
            }
        };
        let ballot = match ballot {
            Ok(ballot) => ballot,
            Err(e) => {
                warn!(participant = %voter, "evaluator failed, treating as non-vote: {e}");
                continue;
            }
        };
        match sessions.submit_ballot(&session.id, &voter, ballot).await? {
            BallotAck::Concluded(result) => concluded = Some(result),
            BallotAck::Recorded { .. } => {}
        }
    }

    match concluded {
        Some(result) => Ok(result),
        None => sessions.conclude(&session.id).await,
    }
}
