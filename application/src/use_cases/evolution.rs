//! Consensus-gated artifact evolution
//!
//! [`EvolutionOrchestrator`] ties the voting machinery to the artifact
//! store: a proposed changeset is only applied once a voting session over
//! it passes. Iterative evolution repeats the propose/vote/apply loop until
//! the participants stop producing applicable changes.

use crate::error::EngineError;
use crate::ports::event_sink::{EventSink, events};
use crate::ports::policies::{BallotPolicy, ProposalPolicy};
use crate::sessions::SessionManager;
use crate::store::{ApplyOutcome, ArtifactStore};
use crate::use_cases::consensus::collect_ballots;
use chrono::{DateTime, Utc};
use coevolve_domain::{
    Artifact, ArtifactId, ArtifactMetadata, ChangeSet, DomainError, EvolutionEvent, EvolutionPhase,
    ParticipantId, SessionId, SessionResult, StateMap,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a single propose/vote/apply attempt
#[derive(Debug, Clone, Serialize)]
pub struct EvolutionOutcome {
    pub session_id: SessionId,
    pub artifact_id: ArtifactId,
    /// Terminal phase of the attempt: `Applying` when the vote passed,
    /// `Aborted` when it was rejected
    pub phase: EvolutionPhase,
    pub accepted: bool,
    /// Version produced by the commit; `None` when the vote failed or the
    /// accepted changeset normalized to a no-op
    pub new_version: Option<u64>,
    /// Changes actually committed after normalization
    pub applied: ChangeSet,
    pub result: SessionResult,
}

/// One participant's proposal within an iterative-evolution round
#[derive(Debug, Clone, Serialize)]
pub struct ProposalEntry {
    pub participant: ParticipantId,
    pub changes: ChangeSet,
}

/// One round of iterative evolution
#[derive(Debug, Clone, Serialize)]
pub struct EvolutionRound {
    /// Round number, 1-indexed
    pub round: usize,
    pub proposals: Vec<ProposalEntry>,
    pub outcomes: Vec<EvolutionOutcome>,
    /// How many proposals produced a new artifact version
    pub applied: usize,
}

/// Full report of an iterative-evolution run
#[derive(Debug, Clone, Serialize)]
pub struct EvolutionReport {
    pub id: String,
    pub artifact_id: ArtifactId,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub rounds: Vec<EvolutionRound>,
    /// True when a round applied nothing and the loop stopped early
    pub stabilized: bool,
    pub final_state: StateMap,
    pub final_version: u64,
}

/// Drives the propose -> vote -> apply lifecycle over artifacts
pub struct EvolutionOrchestrator {
    artifacts: Arc<ArtifactStore>,
    sessions: Arc<SessionManager>,
    ballots: Arc<dyn BallotPolicy>,
    proposals: Arc<dyn ProposalPolicy>,
    events: Arc<dyn EventSink>,
}

impl EvolutionOrchestrator {
    pub fn new(
        artifacts: Arc<ArtifactStore>,
        sessions: Arc<SessionManager>,
        ballots: Arc<dyn BallotPolicy>,
        proposals: Arc<dyn ProposalPolicy>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            artifacts,
            sessions,
            ballots,
            proposals,
            events,
        }
    }

    /// Create a new artifact at version 1
    pub async fn create_artifact(
        &self,
        initial_state: StateMap,
        metadata: ArtifactMetadata,
    ) -> Result<Artifact, EngineError> {
        let artifact = self.artifacts.create(initial_state, metadata).await?;
        self.events.emit(
            events::ARTIFACT_CREATED,
            json!({
                "artifact_id": artifact.id,
                "version": artifact.current_version,
            }),
        );
        Ok(artifact)
    }

    /// Apply a changeset directly, bypassing consensus. Recorded in the
    /// evolution log as a plain modification.
    pub async fn apply_modification(
        &self,
        artifact_id: &ArtifactId,
        actor: &ParticipantId,
        changeset: ChangeSet,
    ) -> Result<ApplyOutcome, EngineError> {
        let outcome = self
            .artifacts
            .apply_change_set(artifact_id, changeset, vec![actor.clone()])
            .await?;

        if let ApplyOutcome::Applied { version, changes } = &outcome {
            self.artifacts
                .record_event(
                    artifact_id,
                    EvolutionEvent::modification(actor.clone(), changes.clone(), *version),
                )
                .await?;
            self.events.emit(
                events::ARTIFACT_UPDATED,
                json!({
                    "artifact_id": artifact_id,
                    "version": version,
                    "actor": actor,
                }),
            );
        }
        Ok(outcome)
    }

    /// Put a changeset to a vote and apply it only if the session passes
    pub async fn propose_and_evolve(
        &self,
        artifact_id: &ArtifactId,
        changeset: ChangeSet,
        participants: &[ParticipantId],
    ) -> Result<EvolutionOutcome, EngineError> {
        if changeset.is_empty() {
            return Err(DomainError::validation("empty proposal").into());
        }
        if participants.is_empty() {
            return Err(DomainError::validation("no participants").into());
        }

        info!(artifact = %artifact_id, phase = %EvolutionPhase::Proposing, "proposing changeset");
        let current_state = self.artifacts.current_state(artifact_id).await?;
        let proposal = json!({
            "artifact_id": artifact_id,
            "current_state": current_state,
            "proposed_changes": changeset,
        });

        let session = self
            .sessions
            .open(artifact_id.clone(), proposal, participants.to_vec(), None)
            .await?;
        let session_id = session.id.clone();

        info!(artifact = %artifact_id, session = %session_id, phase = %EvolutionPhase::Voting, "collecting ballots");
        let result = collect_ballots(&self.sessions, Arc::clone(&self.ballots), &session).await?;
        self.events.emit(
            events::CONSENSUS_CONCLUDED,
            json!({
                "session_id": session_id,
                "artifact_id": artifact_id,
                "passed": result.passed,
                "approval_ratio": result.approval_ratio,
            }),
        );

        if !result.passed {
            info!(artifact = %artifact_id, session = %session_id, phase = %EvolutionPhase::Aborted, "proposal rejected");
            return Ok(EvolutionOutcome {
                session_id,
                artifact_id: artifact_id.clone(),
                phase: EvolutionPhase::Aborted,
                accepted: false,
                new_version: None,
                applied: ChangeSet::new(),
                result,
            });
        }

        info!(artifact = %artifact_id, session = %session_id, phase = %EvolutionPhase::Applying, "proposal accepted");
        let contributors = changeset.proposers();
        let outcome = self
            .artifacts
            .apply_change_set(artifact_id, changeset, contributors)
            .await?;

        let (new_version, applied) = match outcome {
            ApplyOutcome::Applied { version, changes } => {
                self.artifacts
                    .record_event(
                        artifact_id,
                        EvolutionEvent::consensus(session_id.clone(), changes.clone(), version),
                    )
                    .await?;
                self.events.emit(
                    events::ARTIFACT_UPDATED,
                    json!({
                        "artifact_id": artifact_id,
                        "version": version,
                        "session_id": session_id,
                    }),
                );
                (Some(version), changes)
            }
            // The state moved on since the proposal; an accepted vote over
            // an already-satisfied changeset applies nothing
            ApplyOutcome::NoOp => (None, ChangeSet::new()),
        };

        Ok(EvolutionOutcome {
            session_id,
            artifact_id: artifact_id.clone(),
            phase: EvolutionPhase::Applying,
            accepted: true,
            new_version,
            applied,
            result,
        })
    }

    /// Run repeated rounds of propose/vote/apply until the participants
    /// produce no applicable changes or `max_rounds` is reached.
    ///
    /// In each round every participant is asked for a proposal against the
    /// live state; empty proposals are skipped, and a failing proposer is
    /// logged and treated as having nothing to suggest. The run stabilizes
    /// when a whole round applies zero changes.
    pub async fn iterative_evolution(
        &self,
        artifact_id: &ArtifactId,
        participants: &[ParticipantId],
        max_rounds: usize,
    ) -> Result<EvolutionReport, EngineError> {
        if max_rounds == 0 {
            return Err(DomainError::validation("max_rounds must be at least 1").into());
        }
        if participants.is_empty() {
            return Err(DomainError::validation("no participants").into());
        }

        let started = Utc::now();
        let mut rounds: Vec<EvolutionRound> = Vec::new();
        let mut stabilized = false;

        for round in 1..=max_rounds {
            let state = self.artifacts.current_state(artifact_id).await?;

            let mut proposals: Vec<ProposalEntry> = Vec::new();
            for participant in participants {
                match self.proposals.propose(participant, &state).await {
                    Ok(changes) if !changes.is_empty() => proposals.push(ProposalEntry {
                        participant: participant.clone(),
                        changes,
                    }),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(participant = %participant, round, "proposer failed, skipping: {e}");
                    }
                }
            }

            let mut outcomes: Vec<EvolutionOutcome> = Vec::new();
            let mut applied = 0;
            for entry in &proposals {
                let outcome = self
                    .propose_and_evolve(artifact_id, entry.changes.clone(), participants)
                    .await?;
                if outcome.new_version.is_some() {
                    applied += 1;
                }
                outcomes.push(outcome);
            }

            info!(
                artifact = %artifact_id,
                round,
                proposals = proposals.len(),
                applied,
                "evolution round finished"
            );
            rounds.push(EvolutionRound {
                round,
                proposals,
                outcomes,
                applied,
            });

            if applied == 0 {
                stabilized = true;
                info!(artifact = %artifact_id, round, phase = %EvolutionPhase::Stabilized, "artifact stabilized");
                self.events.emit(
                    events::EVOLUTION_STABILIZED,
                    json!({
                        "artifact_id": artifact_id,
                        "round": round,
                    }),
                );
                break;
            }
        }

        let artifact = self.artifacts.artifact(artifact_id).await?;
        Ok(EvolutionReport {
            id: format!("evolution-{}", Uuid::new_v4()),
            artifact_id: artifact_id.clone(),
            started,
            finished: Utc::now(),
            rounds,
            stabilized,
            final_state: artifact.current_state,
            final_version: artifact.current_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionConfig;
    use crate::testing::{CollectingSink, MemStore, QueuedProposalPolicy, StaticBallotPolicy};
    use coevolve_domain::EventKind;
    use serde_json::json;

    fn initial_state() -> StateMap {
        let mut state = StateMap::new();
        state.insert("body_color".to_string(), json!("#2C3E50"));
        state.insert("collar_type".to_string(), json!("stand"));
        state.insert("pocket_count".to_string(), json!(2));
        state
    }

    struct Fixture {
        orchestrator: EvolutionOrchestrator,
        artifacts: Arc<ArtifactStore>,
        sink: Arc<CollectingSink>,
    }

    fn fixture(ballots: Arc<dyn BallotPolicy>, proposals: Arc<dyn ProposalPolicy>) -> Fixture {
        let artifacts = Arc::new(ArtifactStore::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::new(MemStore::new()),
            SessionConfig::default(),
        ));
        let sink = Arc::new(CollectingSink::new());
        let orchestrator = EvolutionOrchestrator::new(
            Arc::clone(&artifacts),
            sessions,
            ballots,
            proposals,
            sink.clone(),
        );
        Fixture {
            orchestrator,
            artifacts,
            sink,
        }
    }

    fn agents(names: &[&str]) -> Vec<ParticipantId> {
        names.iter().map(|n| ParticipantId::from(*n)).collect()
    }

    #[tokio::test]
    async fn test_accepted_proposal_applies_and_logs() {
        let fx = fixture(
            Arc::new(StaticBallotPolicy::approving()),
            Arc::new(QueuedProposalPolicy::new()),
        );
        let artifact = fx
            .orchestrator
            .create_artifact(initial_state(), ArtifactMetadata::named("jacket"))
            .await
            .unwrap();

        let cs = ChangeSet::proposing("agent-a", [("pocket_count".to_string(), json!(4))]);
        let outcome = fx
            .orchestrator
            .propose_and_evolve(&artifact.id, cs, &agents(&["a", "b", "c"]))
            .await
            .unwrap();

        assert!(outcome.accepted);
        assert_eq!(outcome.phase, EvolutionPhase::Applying);
        assert_eq!(outcome.new_version, Some(2));
        assert_eq!(outcome.applied.len(), 1);

        let history = fx.artifacts.history(&artifact.id).await.unwrap();
        assert_eq!(history.current_version, 2);
        assert_eq!(history.log.len(), 1);
        assert_eq!(history.log[0].kind, EventKind::ConsensusEvolution);
        assert_eq!(history.log[0].session, Some(outcome.session_id));

        let names = fx.sink.names();
        assert!(names.contains(&events::ARTIFACT_CREATED.to_string()));
        assert!(names.contains(&events::CONSENSUS_CONCLUDED.to_string()));
        assert!(names.contains(&events::ARTIFACT_UPDATED.to_string()));
    }

    #[tokio::test]
    async fn test_rejected_proposal_leaves_artifact_untouched() {
        let fx = fixture(
            Arc::new(StaticBallotPolicy::rejecting()),
            Arc::new(QueuedProposalPolicy::new()),
        );
        let artifact = fx
            .orchestrator
            .create_artifact(initial_state(), ArtifactMetadata::default())
            .await
            .unwrap();

        let cs = ChangeSet::proposing("agent-a", [("pocket_count".to_string(), json!(4))]);
        let outcome = fx
            .orchestrator
            .propose_and_evolve(&artifact.id, cs, &agents(&["a", "b"]))
            .await
            .unwrap();

        assert!(!outcome.accepted);
        assert_eq!(outcome.phase, EvolutionPhase::Aborted);
        assert_eq!(outcome.new_version, None);
        assert!(outcome.applied.is_empty());

        let snapshot = fx.artifacts.artifact(&artifact.id).await.unwrap();
        assert_eq!(snapshot.current_version, 1);
        assert_eq!(snapshot.current_state["pocket_count"], json!(2));
        assert!(fx.artifacts.history(&artifact.id).await.unwrap().log.is_empty());
    }

    #[tokio::test]
    async fn test_accepted_noop_produces_no_version() {
        let fx = fixture(
            Arc::new(StaticBallotPolicy::approving()),
            Arc::new(QueuedProposalPolicy::new()),
        );
        let artifact = fx
            .orchestrator
            .create_artifact(initial_state(), ArtifactMetadata::default())
            .await
            .unwrap();

        // Proposes the value the state already holds
        let cs = ChangeSet::proposing("agent-a", [("pocket_count".to_string(), json!(2))]);
        let outcome = fx
            .orchestrator
            .propose_and_evolve(&artifact.id, cs, &agents(&["a"]))
            .await
            .unwrap();

        assert!(outcome.accepted);
        assert_eq!(outcome.new_version, None);
        assert!(outcome.applied.is_empty());
        let snapshot = fx.artifacts.artifact(&artifact.id).await.unwrap();
        assert_eq!(snapshot.current_version, 1);
    }

    #[tokio::test]
    async fn test_direct_modification_skips_consensus() {
        let fx = fixture(
            Arc::new(StaticBallotPolicy::rejecting()),
            Arc::new(QueuedProposalPolicy::new()),
        );
        let artifact = fx
            .orchestrator
            .create_artifact(initial_state(), ArtifactMetadata::default())
            .await
            .unwrap();

        let cs = ChangeSet::proposing("system", [("collar_type".to_string(), json!("notch"))]);
        let outcome = fx
            .orchestrator
            .apply_modification(&artifact.id, &ParticipantId::system(), cs)
            .await
            .unwrap();

        assert!(outcome.is_applied());
        let history = fx.artifacts.history(&artifact.id).await.unwrap();
        assert_eq!(history.current_version, 2);
        assert_eq!(history.log[0].kind, EventKind::Modification);
        assert!(history.log[0].session.is_none());
    }

    #[tokio::test]
    async fn test_iterative_evolution_stabilizes_when_nothing_applies() {
        // Two rounds of real proposals from one participant, then silence:
        // round 3 applies nothing and the run stabilizes there
        let proposals = QueuedProposalPolicy::new()
            .enqueue(
                "a",
                ChangeSet::proposing("a", [("pocket_count".to_string(), json!(4))]),
            )
            .enqueue(
                "a",
                ChangeSet::proposing("a", [("body_color".to_string(), json!("#FF0000"))]),
            );
        let fx = fixture(Arc::new(StaticBallotPolicy::approving()), Arc::new(proposals));
        let artifact = fx
            .orchestrator
            .create_artifact(initial_state(), ArtifactMetadata::default())
            .await
            .unwrap();

        let report = fx
            .orchestrator
            .iterative_evolution(&artifact.id, &agents(&["a", "b", "c"]), 5)
            .await
            .unwrap();

        assert!(report.stabilized);
        assert_eq!(report.rounds.len(), 3);
        assert_eq!(report.rounds[0].applied, 1);
        assert_eq!(report.rounds[1].applied, 1);
        assert_eq!(report.rounds[2].applied, 0);
        assert_eq!(report.final_version, 3);
        assert_eq!(report.final_state["pocket_count"], json!(4));
        assert_eq!(report.final_state["body_color"], json!("#FF0000"));
        assert!(
            fx.sink
                .names()
                .contains(&events::EVOLUTION_STABILIZED.to_string())
        );
    }

    #[tokio::test]
    async fn test_iterative_evolution_respects_max_rounds() {
        let proposals = QueuedProposalPolicy::new()
            .enqueue(
                "a",
                ChangeSet::proposing("a", [("pocket_count".to_string(), json!(3))]),
            )
            .enqueue(
                "a",
                ChangeSet::proposing("a", [("pocket_count".to_string(), json!(4))]),
            )
            .enqueue(
                "a",
                ChangeSet::proposing("a", [("pocket_count".to_string(), json!(5))]),
            );
        let fx = fixture(Arc::new(StaticBallotPolicy::approving()), Arc::new(proposals));
        let artifact = fx
            .orchestrator
            .create_artifact(initial_state(), ArtifactMetadata::default())
            .await
            .unwrap();

        let report = fx
            .orchestrator
            .iterative_evolution(&artifact.id, &agents(&["a"]), 2)
            .await
            .unwrap();

        assert!(!report.stabilized);
        assert_eq!(report.rounds.len(), 2);
        assert_eq!(report.final_version, 3);
    }

    #[tokio::test]
    async fn test_rejected_rounds_still_count_toward_stabilization() {
        // The proposal is real but every vote fails, so nothing applies and
        // the run stabilizes in round 1
        let proposals = QueuedProposalPolicy::new().enqueue(
            "a",
            ChangeSet::proposing("a", [("pocket_count".to_string(), json!(9))]),
        );
        let fx = fixture(Arc::new(StaticBallotPolicy::rejecting()), Arc::new(proposals));
        let artifact = fx
            .orchestrator
            .create_artifact(initial_state(), ArtifactMetadata::default())
            .await
            .unwrap();

        let report = fx
            .orchestrator
            .iterative_evolution(&artifact.id, &agents(&["a", "b"]), 4)
            .await
            .unwrap();

        assert!(report.stabilized);
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.rounds[0].outcomes.len(), 1);
        assert_eq!(report.rounds[0].outcomes[0].phase, EvolutionPhase::Aborted);
        assert_eq!(report.final_version, 1);
    }

    #[tokio::test]
    async fn test_empty_proposal_rejected() {
        let fx = fixture(
            Arc::new(StaticBallotPolicy::approving()),
            Arc::new(QueuedProposalPolicy::new()),
        );
        let artifact = fx
            .orchestrator
            .create_artifact(initial_state(), ArtifactMetadata::default())
            .await
            .unwrap();

        let err = fx
            .orchestrator
            .propose_and_evolve(&artifact.id, ChangeSet::new(), &agents(&["a"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Domain(DomainError::Validation(_))
        ));
    }
}
