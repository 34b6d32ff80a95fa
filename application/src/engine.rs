//! Engine facade
//!
//! [`ConsensusEngine`] wires the artifact store, session manager, and
//! orchestrators behind one entry point. Callers inject the ports (durable
//! store, policies, weight classifier, event sink) and get the full
//! operation surface back.

use crate::error::EngineError;
use crate::ports::durable_store::DurableStore;
use crate::ports::event_sink::EventSink;
use crate::ports::policies::{BallotPolicy, ProposalPolicy};
use crate::sessions::{BallotAck, SessionConfig, SessionManager, SessionReport};
use crate::store::{ApplyOutcome, ArtifactExport, ArtifactHistory, ArtifactStore, ExportMode};
use crate::use_cases::consensus::{ConsensusOrchestrator, DelegatedOutcome};
use crate::use_cases::evolution::{EvolutionOrchestrator, EvolutionOutcome, EvolutionReport};
use coevolve_domain::{
    Artifact, ArtifactId, ArtifactMetadata, Ballot, ChangeSet, DelegationMap, MultiRoundSession,
    ParticipantId, PropertyDiff, SessionId, SessionResult, StateMap, VotingPowerAllocator,
    VotingSession, WeightClassifier,
};
use serde_json::Value;
use std::sync::Arc;

/// One handle over the whole engine: artifacts, sessions, and the
/// consensus and evolution protocols
pub struct ConsensusEngine {
    artifacts: Arc<ArtifactStore>,
    sessions: Arc<SessionManager>,
    consensus: ConsensusOrchestrator,
    evolution: EvolutionOrchestrator,
}

impl ConsensusEngine {
    pub fn new(
        store: Arc<dyn DurableStore>,
        ballots: Arc<dyn BallotPolicy>,
        proposals: Arc<dyn ProposalPolicy>,
        classifier: Arc<dyn WeightClassifier>,
        events: Arc<dyn EventSink>,
        config: SessionConfig,
    ) -> Self {
        let artifacts = Arc::new(ArtifactStore::new());
        let sessions = Arc::new(SessionManager::new(store, config));
        let allocator = VotingPowerAllocator::new(classifier);

        let consensus = ConsensusOrchestrator::new(
            Arc::clone(&sessions),
            allocator,
            Arc::clone(&ballots),
            Arc::clone(&events),
        );
        let evolution = EvolutionOrchestrator::new(
            Arc::clone(&artifacts),
            Arc::clone(&sessions),
            ballots,
            proposals,
            events,
        );

        Self {
            artifacts,
            sessions,
            consensus,
            evolution,
        }
    }

    pub async fn create_artifact(
        &self,
        initial_state: StateMap,
        metadata: ArtifactMetadata,
    ) -> Result<Artifact, EngineError> {
        self.evolution.create_artifact(initial_state, metadata).await
    }

    /// Direct modification, no vote
    pub async fn apply_modification(
        &self,
        artifact_id: &ArtifactId,
        actor: &ParticipantId,
        changeset: ChangeSet,
    ) -> Result<ApplyOutcome, EngineError> {
        self.evolution
            .apply_modification(artifact_id, actor, changeset)
            .await
    }

    /// Single propose/vote/apply attempt
    pub async fn propose_and_evolve(
        &self,
        artifact_id: &ArtifactId,
        changeset: ChangeSet,
        participants: &[ParticipantId],
    ) -> Result<EvolutionOutcome, EngineError> {
        self.evolution
            .propose_and_evolve(artifact_id, changeset, participants)
            .await
    }

    /// Repeated propose/vote/apply rounds until stabilization
    pub async fn iterative_evolution(
        &self,
        artifact_id: &ArtifactId,
        participants: &[ParticipantId],
        max_rounds: usize,
    ) -> Result<EvolutionReport, EngineError> {
        self.evolution
            .iterative_evolution(artifact_id, participants, max_rounds)
            .await
    }

    /// Multi-round consensus with early exit
    pub async fn run_multi_round(
        &self,
        artifact_id: ArtifactId,
        proposal: Value,
        participants: Vec<ParticipantId>,
        max_rounds: usize,
        early_exit_ratio: f64,
    ) -> Result<MultiRoundSession, EngineError> {
        self.consensus
            .run_multi_round(artifact_id, proposal, participants, max_rounds, early_exit_ratio)
            .await
    }

    /// Delegated consensus over a delegation map
    pub async fn run_delegated(
        &self,
        artifact_id: ArtifactId,
        proposal: Value,
        delegations: &DelegationMap,
    ) -> Result<DelegatedOutcome, EngineError> {
        self.consensus
            .run_delegated(artifact_id, proposal, delegations)
            .await
    }

    pub async fn state(&self, artifact_id: &ArtifactId) -> Result<StateMap, EngineError> {
        self.artifacts.current_state(artifact_id).await
    }

    pub async fn history(&self, artifact_id: &ArtifactId) -> Result<ArtifactHistory, EngineError> {
        self.artifacts.history(artifact_id).await
    }

    pub async fn diff(
        &self,
        artifact_id: &ArtifactId,
        v1: u64,
        v2: u64,
    ) -> Result<Vec<PropertyDiff>, EngineError> {
        self.artifacts.diff(artifact_id, v1, v2).await
    }

    pub async fn export(
        &self,
        artifact_id: &ArtifactId,
        mode: ExportMode,
    ) -> Result<ArtifactExport, EngineError> {
        self.artifacts.export(artifact_id, mode).await
    }

    pub async fn session_status(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionReport, EngineError> {
        self.sessions.status(session_id).await
    }

    /// Open a bare voting session for externally driven ballots
    pub async fn open_session(
        &self,
        artifact_id: ArtifactId,
        proposal: Value,
        participants: Vec<ParticipantId>,
        threshold: Option<f64>,
    ) -> Result<VotingSession, EngineError> {
        self.sessions
            .open(artifact_id, proposal, participants, threshold)
            .await
    }

    /// Record one participant's ballot on an open session
    pub async fn submit_ballot(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
        ballot: Ballot,
    ) -> Result<BallotAck, EngineError> {
        self.sessions.submit_ballot(session_id, participant, ballot).await
    }

    /// Conclude a session even if some voters never cast
    pub async fn conclude_session(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionResult, EngineError> {
        self.sessions.conclude(session_id).await
    }
}
