//! Voting-session lifecycle
//!
//! The [`SessionManager`] owns every live [`VotingSession`]. Session state
//! is persisted to the durable store with a bounded TTL on every mutation;
//! the in-memory map is a cache rehydrated from the store on lookup miss,
//! so the store remains the authority across process restarts.
//!
//! Each live session sits behind its own mutex, the same discipline the
//! artifact store uses for commits. Submission and conclusion for one
//! session serialize on that mutex, so the conclude-on-last-ballot check
//! is atomic and two racing final ballots cannot both conclude it, while
//! a slow durable-store round-trip only stalls the session it belongs to.

use crate::error::EngineError;
use crate::ports::durable_store::DurableStore;
use chrono::{DateTime, Utc};
use coevolve_domain::{
    ArtifactId, Ballot, DomainError, LiveTally, ParticipantId, SessionId, SessionResult,
    SessionStatus, VotingSession,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Tuning for session lifetime and retention
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Approval threshold used when the caller does not override it
    pub default_threshold: f64,
    /// Bounded session lifetime; an expired session is force-concluded on
    /// access with its uncast ballots excluded from the tally
    pub ttl: Duration,
    /// How many concluded sessions to retain in memory. Older ones fall
    /// out of the history ring; the durable store keeps them until TTL.
    pub retained_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_threshold: coevolve_domain::voting::DEFAULT_THRESHOLD,
            ttl: Duration::from_secs(3600),
            retained_history: 256,
        }
    }
}

/// Acknowledgement of a recorded ballot
#[derive(Debug, Clone, PartialEq)]
pub enum BallotAck {
    /// Ballot recorded; the session stays open
    Recorded { received: usize, required: usize },
    /// This was the last outstanding ballot; the session concluded
    Concluded(SessionResult),
}

/// Live or historical session view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: SessionId,
    pub artifact_id: ArtifactId,
    pub status: SessionStatus,
    pub tally: LiveTally,
    pub result: Option<SessionResult>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl SessionReport {
    fn of(session: &VotingSession) -> Self {
        Self {
            id: session.id.clone(),
            artifact_id: session.artifact_id.clone(),
            status: session.status,
            tally: session.tally(),
            result: session.result.clone(),
            created_at: session.created_at,
            closed_at: session.closed_at,
        }
    }
}

/// Manages voting sessions: ballot collection, tallying, pass/fail
pub struct SessionManager {
    store: Arc<dyn DurableStore>,
    config: SessionConfig,
    active: RwLock<HashMap<SessionId, Arc<Mutex<VotingSession>>>>,
    history: Mutex<VecDeque<VotingSession>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn DurableStore>, config: SessionConfig) -> Self {
        Self {
            store,
            config,
            active: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a session with default weights over the given participants
    pub async fn open(
        &self,
        artifact_id: ArtifactId,
        proposal: Value,
        participants: Vec<ParticipantId>,
        threshold: Option<f64>,
    ) -> Result<VotingSession, EngineError> {
        let session = VotingSession::open(
            artifact_id,
            proposal,
            participants,
            threshold.unwrap_or(self.config.default_threshold),
        )?;
        self.open_prepared(session).await
    }

    /// Register a session built by the caller (delegated consensus opens
    /// sessions with overridden weights and a restricted voter set)
    pub async fn open_prepared(
        &self,
        session: VotingSession,
    ) -> Result<VotingSession, EngineError> {
        self.persist(&session).await?;
        info!(
            session = %session.id,
            artifact = %session.artifact_id,
            participants = session.participants().len(),
            threshold = session.threshold,
            "opened voting session"
        );
        self.active
            .write()
            .await
            .insert(session.id.clone(), Arc::new(Mutex::new(session.clone())));
        Ok(session)
    }

    /// Record a participant's ballot, concluding the session atomically
    /// when it was the last one outstanding
    pub async fn submit_ballot(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
        ballot: Ballot,
    ) -> Result<BallotAck, EngineError> {
        let handle = self.session_handle(session_id).await?;
        let mut session = handle.lock().await;
        self.guard_live(&mut session, session_id).await?;

        let complete = session.submit(participant, ballot)?;
        debug!(
            session = %session_id,
            participant = %participant,
            received = session.ballots_cast(),
            required = session.voters().len(),
            "ballot recorded"
        );

        if complete {
            let result = self.conclude_in_place(&mut session).await?;
            drop(session);
            self.evict(session_id).await;
            return Ok(BallotAck::Concluded(result));
        }

        let received = session.ballots_cast();
        let required = session.voters().len();
        // Persist before releasing the session lock so the store never
        // observes this session's ballots out of submission order
        self.persist(&session).await?;
        Ok(BallotAck::Recorded { received, required })
    }

    /// Conclude a session explicitly (used when some voters never cast)
    pub async fn conclude(&self, session_id: &SessionId) -> Result<SessionResult, EngineError> {
        let handle = self.session_handle(session_id).await?;
        let mut session = handle.lock().await;
        if !session.is_active() {
            return Err(
                DomainError::invalid_state(format!("session {session_id} is not active")).into(),
            );
        }
        let result = self.conclude_in_place(&mut session).await?;
        drop(session);
        self.evict(session_id).await;
        Ok(result)
    }

    /// Live or historical tally for a session
    pub async fn status(&self, session_id: &SessionId) -> Result<SessionReport, EngineError> {
        match self.session_handle(session_id).await {
            Ok(handle) => {
                let mut session = handle.lock().await;
                if session.is_active() && session.is_expired(self.config.ttl, Utc::now()) {
                    warn!(session = %session_id, "session ttl elapsed, force concluding");
                    self.conclude_in_place(&mut session).await?;
                    let report = SessionReport::of(&session);
                    drop(session);
                    self.evict(session_id).await;
                    return Ok(report);
                }
                return Ok(SessionReport::of(&session));
            }
            // A concluded or missing cache entry; fall through to history
            // and then to the durable store
            Err(EngineError::Domain(DomainError::NotFound(_)))
            | Err(EngineError::Domain(DomainError::InvalidState(_))) => {}
            Err(e) => return Err(e),
        }

        if let Some(session) = self.from_history(session_id).await {
            return Ok(SessionReport::of(&session));
        }

        // Last resort: another process may have concluded it
        if let Some(bytes) = self.store.get(session_id.as_str()).await? {
            let session: VotingSession = serde_json::from_slice(&bytes)?;
            return Ok(SessionReport::of(&session));
        }

        Err(DomainError::NotFound(format!("session {session_id}")).into())
    }

    /// Concluded-session lookup for callers that need the full result
    pub async fn result(&self, session_id: &SessionId) -> Result<SessionResult, EngineError> {
        let report = self.status(session_id).await?;
        report
            .result
            .ok_or_else(|| DomainError::invalid_state(format!("session {session_id} still active")).into())
    }

    /// Look up a session's handle, rehydrating it from the durable store
    /// on cache miss. Only sessions still open at rehydration enter the
    /// cache; a concluded one goes straight to history.
    async fn session_handle(
        &self,
        session_id: &SessionId,
    ) -> Result<Arc<Mutex<VotingSession>>, EngineError> {
        if let Some(handle) = self.active.read().await.get(session_id) {
            return Ok(Arc::clone(handle));
        }

        let Some(bytes) = self.store.get(session_id.as_str()).await? else {
            return Err(DomainError::NotFound(format!("session {session_id}")).into());
        };
        let session: VotingSession = serde_json::from_slice(&bytes)?;
        if !session.is_active() {
            self.remember(session).await;
            return Err(
                DomainError::invalid_state(format!("session {session_id} is not active")).into(),
            );
        }
        debug!(session = %session_id, "rehydrated session from durable store");

        let mut active = self.active.write().await;
        // Another caller may have rehydrated it while we read the store
        let handle = active
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(session)));
        Ok(Arc::clone(handle))
    }

    /// Reject a stale handle and force-conclude a session whose TTL has
    /// passed. Callers hold the session lock; the cache entry is removed
    /// after it drops.
    async fn guard_live(
        &self,
        session: &mut MutexGuard<'_, VotingSession>,
        session_id: &SessionId,
    ) -> Result<(), EngineError> {
        if !session.is_active() {
            return Err(
                DomainError::invalid_state(format!("session {session_id} is not active")).into(),
            );
        }
        if session.is_expired(self.config.ttl, Utc::now()) {
            warn!(session = %session_id, "session ttl elapsed, force concluding");
            self.conclude_in_place(session).await?;
            self.evict(session_id).await;
            return Err(
                DomainError::invalid_state(format!("session {session_id} expired")).into(),
            );
        }
        Ok(())
    }

    /// Conclude a locked session, record it in bounded history, and
    /// persist the final state
    async fn conclude_in_place(
        &self,
        session: &mut VotingSession,
    ) -> Result<SessionResult, EngineError> {
        let result = session.conclude()?.clone();
        info!(
            session = %session.id,
            passed = result.passed,
            approval_ratio = result.approval_ratio,
            "session concluded"
        );

        self.remember(session.clone()).await;
        self.persist(session).await?;
        Ok(result)
    }

    async fn evict(&self, session_id: &SessionId) {
        self.active.write().await.remove(session_id);
    }

    async fn remember(&self, session: VotingSession) {
        let mut history = self.history.lock().await;
        if history.iter().any(|s| s.id == session.id) {
            return;
        }
        if history.len() >= self.config.retained_history {
            history.pop_front();
        }
        history.push_back(session);
    }

    async fn from_history(&self, session_id: &SessionId) -> Option<VotingSession> {
        self.history
            .lock()
            .await
            .iter()
            .find(|s| s.id == *session_id)
            .cloned()
    }

    async fn persist(&self, session: &VotingSession) -> Result<(), EngineError> {
        let bytes = serde_json::to_vec(session)?;
        self.store
            .set_with_ttl(session.id.as_str(), bytes, self.config.ttl)
            .await?;
        Ok(())
    }
}
