//! Deterministic doubles for the engine's ports, shared across test modules

use crate::ports::durable_store::{DurableStore, StoreError};
use crate::ports::event_sink::EventSink;
use crate::ports::policies::{BallotPolicy, PolicyError, ProposalPolicy};
use async_trait::async_trait;
use coevolve_domain::{Ballot, ChangeSet, Decision, ParticipantId, StateMap};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// In-memory durable store honoring TTLs
#[derive(Default)]
pub struct MemStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((bytes, expires)) if *expires > Instant::now() => Ok(Some(bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires = Instant::now()
            .checked_add(ttl)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, expires));
        Ok(())
    }
}

/// Ballot policy answering from a fixed per-participant decision
pub struct StaticBallotPolicy {
    decisions: HashMap<ParticipantId, Decision>,
    fallback: Decision,
}

impl StaticBallotPolicy {
    pub fn approving() -> Self {
        Self {
            decisions: HashMap::new(),
            fallback: Decision::Approve,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            decisions: HashMap::new(),
            fallback: Decision::Reject,
        }
    }

    pub fn with(mut self, participant: impl Into<ParticipantId>, decision: Decision) -> Self {
        self.decisions.insert(participant.into(), decision);
        self
    }
}

#[async_trait]
impl BallotPolicy for StaticBallotPolicy {
    async fn cast(
        &self,
        participant: &ParticipantId,
        _proposal: &Value,
    ) -> Result<Ballot, PolicyError> {
        let decision = self
            .decisions
            .get(participant)
            .copied()
            .unwrap_or(self.fallback);
        Ok(Ballot::new(decision))
    }
}

/// Ballot policy with a per-round script, shared across participants.
/// Round advances each time every participant has cast once.
pub struct RoundScriptBallotPolicy {
    rounds: Mutex<VecDeque<HashMap<ParticipantId, Decision>>>,
    current: Mutex<Option<HashMap<ParticipantId, Decision>>>,
    served: Mutex<usize>,
    participants: usize,
    fallback: Decision,
}

impl RoundScriptBallotPolicy {
    pub fn new(
        participants: usize,
        rounds: Vec<HashMap<ParticipantId, Decision>>,
        fallback: Decision,
    ) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            current: Mutex::new(None),
            served: Mutex::new(0),
            participants,
            fallback,
        }
    }
}

#[async_trait]
impl BallotPolicy for RoundScriptBallotPolicy {
    async fn cast(
        &self,
        participant: &ParticipantId,
        _proposal: &Value,
    ) -> Result<Ballot, PolicyError> {
        let mut current = self.current.lock().unwrap();
        if current.is_none() {
            *current = self.rounds.lock().unwrap().pop_front();
        }
        let decision = current
            .as_ref()
            .and_then(|round| round.get(participant).copied())
            .unwrap_or(self.fallback);

        let mut served = self.served.lock().unwrap();
        *served += 1;
        if *served >= self.participants {
            *served = 0;
            *current = None;
        }
        Ok(Ballot::new(decision))
    }
}

/// Proposal policy replaying queued changesets per participant; an empty
/// queue yields an empty changeset (the participant has nothing left to
/// suggest)
#[derive(Default)]
pub struct QueuedProposalPolicy {
    queues: Mutex<HashMap<ParticipantId, VecDeque<ChangeSet>>>,
}

impl QueuedProposalPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(self, participant: impl Into<ParticipantId>, changeset: ChangeSet) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(participant.into())
            .or_default()
            .push_back(changeset);
        self
    }
}

#[async_trait]
impl ProposalPolicy for QueuedProposalPolicy {
    async fn propose(
        &self,
        participant: &ParticipantId,
        _current_state: &StateMap,
    ) -> Result<ChangeSet, PolicyError> {
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get_mut(participant)
            .and_then(|q| q.pop_front())
            .unwrap_or_default())
    }
}

/// Event sink capturing emitted events for assertions
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<(String, Value)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, name: &str, payload: Value) {
        self.events
            .lock()
            .unwrap()
            .push((name.to_string(), payload));
    }
}
