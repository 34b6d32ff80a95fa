//! Application layer for coevolve
//!
//! This crate contains the artifact store, session lifecycle, consensus
//! and evolution orchestrators, and the port definitions the
//! infrastructure layer implements. It depends only on the domain layer.

pub mod engine;
pub mod error;
pub mod ports;
pub mod sessions;
pub mod store;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use engine::ConsensusEngine;
pub use error::EngineError;
pub use ports::{
    durable_store::{DurableStore, StoreError},
    event_sink::{EventSink, NullEventSink, events},
    policies::{BallotPolicy, PolicyError, ProposalPolicy},
};
pub use sessions::{BallotAck, SessionConfig, SessionManager, SessionReport};
pub use store::{ApplyOutcome, ArtifactExport, ArtifactHistory, ArtifactStore, ExportMode};
pub use use_cases::consensus::{ConsensusOrchestrator, DelegatedOutcome};
pub use use_cases::evolution::{
    EvolutionOrchestrator, EvolutionOutcome, EvolutionReport, EvolutionRound, ProposalEntry,
};
