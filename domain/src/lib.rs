//! Domain layer for coevolve
//!
//! This crate contains the core business logic for collaborative artifact
//! evolution. It has no dependencies on infrastructure or transport concerns.
//!
//! # Core Concepts
//!
//! ## Artifact
//!
//! A shared versioned object under collaborative evolution. Every accepted
//! change appends an immutable [`Iteration`]; versions are gapless and
//! strictly increasing, starting at 1.
//!
//! ## Quorum voting
//!
//! Proposals against an artifact are accepted only after a weighted quorum
//! vote. A [`VotingSession`] collects one [`Ballot`] per participant and
//! tallies them against a configurable approval threshold. Voting power can
//! be adjusted per participant and transferred via [`DelegationMap`].

pub mod artifact;
pub mod core;
pub mod evolution;
pub mod power;
pub mod voting;

// Re-export commonly used types
pub use artifact::{
    changeset::{Change, ChangeSet},
    entities::{Artifact, ArtifactMetadata, Iteration, PropertyDiff, StateMap},
};
pub use core::{
    error::DomainError,
    ids::{ArtifactId, ParticipantId, SessionId},
};
pub use evolution::{
    ConsensusStrength, EventKind, EvolutionEvent, EvolutionPhase, MultiRoundOutcome,
    MultiRoundSession, RoundResult,
};
pub use power::{DelegationMap, UniformWeight, VotingPowerAllocator, WeightClassifier};
pub use voting::{
    ballot::{Ballot, Decision},
    session::{BallotRecord, LiveTally, SessionResult, SessionStatus, VotingSession},
};
