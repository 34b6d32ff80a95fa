//! Use cases composing sessions, voting power, and the artifact store

pub mod consensus;
pub mod evolution;

pub use consensus::{ConsensusOrchestrator, DelegatedOutcome};
pub use evolution::{
    EvolutionOrchestrator, EvolutionOutcome, EvolutionReport, EvolutionRound, ProposalEntry,
};
