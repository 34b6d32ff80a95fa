//! Infrastructure layer for coevolve
//!
//! Adapters for the application layer's ports: in-memory durable storage,
//! tracing and broadcast event sinks, simulated and scripted evaluator
//! policies, keyword-based voting power, and configuration loading.

pub mod config;
pub mod events;
pub mod policies;
pub mod power;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig};
pub use events::{BroadcastEventSink, EngineEvent, TracingEventSink};
pub use policies::{
    ScriptedBallotPolicy, ScriptedProposalPolicy, SimulatedBallotPolicy, SimulatedProposalPolicy,
};
pub use power::KeywordWeightClassifier;
pub use store::InMemoryDurableStore;
