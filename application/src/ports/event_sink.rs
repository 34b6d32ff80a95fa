//! Outbound event port
//!
//! The engine notifies the surrounding transport layer of state changes
//! through an injected sink instead of ambient global listeners. Emission is
//! fire-and-forget; a sink must never fail the operation that emitted.

use serde_json::Value;

/// Names of the events the engine emits
pub mod events {
    pub const ARTIFACT_CREATED: &str = "artifact-created";
    pub const ARTIFACT_UPDATED: &str = "artifact-updated";
    pub const CONSENSUS_CONCLUDED: &str = "consensus-concluded";
    pub const EVOLUTION_STABILIZED: &str = "evolution-stabilized";
}

/// Receives engine events for the transport layer
pub trait EventSink: Send + Sync {
    fn emit(&self, name: &str, payload: Value);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _name: &str, _payload: Value) {}
}
