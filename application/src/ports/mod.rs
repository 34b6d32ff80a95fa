//! Ports: interfaces the engine consumes from the outside world
//!
//! Adapters live in the infrastructure layer (or in test doubles). The core
//! never retries a failing port; transient failures are the caller's
//! responsibility.

pub mod durable_store;
pub mod event_sink;
pub mod policies;

pub use durable_store::{DurableStore, StoreError};
pub use event_sink::{EventSink, NullEventSink};
pub use policies::{BallotPolicy, PolicyError, ProposalPolicy};
