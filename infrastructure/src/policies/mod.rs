//! Policy adapters: simulated and scripted evaluators

mod scripted;
mod simulated;

pub use scripted::{ScriptedBallotPolicy, ScriptedProposalPolicy};
pub use simulated::{SimulatedBallotPolicy, SimulatedProposalPolicy};
