//! Weighted ballots and voting sessions

pub mod ballot;
pub mod session;

pub use ballot::{Ballot, Decision};
pub use session::{
    BallotRecord, DEFAULT_THRESHOLD, LiveTally, SessionResult, SessionStatus, VotingSession,
};
