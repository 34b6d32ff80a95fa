//! Domain error taxonomy
//!
//! All core operations fail fast with one of these variants and perform no
//! partial mutation. Transient failures of external collaborators (durable
//! store, policies) are not represented here; those belong to the layer that
//! talks to them.

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    /// Unknown artifact, session, version, or participant
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not valid for the current lifecycle state
    /// (e.g. voting on a completed session, re-concluding)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Ballot from a participant outside the session's fixed eligible set,
    /// or from a participant whose voting power is fully delegated away
    #[error("participant '{0}' is not eligible to vote in this session")]
    IneligibleParticipant(String),

    /// Malformed input: empty changeset, threshold outside [0, 1],
    /// self-delegation, delegation cycle
    #[error("validation failed: {0}")]
    Validation(String),

    /// Concurrent version clash: a normalized changeset no longer matches
    /// the live state it targets
    #[error("version conflict: {0}")]
    Conflict(String),

    /// A known artifact is missing an expected iteration. This signals store
    /// corruption and must halt the operation rather than be repaired.
    #[error("store corruption: {0}")]
    Corrupted(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }

    pub fn invalid_state(what: impl Into<String>) -> Self {
        DomainError::InvalidState(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        DomainError::Validation(what.into())
    }

    /// Whether this error signals corruption that callers must not retry
    /// or work around
    pub fn is_fatal(&self) -> bool {
        matches!(self, DomainError::Corrupted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = DomainError::not_found("artifact artifact-123");
        assert_eq!(e.to_string(), "not found: artifact artifact-123");

        let e = DomainError::IneligibleParticipant("agent-x".to_string());
        assert!(e.to_string().contains("agent-x"));
    }

    #[test]
    fn test_only_corruption_is_fatal() {
        assert!(DomainError::Corrupted("missing iteration 3".to_string()).is_fatal());
        assert!(!DomainError::not_found("x").is_fatal());
        assert!(!DomainError::validation("x").is_fatal());
        assert!(!DomainError::Conflict("x".to_string()).is_fatal());
    }
}
