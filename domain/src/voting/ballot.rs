//! Ballot types
//!
//! A [`Ballot`] is one participant's weighted vote on a proposal. The weight
//! carried by a ballot is stamped by the session at submission time from its
//! voting-power map; the constructors default it to 1.0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A participant's decision on a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
    Abstain,
}

impl Decision {
    pub fn is_approve(&self) -> bool {
        matches!(self, Decision::Approve)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, Decision::Reject)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Approve => write!(f, "approve"),
            Decision::Reject => write!(f, "reject"),
            Decision::Abstain => write!(f, "abstain"),
        }
    }
}

/// A single weighted vote
///
/// # Example
///
/// ```
/// use coevolve_domain::voting::Ballot;
///
/// let ballot = Ballot::approve()
///     .with_reasoning("clean silhouette, keeps the feature set tight")
///     .with_confidence(0.85);
/// assert!(ballot.decision.is_approve());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub decision: Decision,
    /// Voting weight, >= 0. Stamped by the session on submission.
    pub weight: f64,
    /// Free-form justification from the evaluator
    pub reasoning: Option<String>,
    /// Evaluator confidence (0.0 to 1.0, if available)
    pub confidence: Option<f64>,
    pub cast_at: DateTime<Utc>,
}

impl Ballot {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            weight: 1.0,
            reasoning: None,
            confidence: None,
            cast_at: Utc::now(),
        }
    }

    pub fn approve() -> Self {
        Self::new(Decision::Approve)
    }

    pub fn reject() -> Self {
        Self::new(Decision::Reject)
    }

    pub fn abstain() -> Self {
        Self::new(Decision::Abstain)
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Add confidence, clamped to [0, 1]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub(crate) fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(Ballot::approve().decision.is_approve());
        assert!(Ballot::reject().decision.is_reject());
        assert_eq!(Ballot::abstain().decision, Decision::Abstain);
        assert_eq!(Ballot::approve().weight, 1.0);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Ballot::approve().with_confidence(1.5).confidence, Some(1.0));
        assert_eq!(
            Ballot::approve().with_confidence(-0.2).confidence,
            Some(0.0)
        );
    }

    #[test]
    fn test_weight_never_negative() {
        assert_eq!(Ballot::approve().with_weight(-2.0).weight, 0.0);
    }

    #[test]
    fn test_decision_serde_is_lowercase() {
        let json = serde_json::to_string(&Decision::Approve).unwrap();
        assert_eq!(json, "\"approve\"");
    }
}
