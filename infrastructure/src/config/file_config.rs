//! Engine configuration from TOML (`coevolve.toml`)
//!
//! Example configuration:
//!
//! ```toml
//! [engine]
//! threshold = 0.66
//! session_ttl_secs = 3600
//! early_exit_ratio = 0.8
//! max_rounds = 3
//!
//! [weights]
//! default = 1.0
//!
//! [weights.keywords]
//! minimalist = 1.1
//! futuristic = 1.2
//! ```

use crate::policies::SimulatedBallotPolicy;
use crate::power::KeywordWeightClassifier;
use coevolve_application::sessions::SessionConfig;
use coevolve_domain::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub engine: EngineSection,
    pub weights: WeightsSection,
    pub simulation: SimulationSection,
}

impl FileConfig {
    /// Reject values outside their meaningful ranges
    pub fn validate(&self) -> Result<(), DomainError> {
        if !(0.0..=1.0).contains(&self.engine.threshold) {
            return Err(DomainError::validation(format!(
                "engine.threshold {} outside [0, 1]",
                self.engine.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.engine.early_exit_ratio) {
            return Err(DomainError::validation(format!(
                "engine.early_exit_ratio {} outside [0, 1]",
                self.engine.early_exit_ratio
            )));
        }
        if self.engine.max_rounds == 0 {
            return Err(DomainError::validation("engine.max_rounds must be at least 1"));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            default_threshold: self.engine.threshold,
            ttl: Duration::from_secs(self.engine.session_ttl_secs),
            retained_history: self.engine.retained_history,
        }
    }

    pub fn classifier(&self) -> KeywordWeightClassifier {
        KeywordWeightClassifier::new(
            self.weights
                .keywords
                .iter()
                .map(|(keyword, weight)| (keyword.clone(), *weight))
                .collect(),
        )
        .with_default_weight(self.weights.default)
    }

    pub fn ballot_policy(&self) -> SimulatedBallotPolicy {
        SimulatedBallotPolicy::new(self.simulation.approve_rate, self.simulation.reject_rate)
    }
}

/// `[engine]` section: session and protocol tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Approval threshold, inclusive boundary
    pub threshold: f64,
    /// Session lifetime before force-conclusion
    pub session_ttl_secs: u64,
    /// Concluded sessions kept in memory
    pub retained_history: usize,
    /// Approve-per-participant fraction above which multi-round consensus
    /// stops early
    pub early_exit_ratio: f64,
    /// Default round cap for multi-round and iterative protocols
    pub max_rounds: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            threshold: coevolve_domain::voting::DEFAULT_THRESHOLD,
            session_ttl_secs: 3600,
            retained_history: 256,
            early_exit_ratio: 0.8,
            max_rounds: 3,
        }
    }
}

/// `[weights]` section: keyword-based voting power
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsSection {
    /// Weight for participants matching no keyword
    pub default: f64,
    /// Keyword (substring of the participant id) to weight
    pub keywords: BTreeMap<String, f64>,
}

impl Default for WeightsSection {
    fn default() -> Self {
        Self {
            default: 1.0,
            keywords: BTreeMap::from([
                ("minimalist".to_string(), 1.1),
                ("futuristic".to_string(), 1.2),
                ("fusion".to_string(), 1.0),
            ]),
        }
    }
}

/// `[simulation]` section: randomized evaluator biases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub approve_rate: f64,
    pub reject_rate: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            approve_rate: 0.6,
            reject_rate: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coevolve_domain::WeightClassifier;

    #[test]
    fn test_defaults() {
        let config = FileConfig::default();
        assert_eq!(config.engine.threshold, 0.66);
        assert_eq!(config.engine.session_ttl_secs, 3600);
        assert_eq!(config.engine.early_exit_ratio, 0.8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_conversion() {
        let mut config = FileConfig::default();
        config.engine.session_ttl_secs = 60;
        let session = config.session_config();
        assert_eq!(session.ttl, Duration::from_secs(60));
        assert_eq!(session.default_threshold, 0.66);
    }

    #[test]
    fn test_classifier_reflects_keywords() {
        let config = FileConfig::default();
        let classifier = config.classifier();
        assert_eq!(classifier.weight_for(&"agent-futuristic".into()), 1.2);
        assert_eq!(classifier.weight_for(&"agent-other".into()), 1.0);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut config = FileConfig::default();
        config.engine.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = FileConfig::default();
        config.engine.max_rounds = 0;
        assert!(config.validate().is_err());
    }
}
