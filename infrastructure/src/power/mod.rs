//! Voting-power classifiers
//!
//! [`KeywordWeightClassifier`] assigns weight by substring match against
//! the participant id, so persona-named agents ("agent-minimalist") carry
//! the bias configured for their style.

use coevolve_domain::{ParticipantId, WeightClassifier, power::DEFAULT_WEIGHT};

/// Weight by keyword found in the participant id (case-insensitive).
/// First matching rule wins; no match falls back to the default weight.
pub struct KeywordWeightClassifier {
    rules: Vec<(String, f64)>,
    default_weight: f64,
}

impl KeywordWeightClassifier {
    pub fn new(rules: Vec<(String, f64)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(keyword, weight)| (keyword.to_lowercase(), weight.max(0.0)))
                .collect(),
            default_weight: DEFAULT_WEIGHT,
        }
    }

    pub fn with_default_weight(mut self, weight: f64) -> Self {
        self.default_weight = weight.max(0.0);
        self
    }
}

impl Default for KeywordWeightClassifier {
    /// Persona biases: minimalists slightly above baseline, futurists
    /// strongest, fusion styles neutral
    fn default() -> Self {
        Self::new(vec![
            ("minimalist".to_string(), 1.1),
            ("futuristic".to_string(), 1.2),
            ("fusion".to_string(), 1.0),
        ])
    }
}

impl WeightClassifier for KeywordWeightClassifier {
    fn weight_for(&self, participant: &ParticipantId) -> f64 {
        let id = participant.as_str().to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| id.contains(keyword))
            .map(|(_, weight)| *weight)
            .unwrap_or(self.default_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let classifier = KeywordWeightClassifier::default();
        assert_eq!(classifier.weight_for(&"agent-Minimalist".into()), 1.1);
        assert_eq!(classifier.weight_for(&"FUTURISTIC-03".into()), 1.2);
        assert_eq!(classifier.weight_for(&"fusion-stylist".into()), 1.0);
    }

    #[test]
    fn test_unmatched_participant_gets_default() {
        let classifier = KeywordWeightClassifier::default();
        assert_eq!(classifier.weight_for(&"agent-classic".into()), 1.0);

        let strict = KeywordWeightClassifier::new(vec![]).with_default_weight(0.5);
        assert_eq!(strict.weight_for(&"anyone".into()), 0.5);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let classifier = KeywordWeightClassifier::new(vec![
            ("agent".to_string(), 2.0),
            ("minimalist".to_string(), 1.1),
        ]);
        assert_eq!(classifier.weight_for(&"agent-minimalist".into()), 2.0);
    }

    #[test]
    fn test_negative_weights_clamped() {
        let classifier = KeywordWeightClassifier::new(vec![("bad".to_string(), -1.0)]);
        assert_eq!(classifier.weight_for(&"bad-actor".into()), 0.0);
    }
}
