//! Threshold rules classifier.

use lectern_core::EngagementTier;
use lectern_settings::ClassifierSettings;

use super::{EngagementClassifier, FeatureContext};

/// Rules-based classifier.
///
/// - correct and `latency < active_max_latency_ms` → ACTIVE
/// - incorrect or `latency > passive_min_latency_ms` → PASSIVE
/// - otherwise → MODERATE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulesClassifier {
    active_max_latency_ms: u64,
    passive_min_latency_ms: u64,
}

impl RulesClassifier {
    /// Classifier with explicit thresholds.
    #[must_use]
    pub fn new(active_max_latency_ms: u64, passive_min_latency_ms: u64) -> Self {
        Self {
            active_max_latency_ms,
            passive_min_latency_ms,
        }
    }

    /// Classifier from settings.
    #[must_use]
    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        Self::new(settings.active_max_latency_ms, settings.passive_min_latency_ms)
    }

    /// Apply the rules.
    #[must_use]
    pub fn tier_for(&self, latency_ms: u64, is_correct: bool) -> EngagementTier {
        if is_correct && latency_ms < self.active_max_latency_ms {
            EngagementTier::Active
        } else if !is_correct || latency_ms > self.passive_min_latency_ms {
            EngagementTier::Passive
        } else {
            EngagementTier::Moderate
        }
    }
}

impl Default for RulesClassifier {
    fn default() -> Self {
        Self::from_settings(&ClassifierSettings::default())
    }
}

impl EngagementClassifier for RulesClassifier {
    fn classify(
        &self,
        latency_ms: u64,
        is_correct: bool,
        _context: Option<&FeatureContext>,
    ) -> EngagementTier {
        self.tier_for(latency_ms, is_correct)
    }
}
