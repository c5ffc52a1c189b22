//! Learned-model classifier with a rules fallback.
//!
//! The model slot starts empty and is filled asynchronously (see
//! [`ModelClassifier::spawn_load`]). Until then, and whenever a prediction
//! fails, classification answers from [`RulesClassifier`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lectern_core::{CollaboratorError, EngagementTier};
use metrics::counter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::features::{FEATURE_COUNT, FeatureVector};
use super::rules::RulesClassifier;
use super::{EngagementClassifier, FeatureContext};
use crate::metrics::CLASSIFIER_FALLBACKS_TOTAL;

/// A learned tier predictor.
pub trait TierModel: Send + Sync {
    /// Predict a tier from a feature vector.
    fn predict(&self, features: &FeatureVector) -> Result<EngagementTier, CollaboratorError>;
}

/// Linear scorer: one weight row and bias per tier, argmax wins.
///
/// Rows are ordered ACTIVE, MODERATE, PASSIVE and applied to
/// [`FeatureVector::normalized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearTierModel {
    /// Per-tier weights over the normalized features.
    pub weights: [[f64; FEATURE_COUNT]; 3],
    /// Per-tier bias.
    pub bias: [f64; 3],
}

impl LinearTierModel {
    /// Load a model from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CollaboratorError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| CollaboratorError::Model(format!("{}: {e}", path.display())))
    }
}

impl TierModel for LinearTierModel {
    fn predict(&self, features: &FeatureVector) -> Result<EngagementTier, CollaboratorError> {
        let x = features.normalized();
        let mut best: Option<(EngagementTier, f64)> = None;
        for (tier, (row, bias)) in EngagementTier::ALL
            .into_iter()
            .zip(self.weights.iter().zip(self.bias))
        {
            let score = row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + bias;
            if !score.is_finite() {
                return Err(CollaboratorError::Model(format!(
                    "non-finite score for {tier}"
                )));
            }
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((tier, score));
            }
        }
        best.map(|(tier, _)| tier)
            .ok_or_else(|| CollaboratorError::Model("empty model".into()))
    }
}

/// Classifier that prefers a learned model and falls back to rules.
pub struct ModelClassifier {
    rules: RulesClassifier,
    model: RwLock<Option<Arc<dyn TierModel>>>,
}

impl ModelClassifier {
    /// Classifier with no model installed yet.
    pub fn new(rules: RulesClassifier) -> Self {
        Self {
            rules,
            model: RwLock::new(None),
        }
    }

    /// Install (or replace) the model.
    pub fn install_model(&self, model: Arc<dyn TierModel>) {
        *self.model.write() = Some(model);
    }

    /// Remove the model; returns whether one was installed.
    pub fn clear_model(&self) -> bool {
        self.model.write().take().is_some()
    }

    /// Whether a model is installed.
    pub fn has_model(&self) -> bool {
        self.model.read().is_some()
    }

    /// Load a [`LinearTierModel`] on the blocking pool and install it when ready.
    ///
    /// Classification keeps using rules until the load completes; a failed
    /// load is logged and leaves the rules path in place.
    pub fn spawn_load(self: &Arc<Self>, path: PathBuf) -> JoinHandle<()> {
        let classifier = Arc::clone(self);
        tokio::task::spawn_blocking(move || match LinearTierModel::load(&path) {
            Ok(model) => {
                classifier.install_model(Arc::new(model));
                info!(path = %path.display(), "engagement model installed");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "engagement model unavailable, using rules");
            }
        })
    }
}

impl EngagementClassifier for ModelClassifier {
    fn classify(
        &self,
        latency_ms: u64,
        is_correct: bool,
        context: Option<&FeatureContext>,
    ) -> EngagementTier {
        let model = self.model.read().clone();
        let Some(model) = model else {
            return self.rules.tier_for(latency_ms, is_correct);
        };
        let features = FeatureVector::from_response(latency_ms, is_correct, context);
        match model.predict(&features) {
            Ok(tier) => tier,
            Err(e) => {
                counter!(CLASSIFIER_FALLBACKS_TOTAL).increment(1);
                warn!(error = %e, "model prediction failed, falling back to rules");
                self.rules.tier_for(latency_ms, is_correct)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingModel;

    impl TierModel for FailingModel {
        fn predict(&self, _: &FeatureVector) -> Result<EngagementTier, CollaboratorError> {
            Err(CollaboratorError::Model("boom".into()))
        }
    }

    struct ConstantModel(EngagementTier);

    impl TierModel for ConstantModel {
        fn predict(&self, _: &FeatureVector) -> Result<EngagementTier, CollaboratorError> {
            Ok(self.0)
        }
    }

    /// Scores PASSIVE purely on latency and ACTIVE on correctness.
    fn latency_model() -> LinearTierModel {
        LinearTierModel {
            weights: [
                [0.0, 1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0, 0.0],
                [2.0, 0.0, 0.0, 0.0, 0.0],
            ],
            bias: [0.0, 0.5, 0.0],
        }
    }

    #[test]
    fn no_model_uses_rules() {
        let c = ModelClassifier::new(RulesClassifier::default());
        assert!(!c.has_model());
        assert_eq!(c.classify(1000, true, None), EngagementTier::Active);
    }

    #[test]
    fn installed_model_wins() {
        let c = ModelClassifier::new(RulesClassifier::default());
        c.install_model(Arc::new(ConstantModel(EngagementTier::Moderate)));
        assert_eq!(c.classify(1000, true, None), EngagementTier::Moderate);
        assert!(c.clear_model());
        assert_eq!(c.classify(1000, true, None), EngagementTier::Active);
    }

    #[test]
    fn failing_model_falls_back() {
        let c = ModelClassifier::new(RulesClassifier::default());
        c.install_model(Arc::new(FailingModel));
        assert_eq!(c.classify(9000, true, None), EngagementTier::Passive);
    }

    #[test]
    fn linear_model_argmax() {
        let m = latency_model();
        // fast + correct: active 1.0, moderate 0.5, passive 0.2
        let fast = FeatureVector::from_response(1000, true, None);
        assert_eq!(m.predict(&fast).unwrap(), EngagementTier::Active);
        // slow + correct: active 1.0, passive 1.8
        let slow = FeatureVector::from_response(9000, true, None);
        assert_eq!(m.predict(&slow).unwrap(), EngagementTier::Passive);
        // mid + incorrect: active 0.0, moderate 0.5, passive 0.2
        let mid = FeatureVector::from_response(1000, false, None);
        assert_eq!(m.predict(&mid).unwrap(), EngagementTier::Moderate);
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"weights": []}"#).unwrap();
        assert!(matches!(
            LinearTierModel::load(&path),
            Err(CollaboratorError::Model(_))
        ));
        assert!(matches!(
            LinearTierModel::load(&dir.path().join("absent.json")),
            Err(CollaboratorError::Io(_))
        ));
    }

    #[tokio::test]
    async fn spawn_load_installs_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(&latency_model()).unwrap()).unwrap();

        let c = Arc::new(ModelClassifier::new(RulesClassifier::default()));
        c.spawn_load(path).await.unwrap();
        assert!(c.has_model());
    }
}
