//! Engagement classification: (latency, correctness) → tier.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `rules` | Default threshold classifier |
//! | `features` | Feature extraction + normalization for learned models |
//! | `model` | Learned-model classifier with rules fallback |

pub mod features;
pub mod model;
pub mod rules;

use std::collections::HashMap;

use lectern_core::EngagementTier;

pub use features::FeatureVector;
pub use model::{LinearTierModel, ModelClassifier, TierModel};
pub use rules::RulesClassifier;

/// Extra per-response features (difficulty, attempt count, ...).
pub type FeatureContext = HashMap<String, f64>;

/// Total classification function.
///
/// Implementations never fail and never block: anything that can go wrong
/// (a model not yet loaded, a bad prediction) must degrade to a rules answer.
pub trait EngagementClassifier: Send + Sync {
    /// Classify one graded response.
    fn classify(
        &self,
        latency_ms: u64,
        is_correct: bool,
        context: Option<&FeatureContext>,
    ) -> EngagementTier;
}
