//! Feature extraction for learned tier models.

use super::FeatureContext;

/// Number of model input features.
pub const FEATURE_COUNT: usize = 5;

/// Raw features describing one graded response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// Response latency in milliseconds.
    pub response_time_ms: f64,
    /// 1.0 when correct, 0.0 otherwise.
    pub is_correct: f64,
    /// Question difficulty in [0, 1]; 0.5 when unknown.
    pub question_difficulty: f64,
    /// Attempts on this question; 1 when unknown.
    pub attempt_count: f64,
    /// Student's running mean latency; 5000 when unknown.
    pub avg_response_time_ms: f64,
}

impl FeatureVector {
    /// Build from the response plus optional context keys
    /// `question_difficulty`, `attempt_count`, `avg_response_time`.
    #[must_use]
    pub fn from_response(latency_ms: u64, is_correct: bool, context: Option<&FeatureContext>) -> Self {
        let get = |key: &str, default: f64| {
            context
                .and_then(|c| c.get(key).copied())
                .filter(|v| v.is_finite())
                .unwrap_or(default)
        };
        Self {
            response_time_ms: latency_ms as f64,
            is_correct: if is_correct { 1.0 } else { 0.0 },
            question_difficulty: get("question_difficulty", 0.5),
            attempt_count: get("attempt_count", 1.0),
            avg_response_time_ms: get("avg_response_time", 5000.0),
        }
    }

    /// Min-max normalize every feature into [0, 1].
    #[must_use]
    pub fn normalized(&self) -> [f64; FEATURE_COUNT] {
        fn scale(value: f64, min: f64, max: f64) -> f64 {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        }
        [
            scale(self.response_time_ms, 0.0, 10_000.0),
            scale(self.is_correct, 0.0, 1.0),
            scale(self.question_difficulty, 0.0, 1.0),
            scale(self.attempt_count, 0.0, 10.0),
            scale(self.avg_response_time_ms, 0.0, 10_000.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_context() {
        let f = FeatureVector::from_response(2500, true, None);
        assert_eq!(f.question_difficulty, 0.5);
        assert_eq!(f.attempt_count, 1.0);
        assert_eq!(f.avg_response_time_ms, 5000.0);
        assert_eq!(f.normalized(), [0.25, 1.0, 0.5, 0.1, 0.5]);
    }

    #[test]
    fn context_overrides_defaults() {
        let ctx: FeatureContext = [("attempt_count".to_string(), 3.0)].into_iter().collect();
        let f = FeatureVector::from_response(0, false, Some(&ctx));
        assert_eq!(f.attempt_count, 3.0);
        assert_eq!(f.is_correct, 0.0);
    }

    #[test]
    fn normalization_clamps() {
        let ctx: FeatureContext = [
            ("attempt_count".to_string(), 50.0),
            ("question_difficulty".to_string(), f64::NAN),
        ]
        .into_iter()
        .collect();
        let n = FeatureVector::from_response(60_000, true, Some(&ctx)).normalized();
        assert_eq!(n[0], 1.0);
        assert_eq!(n[2], 0.5);
        assert_eq!(n[3], 1.0);
    }
}
