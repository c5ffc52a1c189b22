//! Engagement store: classification + append + "current tier" reads.
//!
//! Every read is recomputed from the log. Nothing derived is cached, so a
//! newly appended event is visible to the very next query.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use lectern_core::engagement::latest_tiers;
use lectern_core::{
    EngagementEvent, EngagementTier, NewEngagementEvent, SessionId, StudentId, TierSummary,
};
use metrics::counter;
use tracing::debug;

use super::repository::EngagementRepository;
use crate::classifier::{EngagementClassifier, FeatureContext};
use crate::errors::RuntimeError;
use crate::metrics::ENGAGEMENT_EVENTS_TOTAL;

/// Engagement log facade used by the monitor, the response path and the dashboard.
pub struct EngagementStore {
    repository: Arc<dyn EngagementRepository>,
    classifier: Arc<dyn EngagementClassifier>,
}

impl EngagementStore {
    /// Create a store over a repository and classifier.
    pub fn new(
        repository: Arc<dyn EngagementRepository>,
        classifier: Arc<dyn EngagementClassifier>,
    ) -> Self {
        Self {
            repository,
            classifier,
        }
    }

    /// Classify without recording.
    pub fn classify(
        &self,
        latency_ms: u64,
        is_correct: bool,
        context: Option<&FeatureContext>,
    ) -> EngagementTier {
        self.classifier.classify(latency_ms, is_correct, context)
    }

    /// Append a new event for `tier`. Earlier events are never touched.
    pub async fn record(
        &self,
        student_id: StudentId,
        session_id: SessionId,
        tier: EngagementTier,
    ) -> Result<EngagementEvent, RuntimeError> {
        let event = self
            .repository
            .append(NewEngagementEvent {
                student_id,
                session_id,
                tier,
                recorded_at: Utc::now(),
            })
            .await?;
        counter!(ENGAGEMENT_EVENTS_TOTAL, "tier" => tier.as_str()).increment(1);
        debug!(%student_id, %session_id, %tier, event_id = event.id, "engagement recorded");
        Ok(event)
    }

    /// Classify a graded response and record the result.
    pub async fn record_response(
        &self,
        student_id: StudentId,
        session_id: SessionId,
        latency_ms: u64,
        is_correct: bool,
        context: Option<&FeatureContext>,
    ) -> Result<EngagementEvent, RuntimeError> {
        let tier = self.classify(latency_ms, is_correct, context);
        self.record(student_id, session_id, tier).await
    }

    /// Tier of the latest event, or `None` if the student has none yet.
    pub async fn current_tier(
        &self,
        student_id: StudentId,
        session_id: SessionId,
    ) -> Result<Option<EngagementTier>, RuntimeError> {
        Ok(self
            .repository
            .query_latest(student_id, session_id)
            .await?
            .map(|e| e.tier))
    }

    /// Latest tier of every student with at least one event in the session.
    pub async fn session_tiers(
        &self,
        session_id: SessionId,
    ) -> Result<BTreeMap<StudentId, EngagementTier>, RuntimeError> {
        let events = self.repository.query_session(session_id).await?;
        Ok(latest_tiers(&events))
    }

    /// Distinct students per tier, using each student's latest tier.
    pub async fn session_summary(&self, session_id: SessionId) -> Result<TierSummary, RuntimeError> {
        let tiers = self.session_tiers(session_id).await?;
        Ok(TierSummary::from_tiers(tiers.into_values()))
    }

    /// Up to `limit` events for the pair, newest first.
    pub async fn history(
        &self,
        student_id: StudentId,
        session_id: SessionId,
        limit: usize,
    ) -> Result<Vec<EngagementEvent>, RuntimeError> {
        let mut events: Vec<_> = self
            .repository
            .query_session(session_id)
            .await?
            .into_iter()
            .filter(|e| e.student_id == student_id)
            .collect();
        events.sort_by(|a, b| (b.recorded_at, b.id).cmp(&(a.recorded_at, a.id)));
        events.truncate(limit);
        Ok(events)
    }
}
