//! Delivery policies: which students are due a question this tick.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lectern_core::EngagementTier;
use lectern_settings::{PolicyKind, PolicySettings};

/// Decides whether a student is due a question push.
///
/// `last_delivered_at` is when a push to this student in this session was
/// last enqueued (`None` if never). Policies that ignore it
/// deliver on every tick.
pub trait DeliveryPolicy: Send + Sync {
    /// Whether to include the student in this tick's delivery set.
    fn should_deliver(
        &self,
        tier: Option<EngagementTier>,
        last_delivered_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool;

    /// Policy name for logs.
    fn name(&self) -> &'static str;
}

/// Absent, PASSIVE and MODERATE every tick; ACTIVE never.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPolicy;

impl DeliveryPolicy for DefaultPolicy {
    fn should_deliver(
        &self,
        tier: Option<EngagementTier>,
        _last_delivered_at: Option<DateTime<Utc>>,
        _now: DateTime<Utc>,
    ) -> bool {
        !matches!(tier, Some(EngagementTier::Active))
    }

    fn name(&self) -> &'static str {
        "default"
    }
}

/// Rate-limited MODERATE and ACTIVE delivery.
///
/// Absent and PASSIVE students are pushed every tick, as under
/// [`DefaultPolicy`].
#[derive(Clone, Copy, Debug)]
pub struct ThrottledPolicy {
    moderate_min_interval: Duration,
    active_min_interval: Duration,
}

impl ThrottledPolicy {
    /// Policy with explicit minimum intervals.
    pub fn new(moderate_min_interval: Duration, active_min_interval: Duration) -> Self {
        Self {
            moderate_min_interval,
            active_min_interval,
        }
    }

    fn due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, min_interval: Duration) -> bool {
        last.is_none_or(|at| now - at >= min_interval)
    }
}

impl DeliveryPolicy for ThrottledPolicy {
    fn should_deliver(
        &self,
        tier: Option<EngagementTier>,
        last_delivered_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        match tier {
            None | Some(EngagementTier::Passive) => true,
            Some(EngagementTier::Moderate) => {
                Self::due(last_delivered_at, now, self.moderate_min_interval)
            }
            Some(EngagementTier::Active) => {
                Self::due(last_delivered_at, now, self.active_min_interval)
            }
        }
    }

    fn name(&self) -> &'static str {
        "throttled"
    }
}

/// Build the configured policy.
pub fn policy_from_settings(settings: &PolicySettings) -> Arc<dyn DeliveryPolicy> {
    match settings.kind {
        PolicyKind::Default => Arc::new(DefaultPolicy),
        PolicyKind::Throttled => Arc::new(ThrottledPolicy::new(
            Duration::seconds(settings.moderate_min_interval_secs as i64),
            Duration::seconds(settings.active_min_interval_secs as i64),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn default_policy_matrix() {
        let p = DefaultPolicy;
        let t = now();
        assert!(p.should_deliver(None, None, t));
        assert!(p.should_deliver(Some(EngagementTier::Passive), Some(t), t));
        assert!(p.should_deliver(Some(EngagementTier::Moderate), Some(t), t));
        assert!(!p.should_deliver(Some(EngagementTier::Active), None, t));
    }

    #[test]
    fn throttled_moderate_waits_for_interval() {
        let p = ThrottledPolicy::new(Duration::seconds(30), Duration::seconds(120));
        let t = now();
        let moderate = Some(EngagementTier::Moderate);
        assert!(p.should_deliver(moderate, None, t));
        assert!(!p.should_deliver(moderate, Some(t - Duration::seconds(10)), t));
        assert!(p.should_deliver(moderate, Some(t - Duration::seconds(30)), t));
    }

    #[test]
    fn throttled_active_uses_longer_interval() {
        let p = ThrottledPolicy::new(Duration::seconds(30), Duration::seconds(120));
        let t = now();
        let active = Some(EngagementTier::Active);
        assert!(!p.should_deliver(active, Some(t - Duration::seconds(60)), t));
        assert!(p.should_deliver(active, Some(t - Duration::seconds(121)), t));
    }

    #[test]
    fn throttled_never_delays_passive_or_absent() {
        let p = ThrottledPolicy::new(Duration::seconds(30), Duration::seconds(120));
        let t = now();
        assert!(p.should_deliver(None, Some(t), t));
        assert!(p.should_deliver(Some(EngagementTier::Passive), Some(t), t));
    }

    #[test]
    fn settings_select_policy() {
        let mut settings = PolicySettings::default();
        assert_eq!(policy_from_settings(&settings).name(), "default");
        settings.kind = PolicyKind::Throttled;
        assert_eq!(policy_from_settings(&settings).name(), "throttled");
    }
}
