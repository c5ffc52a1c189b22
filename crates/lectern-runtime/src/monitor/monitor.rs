//! Adaptive monitor: periodic per-session delivery decisions.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use lectern_core::{SessionId, StudentId};
use lectern_settings::MonitorSettings;
use metrics::{counter, gauge, histogram};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::policy::{DefaultPolicy, DeliveryPolicy, policy_from_settings};
use crate::engagement::EngagementStore;
use crate::errors::RuntimeError;
use crate::metrics::{
    MONITOR_DECISION_DROPS_TOTAL, MONITOR_DECISIONS_TOTAL, MONITOR_SESSION_ERRORS_TOTAL,
    MONITOR_SESSIONS_ACTIVE, MONITOR_TICK_DURATION_SECONDS, MONITOR_TICKS_TOTAL,
};

/// Default tick period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Students of one session due a question, decided by one tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushDecision {
    /// Session the decision belongs to.
    pub session_id: SessionId,
    /// Non-empty delivery set.
    pub student_ids: BTreeSet<StudentId>,
    /// Tick sequence number that produced it.
    pub tick: u64,
    /// Wall-clock time of the decision.
    pub decided_at: DateTime<Utc>,
}

/// Outcome counters for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick sequence number (1-based).
    pub tick: u64,
    /// Sessions in the tick-start snapshot.
    pub evaluated: usize,
    /// Decisions handed to dispatch.
    pub decisions: usize,
    /// Sessions whose evaluation failed.
    pub failed: usize,
    /// Decisions lost to a full or closed dispatch channel.
    pub dropped: usize,
}

struct Runner {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Builder for [`AdaptiveMonitor`].
pub struct AdaptiveMonitorBuilder {
    store: Option<Arc<EngagementStore>>,
    policy: Arc<dyn DeliveryPolicy>,
    decisions: Option<mpsc::Sender<PushDecision>>,
    interval: Duration,
}

impl AdaptiveMonitorBuilder {
    /// Engagement store the monitor reads tiers from. Required.
    #[must_use]
    pub fn store(mut self, store: Arc<EngagementStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Delivery policy. Defaults to [`DefaultPolicy`].
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn DeliveryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Channel decisions are handed to. Required.
    #[must_use]
    pub fn decisions(mut self, tx: mpsc::Sender<PushDecision>) -> Self {
        self.decisions = Some(tx);
        self
    }

    /// Tick period.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Apply tick period and policy from settings.
    #[must_use]
    pub fn settings(self, settings: &MonitorSettings) -> Self {
        self.interval(settings.tick_interval())
            .policy(policy_from_settings(&settings.policy))
    }

    /// Validate wiring and build the monitor.
    pub fn build(self) -> Result<AdaptiveMonitor, RuntimeError> {
        let store = self
            .store
            .ok_or_else(|| RuntimeError::Configuration("monitor has no engagement store".into()))?;
        let decisions = self.decisions.ok_or_else(|| {
            RuntimeError::Configuration("monitor has no dispatch channel".into())
        })?;
        if self.interval.is_zero() {
            return Err(RuntimeError::Configuration(
                "monitor tick interval must be non-zero".into(),
            ));
        }
        Ok(AdaptiveMonitor {
            store,
            policy: self.policy,
            decisions,
            interval: self.interval,
            rosters: RwLock::new(HashMap::new()),
            last_delivered: Mutex::new(HashMap::new()),
            ticks: AtomicU64::new(0),
            runner: Mutex::new(None),
        })
    }
}

/// Periodic scheduler deciding which students are due a question.
///
/// Owns `session_id → roster`. Every tick takes a snapshot of that map,
/// evaluates each session concurrently and hands every non-empty delivery set
/// to the dispatch channel exactly once. Sessions may be added, replaced or
/// removed from any task at any time; changes apply from the next tick.
pub struct AdaptiveMonitor {
    store: Arc<EngagementStore>,
    policy: Arc<dyn DeliveryPolicy>,
    decisions: mpsc::Sender<PushDecision>,
    interval: Duration,
    rosters: RwLock<HashMap<SessionId, Arc<BTreeSet<StudentId>>>>,
    /// Lock order: `rosters` before `last_delivered`.
    last_delivered: Mutex<HashMap<(SessionId, StudentId), DateTime<Utc>>>,
    ticks: AtomicU64,
    runner: Mutex<Option<Runner>>,
}

impl std::fmt::Debug for AdaptiveMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveMonitor")
            .field("interval", &self.interval)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl AdaptiveMonitor {
    /// Start building a monitor.
    pub fn builder() -> AdaptiveMonitorBuilder {
        AdaptiveMonitorBuilder {
            store: None,
            policy: Arc::new(DefaultPolicy),
            decisions: None,
            interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Register a session, replacing any roster it already had.
    #[instrument(skip(self, roster), fields(students = roster.len()))]
    pub fn add_session(&self, session_id: SessionId, roster: BTreeSet<StudentId>) {
        let mut rosters = self.rosters.write();
        let _ = rosters.insert(session_id, Arc::new(roster));
        gauge!(MONITOR_SESSIONS_ACTIVE).set(rosters.len() as f64);
        info!(%session_id, "session monitored");
    }

    /// Replace the roster of a monitored session. Returns `false` (and does
    /// nothing) if the session is not monitored.
    pub fn update_roster(&self, session_id: SessionId, roster: BTreeSet<StudentId>) -> bool {
        let mut rosters = self.rosters.write();
        match rosters.get_mut(&session_id) {
            Some(current) => {
                debug!(%session_id, students = roster.len(), "roster replaced");
                *current = Arc::new(roster);
                true
            }
            None => false,
        }
    }

    /// Stop monitoring a session. Idempotent; returns whether it was present.
    #[instrument(skip(self))]
    pub fn remove_session(&self, session_id: SessionId) -> bool {
        let mut rosters = self.rosters.write();
        let removed = rosters.remove(&session_id).is_some();
        self.last_delivered
            .lock()
            .retain(|(session, _), _| *session != session_id);
        gauge!(MONITOR_SESSIONS_ACTIVE).set(rosters.len() as f64);
        if removed {
            info!(%session_id, "session no longer monitored");
        }
        removed
    }

    /// Current roster of a monitored session.
    pub fn roster(&self, session_id: SessionId) -> Option<BTreeSet<StudentId>> {
        self.rosters
            .read()
            .get(&session_id)
            .map(|roster| roster.as_ref().clone())
    }

    /// Whether the session is monitored.
    pub fn is_monitoring(&self, session_id: SessionId) -> bool {
        self.rosters.read().contains_key(&session_id)
    }

    /// Monitored sessions, ascending.
    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.rosters.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Run one evaluation over the tick-start snapshot.
    ///
    /// A failing session is logged and counted; it never prevents the other
    /// sessions of the same tick from being evaluated or dispatched.
    pub async fn tick(&self) -> TickReport {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        let snapshot: Vec<(SessionId, Arc<BTreeSet<StudentId>>)> = self
            .rosters
            .read()
            .iter()
            .map(|(id, roster)| (*id, Arc::clone(roster)))
            .collect();
        let now = Utc::now();

        let results = join_all(
            snapshot
                .iter()
                .map(|(session_id, roster)| self.evaluate_session(*session_id, roster, now)),
        )
        .await;

        let mut report = TickReport {
            tick,
            evaluated: snapshot.len(),
            ..TickReport::default()
        };
        for ((session_id, _), result) in snapshot.iter().zip(results) {
            let due = match result {
                Ok(due) => due,
                Err(e) => {
                    report.failed += 1;
                    counter!(MONITOR_SESSION_ERRORS_TOTAL, "error_type" => e.kind()).increment(1);
                    warn!(%session_id, tick, error = %e, "session evaluation failed, skipping");
                    continue;
                }
            };
            if due.is_empty() {
                continue;
            }
            let decision = PushDecision {
                session_id: *session_id,
                student_ids: due.clone(),
                tick,
                decided_at: now,
            };
            match self.decisions.try_send(decision) {
                Ok(()) => {
                    self.mark_delivered(*session_id, &due, now);
                    report.decisions += 1;
                    counter!(MONITOR_DECISIONS_TOTAL).increment(1);
                }
                Err(e) => {
                    report.dropped += 1;
                    counter!(MONITOR_DECISION_DROPS_TOTAL).increment(1);
                    let reason = match e {
                        mpsc::error::TrySendError::Full(_) => "channel full",
                        mpsc::error::TrySendError::Closed(_) => "channel closed",
                    };
                    warn!(%session_id, tick, reason, "push decision dropped");
                }
            }
        }

        counter!(MONITOR_TICKS_TOTAL).increment(1);
        histogram!(MONITOR_TICK_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(
            tick,
            evaluated = report.evaluated,
            decisions = report.decisions,
            failed = report.failed,
            dropped = report.dropped,
            "tick complete"
        );
        report
    }

    async fn evaluate_session(
        &self,
        session_id: SessionId,
        roster: &BTreeSet<StudentId>,
        now: DateTime<Utc>,
    ) -> Result<BTreeSet<StudentId>, RuntimeError> {
        let tiers = try_join_all(roster.iter().map(|student_id| async move {
            let tier = self.store.current_tier(*student_id, session_id).await?;
            Ok::<_, RuntimeError>((*student_id, tier))
        }))
        .await?;

        let last_delivered = self.last_delivered.lock();
        Ok(tiers
            .into_iter()
            .filter(|(student_id, tier)| {
                let last = last_delivered.get(&(session_id, *student_id)).copied();
                self.policy.should_deliver(*tier, last, now)
            })
            .map(|(student_id, _)| student_id)
            .collect())
    }

    fn mark_delivered(&self, session_id: SessionId, due: &BTreeSet<StudentId>, now: DateTime<Utc>) {
        let rosters = self.rosters.read();
        if !rosters.contains_key(&session_id) {
            return;
        }
        let mut last_delivered = self.last_delivered.lock();
        for student_id in due {
            let _ = last_delivered.insert((session_id, *student_id), now);
        }
    }

    /// Spawn the tick loop. The first tick fires one interval from now.
    /// Calling `start` on a running monitor does nothing.
    #[instrument(skip(self))]
    pub fn start(self: &Arc<Self>) {
        let mut runner = self.runner.lock();
        if runner.is_some() {
            debug!("monitor already running");
            return;
        }
        let cancel = CancellationToken::new();
        let monitor = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let period = monitor.interval;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let _ = monitor.tick().await;
                    }
                }
            }
            debug!("monitor loop exited");
        });
        *runner = Some(Runner { cancel, handle });
        info!(interval_ms = self.interval.as_millis() as u64, policy = self.policy.name(), "monitor started");
    }

    /// Stop the tick loop and wait for it to exit. An in-flight tick runs to
    /// completion; no tick starts after this returns. Idempotent.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let Some(runner) = self.runner.lock().take() else {
            return;
        };
        runner.cancel.cancel();
        if let Err(e) = runner.handle.await {
            warn!(error = %e, "monitor loop ended abnormally");
        }
        info!(ticks = self.tick_count(), "monitor stopped");
    }

    /// Whether the tick loop is running.
    pub fn is_running(&self) -> bool {
        self.runner.lock().is_some()
    }
}
