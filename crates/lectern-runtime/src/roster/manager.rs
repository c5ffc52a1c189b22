//! Session lifecycle and roster bridging into the monitor.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use lectern_core::{InstructorId, SessionId, SessionRecord, SessionStatus, StudentId};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::source::RosterSource;
use crate::connections::{ClientConnection, StudentKey, StudentRegistry};
use crate::dispatch::QuestionPool;
use crate::errors::RuntimeError;
use crate::monitor::AdaptiveMonitor;

/// Record plus the roster the monitor currently holds for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Lifecycle record.
    #[serde(flatten)]
    pub record: SessionRecord,
    /// Monitored roster; empty unless the session is ACTIVE.
    pub student_ids: BTreeSet<StudentId>,
}

struct SessionEntry {
    record: SessionRecord,
    poller: Option<CancellationToken>,
    /// Last roster generation handed out (to a refresh or a start).
    roster_issued: u64,
    /// Generation of the roster the monitor currently holds.
    roster_applied: u64,
}

impl SessionEntry {
    fn next_generation(&mut self) -> u64 {
        self.roster_issued += 1;
        self.roster_issued
    }
}

/// Owns every session's lifecycle (PENDING → ACTIVE → ENDED).
///
/// A session is in the monitor's active set exactly while its record is
/// ACTIVE: both change together under the same lock. Roster fetches from the
/// external source happen with no lock held; each carries a generation taken
/// before the fetch, and a result older than the applied roster is dropped.
pub struct SessionRosterManager {
    monitor: Arc<AdaptiveMonitor>,
    students: Arc<StudentRegistry>,
    source: Arc<dyn RosterSource>,
    questions: Option<Arc<dyn QuestionPool>>,
    poll_interval: Duration,
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
    next_id: AtomicU64,
}

impl SessionRosterManager {
    /// Create a manager.
    pub fn new(
        monitor: Arc<AdaptiveMonitor>,
        students: Arc<StudentRegistry>,
        source: Arc<dyn RosterSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            monitor,
            students,
            source,
            questions: None,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Release the pool's per-session state whenever a session stops.
    #[must_use]
    pub fn with_question_pool(mut self, pool: Arc<dyn QuestionPool>) -> Self {
        self.questions = Some(pool);
        self
    }

    /// Create a PENDING session.
    #[instrument(skip(self))]
    pub fn create(
        &self,
        instructor_id: InstructorId,
        external_ref: Option<String>,
    ) -> SessionRecord {
        let session_id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = SessionRecord {
            session_id,
            instructor_id,
            status: SessionStatus::Pending,
            started_at: Utc::now(),
            ended_at: None,
            external_meeting_ref: external_ref,
        };
        let _ = self.sessions.lock().insert(
            session_id,
            SessionEntry {
                record: record.clone(),
                poller: None,
                roster_issued: 0,
                roster_applied: 0,
            },
        );
        info!(%session_id, %instructor_id, "session created");
        record
    }

    /// Activate a session with `initial_students`.
    ///
    /// Re-starting an ACTIVE session replaces its roster. Sessions with an
    /// external meeting reference get one roster poller, started on the
    /// first activation.
    #[instrument(skip(self, initial_students), fields(students = initial_students.len()))]
    pub fn start(
        self: &Arc<Self>,
        session_id: SessionId,
        initial_students: BTreeSet<StudentId>,
    ) -> Result<(), RuntimeError> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(&session_id)
            .ok_or_else(|| RuntimeError::session_not_found(session_id))?;
        let from = entry.record.status;
        if !from.can_transition_to(SessionStatus::Active) {
            return Err(RuntimeError::InvalidTransition {
                session_id,
                from,
                to: SessionStatus::Active,
            });
        }

        entry.record.status = SessionStatus::Active;
        entry.roster_applied = entry.next_generation();
        self.monitor.add_session(session_id, initial_students);
        if entry.record.external_meeting_ref.is_some() && entry.poller.is_none() {
            entry.poller = Some(self.spawn_poller(session_id));
        }
        info!(%session_id, %from, "session started");
        Ok(())
    }

    /// End a session. Already-ended sessions are left untouched.
    ///
    /// Unregisters from the monitor, stops roster polling, closes every
    /// student connection of the session and releases its question cursor.
    #[instrument(skip(self))]
    pub fn stop(&self, session_id: SessionId) -> Result<(), RuntimeError> {
        {
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .get_mut(&session_id)
                .ok_or_else(|| RuntimeError::session_not_found(session_id))?;
            if entry.record.status.is_terminal() {
                debug!(%session_id, "session already ended");
                return Ok(());
            }
            entry.record.status = SessionStatus::Ended;
            entry.record.ended_at = Some(Utc::now());
            if let Some(poller) = entry.poller.take() {
                poller.cancel();
            }
            let _ = self.monitor.remove_session(session_id);
        }
        let closed = self.students.disconnect_session(session_id);
        if let Some(pool) = &self.questions {
            pool.release_session(session_id);
        }
        info!(%session_id, closed_connections = closed, "session stopped");
        Ok(())
    }

    /// Replace the monitored roster with the external source's current
    /// members. No-op without an external reference or when not ACTIVE.
    ///
    /// Overlapping refreshes apply in the order they started: a fetch that
    /// completes after a newer refresh (or a re-start) has been applied is
    /// discarded.
    #[instrument(skip(self))]
    pub async fn refresh_roster(&self, session_id: SessionId) -> Result<(), RuntimeError> {
        let (external_ref, generation) = {
            let mut sessions = self.sessions.lock();
            let entry = sessions
                .get_mut(&session_id)
                .ok_or_else(|| RuntimeError::session_not_found(session_id))?;
            let external_ref = match (&entry.record.external_meeting_ref, entry.record.status) {
                (Some(external_ref), SessionStatus::Active) => external_ref.clone(),
                _ => return Ok(()),
            };
            (external_ref, entry.next_generation())
        };

        let members = self.source.fetch_current_members(&external_ref).await?;

        let mut sessions = self.sessions.lock();
        let Some(entry) = sessions
            .get_mut(&session_id)
            .filter(|e| e.record.status == SessionStatus::Active)
        else {
            return Ok(());
        };
        if generation < entry.roster_applied {
            debug!(%session_id, generation, applied = entry.roster_applied, "stale roster fetch discarded");
            return Ok(());
        }
        entry.roster_applied = generation;
        let count = members.len();
        let _ = self.monitor.update_roster(session_id, members);
        debug!(%session_id, students = count, generation, "roster refreshed");
        Ok(())
    }

    /// Register a student connection if the session is still open.
    ///
    /// The status check and the registration happen under the session lock,
    /// so a concurrent [`stop`](Self::stop) either sees the connection and
    /// closes it or ends the session before it is registered.
    pub fn admit_student(
        &self,
        key: StudentKey,
        connection: Arc<ClientConnection>,
    ) -> Result<(), RuntimeError> {
        let sessions = self.sessions.lock();
        let entry = sessions
            .get(&key.session_id)
            .ok_or_else(|| RuntimeError::session_not_found(key.session_id))?;
        if entry.record.status.is_terminal() {
            return Err(RuntimeError::SessionEnded(key.session_id));
        }
        self.students.connect(key, connection);
        Ok(())
    }

    /// Lifecycle record of a session.
    pub fn get(&self, session_id: SessionId) -> Option<SessionRecord> {
        self.sessions
            .lock()
            .get(&session_id)
            .map(|e| e.record.clone())
    }

    /// Record plus monitored roster.
    pub fn session_state(&self, session_id: SessionId) -> Option<SessionState> {
        let record = self.get(session_id)?;
        let student_ids = self.monitor.roster(session_id).unwrap_or_default();
        Some(SessionState {
            record,
            student_ids,
        })
    }

    /// Owning instructor of a session.
    pub fn instructor_of(&self, session_id: SessionId) -> Option<InstructorId> {
        self.sessions
            .lock()
            .get(&session_id)
            .map(|e| e.record.instructor_id)
    }

    /// Every session owned by `instructor_id`, ascending by id.
    pub fn sessions_for_instructor(&self, instructor_id: InstructorId) -> Vec<SessionRecord> {
        let mut records: Vec<_> = self
            .sessions
            .lock()
            .values()
            .filter(|e| e.record.instructor_id == instructor_id)
            .map(|e| e.record.clone())
            .collect();
        records.sort_by_key(|r| r.session_id);
        records
    }

    /// End every session that has not ended yet.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        let open: Vec<SessionId> = self
            .sessions
            .lock()
            .values()
            .filter(|e| !e.record.status.is_terminal())
            .map(|e| e.record.session_id)
            .collect();
        for session_id in open {
            if let Err(e) = self.stop(session_id) {
                warn!(%session_id, error = %e, "failed to stop session during shutdown");
            }
        }
    }

    fn spawn_poller(self: &Arc<Self>, session_id: SessionId) -> CancellationToken {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let manager: Weak<Self> = Arc::downgrade(self);
        let period = self.poll_interval;
        let _ = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if let Err(e) = manager.refresh_roster(session_id).await {
                    warn!(%session_id, error = %e, "roster refresh failed");
                }
            }
            debug!(%session_id, "roster poller exited");
        });
        token
    }
}
