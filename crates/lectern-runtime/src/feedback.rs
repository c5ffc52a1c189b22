//! Response intake: grading, classification and dashboard fan-out.

use std::collections::BTreeSet;
use std::sync::Arc;

use lectern_core::messages::{DashboardSnapshot, OutboundMessage, StudentStatus};
use lectern_core::{EngagementEvent, InstructorId, QuestionId, SessionId, StudentId, TierSummary};
use tracing::{info, instrument, warn};

use crate::connections::{InstructorRegistry, StudentRegistry};
use crate::dispatch::QuestionPool;
use crate::engagement::EngagementStore;
use crate::errors::RuntimeError;
use crate::roster::SessionRosterManager;

/// An answer as submitted by a student client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedResponse {
    /// Session the answer belongs to.
    pub session_id: SessionId,
    /// Answering student.
    pub student_id: StudentId,
    /// Question being answered.
    pub question_id: QuestionId,
    /// Raw answer text.
    pub answer: String,
    /// Time from push to answer.
    pub response_time_ms: u64,
}

/// Result of grading one response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradedResponse {
    /// Whether the answer matched the key.
    pub is_correct: bool,
    /// The engagement event recorded for it.
    pub event: EngagementEvent,
}

/// Closes the loop from student answers back into the engagement log.
pub struct ResponseIntake {
    store: Arc<EngagementStore>,
    pool: Arc<dyn QuestionPool>,
    sessions: Arc<SessionRosterManager>,
    instructors: Arc<InstructorRegistry>,
    students: Arc<StudentRegistry>,
}

impl ResponseIntake {
    /// Create an intake over the shared components.
    pub fn new(
        store: Arc<EngagementStore>,
        pool: Arc<dyn QuestionPool>,
        sessions: Arc<SessionRosterManager>,
        instructors: Arc<InstructorRegistry>,
        students: Arc<StudentRegistry>,
    ) -> Self {
        Self {
            store,
            pool,
            sessions,
            instructors,
            students,
        }
    }

    /// Grade, classify and record a response, then update the session's
    /// instructor with the new tier and a fresh dashboard snapshot.
    #[instrument(skip(self, response), fields(session_id = %response.session_id, student_id = %response.student_id))]
    pub async fn submit(&self, response: SubmittedResponse) -> Result<GradedResponse, RuntimeError> {
        let instructor_id = self
            .sessions
            .instructor_of(response.session_id)
            .ok_or_else(|| RuntimeError::session_not_found(response.session_id))?;
        let question = self
            .pool
            .question(response.question_id)
            .await?
            .ok_or_else(|| RuntimeError::question_not_found(response.question_id))?;

        let is_correct = question.is_correct(&response.answer);
        let event = self
            .store
            .record_response(
                response.student_id,
                response.session_id,
                response.response_time_ms,
                is_correct,
                None,
            )
            .await?;
        info!(
            question_id = %response.question_id,
            is_correct,
            tier = %event.tier,
            "response graded"
        );

        let _ = self.instructors.send(
            &instructor_id,
            &OutboundMessage::Engagement {
                student_id: response.student_id,
                tier: event.tier,
            },
        );
        match self.dashboard_snapshot(response.session_id).await {
            Ok(snapshot) => {
                let _ = self
                    .instructors
                    .send(&instructor_id, &OutboundMessage::DashboardUpdate(snapshot));
            }
            Err(e) => warn!(error = %e, "dashboard snapshot skipped"),
        }

        Ok(GradedResponse { is_correct, event })
    }

    /// Current dashboard view of a session.
    ///
    /// Rows cover every student on the roster, every student with an event
    /// and every connected student, ordered by id.
    pub async fn dashboard_snapshot(&self, session_id: SessionId) -> Result<DashboardSnapshot, RuntimeError> {
        let state = self
            .sessions
            .session_state(session_id)
            .ok_or_else(|| RuntimeError::session_not_found(session_id))?;
        let tiers = self.store.session_tiers(session_id).await?;
        let connected = self.students.connected_students(session_id);

        let mut ids: BTreeSet<StudentId> = state.student_ids;
        ids.extend(tiers.keys().copied());
        ids.extend(connected.iter().copied());

        let students = ids
            .into_iter()
            .map(|student_id| StudentStatus {
                student_id,
                tier: tiers.get(&student_id).copied(),
                connected: connected.contains(&student_id),
            })
            .collect();
        Ok(DashboardSnapshot {
            session_id,
            stats: TierSummary::from_tiers(tiers.values().copied()).into(),
            students,
        })
    }

    /// Snapshots of every non-ended session owned by an instructor.
    pub async fn dashboards_for(&self, instructor_id: InstructorId) -> Vec<DashboardSnapshot> {
        let mut snapshots = Vec::new();
        for record in self.sessions.sessions_for_instructor(instructor_id) {
            if record.status.is_terminal() {
                continue;
            }
            match self.dashboard_snapshot(record.session_id).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!(session_id = %record.session_id, error = %e, "dashboard snapshot skipped"),
            }
        }
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RulesClassifier;
    use crate::connections::{ClientConnection, StudentKey};
    use crate::dispatch::RotatingQuestionPool;
    use crate::engagement::MemoryEngagementRepository;
    use crate::monitor::AdaptiveMonitor;
    use crate::roster::StaticRosterSource;
    use assert_matches::assert_matches;
    use lectern_core::EngagementTier;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        intake: ResponseIntake,
        sessions: Arc<SessionRosterManager>,
        instructors: Arc<InstructorRegistry>,
        students: Arc<StudentRegistry>,
        _decisions: mpsc::Receiver<crate::monitor::PushDecision>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(EngagementStore::new(
            Arc::new(MemoryEngagementRepository::new()),
            Arc::new(RulesClassifier::default()),
        ));
        let (tx, rx) = mpsc::channel(8);
        let monitor = Arc::new(
            AdaptiveMonitor::builder()
                .store(Arc::clone(&store))
                .decisions(tx)
                .build()
                .unwrap(),
        );
        let instructors = Arc::new(InstructorRegistry::new("instructor"));
        let students = Arc::new(StudentRegistry::new("student"));
        let sessions = Arc::new(SessionRosterManager::new(
            monitor,
            Arc::clone(&students),
            Arc::new(StaticRosterSource::new()),
            Duration::from_secs(30),
        ));
        let intake = ResponseIntake::new(
            store,
            Arc::new(RotatingQuestionPool::demo()),
            Arc::clone(&sessions),
            Arc::clone(&instructors),
            Arc::clone(&students),
        );
        Fixture {
            intake,
            sessions,
            instructors,
            students,
            _decisions: rx,
        }
    }

    fn response(session_id: SessionId, student: u64, answer: &str, ms: u64) -> SubmittedResponse {
        SubmittedResponse {
            session_id,
            student_id: StudentId(student),
            question_id: QuestionId(1),
            answer: answer.into(),
            response_time_ms: ms,
        }
    }

    #[tokio::test]
    async fn correct_fast_answer_is_active_and_reaches_dashboard() {
        let f = fixture();
        let session = f.sessions.create(InstructorId(9), None).session_id;
        f.sessions.start(session, BTreeSet::from([StudentId(1)])).unwrap();
        let (conn, mut rx) = ClientConnection::channel(8);
        f.instructors.connect(InstructorId(9), Arc::new(conn));

        let graded = f.intake.submit(response(session, 1, " 56 ", 1500)).await.unwrap();
        assert!(graded.is_correct);
        assert_eq!(graded.event.tier, EngagementTier::Active);

        let engagement: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(engagement["type"], "engagement");
        assert_eq!(engagement["tier"], "active");
        let dashboard: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(dashboard["type"], "dashboard_update");
        assert_eq!(dashboard["stats"]["active_students"], 1);
    }

    #[tokio::test]
    async fn wrong_answer_is_passive() {
        let f = fixture();
        let session = f.sessions.create(InstructorId(1), None).session_id;
        let graded = f.intake.submit(response(session, 1, "42", 1000)).await.unwrap();
        assert!(!graded.is_correct);
        assert_eq!(graded.event.tier, EngagementTier::Passive);
    }

    #[tokio::test]
    async fn unknown_session_or_question_is_not_found() {
        let f = fixture();
        assert_matches!(
            f.intake.submit(response(SessionId(77), 1, "56", 1000)).await,
            Err(RuntimeError::NotFound { kind: "session", .. })
        );
        let session = f.sessions.create(InstructorId(1), None).session_id;
        let mut bad = response(session, 1, "56", 1000);
        bad.question_id = QuestionId(999);
        assert_matches!(
            f.intake.submit(bad).await,
            Err(RuntimeError::NotFound { kind: "question", id: 999 })
        );
    }

    #[tokio::test]
    async fn snapshot_merges_roster_events_and_connections() {
        let f = fixture();
        let session = f.sessions.create(InstructorId(1), None).session_id;
        f.sessions
            .start(session, BTreeSet::from([StudentId(1), StudentId(2)]))
            .unwrap();
        let _ = f.intake.submit(response(session, 2, "wrong", 9000)).await.unwrap();
        let (conn, _rx) = ClientConnection::channel(8);
        f.students
            .connect(StudentKey::new(session, StudentId(3)), Arc::new(conn));

        let snapshot = f.intake.dashboard_snapshot(session).await.unwrap();
        assert_eq!(snapshot.stats.total_students, 1);
        assert_eq!(snapshot.stats.passive_students, 1);
        let rows: Vec<_> = snapshot
            .students
            .iter()
            .map(|s| (s.student_id.get(), s.tier, s.connected))
            .collect();
        assert_eq!(
            rows,
            vec![
                (1, None, false),
                (2, Some(EngagementTier::Passive), false),
                (3, None, true),
            ]
        );
    }

    #[tokio::test]
    async fn dashboards_skip_ended_sessions() {
        let f = fixture();
        let live = f.sessions.create(InstructorId(4), None).session_id;
        let ended = f.sessions.create(InstructorId(4), None).session_id;
        f.sessions.stop(ended).unwrap();

        let snapshots = f.intake.dashboards_for(InstructorId(4)).await;
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].session_id, live);
    }
}
