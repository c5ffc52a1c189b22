#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lectern_core::{
    CollaboratorError, EngagementEvent, EngagementTier, InstructorId, NewEngagementEvent,
    SessionId, StudentId, TierSummary,
};
use lectern_runtime::{
    AdaptiveMonitor, ClientConnection, Collaborators, DispatchGateway, EngagementRepository,
    EngagementStore, InstructorRegistry, LecternRuntime, MemoryEngagementRepository, PushDecision,
    RotatingQuestionPool, RulesClassifier, SessionRosterManager, StaticRosterSource, StudentKey,
    StudentRegistry,
};
use lectern_settings::LecternSettings;
use tokio::sync::{Notify, mpsc};

fn ids(raw: &[u64]) -> BTreeSet<StudentId> {
    raw.iter().copied().map(StudentId).collect()
}

fn store_over(repo: Arc<dyn EngagementRepository>) -> Arc<EngagementStore> {
    Arc::new(EngagementStore::new(repo, Arc::new(RulesClassifier::default())))
}

fn monitor_over(store: Arc<EngagementStore>) -> (Arc<AdaptiveMonitor>, mpsc::Receiver<PushDecision>) {
    let (tx, rx) = mpsc::channel(32);
    let monitor = AdaptiveMonitor::builder()
        .store(store)
        .decisions(tx)
        .interval(Duration::from_millis(50))
        .build()
        .unwrap();
    (Arc::new(monitor), rx)
}

fn drain(rx: &mut mpsc::Receiver<PushDecision>) -> Vec<PushDecision> {
    let mut out = Vec::new();
    while let Ok(d) = rx.try_recv() {
        out.push(d);
    }
    out
}

/// Fails every read for one session; delegates everything else.
struct FlakyRepository {
    inner: MemoryEngagementRepository,
    broken: SessionId,
}

#[async_trait]
impl EngagementRepository for FlakyRepository {
    async fn append(&self, event: NewEngagementEvent) -> Result<EngagementEvent, CollaboratorError> {
        self.inner.append(event).await
    }

    async fn query_latest(
        &self,
        student_id: StudentId,
        session_id: SessionId,
    ) -> Result<Option<EngagementEvent>, CollaboratorError> {
        if session_id == self.broken {
            return Err(CollaboratorError::Storage("connection reset".into()));
        }
        self.inner.query_latest(student_id, session_id).await
    }

    async fn query_session(&self, session_id: SessionId) -> Result<Vec<EngagementEvent>, CollaboratorError> {
        self.inner.query_session(session_id).await
    }
}

/// Parks every `query_latest` until released.
#[derive(Default)]
struct GatedRepository {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl EngagementRepository for GatedRepository {
    async fn append(&self, _: NewEngagementEvent) -> Result<EngagementEvent, CollaboratorError> {
        Err(CollaboratorError::Storage("read-only".into()))
    }

    async fn query_latest(
        &self,
        _: StudentId,
        _: SessionId,
    ) -> Result<Option<EngagementEvent>, CollaboratorError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(None)
    }

    async fn query_session(&self, _: SessionId) -> Result<Vec<EngagementEvent>, CollaboratorError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn delivery_follows_engagement_then_stops_with_session() {
    let store = store_over(Arc::new(MemoryEngagementRepository::new()));
    let (monitor, mut rx) = monitor_over(Arc::clone(&store));
    let students = Arc::new(StudentRegistry::new("student"));
    let manager = Arc::new(SessionRosterManager::new(
        Arc::clone(&monitor),
        students,
        Arc::new(StaticRosterSource::new()),
        Duration::from_secs(30),
    ));
    let session = manager.create(InstructorId(1), None).session_id;
    let (s1, s2) = (StudentId(1), StudentId(2));
    manager.start(session, ids(&[1, 2])).unwrap();

    let _ = monitor.tick().await;
    let decisions = drain(&mut rx);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].session_id, session);
    assert_eq!(decisions[0].student_ids, ids(&[1, 2]));

    let _ = store.record(s1, session, EngagementTier::Active).await.unwrap();
    let _ = store.record(s2, session, EngagementTier::Passive).await.unwrap();
    let _ = monitor.tick().await;
    let decisions = drain(&mut rx);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].student_ids, BTreeSet::from([s2]));

    manager.stop(session).unwrap();
    let report = monitor.tick().await;
    assert_eq!(report.evaluated, 0);
    assert!(drain(&mut rx).iter().all(|d| d.session_id != session));
}

#[tokio::test]
async fn session_summary_uses_latest_tier() {
    let store = store_over(Arc::new(MemoryEngagementRepository::new()));
    let session = SessionId(5);
    let _ = store.record(StudentId(1), session, EngagementTier::Active).await.unwrap();
    let _ = store.record(StudentId(1), session, EngagementTier::Passive).await.unwrap();
    let _ = store.record(StudentId(2), session, EngagementTier::Moderate).await.unwrap();

    assert_eq!(
        store.session_summary(session).await.unwrap(),
        TierSummary {
            active: 0,
            moderate: 1,
            passive: 1
        }
    );
}

#[tokio::test]
async fn failing_session_does_not_block_siblings() {
    let repo = Arc::new(FlakyRepository {
        inner: MemoryEngagementRepository::new(),
        broken: SessionId(13),
    });
    let (monitor, mut rx) = monitor_over(store_over(repo));
    monitor.add_session(SessionId(13), ids(&[1]));
    monitor.add_session(SessionId(14), ids(&[2]));

    let report = monitor.tick().await;
    assert_eq!(report.evaluated, 2);
    assert_eq!(report.failed, 1);
    let decisions = drain(&mut rx);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].session_id, SessionId(14));
}

#[tokio::test]
async fn session_removed_mid_tick_finishes_then_disappears() {
    let repo = Arc::new(GatedRepository::default());
    let (monitor, mut rx) = monitor_over(store_over(Arc::clone(&repo) as Arc<dyn EngagementRepository>));
    monitor.add_session(SessionId(42), ids(&[1]));

    let ticking = {
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move { monitor.tick().await })
    };
    repo.entered.notified().await;
    assert!(monitor.remove_session(SessionId(42)));
    monitor.add_session(SessionId(43), ids(&[2]));
    repo.release.notify_one();

    let report = ticking.await.unwrap();
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.failed, 0);
    let _ = drain(&mut rx);

    // Session 43 joined mid-tick; it is the only one the next tick sees.
    repo.release.notify_one();
    let report = monitor.tick().await;
    assert_eq!(report.evaluated, 1);
    let decisions = drain(&mut rx);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].session_id, SessionId(43));
}

#[tokio::test]
async fn fan_out_survives_one_broken_channel() {
    let instructors = InstructorRegistry::new("instructor");
    let (broken, broken_rx) = ClientConnection::channel(4);
    drop(broken_rx);
    let (healthy, mut healthy_rx) = ClientConnection::channel(4);
    instructors.connect(InstructorId(1), Arc::new(broken));
    instructors.connect(InstructorId(1), Arc::new(healthy));

    let delivered = instructors.send(
        &InstructorId(1),
        &lectern_core::messages::OutboundMessage::Engagement {
            student_id: StudentId(3),
            tier: EngagementTier::Moderate,
        },
    );
    assert_eq!(delivered, 1);
    assert!(healthy_rx.try_recv().unwrap().contains("\"moderate\""));
}

#[tokio::test]
async fn double_disconnect_is_harmless() {
    let students = StudentRegistry::new("student");
    let (conn, _rx) = ClientConnection::channel(4);
    let id = conn.id.clone();
    students.connect(StudentKey::new(SessionId(1), StudentId(1)), Arc::new(conn));

    assert!(students.disconnect(&id).is_some());
    assert!(students.disconnect(&id).is_none());
    assert!(students.disconnect("never-registered").is_none());
    assert_eq!(students.connection_count(), 0);
}

#[tokio::test]
async fn decisions_reach_connected_students() {
    let store = store_over(Arc::new(MemoryEngagementRepository::new()));
    let (monitor, mut decisions) = monitor_over(store);
    let students = Arc::new(StudentRegistry::new("student"));
    let gateway = DispatchGateway::new(Arc::new(RotatingQuestionPool::demo()), Arc::clone(&students));

    let (conn, mut frames) = ClientConnection::channel(4);
    students.connect(StudentKey::new(SessionId(8), StudentId(1)), Arc::new(conn));
    monitor.add_session(SessionId(8), ids(&[1, 2]));

    let _ = monitor.tick().await;
    let decision = decisions.try_recv().unwrap();
    let outcome = gateway.push(decision.session_id, &decision.student_ids).await;
    assert_eq!(outcome.sent, 1);
    assert_eq!(outcome.unreachable, 1);

    let frame: serde_json::Value = serde_json::from_str(&frames.try_recv().unwrap()).unwrap();
    assert_eq!(frame["type"], "question");
    assert_eq!(frame["session_id"], 8);
}

#[tokio::test(start_paused = true)]
async fn assembled_runtime_pushes_on_schedule() {
    let mut settings = LecternSettings::default();
    settings.monitor.tick_interval_ms = 1000;
    let runtime = LecternRuntime::build(
        &settings,
        Collaborators {
            repository: Arc::new(MemoryEngagementRepository::new()),
            roster_source: Arc::new(StaticRosterSource::new()),
            question_pool: Arc::new(RotatingQuestionPool::demo()),
        },
    )
    .unwrap();
    let session = runtime.sessions.create(InstructorId(1), None).session_id;
    runtime.sessions.start(session, ids(&[1])).unwrap();
    let (conn, mut frames) = ClientConnection::channel(8);
    runtime
        .students
        .connect(StudentKey::new(session, StudentId(1)), Arc::new(conn));

    runtime.start().unwrap();
    let frame = frames.recv().await.unwrap();
    assert!(frame.contains("\"question\""));

    runtime.shutdown().await;
    assert!(!runtime.monitor.is_running());
    assert_eq!(runtime.students.connection_count(), 0);
}
