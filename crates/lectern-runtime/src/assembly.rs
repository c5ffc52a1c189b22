//! Process-wide wiring of the runtime components.
//!
//! Everything is constructed once, from settings plus the external
//! collaborators, and shared by `Arc`. There are no module-level instances.

use std::path::PathBuf;
use std::sync::Arc;

use lectern_settings::LecternSettings;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::classifier::{EngagementClassifier, ModelClassifier, RulesClassifier};
use crate::connections::{InstructorRegistry, StudentRegistry};
use crate::dispatch::{DispatchGateway, QuestionPool};
use crate::engagement::{EngagementRepository, EngagementStore};
use crate::errors::RuntimeError;
use crate::feedback::ResponseIntake;
use crate::monitor::{AdaptiveMonitor, PushDecision};
use crate::roster::{RosterSource, SessionRosterManager};

/// External collaborators the runtime consumes.
pub struct Collaborators {
    /// Engagement event persistence.
    pub repository: Arc<dyn EngagementRepository>,
    /// Meeting-provider roster source.
    pub roster_source: Arc<dyn RosterSource>,
    /// Question supply and answer keys.
    pub question_pool: Arc<dyn QuestionPool>,
}

struct DispatchTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// All runtime components, wired together.
pub struct LecternRuntime {
    /// Engagement log facade.
    pub store: Arc<EngagementStore>,
    /// Periodic scheduler.
    pub monitor: Arc<AdaptiveMonitor>,
    /// Session lifecycle owner.
    pub sessions: Arc<SessionRosterManager>,
    /// Decision consumer.
    pub gateway: Arc<DispatchGateway>,
    /// Response grading and dashboard updates.
    pub intake: Arc<ResponseIntake>,
    /// Dashboard-side connections.
    pub instructors: Arc<InstructorRegistry>,
    /// Student-side connections.
    pub students: Arc<StudentRegistry>,
    model: Option<(Arc<ModelClassifier>, PathBuf)>,
    decisions: Mutex<Option<mpsc::Receiver<PushDecision>>>,
    dispatch: Mutex<Option<DispatchTask>>,
}

impl LecternRuntime {
    /// Build every component. Nothing is spawned until [`start`](Self::start).
    pub fn build(
        settings: &LecternSettings,
        collaborators: Collaborators,
    ) -> Result<Arc<Self>, RuntimeError> {
        let rules = RulesClassifier::from_settings(&settings.classifier);
        let (classifier, model): (Arc<dyn EngagementClassifier>, _) =
            match &settings.classifier.model_path {
                Some(path) => {
                    let model = Arc::new(ModelClassifier::new(rules));
                    (
                        Arc::clone(&model) as Arc<dyn EngagementClassifier>,
                        Some((model, PathBuf::from(path))),
                    )
                }
                None => (Arc::new(rules), None),
            };

        let store = Arc::new(EngagementStore::new(collaborators.repository, classifier));
        let (tx, rx) = mpsc::channel(settings.monitor.decision_buffer.max(1));
        let monitor = Arc::new(
            AdaptiveMonitor::builder()
                .store(Arc::clone(&store))
                .decisions(tx)
                .settings(&settings.monitor)
                .build()?,
        );

        let max_drops = settings.connections.max_total_drops;
        let instructors = Arc::new(InstructorRegistry::with_max_drops("instructor", max_drops));
        let students = Arc::new(StudentRegistry::with_max_drops("student", max_drops));

        let sessions = Arc::new(
            SessionRosterManager::new(
                Arc::clone(&monitor),
                Arc::clone(&students),
                collaborators.roster_source,
                settings.roster.poll_interval(),
            )
            .with_question_pool(Arc::clone(&collaborators.question_pool)),
        );
        let gateway = Arc::new(DispatchGateway::new(
            Arc::clone(&collaborators.question_pool),
            Arc::clone(&students),
        ));
        let intake = Arc::new(ResponseIntake::new(
            Arc::clone(&store),
            collaborators.question_pool,
            Arc::clone(&sessions),
            Arc::clone(&instructors),
            Arc::clone(&students),
        ));

        Ok(Arc::new(Self {
            store,
            monitor,
            sessions,
            gateway,
            intake,
            instructors,
            students,
            model,
            decisions: Mutex::new(Some(rx)),
            dispatch: Mutex::new(None),
        }))
    }

    /// Start the dispatch consumer and the monitor tick loop, and begin
    /// loading the learned model if one is configured.
    ///
    /// Fails with [`RuntimeError::Configuration`] if already started once.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<(), RuntimeError> {
        let rx = self
            .decisions
            .lock()
            .take()
            .ok_or_else(|| RuntimeError::Configuration("runtime already started".into()))?;
        if let Some((model, path)) = &self.model {
            let _ = model.spawn_load(path.clone());
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.gateway).run(rx, cancel.clone()));
        *self.dispatch.lock() = Some(DispatchTask { cancel, handle });
        self.monitor.start();
        info!("runtime started");
        Ok(())
    }

    /// End all sessions, close every connection, stop the monitor, then
    /// drain and stop dispatch. Idempotent.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.sessions.shutdown();
        let closed = self.students.disconnect_where(|_| true)
            + self.instructors.disconnect_where(|_| true);
        debug!(closed, "connections closed");
        self.monitor.stop().await;
        let task = self.dispatch.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "dispatch task ended abnormally");
            }
        }
        info!("runtime stopped");
    }
}
