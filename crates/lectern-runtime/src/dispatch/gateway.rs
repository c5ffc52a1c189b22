//! Dispatch gateway: turns push decisions into question frames.

use std::collections::BTreeSet;
use std::sync::Arc;

use lectern_core::{SessionId, StudentId};
use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::questions::QuestionPool;
use crate::connections::{StudentKey, StudentRegistry};
use crate::metrics::DISPATCH_QUESTIONS_TOTAL;
use crate::monitor::PushDecision;

/// Per-push counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Students that received the frame on at least one connection.
    pub sent: usize,
    /// Students with no live connection.
    pub unreachable: usize,
    /// Students for whom no question could be obtained.
    pub failed: usize,
}

/// Sends the next question to each student of a push decision.
///
/// Delivery is attempted once. Missing connections and question-pool
/// failures are logged and counted, never retried here.
pub struct DispatchGateway {
    pool: Arc<dyn QuestionPool>,
    students: Arc<StudentRegistry>,
}

impl DispatchGateway {
    /// Create a gateway.
    pub fn new(pool: Arc<dyn QuestionPool>, students: Arc<StudentRegistry>) -> Self {
        Self { pool, students }
    }

    /// Push one question to each of `student_ids` in `session_id`.
    ///
    /// Students with no live connection are counted as unreachable without
    /// drawing a question.
    pub async fn push(&self, session_id: SessionId, student_ids: &BTreeSet<StudentId>) -> PushOutcome {
        let mut outcome = PushOutcome::default();
        for student_id in student_ids {
            let key = StudentKey::new(session_id, *student_id);
            if !self.students.is_connected(&key) {
                outcome.unreachable += 1;
                counter!(DISPATCH_QUESTIONS_TOTAL, "outcome" => "unreachable").increment(1);
                continue;
            }
            let question = match self.pool.next_question(session_id).await {
                Ok(q) => q,
                Err(e) => {
                    outcome.failed += 1;
                    counter!(DISPATCH_QUESTIONS_TOTAL, "outcome" => "failed").increment(1);
                    warn!(%session_id, %student_id, error = %e, "no question available");
                    continue;
                }
            };
            if self.students.send(&key, &question.to_message(session_id)) > 0 {
                outcome.sent += 1;
                counter!(DISPATCH_QUESTIONS_TOTAL, "outcome" => "sent").increment(1);
            } else {
                outcome.unreachable += 1;
                counter!(DISPATCH_QUESTIONS_TOTAL, "outcome" => "unreachable").increment(1);
            }
        }
        debug!(
            %session_id,
            sent = outcome.sent,
            unreachable = outcome.unreachable,
            failed = outcome.failed,
            "push complete"
        );
        outcome
    }

    /// Consume decisions until the channel closes or `cancel` fires.
    ///
    /// Each decision runs on its own task so a slow session never delays
    /// another. In-flight pushes are awaited before returning.
    pub async fn run(self: Arc<Self>, mut decisions: mpsc::Receiver<PushDecision>, cancel: CancellationToken) {
        let tracker = TaskTracker::new();
        info!("dispatch gateway started");
        loop {
            let decision = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = decisions.recv() => match next {
                    Some(decision) => decision,
                    None => break,
                },
            };
            let gateway = Arc::clone(&self);
            let _ = tracker.spawn(async move {
                let _ = gateway.push(decision.session_id, &decision.student_ids).await;
            });
        }
        let _ = tracker.close();
        tracker.wait().await;
        info!("dispatch gateway stopped");
    }
}
