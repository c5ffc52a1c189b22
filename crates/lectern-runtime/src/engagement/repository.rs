//! Persistence collaborator for engagement events.

use async_trait::async_trait;
use lectern_core::{CollaboratorError, EngagementEvent, NewEngagementEvent, SessionId, StudentId};
use parking_lot::RwLock;

/// Append-only storage for engagement events.
///
/// Implementations assign each appended event an identifier that increases
/// with insertion order and never modify an event once stored.
#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// Durably append an event.
    async fn append(&self, event: NewEngagementEvent) -> Result<EngagementEvent, CollaboratorError>;

    /// Latest event for a (student, session) pair by `(recorded_at, id)`.
    async fn query_latest(
        &self,
        student_id: StudentId,
        session_id: SessionId,
    ) -> Result<Option<EngagementEvent>, CollaboratorError>;

    /// Every event recorded for a session, in insertion order.
    async fn query_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<EngagementEvent>, CollaboratorError>;
}

/// In-process repository. State is lost on restart.
#[derive(Default)]
pub struct MemoryEngagementRepository {
    events: RwLock<Vec<EngagementEvent>>,
}

impl MemoryEngagementRepository {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EngagementRepository for MemoryEngagementRepository {
    async fn append(&self, event: NewEngagementEvent) -> Result<EngagementEvent, CollaboratorError> {
        let mut events = self.events.write();
        let stored = EngagementEvent::from_new(events.len() as u64 + 1, event);
        events.push(stored.clone());
        Ok(stored)
    }

    async fn query_latest(
        &self,
        student_id: StudentId,
        session_id: SessionId,
    ) -> Result<Option<EngagementEvent>, CollaboratorError> {
        let events = self.events.read();
        let latest = events
            .iter()
            .filter(|e| e.student_id == student_id && e.session_id == session_id)
            .fold(None::<&EngagementEvent>, |best, e| match best {
                Some(b) if !e.is_newer_than(b) => Some(b),
                _ => Some(e),
            });
        Ok(latest.cloned())
    }

    async fn query_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<EngagementEvent>, CollaboratorError> {
        Ok(self
            .events
            .read()
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use lectern_core::EngagementTier;

    fn new_event(student: u64, session: u64, tier: EngagementTier) -> NewEngagementEvent {
        NewEngagementEvent {
            student_id: StudentId(student),
            session_id: SessionId(session),
            tier,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let repo = MemoryEngagementRepository::new();
        let a = repo.append(new_event(1, 1, EngagementTier::Active)).await.unwrap();
        let b = repo.append(new_event(1, 1, EngagementTier::Passive)).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn latest_is_scoped_to_pair() {
        let repo = MemoryEngagementRepository::new();
        let _ = repo.append(new_event(1, 1, EngagementTier::Active)).await.unwrap();
        let _ = repo.append(new_event(1, 2, EngagementTier::Passive)).await.unwrap();
        let _ = repo.append(new_event(2, 1, EngagementTier::Moderate)).await.unwrap();

        let latest = repo.query_latest(StudentId(1), SessionId(1)).await.unwrap().unwrap();
        assert_eq!(latest.tier, EngagementTier::Active);
        assert!(repo.query_latest(StudentId(3), SessionId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_honours_recorded_at_over_insertion() {
        let repo = MemoryEngagementRepository::new();
        let mut later = new_event(1, 1, EngagementTier::Passive);
        later.recorded_at += Duration::seconds(30);
        let _ = repo.append(later).await.unwrap();
        let _ = repo.append(new_event(1, 1, EngagementTier::Active)).await.unwrap();

        let latest = repo.query_latest(StudentId(1), SessionId(1)).await.unwrap().unwrap();
        assert_eq!(latest.tier, EngagementTier::Passive);
    }

    #[tokio::test]
    async fn query_session_filters() {
        let repo = MemoryEngagementRepository::new();
        let _ = repo.append(new_event(1, 1, EngagementTier::Active)).await.unwrap();
        let _ = repo.append(new_event(2, 9, EngagementTier::Active)).await.unwrap();
        let events = repo.query_session(SessionId(1)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].student_id, StudentId(1));
    }
}
