//! External roster collaborator.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use lectern_core::{CollaboratorError, StudentId};
use parking_lot::RwLock;

/// Source of truth for who is currently in a meeting.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Current participants of the meeting identified by `external_ref`.
    async fn fetch_current_members(
        &self,
        external_ref: &str,
    ) -> Result<BTreeSet<StudentId>, CollaboratorError>;
}

/// In-memory roster source keyed by meeting reference.
///
/// Unknown references fail with [`CollaboratorError::RosterSource`], the same
/// way a provider API would for a meeting it does not know.
#[derive(Default)]
pub struct StaticRosterSource {
    meetings: RwLock<HashMap<String, BTreeSet<StudentId>>>,
}

impl StaticRosterSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (replace) the participants of a meeting.
    pub fn set_members(&self, external_ref: impl Into<String>, members: BTreeSet<StudentId>) {
        let _ = self.meetings.write().insert(external_ref.into(), members);
    }

    /// Forget a meeting.
    pub fn remove_meeting(&self, external_ref: &str) -> bool {
        self.meetings.write().remove(external_ref).is_some()
    }
}

#[async_trait]
impl RosterSource for StaticRosterSource {
    async fn fetch_current_members(
        &self,
        external_ref: &str,
    ) -> Result<BTreeSet<StudentId>, CollaboratorError> {
        self.meetings
            .read()
            .get(external_ref)
            .cloned()
            .ok_or_else(|| CollaboratorError::RosterSource(format!("unknown meeting {external_ref}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn returns_latest_members() {
        let source = StaticRosterSource::new();
        source.set_members("zoom-1", BTreeSet::from([StudentId(1)]));
        source.set_members("zoom-1", BTreeSet::from([StudentId(2), StudentId(3)]));
        let members = source.fetch_current_members("zoom-1").await.unwrap();
        assert_eq!(members, BTreeSet::from([StudentId(2), StudentId(3)]));
    }

    #[tokio::test]
    async fn unknown_meeting_fails() {
        let source = StaticRosterSource::new();
        assert_matches!(
            source.fetch_current_members("nope").await,
            Err(CollaboratorError::RosterSource(_))
        );
        source.set_members("a", BTreeSet::new());
        assert!(source.remove_meeting("a"));
        assert!(!source.remove_meeting("a"));
    }
}
