//! Session records and the monotonic PENDING → ACTIVE → ENDED lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{InstructorId, SessionId};

/// Lifecycle status of a monitored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, not yet monitored.
    Pending,
    /// Monitored by the adaptive scheduler.
    Active,
    /// Terminal.
    Ended,
}

impl SessionStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Whether moving to `next` keeps the lifecycle monotonic.
    ///
    /// Self-transitions are allowed except on the terminal state, which
    /// callers treat as an idempotent no-op rather than a transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() && next >= self
    }

    /// Lowercase wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classroom session owned by one instructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session identifier.
    pub session_id: SessionId,
    /// Owning instructor.
    pub instructor_id: InstructorId,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Set once the session reaches [`SessionStatus::Ended`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Meeting reference for the external roster source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_meeting_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_monotonic() {
        use SessionStatus::{Active, Ended, Pending};
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Ended));
        assert!(Active.can_transition_to(Active));
        assert!(Active.can_transition_to(Ended));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Ended.can_transition_to(Active));
        assert!(!Ended.can_transition_to(Ended));
    }

    #[test]
    fn record_omits_unset_optionals() {
        let record = SessionRecord {
            session_id: SessionId(1),
            instructor_id: InstructorId(9),
            status: SessionStatus::Pending,
            started_at: DateTime::<Utc>::UNIX_EPOCH,
            ended_at: None,
            external_meeting_ref: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "pending");
        assert!(json.get("endedAt").is_none());
        assert!(json.get("externalMeetingRef").is_none());
    }
}
