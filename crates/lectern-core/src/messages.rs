//! JSON frames exchanged with student clients and instructor dashboards.
//!
//! Every frame is an internally tagged object: `{"type": "<kind>", ...}`.
//! Field names are `snake_case` to stay compatible with existing clients.

use serde::{Deserialize, Serialize};

use crate::engagement::{EngagementTier, TierSummary};
use crate::ids::{QuestionId, SessionId, StudentId};

/// Frames produced by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A question pushed to a student.
    Question {
        /// Question identifier (echoed back in the response frame).
        question_id: QuestionId,
        /// Prompt text.
        question_text: String,
        /// Optional subject label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<String>,
        /// Session the push belongs to.
        session_id: SessionId,
    },
    /// A single student's freshly classified tier.
    Engagement {
        /// Classified student.
        student_id: StudentId,
        /// New tier.
        tier: EngagementTier,
    },
    /// Full dashboard snapshot for one session.
    DashboardUpdate(DashboardSnapshot),
    /// Reply to [`InboundMessage::Ping`].
    Pong,
}

impl OutboundMessage {
    /// The `type` tag value, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Question { .. } => "question",
            Self::Engagement { .. } => "engagement",
            Self::DashboardUpdate(_) => "dashboard_update",
            Self::Pong => "pong",
        }
    }
}

/// Frames accepted from clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// A student's answer to a pushed question.
    Response {
        /// Question being answered.
        question_id: QuestionId,
        /// Raw answer text.
        answer: String,
        /// Time from push to answer, in milliseconds.
        response_time_ms: u64,
    },
    /// Liveness probe.
    Ping,
}

/// Aggregate engagement counts for a dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Distinct classified students.
    pub total_students: usize,
    /// Students currently ACTIVE.
    pub active_students: usize,
    /// Students currently MODERATE.
    pub moderate_students: usize,
    /// Students currently PASSIVE.
    pub passive_students: usize,
}

impl From<TierSummary> for DashboardStats {
    fn from(summary: TierSummary) -> Self {
        Self {
            total_students: summary.total(),
            active_students: summary.active,
            moderate_students: summary.moderate,
            passive_students: summary.passive,
        }
    }
}

/// One row of the dashboard's student list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentStatus {
    /// Student identifier.
    pub student_id: StudentId,
    /// Latest tier, `null` before the first graded response.
    pub tier: Option<EngagementTier>,
    /// Whether the student has at least one live connection.
    pub connected: bool,
}

/// Dashboard snapshot payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// Session the snapshot describes.
    pub session_id: SessionId,
    /// Aggregate counts.
    pub stats: DashboardStats,
    /// Per-student rows, ordered by student id.
    pub students: Vec<StudentStatus>,
}
