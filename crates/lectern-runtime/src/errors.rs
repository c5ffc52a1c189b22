//! Runtime error taxonomy.

use lectern_core::{CollaboratorError, QuestionId, SessionId, SessionStatus};

/// Errors surfaced by runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Unknown session, question or student. Surfaced to the caller, never retried.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind (`session`, `question`).
        kind: &'static str,
        /// Raw identifier.
        id: u64,
    },

    /// Illegal lifecycle change.
    #[error("session {session_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Session being changed.
        session_id: SessionId,
        /// Current status.
        from: SessionStatus,
        /// Requested status.
        to: SessionStatus,
    },

    /// The session has ended and accepts no new participants.
    #[error("session {0} has ended")]
    SessionEnded(SessionId),

    /// Store, roster source or question pool failure. Abandoned for this
    /// cycle and retried naturally on the next one.
    #[error("transient failure: {0}")]
    TransientIo(#[from] CollaboratorError),

    /// Component started without a required collaborator.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RuntimeError {
    /// Unknown session.
    #[must_use]
    pub fn session_not_found(id: SessionId) -> Self {
        Self::NotFound {
            kind: "session",
            id: id.get(),
        }
    }

    /// Unknown question.
    #[must_use]
    pub fn question_not_found(id: QuestionId) -> Self {
        Self::NotFound {
            kind: "question",
            id: id.get(),
        }
    }

    /// Short label for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::SessionEnded(_) => "session_ended",
            Self::TransientIo(_) => "transient_io",
            Self::Configuration(_) => "configuration",
        }
    }
}
