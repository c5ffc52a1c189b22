//! Errors raised by external collaborators (storage, roster source, question pool, model).

/// Failure reported by a collaborator behind one of the runtime's traits.
///
/// All variants are transient from the scheduler's point of view: the
/// operation is abandoned for the current cycle and retried naturally.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// External roster source failure (meeting provider API).
    #[error("roster source error: {0}")]
    RosterSource(String),

    /// Question pool failure.
    #[error("question pool error: {0}")]
    QuestionPool(String),

    /// Learned model not loaded or inference failed.
    #[error("model error: {0}")]
    Model(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    /// Short label for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::RosterSource(_) => "roster_source",
            Self::QuestionPool(_) => "question_pool",
            Self::Model(_) => "model",
            Self::Io(_) => "io",
        }
    }
}
