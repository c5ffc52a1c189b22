//! Question-pool collaborator and an in-memory rotating pool.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use lectern_core::messages::OutboundMessage;
use lectern_core::{CollaboratorError, QuestionId, SessionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A question with its answer key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Question identifier.
    pub id: QuestionId,
    /// Prompt text.
    pub text: String,
    /// Optional subject label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Expected answer.
    pub correct_answer: String,
}

impl Question {
    /// Compare an answer to the key, ignoring surrounding whitespace and case.
    pub fn is_correct(&self, answer: &str) -> bool {
        answer.trim().to_lowercase() == self.correct_answer.trim().to_lowercase()
    }

    /// Push frame for `session_id`. The answer key is never included.
    pub fn to_message(&self, session_id: SessionId) -> OutboundMessage {
        OutboundMessage::Question {
            question_id: self.id,
            question_text: self.text.clone(),
            subject: self.subject.clone(),
            session_id,
        }
    }
}

/// Supplies question payloads for pushes and answer keys for grading.
#[async_trait]
pub trait QuestionPool: Send + Sync {
    /// Next question to push in a session.
    async fn next_question(&self, session_id: SessionId) -> Result<Question, CollaboratorError>;

    /// Look up a question by id.
    async fn question(&self, question_id: QuestionId) -> Result<Option<Question>, CollaboratorError>;

    /// Drop any per-session state once `session_id` has ended.
    fn release_session(&self, _session_id: SessionId) {}
}

/// Fixed question list handed out round-robin, with an independent cursor
/// per session. Cursors live until [`QuestionPool::release_session`].
#[derive(Debug)]
pub struct RotatingQuestionPool {
    questions: Vec<Question>,
    cursors: Mutex<HashMap<SessionId, usize>>,
}

impl RotatingQuestionPool {
    /// Pool over `questions`, served in the given order.
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Load a JSON array of questions.
    pub fn from_json_file(path: &Path) -> Result<Self, CollaboratorError> {
        let raw = std::fs::read_to_string(path)?;
        let questions: Vec<Question> = serde_json::from_str(&raw).map_err(|e| {
            CollaboratorError::QuestionPool(format!("invalid question file {}: {e}", path.display()))
        })?;
        Ok(Self::new(questions))
    }

    /// Small built-in set for local runs.
    pub fn demo() -> Self {
        let q = |id: u64, text: &str, subject: &str, answer: &str| Question {
            id: QuestionId(id),
            text: text.into(),
            subject: Some(subject.into()),
            correct_answer: answer.into(),
        };
        Self::new(vec![
            q(1, "What is 7 x 8?", "math", "56"),
            q(2, "What gas do plants absorb for photosynthesis?", "biology", "carbon dioxide"),
            q(3, "What is the chemical symbol for sodium?", "chemistry", "Na"),
            q(4, "How many sides does a hexagon have?", "math", "6"),
            q(5, "Which planet is closest to the sun?", "astronomy", "Mercury"),
        ])
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the pool has no questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Sessions currently holding a cursor.
    pub fn tracked_sessions(&self) -> usize {
        self.cursors.lock().len()
    }
}

#[async_trait]
impl QuestionPool for RotatingQuestionPool {
    async fn next_question(&self, session_id: SessionId) -> Result<Question, CollaboratorError> {
        if self.questions.is_empty() {
            return Err(CollaboratorError::QuestionPool("question pool is empty".into()));
        }
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(session_id).or_insert(0);
        let question = self.questions[*cursor % self.questions.len()].clone();
        *cursor = (*cursor + 1) % self.questions.len();
        Ok(question)
    }

    async fn question(&self, question_id: QuestionId) -> Result<Option<Question>, CollaboratorError> {
        Ok(self.questions.iter().find(|q| q.id == question_id).cloned())
    }

    fn release_session(&self, session_id: SessionId) {
        let _ = self.cursors.lock().remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn grading_ignores_case_and_whitespace() {
        let q = Question {
            id: QuestionId(1),
            text: "Symbol for sodium?".into(),
            subject: None,
            correct_answer: "Na".into(),
        };
        assert!(q.is_correct("  na "));
        assert!(q.is_correct("NA"));
        assert!(!q.is_correct("N a"));
    }

    #[tokio::test]
    async fn rotates_per_session() {
        let pool = RotatingQuestionPool::demo();
        let a1 = pool.next_question(SessionId(1)).await.unwrap();
        let a2 = pool.next_question(SessionId(1)).await.unwrap();
        let b1 = pool.next_question(SessionId(2)).await.unwrap();
        assert_eq!(a1.id, QuestionId(1));
        assert_eq!(a2.id, QuestionId(2));
        assert_eq!(b1.id, QuestionId(1));

        for _ in 0..pool.len() - 2 {
            let _ = pool.next_question(SessionId(1)).await.unwrap();
        }
        assert_eq!(pool.next_question(SessionId(1)).await.unwrap().id, QuestionId(1));
    }

    #[tokio::test]
    async fn released_session_restarts_rotation() {
        let pool = RotatingQuestionPool::demo();
        let _ = pool.next_question(SessionId(1)).await.unwrap();
        let _ = pool.next_question(SessionId(2)).await.unwrap();
        assert_eq!(pool.tracked_sessions(), 2);

        pool.release_session(SessionId(1));
        pool.release_session(SessionId(1));
        assert_eq!(pool.tracked_sessions(), 1);
        assert_eq!(pool.next_question(SessionId(1)).await.unwrap().id, QuestionId(1));
    }

    #[tokio::test]
    async fn empty_pool_fails() {
        let pool = RotatingQuestionPool::new(Vec::new());
        assert_matches!(
            pool.next_question(SessionId(1)).await,
            Err(CollaboratorError::QuestionPool(_))
        );
    }

    #[tokio::test]
    async fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": 10, "text": "2 + 2?", "correctAnswer": "4"}}]"#
        )
        .unwrap();
        let pool = RotatingQuestionPool::from_json_file(file.path()).unwrap();
        let q = pool.question(QuestionId(10)).await.unwrap().unwrap();
        assert_eq!(q.correct_answer, "4");
        assert!(q.subject.is_none());
        assert!(pool.question(QuestionId(11)).await.unwrap().is_none());
    }

    #[test]
    fn malformed_file_is_pool_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert_matches!(
            RotatingQuestionPool::from_json_file(file.path()),
            Err(CollaboratorError::QuestionPool(_))
        );
    }
}
