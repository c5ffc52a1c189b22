//! Question delivery: the question-pool collaborator and the gateway that
//! turns monitor decisions into student frames.

pub mod gateway;
pub mod questions;

pub use gateway::{DispatchGateway, PushOutcome};
pub use questions::{Question, QuestionPool, RotatingQuestionPool};
