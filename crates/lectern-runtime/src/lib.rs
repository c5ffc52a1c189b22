//! # lectern-runtime
//!
//! Engagement monitoring and adaptive question delivery.
//!
//! - **Classifier**: `(latency, correctness) → tier`, rules by default, learned model optional
//! - **Engagement store**: append-only event log with "current tier" and summary reads
//! - **Connections**: instructor-side and student-side registries with best-effort fan-out
//! - **Monitor**: fixed-interval tick over a snapshot of every active session's roster
//! - **Roster manager**: session lifecycle (pending → active → ended) and external roster sync
//! - **Dispatch**: consumes monitor decisions, pushes questions to students
//! - **Feedback**: grades responses, records engagement, refreshes dashboards
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on: lectern-core, lectern-settings.
//! Depended on by: lectern-server.

#![deny(unsafe_code)]

pub mod assembly;
pub mod classifier;
pub mod connections;
pub mod dispatch;
pub mod engagement;
pub mod errors;
pub mod feedback;
pub mod metrics;
pub mod monitor;
pub mod roster;

pub use assembly::{Collaborators, LecternRuntime};
pub use classifier::{EngagementClassifier, FeatureContext, ModelClassifier, RulesClassifier};
pub use connections::{
    ClientConnection, ConnectionRegistry, InstructorRegistry, StudentKey, StudentRegistry,
};
pub use dispatch::{DispatchGateway, PushOutcome, Question, QuestionPool, RotatingQuestionPool};
pub use engagement::{EngagementRepository, EngagementStore, MemoryEngagementRepository};
pub use errors::RuntimeError;
pub use feedback::{GradedResponse, ResponseIntake, SubmittedResponse};
pub use monitor::{
    AdaptiveMonitor, DefaultPolicy, DeliveryPolicy, PushDecision, ThrottledPolicy, TickReport,
};
pub use roster::{RosterSource, SessionRosterManager, SessionState, StaticRosterSource};
