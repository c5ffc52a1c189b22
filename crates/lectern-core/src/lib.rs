//! # lectern-core
//!
//! Foundation types, branded IDs, wire messages and logging for lectern.
//!
//! This crate provides the shared vocabulary that the other lectern crates depend on:
//!
//! - **Branded IDs**: [`ids::SessionId`], [`ids::StudentId`], [`ids::InstructorId`], [`ids::QuestionId`]
//! - **Engagement**: [`engagement::EngagementTier`], [`engagement::EngagementEvent`], [`engagement::TierSummary`]
//! - **Sessions**: [`session::SessionRecord`] and its monotonic [`session::SessionStatus`]
//! - **Messages**: [`messages::OutboundMessage`] / [`messages::InboundMessage`] JSON frames
//! - **Errors**: [`errors::CollaboratorError`] for storage, roster and question-pool failures
//! - **Logging**: [`logging::init_subscriber`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other lectern crates.

#![deny(unsafe_code)]

pub mod engagement;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod session;

pub use engagement::{EngagementEvent, EngagementTier, NewEngagementEvent, TierSummary};
pub use errors::CollaboratorError;
pub use ids::{InstructorId, QuestionId, SessionId, StudentId};
pub use session::{SessionRecord, SessionStatus};
