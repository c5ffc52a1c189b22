//! Session lifecycle and the external roster collaborator.

pub mod manager;
pub mod source;

pub use manager::{SessionRosterManager, SessionState};
pub use source::{RosterSource, StaticRosterSource};
