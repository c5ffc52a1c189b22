//! Engagement log: persistence collaborator and the store the monitor reads.

pub mod repository;
pub mod store;

pub use repository::{EngagementRepository, MemoryEngagementRepository};
pub use store::EngagementStore;
