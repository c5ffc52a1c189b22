//! Live duplex connections for instructors and students.

pub mod connection;
pub mod registry;

pub use connection::{ClientConnection, SendFailure};
pub use registry::{
    ConnectionRegistry, DEFAULT_MAX_TOTAL_DROPS, InstructorRegistry, StudentKey, StudentRegistry,
};
