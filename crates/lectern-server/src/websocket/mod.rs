//! WebSocket transport for both connection registries.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | Writer task (queued frames + heartbeat), reader loop, ping/pong |
//! | `student` | `/ws/student/{session_id}/{student_id}`: question pushes in, responses out |
//! | `instructor` | `/ws/instructor/{instructor_id}`: engagement and dashboard updates |
//!
//! ## Data Flow
//!
//! Registry `send` → connection buffer → writer → socket.
//! Socket → reader → `ResponseIntake` → engagement log → instructor registry.

pub mod connection;
pub mod instructor;
pub mod student;
