//! # lectern-server
//!
//! Axum HTTP + WebSocket transport for the lectern runtime.
//!
//! - **WebSocket**: `/ws/student/{session_id}/{student_id}` and `/ws/instructor/{instructor_id}`
//! - **API**: session lifecycle, dashboard, engagement history, response submission under `/api`
//! - **Ops**: `/health` and Prometheus `/metrics`
//!
//! ## Crate Position
//!
//! Top of the stack. Depends on: lectern-core, lectern-settings, lectern-runtime.
//! Provides the `lectern` binary.

#![deny(unsafe_code)]

pub mod api;
pub mod metrics;
pub mod server;
pub mod websocket;

pub use server::{AppState, build_router, serve};
