//! Core domain types
//!
//! These types describe remote valve operations and the log trail they leave
//! behind. They are shared between the orchestrator (which runs operations)
//! and the client (which triggers and observes them).

pub mod log;
pub mod operation;
