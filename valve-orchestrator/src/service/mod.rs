//! Service Module
//!
//! Business logic layer for the orchestrator.
//! The operation service coordinates the remote executor, the log store and
//! the broadcaster; none of them know about HTTP.

pub mod broadcaster;
pub mod executor;
pub mod log_store;
pub mod operation;

pub use broadcaster::{Broadcaster, Subscription};
pub use executor::{RemoteExecutor, SshExecutor};
pub use log_store::FileLogStore;
pub use operation::{OperationError, OperationOutcome, OperationService};
