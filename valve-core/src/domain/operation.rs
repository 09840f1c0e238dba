//! Operation domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const MAX_ID_LENGTH: usize = 128;

/// Identifier of a single remote operation
///
/// Generated ids are time-derived (`20250101T120000123Z-1a2b3c4d`) so they sort
/// by creation time, with a random suffix to keep concurrent starts apart.
/// Ids are also used as log file stems, so only `[A-Za-z0-9_-]` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid operation id '{0}'")]
pub struct InvalidOperationId(pub String);

impl OperationId {
    /// Generate a fresh, unique operation id
    pub fn generate() -> Self {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", stamp, &suffix[..8]))
    }

    /// Parse an id received from the outside world
    pub fn parse(raw: &str) -> Result<Self, InvalidOperationId> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_ID_LENGTH
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidOperationId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for OperationId {
    type Err = InvalidOperationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Which remote script an operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Start,
    Stop,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Start => write!(f, "start"),
            OperationKind::Stop => write!(f, "stop"),
        }
    }
}

/// Lifecycle state of an operation
///
/// `Created -> Running -> Completed | Failed`. `Completed` covers every exit
/// code; `Failed` means the remote process could not be run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Created,
    Running,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Created => write!(f, "CREATED"),
            OperationStatus::Running => write!(f, "RUNNING"),
            OperationStatus::Completed => write!(f, "COMPLETED"),
            OperationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Output and exit status of a finished remote process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl OperationResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Message reported to callers when the remote side failed
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("Exit code {}", self.exit_code)
        } else {
            stderr.to_string()
        }
    }
}

/// One logical remote actuation request and its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Stop operations carry no id and leave no log trail
    pub id: Option<OperationId>,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Encoded payload handed to the remote script
    pub payload: Option<String>,
    pub result: Option<OperationResult>,
    pub error: Option<String>,
}

impl Operation {
    pub fn new(id: Option<OperationId>, kind: OperationKind, payload: Option<String>) -> Self {
        Self {
            id,
            kind,
            status: OperationStatus::Created,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            payload,
            result: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        if self.status != OperationStatus::Created {
            return;
        }
        self.status = OperationStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self, result: OperationResult) {
        if self.status.is_terminal() {
            return;
        }
        self.status = OperationStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        if self.status.is_terminal() {
            return;
        }
        self.status = OperationStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }
}
