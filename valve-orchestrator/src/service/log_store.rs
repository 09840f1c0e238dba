//! Operation log store
//!
//! Append-only, one text file per operation under the configured log
//! directory. Every line is `[<timestamp>] <message>`.
//!
//! Logs are best-effort: the `*_or_warn` helpers and `read_all` never fail,
//! they report problems through tracing and carry on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use valve_core::domain::log::LogLine;
use valve_core::domain::operation::OperationId;

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("failed to write log for operation {operation_id}: {source}")]
    Write {
        operation_id: OperationId,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read log for operation {operation_id}: {source}")]
    Read {
        operation_id: OperationId,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LogStoreError>;

type WriteLock = Arc<tokio::sync::Mutex<()>>;

/// File-backed store of per-operation log lines
pub struct FileLogStore {
    dir: PathBuf,
    /// One lock per operation: appends to the same file never interleave
    /// partial lines, appends to different files never wait on each other
    write_locks: Mutex<HashMap<OperationId, WriteLock>>,
}

impl FileLogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the log directory if it does not exist yet
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    fn path_for(&self, operation_id: &OperationId) -> PathBuf {
        self.dir.join(format!("{}.log", operation_id))
    }

    /// Append one timestamped line to the operation's log
    ///
    /// The file is created on first write.
    pub async fn append(&self, operation_id: &OperationId, message: &str) -> Result<()> {
        let mut line = LogLine::format(Utc::now(), message);
        line.push('\n');

        let write_err = |source| LogStoreError::Write {
            operation_id: operation_id.clone(),
            source,
        };

        let lock = self.write_lock(operation_id);
        let _guard = lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(operation_id))
            .await
            .map_err(write_err)?;

        file.write_all(line.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        Ok(())
    }

    /// Forget the write lock of a finished operation
    ///
    /// A later append simply takes a fresh lock.
    pub fn release(&self, operation_id: &OperationId) {
        self.write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(operation_id);
    }

    fn write_lock(&self, operation_id: &OperationId) -> WriteLock {
        self.write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation_id.clone())
            .or_default()
            .clone()
    }

    /// Append, reporting failures instead of returning them
    pub async fn append_or_warn(&self, operation_id: &OperationId, message: &str) {
        if let Err(e) = self.append(operation_id, message).await {
            tracing::warn!("{}", e);
        }
    }

    /// Every line logged for the operation, oldest first
    ///
    /// Unknown operations and unreadable files both yield an empty list.
    pub async fn read_all(&self, operation_id: &OperationId) -> Vec<String> {
        match self.try_read_all(operation_id).await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!("{}", e);
                Vec::new()
            }
        }
    }

    async fn try_read_all(&self, operation_id: &OperationId) -> Result<Vec<String>> {
        let data = match tokio::fs::read(self.path_for(operation_id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LogStoreError::Read {
                    operation_id: operation_id.clone(),
                    source,
                });
            }
        };

        Ok(String::from_utf8_lossy(&data)
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
