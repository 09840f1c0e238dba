//! Operation Service
//!
//! Drives the lifecycle of remote valve operations:
//! - assigns every start operation a fresh id
//! - runs the remote script through the executor
//! - persists and publishes each output line in the order it was produced
//! - keeps a snapshot of recent operations for status queries

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info};
use valve_core::domain::operation::{Operation, OperationId, OperationKind, OperationResult};

use super::broadcaster::Broadcaster;
use super::executor::{ExecutorError, OutputChunk, RemoteExecutor};
use super::log_store::FileLogStore;

/// How many operations are remembered for status queries
const MAX_TRACKED_OPERATIONS: usize = 1024;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("operation task aborted: {0}")]
    Task(#[from] JoinError),
}

/// A start operation that ran to completion, whatever its exit code
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub operation_id: OperationId,
    pub result: OperationResult,
}

/// Cloning is cheap; clones share the executor, stores and registry
#[derive(Clone)]
pub struct OperationService {
    executor: Arc<dyn RemoteExecutor>,
    log_store: Arc<FileLogStore>,
    broadcaster: Arc<Broadcaster>,
    operations: Arc<RwLock<BTreeMap<OperationId, Operation>>>,
}

impl OperationService {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        log_store: Arc<FileLogStore>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            executor,
            log_store,
            broadcaster,
            operations: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Run the start script with `payload` under a new operation id
    ///
    /// Every output line is appended to the operation's log and published on
    /// its topic before this returns. A spawn failure or timeout marks the
    /// operation failed and is returned as an error; a non-zero exit code is
    /// a completed operation.
    ///
    /// The remote script runs on its own task: dropping the returned future
    /// (a client hanging up) neither kills it nor loses its output.
    pub async fn start(&self, payload: Option<String>) -> Result<OperationOutcome, OperationError> {
        let id = OperationId::generate();
        self.track(Operation::new(
            Some(id.clone()),
            OperationKind::Start,
            payload.clone(),
        ));

        self.update(&id, Operation::mark_running);
        info!(operation_id = %id, "Operation running");

        let service = self.clone();
        tokio::spawn(async move { service.run_start(id, payload).await }).await?
    }

    async fn run_start(
        &self,
        id: OperationId,
        payload: Option<String>,
    ) -> Result<OperationOutcome, OperationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_output(
            rx,
            id.clone(),
            self.log_store.clone(),
            self.broadcaster.clone(),
        ));

        let outcome = self
            .executor
            .execute(OperationKind::Start, payload.as_deref(), Some(&id), Some(tx))
            .await;

        // the executor has dropped its sender; wait for the backlog to drain
        let forwarded = forwarder.await.unwrap_or_default();

        if let Err(e @ ExecutorError::TimedOut(_)) = &outcome {
            let note = e.to_string();
            self.log_store.append_or_warn(&id, &note).await;
            self.broadcaster.publish(id.as_str(), &note);
        }
        self.log_store.release(&id);

        match outcome {
            Ok(result) => {
                info!(
                    operation_id = %id,
                    exit_code = result.exit_code,
                    lines = forwarded,
                    "Operation completed"
                );
                self.update(&id, |op| op.mark_completed(result.clone()));
                Ok(OperationOutcome {
                    operation_id: id,
                    result,
                })
            }
            Err(e) => {
                error!(operation_id = %id, "Operation failed: {}", e);
                self.update(&id, |op| op.mark_failed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Run the stop script
    ///
    /// Stop operations get no id, no registry entry and leave no log trail.
    /// Like start, the script is not cancelled if the caller goes away.
    pub async fn stop(&self) -> Result<OperationResult, OperationError> {
        info!("Stop operation running");

        let executor = self.executor.clone();
        let outcome = tokio::spawn(async move {
            executor
                .execute(OperationKind::Stop, None, None, None)
                .await
        })
        .await?;

        match outcome {
            Ok(result) => {
                info!(exit_code = result.exit_code, "Stop operation completed");
                Ok(result)
            }
            Err(e) => {
                error!("Stop operation failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Snapshot of an operation started by this process
    pub fn get(&self, id: &OperationId) -> Option<Operation> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Snapshots of every tracked operation, newest first
    pub fn list(&self) -> Vec<Operation> {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .rev()
            .cloned()
            .collect()
    }

    fn track(&self, operation: Operation) {
        let Some(id) = operation.id.clone() else {
            return;
        };

        let mut operations = self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        operations.insert(id, operation);

        // ids sort by creation time, so the first finished entry is the oldest one
        while operations.len() > MAX_TRACKED_OPERATIONS {
            let oldest = operations
                .iter()
                .find(|(_, op)| op.status.is_terminal())
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    operations.remove(&id);
                }
                None => break,
            }
        }
    }

    fn update(&self, id: &OperationId, apply: impl FnOnce(&mut Operation)) {
        let mut operations = self
            .operations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(operation) = operations.get_mut(id) {
            apply(operation);
        }
    }
}

/// Persist then publish each line, strictly in arrival order
async fn forward_output(
    mut rx: mpsc::UnboundedReceiver<OutputChunk>,
    operation_id: OperationId,
    log_store: Arc<FileLogStore>,
    broadcaster: Arc<Broadcaster>,
) -> usize {
    let mut forwarded = 0;
    while let Some(chunk) = rx.recv().await {
        log_store.append_or_warn(&operation_id, &chunk.line).await;
        broadcaster.publish(operation_id.as_str(), &chunk.line);
        forwarded += 1;
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::service::SshExecutor;
    use crate::service::broadcaster::Subscription;
    use crate::service::executor::{OutputSender, OutputStream};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use valve_core::domain::log::LogLine;
    use valve_core::domain::operation::OperationStatus;

    enum Script {
        Exit {
            lines: Vec<(OutputStream, &'static str)>,
            exit_code: i32,
        },
        SpawnFailure,
        Timeout,
    }

    #[derive(Debug, Clone)]
    struct Call {
        kind: OperationKind,
        payload: Option<String>,
        operation_id: Option<OperationId>,
    }

    /// Plays back a scripted run and watches the operation's topic while doing so
    struct ScriptedExecutor {
        script: Script,
        broadcaster: Arc<Broadcaster>,
        calls: Mutex<Vec<Call>>,
        watcher: Mutex<Option<Subscription>>,
    }

    impl ScriptedExecutor {
        fn new(script: Script, broadcaster: Arc<Broadcaster>) -> Arc<Self> {
            Arc::new(Self {
                script,
                broadcaster,
                calls: Mutex::new(Vec::new()),
                watcher: Mutex::new(None),
            })
        }

        fn published(&self) -> Vec<String> {
            let mut watcher = self.watcher.lock().unwrap();
            let mut messages = Vec::new();
            if let Some(sub) = watcher.as_mut() {
                while let Some(message) = sub.try_recv() {
                    messages.push(message);
                }
            }
            messages
        }
    }

    #[async_trait]
    impl RemoteExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            kind: OperationKind,
            payload: Option<&str>,
            operation_id: Option<&OperationId>,
            output: Option<OutputSender>,
        ) -> Result<OperationResult, ExecutorError> {
            self.calls.lock().unwrap().push(Call {
                kind,
                payload: payload.map(str::to_string),
                operation_id: operation_id.cloned(),
            });

            if let Some(id) = operation_id {
                *self.watcher.lock().unwrap() = Some(self.broadcaster.subscribe(id.as_str()));
            }

            match &self.script {
                Script::Exit { lines, exit_code } => {
                    let mut stdout = String::new();
                    let mut stderr = String::new();
                    for (stream, line) in lines {
                        match stream {
                            OutputStream::Stdout => stdout.push_str(&format!("{}\n", line)),
                            OutputStream::Stderr => stderr.push_str(&format!("{}\n", line)),
                        }
                        if let Some(tx) = &output {
                            tx.send(OutputChunk {
                                stream: *stream,
                                line: line.to_string(),
                            })
                            .unwrap();
                        }
                    }
                    Ok(OperationResult {
                        exit_code: *exit_code,
                        stdout,
                        stderr,
                    })
                }
                Script::SpawnFailure => Err(ExecutorError::Spawn {
                    program: "ssh".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                }),
                Script::Timeout => Err(ExecutorError::TimedOut(Duration::from_secs(30))),
            }
        }
    }

    fn service(
        script: Script,
        dir: &std::path::Path,
    ) -> (OperationService, Arc<ScriptedExecutor>, Arc<FileLogStore>) {
        let broadcaster = Broadcaster::new();
        let executor = ScriptedExecutor::new(script, broadcaster.clone());
        let log_store = Arc::new(FileLogStore::new(dir));
        let service = OperationService::new(executor.clone(), log_store.clone(), broadcaster);
        (service, executor, log_store)
    }

    fn messages(lines: &[String]) -> Vec<&str> {
        lines.iter().map(|l| LogLine::parse(l).unwrap().1).collect()
    }

    #[tokio::test]
    async fn test_start_persists_and_publishes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (service, executor, log_store) = service(
            Script::Exit {
                lines: vec![
                    (OutputStream::Stdout, "pin 1 opened"),
                    (OutputStream::Stderr, "warning: slow relay"),
                    (OutputStream::Stdout, "OK"),
                ],
                exit_code: 0,
            },
            dir.path(),
        );

        let outcome = service.start(Some("e30=".to_string())).await.unwrap();

        assert_eq!(outcome.result.exit_code, 0);
        assert_eq!(outcome.result.stdout, "pin 1 opened\nOK\n");

        let logged = log_store.read_all(&outcome.operation_id).await;
        assert_eq!(
            messages(&logged),
            vec!["pin 1 opened", "warning: slow relay", "OK"]
        );
        assert_eq!(
            executor.published(),
            vec!["pin 1 opened", "warning: slow relay", "OK"]
        );

        let call = executor.calls.lock().unwrap()[0].clone();
        assert_eq!(call.kind, OperationKind::Start);
        assert_eq!(call.payload.as_deref(), Some("e30="));
        assert_eq!(call.operation_id, Some(outcome.operation_id.clone()));

        let op = service.get(&outcome.operation_id).unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_structured_result() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _, _) = service(
            Script::Exit {
                lines: vec![(OutputStream::Stderr, "Error: bad pin")],
                exit_code: 1,
            },
            dir.path(),
        );

        let outcome = service.start(None).await.unwrap();
        assert_eq!(outcome.result.exit_code, 1);
        assert_eq!(outcome.result.failure_message(), "Error: bad pin");

        let op = service.get(&outcome.operation_id).unwrap();
        assert_eq!(op.status, OperationStatus::Completed);
        assert_eq!(op.result.unwrap().exit_code, 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_writes_and_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (service, executor, _) = service(Script::SpawnFailure, dir.path());

        let err = service.start(None).await.unwrap_err();
        assert!(matches!(
            err,
            OperationError::Executor(ExecutorError::Spawn { .. })
        ));

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(executor.published().is_empty());

        let id = executor.calls.lock().unwrap()[0]
            .operation_id
            .clone()
            .unwrap();
        let op = service.get(&id).unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert!(op.error.unwrap().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn test_timeout_is_recorded_in_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let (service, executor, log_store) = service(Script::Timeout, dir.path());

        let err = service.start(None).await.unwrap_err();
        assert!(matches!(
            err,
            OperationError::Executor(ExecutorError::TimedOut(_))
        ));

        let id = executor.calls.lock().unwrap()[0]
            .operation_id
            .clone()
            .unwrap();
        let logged = log_store.read_all(&id).await;
        assert_eq!(
            messages(&logged),
            vec!["remote operation timed out after 30s"]
        );
        assert_eq!(service.get(&id).unwrap().status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_stop_has_no_id_and_no_log_trail() {
        let dir = tempfile::tempdir().unwrap();
        let (service, executor, _) = service(
            Script::Exit {
                lines: vec![(OutputStream::Stdout, "Process 42 terminated.")],
                exit_code: 0,
            },
            dir.path(),
        );

        let result = service.stop().await.unwrap();
        assert_eq!(result.stdout, "Process 42 terminated.\n");

        let call = executor.calls.lock().unwrap()[0].clone();
        assert_eq!(call.kind, OperationKind::Stop);
        assert!(call.payload.is_none());
        assert!(call.operation_id.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_starts_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _, _) = service(
            Script::Exit {
                lines: vec![(OutputStream::Stdout, "OK")],
                exit_code: 0,
            },
            dir.path(),
        );

        let (a, b) = tokio::join!(service.start(None), service.start(None));
        assert_ne!(a.unwrap().operation_id, b.unwrap().operation_id);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_cancel_the_operation() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();

        let mut config = Config::new("pi", "garden.local", "/ctl.py", "/stop.py");
        config.ssh_binary = "sh".to_string();
        config.ssh_options = vec![
            "-c".to_string(),
            format!(
                "echo started; sleep 0.5; echo done; touch '{}'",
                marker.display()
            ),
        ];

        let log_store = Arc::new(FileLogStore::new(&logs));
        let service = OperationService::new(
            Arc::new(SshExecutor::new(&config)),
            log_store.clone(),
            Broadcaster::new(),
        );

        // the caller gives up long before the script is done
        let abandoned = tokio::time::timeout(Duration::from_millis(150), service.start(None)).await;
        assert!(abandoned.is_err());

        let operation = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(op) = service.list().into_iter().find(|op| op.status.is_terminal()) {
                    return op;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(operation.status, OperationStatus::Completed);
        assert!(marker.exists());

        let logged = log_store.read_all(operation.id.as_ref().unwrap()).await;
        assert_eq!(messages(&logged), vec!["started", "done"]);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _, _) = service(
            Script::Exit {
                lines: vec![],
                exit_code: 0,
            },
            dir.path(),
        );

        let first = service.start(None).await.unwrap().operation_id;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = service.start(None).await.unwrap().operation_id;

        let ids: Vec<_> = service.list().into_iter().filter_map(|op| op.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn test_unknown_operation() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _, _) = service(Script::SpawnFailure, dir.path());
        assert!(service.get(&OperationId::generate()).is_none());
    }
}
