//! In-process [`RemoteExecutor`] that records invocations instead of touching a
//! host. Used by the test suites and for local wiring checks.

use super::{CommandOutput, MirrorRequest, RemoteCommand, RemoteError, RemoteExecutor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(RemoteCommand),
    Upload {
        local: PathBuf,
        remote: String,
        contents: String,
    },
    Mirror(MirrorRequest),
}

impl Invocation {
    pub fn is_mutating(&self) -> bool {
        match self {
            Invocation::Run(command) => command.is_mutating(),
            Invocation::Upload { .. } => true,
            Invocation::Mirror(request) => !request.dry_run,
        }
    }

    /// Text that failure and response patterns are matched against.
    pub fn describe(&self) -> String {
        match self {
            Invocation::Run(command) => command.script().to_string(),
            Invocation::Upload { remote, .. } => format!("upload {}", remote),
            Invocation::Mirror(request) => format!(
                "mirror {} -> {}",
                request.source.display(),
                request.destination
            ),
        }
    }
}

#[derive(Default)]
pub struct RecordingExecutor {
    invocations: Mutex<Vec<Invocation>>,
    failures: Vec<(String, String)>,
    responses: Vec<(String, String)>,
    latency: Option<Duration>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every invocation whose description contains `pattern`, with
    /// `stderr` as the captured error output.
    pub fn fail_on(mut self, pattern: &str, stderr: &str) -> Self {
        self.failures.push((pattern.to_string(), stderr.to_string()));
        self
    }

    /// Answer invocations matching `pattern` with `stdout`.
    pub fn respond_to(mut self, pattern: &str, stdout: &str) -> Self {
        self.responses.push((pattern.to_string(), stdout.to_string()));
        self
    }

    /// Delay every invocation, to keep a deployment in flight during a test.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().clone()
    }

    pub fn mutating_invocations(&self) -> Vec<Invocation> {
        self.lock()
            .iter()
            .filter(|invocation| invocation.is_mutating())
            .cloned()
            .collect()
    }

    /// Scripts of every `run` invocation, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|invocation| match invocation {
                Invocation::Run(command) => Some(command.script().to_string()),
                _ => None,
            })
            .collect()
    }

    /// Contents of every uploaded file, in call order.
    pub fn uploads(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|invocation| match invocation {
                Invocation::Upload { contents, .. } => Some(contents.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Invocation>> {
        // a panicking test thread must not hide the recorded calls
        self.invocations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn record(&self, invocation: Invocation) -> Result<CommandOutput, RemoteError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let description = invocation.describe();
        self.lock().push(invocation);

        if let Some((_, stderr)) = self
            .failures
            .iter()
            .find(|(pattern, _)| description.contains(pattern.as_str()))
        {
            return Err(RemoteError::CommandFailed {
                code: Some(1),
                stderr: stderr.clone(),
            });
        }

        let stdout = self
            .responses
            .iter()
            .find(|(pattern, _)| description.contains(pattern.as_str()))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default();

        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
        })
    }
}

#[async_trait]
impl RemoteExecutor for RecordingExecutor {
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        self.record(Invocation::Run(command.clone())).await
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), RemoteError> {
        let contents = tokio::fs::read_to_string(local_path)
            .await
            .map_err(|source| RemoteError::LocalFile {
                path: local_path.to_path_buf(),
                source,
            })?;
        self.record(Invocation::Upload {
            local: local_path.to_path_buf(),
            remote: remote_path.to_string(),
            contents,
        })
        .await
        .map(|_| ())
    }

    async fn mirror(&self, request: &MirrorRequest) -> Result<CommandOutput, RemoteError> {
        self.record(Invocation::Mirror(request.clone())).await
    }
}
