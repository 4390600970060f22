//! Remote execution against the production host
//!
//! Everything that touches production goes through [`RemoteExecutor`]: shell
//! commands, single-file uploads and delta mirroring of directory trees.
//! The orchestration core never imposes a timeout of its own; a transport may
//! apply one as caller policy (see [`OpenSshExecutor`]).

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod openssh;
pub mod recording;

pub use openssh::{OpenSshExecutor, SshTarget};
pub use recording::{Invocation, RecordingExecutor};

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {} seconds", .after.as_secs())]
    Timeout { program: String, after: Duration },
    #[error("command exited with status {}: {}", .code.map_or("unknown".to_string(), |c| c.to_string()), .stderr.trim())]
    CommandFailed { code: Option<i32>, stderr: String },
    #[error("failed to read {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    /// Captured stderr of a failed command, empty for other failures.
    pub fn stderr(&self) -> &str {
        match self {
            Self::CommandFailed { stderr, .. } => stderr,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A shell script to run on the production host.
///
/// Secret environment values are exported in front of the script when it is
/// rendered for the transport and are never part of `Debug`/`Display` output.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    script: String,
    env: Vec<(String, String)>,
    mutating: bool,
}

impl RemoteCommand {
    pub fn read_only(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            env: vec![],
            mutating: false,
        }
    }

    /// A command that changes production state (database, files, permissions).
    pub fn mutating(script: impl Into<String>) -> Self {
        Self {
            mutating: true,
            ..Self::read_only(script)
        }
    }

    pub fn with_secret_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn is_mutating(&self) -> bool {
        self.mutating
    }

    pub fn has_env(&self, key: &str) -> bool {
        self.env.iter().any(|(k, _)| k == key)
    }

    /// Full command line as handed to the remote shell.
    pub(crate) fn render(&self) -> String {
        if self.env.is_empty() {
            return self.script.clone();
        }
        let exports = self
            .env
            .iter()
            .map(|(key, value)| format!("export {}={};", key, shell_quote(value)))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {}", exports, self.script)
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.script)
    }
}

impl fmt::Debug for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("RemoteCommand")
            .field("script", &self.script)
            .field("env", &env_keys)
            .field("mutating", &self.mutating)
            .finish()
    }
}

/// Delta transfer of a local directory tree into a remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRequest {
    pub source: PathBuf,
    pub destination: String,
    pub excludes: Vec<String>,
    /// Ask the transfer tool to only report what it would change.
    pub dry_run: bool,
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a shell command on the production host. Non-zero exit codes are
    /// returned as [`RemoteError::CommandFailed`].
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError>;

    /// Copy a single local file to `remote_path` on the production host.
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), RemoteError>;

    /// Mirror a directory tree to the production host.
    async fn mirror(&self, request: &MirrorRequest) -> Result<CommandOutput, RemoteError>;
}

/// Quote a value for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'\''"#))
}
