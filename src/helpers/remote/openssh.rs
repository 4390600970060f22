//! OpenSSH/rsync transport
//!
//! Shells out to the system `ssh`, `scp` and `rsync` binaries. Authentication
//! is key based and non-interactive (`BatchMode=yes`), so a missing key or an
//! unknown host key fails fast instead of waiting on a prompt.

use super::{shell_quote, CommandOutput, MirrorRequest, RemoteCommand, RemoteError, RemoteExecutor};
use crate::configuration::{ProductionSettings, SyncSettings};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
}

impl SshTarget {
    fn destination(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }
}

pub struct OpenSshExecutor {
    target: SshTarget,
    connect_timeout: Duration,
    /// Upper bound for a single process, imposed by whoever configures the
    /// transport. `None` lets long builds and dumps run as long as they need.
    command_timeout: Option<Duration>,
}

impl OpenSshExecutor {
    pub fn new(target: SshTarget, connect_timeout: Duration, command_timeout: Option<Duration>) -> Self {
        Self {
            target,
            connect_timeout,
            command_timeout,
        }
    }

    pub fn from_settings(production: &ProductionSettings, sync: &SyncSettings) -> Self {
        let target = SshTarget {
            host: production.host.clone(),
            user: production.ssh_user.clone(),
            port: production.ssh_port,
            identity_file: production.ssh_key_path.clone(),
        };
        Self::new(
            target,
            Duration::from_secs(sync.connect_timeout_secs),
            sync.command_timeout_secs.map(Duration::from_secs),
        )
    }

    fn common_options(&self) -> Vec<String> {
        let mut options = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
        ];
        if let Some(key) = &self.target.identity_file {
            options.push("-i".to_string());
            options.push(key.display().to_string());
        }
        options
    }

    fn ssh_args(&self, command: &RemoteCommand) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.target.port.to_string()];
        args.extend(self.common_options());
        args.push(self.target.destination());
        args.push(command.render());
        args
    }

    fn scp_args(&self, local_path: &Path, remote_path: &str) -> Vec<String> {
        let mut args = vec!["-P".to_string(), self.target.port.to_string()];
        args.extend(self.common_options());
        args.push(local_path.display().to_string());
        args.push(format!("{}:{}", self.target.destination(), remote_path));
        args
    }

    /// Remote shell handed to rsync via `-e`.
    fn rsync_transport(&self) -> String {
        let mut transport = format!(
            "ssh -p {} -o BatchMode=yes -o ConnectTimeout={}",
            self.target.port,
            self.connect_timeout.as_secs()
        );
        if let Some(key) = &self.target.identity_file {
            transport.push_str(" -i ");
            transport.push_str(&shell_quote(&key.display().to_string()));
        }
        transport
    }

    fn rsync_args(&self, request: &MirrorRequest) -> Vec<String> {
        let mut args = vec!["-az".to_string(), "--itemize-changes".to_string()];
        if request.dry_run {
            args.push("--dry-run".to_string());
        }
        for pattern in &request.excludes {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
        args.push("-e".to_string());
        args.push(self.rsync_transport());
        // trailing slashes: copy the contents, not the directory itself
        args.push(format!("{}/", request.source.display().to_string().trim_end_matches('/')));
        args.push(format!(
            "{}:{}/",
            self.target.destination(),
            request.destination.trim_end_matches('/')
        ));
        args
    }

    async fn execute(&self, program: &str, args: Vec<String>) -> Result<CommandOutput, RemoteError> {
        let mut command = Command::new(program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.command_timeout {
            Some(limit) => timeout(limit, command.output())
                .await
                .map_err(|_| RemoteError::Timeout {
                    program: program.to_string(),
                    after: limit,
                })?,
            None => command.output().await,
        }
        .map_err(|source| RemoteError::Spawn {
            program: program.to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::warn!(
                program,
                code = ?output.status.code(),
                stderr = %stderr.trim(),
                "Remote command failed"
            );
            return Err(RemoteError::CommandFailed {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

#[async_trait]
impl RemoteExecutor for OpenSshExecutor {
    #[tracing::instrument(name = "Run remote command", skip(self), fields(host = %self.target.host))]
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput, RemoteError> {
        self.execute("ssh", self.ssh_args(command)).await
    }

    #[tracing::instrument(name = "Upload file", skip(self), fields(host = %self.target.host))]
    async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<(), RemoteError> {
        self.execute("scp", self.scp_args(local_path, remote_path))
            .await
            .map(|_| ())
    }

    #[tracing::instrument(name = "Mirror directory", skip(self), fields(host = %self.target.host))]
    async fn mirror(&self, request: &MirrorRequest) -> Result<CommandOutput, RemoteError> {
        let output = self.execute("rsync", self.rsync_args(request)).await?;
        tracing::info!(
            changed = output.stdout.lines().count(),
            dry_run = request.dry_run,
            "Mirror finished"
        );
        Ok(output)
    }
}
