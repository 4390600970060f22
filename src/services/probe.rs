use crate::configuration::DeploymentConfig;
use crate::helpers::remote::{RemoteCommand, RemoteError, RemoteExecutor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROBE_COMMAND: &str = "echo connected";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

impl ConnectionStatus {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Checks that the production host is configured, reachable and accepts our
/// key. Never fails: every problem is reported in the returned status.
pub struct ConnectionProbe {
    config: Arc<DeploymentConfig>,
    executor: Arc<dyn RemoteExecutor>,
}

impl ConnectionProbe {
    pub fn new(config: Arc<DeploymentConfig>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { config, executor }
    }

    #[tracing::instrument(name = "Test production connection", skip(self))]
    pub async fn test_connection(&self) -> ConnectionStatus {
        if !self.config.is_production_configured() {
            return ConnectionStatus::failed(
                "Production host is not configured (host and remote path are required)",
            );
        }

        if let Err(err) = self.config.production_credentials().await {
            return ConnectionStatus::failed(format!("Cannot connect to production: {}", err));
        }

        match self.executor.run(&RemoteCommand::read_only(PROBE_COMMAND)).await {
            Ok(_) => ConnectionStatus::ok(format!(
                "Connected to {}@{}",
                self.config.production.ssh_user, self.config.production.host
            )),
            Err(err) => ConnectionStatus::failed(describe_failure(&self.config.production.host, &err)),
        }
    }
}

/// Turn an SSH failure into an operator-facing reason.
fn describe_failure(host: &str, err: &RemoteError) -> String {
    let stderr = err.stderr().to_lowercase();
    let reason = if matches!(err, RemoteError::Timeout { .. })
        || stderr.contains("timed out")
    {
        "connection timed out"
    } else if stderr.contains("host key verification failed")
        || stderr.contains("remote host identification has changed")
    {
        "host key mismatch"
    } else if stderr.contains("permission denied") || stderr.contains("authentication") {
        "authentication failed"
    } else if stderr.contains("could not resolve hostname")
        || stderr.contains("connection refused")
        || stderr.contains("no route to host")
    {
        "host unreachable"
    } else {
        "connection failed"
    };
    format!("Cannot connect to {}: {} ({})", host, reason, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::remote::RecordingExecutor;
    use crate::services::testing::{config, unconfigured};
    use std::time::Duration;

    #[tokio::test]
    async fn test_reachable_host() {
        let executor = Arc::new(RecordingExecutor::new());
        let probe = ConnectionProbe::new(config(), executor.clone());

        let status = probe.test_connection().await;
        assert!(status.success, "{}", status.message);
        assert_eq!(executor.commands(), vec![PROBE_COMMAND]);
        assert!(executor.mutating_invocations().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_host_issues_no_command() {
        let executor = Arc::new(RecordingExecutor::new());
        let probe = ConnectionProbe::new(unconfigured(), executor.clone());

        let status = probe.test_connection().await;
        assert!(!status.success);
        assert!(status.message.contains("not configured"));
        assert!(executor.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_authentication_failure_is_reported() {
        let executor = Arc::new(
            RecordingExecutor::new().fail_on("echo", "deploy@prod: Permission denied (publickey)."),
        );
        let status = ConnectionProbe::new(config(), executor).test_connection().await;
        assert!(!status.success);
        assert!(status.message.contains("authentication failed"), "{}", status.message);
    }

    #[test]
    fn test_failure_classification() {
        let failed = |stderr: &str| RemoteError::CommandFailed {
            code: Some(255),
            stderr: stderr.to_string(),
        };
        assert!(describe_failure("h", &failed("Host key verification failed.")).contains("host key mismatch"));
        assert!(describe_failure("h", &failed("ssh: connect to host h port 22: Connection timed out"))
            .contains("connection timed out"));
        assert!(describe_failure("h", &failed("ssh: Could not resolve hostname h"))
            .contains("host unreachable"));
        assert!(describe_failure(
            "h",
            &RemoteError::Timeout {
                program: "ssh".to_string(),
                after: Duration::from_secs(5)
            }
        )
        .contains("connection timed out"));
        assert!(describe_failure("h", &failed("weird")).contains("connection failed"));
    }
}
