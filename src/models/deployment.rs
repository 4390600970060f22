use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Outcome of one sync or deployment run.
///
/// Produced by [`RunLog::finish`]; after that the details and errors can only
/// be read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    success: bool,
    message: String,
    details: Vec<String>,
    errors: Vec<String>,
    timestamp: DateTime<Utc>,
    duration_millis: u64,
}

impl DeploymentResult {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[String] {
        &self.details
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn duration_millis(&self) -> u64 {
        self.duration_millis
    }
}

/// Append-only accumulator for a run in progress.
#[derive(Debug)]
pub struct RunLog {
    started: Instant,
    timestamp: DateTime<Utc>,
    details: Vec<String>,
    errors: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            timestamp: Utc::now(),
            details: vec![],
            errors: vec![],
        }
    }

    pub fn detail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.details.push(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.errors.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Carry over the lines of a finished sub-run.
    pub fn absorb(&mut self, result: &DeploymentResult) {
        self.details.extend(result.details.iter().cloned());
        self.errors.extend(result.errors.iter().cloned());
    }

    pub fn finish(self, success: bool, message: impl Into<String>) -> DeploymentResult {
        DeploymentResult {
            success,
            message: message.into(),
            details: self.details,
            errors: self.errors,
            timestamp: self.timestamp,
            duration_millis: self.started.elapsed().as_millis() as u64,
        }
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Running,
    Success,
    Failed,
}

/// Lifecycle entry for one tracked deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: String,
    pub status: DeploymentStatus,
    pub triggered_by: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<DeploymentResult>,
}

impl DeploymentRecord {
    pub fn start(triggered_by: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: DeploymentStatus::Running,
            triggered_by: triggered_by.into(),
            started_at: Utc::now(),
            finished_at: None,
            result: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == DeploymentStatus::Running
    }

    /// Move a running record to its terminal state. Returns `false` and leaves
    /// the record untouched if it already finished.
    pub fn finish(&mut self, result: DeploymentResult) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = if result.success() {
            DeploymentStatus::Success
        } else {
            DeploymentStatus::Failed
        };
        self.finished_at = Some(Utc::now());
        self.result = Some(result);
        true
    }
}
