use crate::configuration::DeploymentConfig;
use crate::forms::FileSyncOptions;
use crate::helpers::remote::{shell_quote, MirrorRequest, RemoteCommand, RemoteExecutor};
use crate::models::{DeploymentResult, RunLog};
use std::sync::Arc;

/// Mirrors code and uploads to production, then rebuilds the application
/// there. A dry run only asks the transfer tool what it would change.
pub struct FileSyncEngine {
    config: Arc<DeploymentConfig>,
    executor: Arc<dyn RemoteExecutor>,
}

impl FileSyncEngine {
    pub fn new(config: Arc<DeploymentConfig>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { config, executor }
    }

    #[tracing::instrument(name = "Sync files to production", skip(self))]
    pub async fn sync_files(&self, options: &FileSyncOptions) -> DeploymentResult {
        let mut log = RunLog::new();
        let dry_run = options.dry_run;
        let production = &self.config.production;
        let development = &self.config.development;

        if dry_run {
            log.detail("Dry run: simulating file sync, production files will not be modified");
        }

        if !self.config.is_production_configured() {
            log.error("File sync failed: production host is not configured");
            return log.finish(false, "File sync failed");
        }

        let code = MirrorRequest {
            source: development.local_path.clone(),
            destination: production.remote_path.clone(),
            excludes: self.config.sync.excludes.clone(),
            dry_run,
        };
        match self.executor.mirror(&code).await {
            Ok(output) => log.detail(format!(
                "{} code to {} ({} changes)",
                if dry_run { "Would sync" } else { "Synced" },
                production.remote_path,
                output.stdout.lines().count()
            )),
            Err(err) => {
                log.error(format!("Code sync failed: {}", err));
                return log.finish(false, "File sync failed");
            }
        }

        if options.include_uploads {
            let uploads = MirrorRequest {
                source: development.uploads_path(),
                destination: production.uploads_path(),
                excludes: vec![],
                dry_run,
            };
            match self.executor.mirror(&uploads).await {
                Ok(output) => log.detail(format!(
                    "{} uploads to {} ({} changes)",
                    if dry_run { "Would sync" } else { "Synced" },
                    production.uploads_path(),
                    output.stdout.lines().count()
                )),
                Err(err) => log.error(format!("Uploads sync failed: {}", err)),
            }
        }

        if dry_run {
            log.detail("Dry run: skipped dependency install, build and permission changes");
            let success = !log.has_errors();
            return log.finish(success, "File sync simulation completed");
        }

        self.rebuild(&mut log).await;
        self.normalize_permissions(&mut log, options.include_uploads).await;

        let success = !log.has_errors();
        let message = if success {
            "File sync completed successfully"
        } else {
            "File sync completed with errors"
        };
        log.finish(success, message)
    }

    async fn rebuild(&self, log: &mut RunLog) {
        let app_dir = shell_quote(&self.config.production.remote_path);
        let sync = &self.config.sync;

        let install = RemoteCommand::mutating(format!("cd {} && {}", app_dir, sync.install_command));
        if let Err(err) = self.executor.run(&install).await {
            log.error(format!("Dependency install failed: {}", err));
            return;
        }
        log.detail("Installed production dependencies");

        let build = RemoteCommand::mutating(format!("cd {} && {}", app_dir, sync.build_command));
        match self.executor.run(&build).await {
            Ok(_) => log.detail("Built application"),
            Err(err) => log.error(format!("Build failed: {}", err)),
        }
    }

    /// Service account owns everything; nothing is world-writable.
    async fn normalize_permissions(&self, log: &mut RunLog, include_uploads: bool) {
        let production = &self.config.production;
        let owner = shell_quote(&format!("{0}:{0}", production.service_user));
        let app_dir = shell_quote(&production.remote_path);

        let app = RemoteCommand::mutating(format!(
            "chown -R {owner} {dir} && chmod -R u+rwX,g+rX,o-w {dir}",
            owner = owner,
            dir = app_dir
        ));
        match self.executor.run(&app).await {
            Ok(_) => log.detail("Normalized application permissions"),
            Err(err) => log.error(format!("Permission update failed: {}", err)),
        }

        if include_uploads {
            let uploads_dir = shell_quote(&production.uploads_path());
            let uploads = RemoteCommand::mutating(format!(
                "chown -R {owner} {dir} && chmod -R u+rwX,g+rwX,o-w {dir}",
                owner = owner,
                dir = uploads_dir
            ));
            match self.executor.run(&uploads).await {
                Ok(_) => log.detail("Normalized uploads permissions"),
                Err(err) => log.error(format!("Uploads permission update failed: {}", err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::remote::{Invocation, RecordingExecutor};
    use crate::services::testing::config;

    fn options(include_uploads: bool, dry_run: bool) -> FileSyncOptions {
        FileSyncOptions {
            include_uploads,
            dry_run,
        }
    }

    #[tokio::test]
    async fn test_full_file_sync_order() {
        let executor = Arc::new(RecordingExecutor::new());
        let engine = FileSyncEngine::new(config(), executor.clone());

        let result = engine.sync_files(&options(true, false)).await;
        assert!(result.success(), "{:?}", result.errors());

        let invocations = executor.invocations();
        assert_eq!(invocations.len(), 6);
        assert!(matches!(&invocations[0], Invocation::Mirror(r) if r.destination == "/var/www/site"));
        assert!(matches!(&invocations[1], Invocation::Mirror(r) if r.destination == "/var/www/site/public/uploads"));
        let commands = executor.commands();
        assert!(commands[0].ends_with("npm ci --omit=dev"));
        assert!(commands[1].ends_with("npm run build"));
        assert!(commands[2].contains("chmod -R u+rwX,g+rX,o-w"));
        assert!(commands[3].contains("chmod -R u+rwX,g+rwX,o-w '/var/www/site/public/uploads'"));
        assert!(commands.iter().all(|c| !c.contains("o+w") && !c.contains("777")));
    }

    #[tokio::test]
    async fn test_code_mirror_excludes_secrets_and_caches() {
        let executor = Arc::new(RecordingExecutor::new());
        FileSyncEngine::new(config(), executor.clone())
            .sync_files(&options(false, false))
            .await;

        match &executor.invocations()[0] {
            Invocation::Mirror(request) => {
                for pattern in ["node_modules", ".git", "*.log", ".env"] {
                    assert!(request.excludes.contains(&pattern.to_string()), "{}", pattern);
                }
            }
            other => panic!("unexpected invocation {:?}", other),
        }
        // no uploads mirror, no uploads permission change
        assert_eq!(executor.invocations().len(), 4);
    }

    #[tokio::test]
    async fn test_dry_run_never_mutates() {
        let executor = Arc::new(RecordingExecutor::new());
        let result = FileSyncEngine::new(config(), executor.clone())
            .sync_files(&options(true, true))
            .await;

        assert!(result.success());
        assert!(executor.mutating_invocations().is_empty());
        assert!(executor.commands().is_empty());
        assert_eq!(executor.invocations().len(), 2);
        assert!(result.details()[0].starts_with("Dry run"));
    }

    #[tokio::test]
    async fn test_failed_install_skips_build() {
        let executor = Arc::new(RecordingExecutor::new().fail_on("npm ci", "npm ERR! network"));
        let result = FileSyncEngine::new(config(), executor.clone())
            .sync_files(&options(false, false))
            .await;

        assert!(!result.success());
        assert!(result.errors()[0].contains("Dependency install failed"));
        assert!(!executor.commands().iter().any(|c| c.contains("npm run build")));
        // permissions are still normalized after a failed install
        assert!(executor.commands().iter().any(|c| c.contains("chown")));
    }

    #[tokio::test]
    async fn test_failed_code_mirror_stops_file_steps() {
        let executor = Arc::new(RecordingExecutor::new().fail_on("mirror", "rsync: connection unexpectedly closed"));
        let result = FileSyncEngine::new(config(), executor.clone())
            .sync_files(&options(true, false))
            .await;

        assert!(!result.success());
        assert_eq!(executor.invocations().len(), 1);
        assert!(result.errors()[0].starts_with("Code sync failed"));
    }
}
