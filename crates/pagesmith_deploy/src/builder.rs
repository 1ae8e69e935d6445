//! External project builds.
//!
//! Runs the configured build toolchain against a materialized project
//! directory, bounded by a timeout. A build succeeds only if every step
//! exits cleanly and a non-empty `dist/` directory exists afterward.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{error, info};

use crate::error::{DeployError, DeployResult};

/// Build toolchain configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Commands run in order inside the project directory.
    pub steps: Vec<Vec<String>>,
    /// Overall timeout per step.
    pub timeout: Duration,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            steps: vec![
                vec!["npm".into(), "install".into()],
                vec!["npm".into(), "run".into(), "build".into()],
            ],
            timeout: Duration::from_secs(180),
        }
    }
}

/// Runs the build toolchain for project-layout targets.
#[derive(Clone)]
pub struct ProjectBuilder {
    config: BuildConfig,
}

impl ProjectBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Build `project_dir` and return the `dist/` output directory.
    pub async fn build(&self, project_dir: &Path) -> DeployResult<PathBuf> {
        if !project_dir.is_dir() {
            return Err(DeployError::SourceMissing(project_dir.to_path_buf()));
        }

        for step in &self.config.steps {
            self.run_step(project_dir, step).await?;
        }

        let dist = project_dir.join("dist");
        if !dir_is_nonempty(&dist) {
            return Err(DeployError::BuildFailed(format!(
                "no build output at {}",
                dist.display()
            )));
        }

        info!(project_dir = %project_dir.display(), "project build succeeded");
        Ok(dist)
    }

    async fn run_step(&self, project_dir: &Path, step: &[String]) -> DeployResult<()> {
        let (program, args) = step
            .split_first()
            .ok_or_else(|| DeployError::BuildFailed("empty build step".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(project_dir)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.timeout, command.output())
            .await
            .map_err(|_| DeployError::BuildTimeout(self.config.timeout.as_secs()))?
            .map_err(|e| DeployError::BuildFailed(format!("failed to spawn {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("unknown error");
            error!(
                step = %step.join(" "),
                code = output.status.code().unwrap_or(-1),
                "build step failed: {}",
                detail
            );
            return Err(DeployError::BuildFailed(format!(
                "{} exited with {}: {}",
                step.join(" "),
                output.status,
                detail
            )));
        }

        Ok(())
    }
}

fn dir_is_nonempty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[tokio::test]
    async fn test_build_produces_dist() {
        let temp = tempdir().unwrap();
        let builder = ProjectBuilder::new(BuildConfig {
            steps: vec![sh("mkdir -p dist && echo built > dist/index.html")],
            timeout: Duration::from_secs(10),
        });

        let dist = builder.build(temp.path()).await.unwrap();
        assert!(dist.ends_with("dist"));
        assert!(dist.join("index.html").exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_build_failure() {
        let temp = tempdir().unwrap();
        let builder = ProjectBuilder::new(BuildConfig {
            steps: vec![sh("echo boom >&2; exit 1")],
            timeout: Duration::from_secs(10),
        });

        let err = builder.build(temp.path()).await.unwrap_err();
        assert!(matches!(err, DeployError::BuildFailed(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_clean_exit_without_dist_is_build_failure() {
        let temp = tempdir().unwrap();
        let builder = ProjectBuilder::new(BuildConfig {
            steps: vec![sh("true")],
            timeout: Duration::from_secs(10),
        });

        assert!(matches!(
            builder.build(temp.path()).await,
            Err(DeployError::BuildFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_dist_is_build_failure() {
        let temp = tempdir().unwrap();
        let builder = ProjectBuilder::new(BuildConfig {
            steps: vec![sh("mkdir -p dist")],
            timeout: Duration::from_secs(10),
        });

        assert!(matches!(
            builder.build(temp.path()).await,
            Err(DeployError::BuildFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let temp = tempdir().unwrap();
        let builder = ProjectBuilder::new(BuildConfig {
            steps: vec![sh("sleep 5")],
            timeout: Duration::from_millis(100),
        });

        assert!(matches!(
            builder.build(temp.path()).await,
            Err(DeployError::BuildTimeout(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_project_dir() {
        let builder = ProjectBuilder::new(BuildConfig::default());
        assert!(matches!(
            builder.build(Path::new("/nonexistent/project")).await,
            Err(DeployError::SourceMissing(_))
        ));
    }
}
