//! Runtime configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing or
//! partial file still yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pagesmith_deploy::BuildConfig;
use pagesmith_session::SessionCacheConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Policy for concurrent generation requests against one target.
///
/// The session cache guarantees at-most-one construction either way; this
/// decides whether whole requests for the same target may interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Concurrent requests share the session and may interleave history.
    Allow,
    /// Requests for one target run to completion one at a time.
    SerializePerTarget,
}

/// Session cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub capacity: usize,
    pub ttl_after_write_secs: u64,
    pub ttl_after_access_secs: u64,
    pub replay_limit: usize,
    pub window_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_after_write_secs: 30 * 60,
            ttl_after_access_secs: 10 * 60,
            replay_limit: 20,
            window_size: 20,
        }
    }
}

/// Build toolchain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Commands run in order inside the project directory.
    pub steps: Vec<Vec<String>>,
    pub timeout_secs: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        let defaults = BuildConfig::default();
        Self {
            steps: defaults.steps,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesmithConfig {
    /// Root for target records and history logs.
    pub data_root: PathBuf,
    /// Root for materialized code output.
    pub output_root: PathBuf,
    /// Root for deploy slots.
    pub deploy_root: PathBuf,
    /// Host prefix of deploy URLs.
    pub deploy_host: String,
    /// Root for uploaded screenshots.
    pub screenshot_root: PathBuf,
    /// Public base URL of uploaded screenshots.
    pub screenshot_base_url: String,
    pub session: SessionSettings,
    pub build: BuildSettings,
    pub concurrency: ConcurrencyPolicy,
}

impl Default for PagesmithConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("tmp/data"),
            output_root: PathBuf::from("tmp/code_output"),
            deploy_root: PathBuf::from("tmp/code_deploy"),
            deploy_host: "http://localhost:8585".to_string(),
            screenshot_root: PathBuf::from("tmp/uploads"),
            screenshot_base_url: "http://localhost:8585/uploads".to_string(),
            session: SessionSettings::default(),
            build: BuildSettings::default(),
            concurrency: ConcurrencyPolicy::Allow,
        }
    }
}

impl PagesmithConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Load from a file when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> CoreResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn session_cache_config(&self) -> SessionCacheConfig {
        SessionCacheConfig {
            capacity: self.session.capacity,
            ttl_after_write: Duration::from_secs(self.session.ttl_after_write_secs),
            ttl_after_access: Duration::from_secs(self.session.ttl_after_access_secs),
            replay_limit: self.session.replay_limit,
            window_size: self.session.window_size,
        }
    }

    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            steps: self.build.steps.clone(),
            timeout: Duration::from_secs(self.build.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PagesmithConfig::default();
        assert_eq!(config.session.window_size, 20);
        assert_eq!(config.concurrency, ConcurrencyPolicy::Allow);
        assert_eq!(config.build.steps.len(), 2);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: PagesmithConfig = toml::from_str(
            r#"
            deploy_host = "https://sites.example.com"
            concurrency = "serialize_per_target"

            [session]
            replay_limit = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.deploy_host, "https://sites.example.com");
        assert_eq!(config.concurrency, ConcurrencyPolicy::SerializePerTarget);
        assert_eq!(config.session.replay_limit, 5);
        // Unset fields keep their defaults.
        assert_eq!(config.session.window_size, 20);
        assert_eq!(config.output_root, PathBuf::from("tmp/code_output"));
    }

    #[test]
    fn test_session_cache_config_conversion() {
        let config = PagesmithConfig::default();
        let cache = config.session_cache_config();
        assert_eq!(cache.ttl_after_write, Duration::from_secs(1800));
        assert_eq!(cache.replay_limit, 20);
    }
}
