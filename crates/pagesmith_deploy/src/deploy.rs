//! Deploy slots.
//!
//! A deploy slot is `<deploy_root>/<deploy_key>`, where the key is six
//! random alphanumeric characters generated on a target's first deploy
//! and reused on every redeploy. Redeploys overwrite the slot wholesale.

use std::path::{Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::error::{DeployError, DeployResult};

/// Length of a deploy key.
pub const DEPLOY_KEY_LEN: usize = 6;

/// Generate a fresh deploy key (mixed-case letters and digits).
pub fn generate_deploy_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DEPLOY_KEY_LEN)
        .map(char::from)
        .collect()
}

/// Copies build output into publicly addressable deploy slots.
#[derive(Clone)]
pub struct DeployManager {
    deploy_root: PathBuf,
    deploy_host: String,
}

impl DeployManager {
    pub fn new(deploy_root: impl AsRef<Path>, deploy_host: impl Into<String>) -> Self {
        Self {
            deploy_root: deploy_root.as_ref().to_path_buf(),
            deploy_host: deploy_host.into(),
        }
    }

    /// Copy `source_dir` into the slot for `deploy_key`, replacing any
    /// previous contents, and return the public URL.
    pub async fn deploy(&self, deploy_key: &str, source_dir: &Path) -> DeployResult<String> {
        if !source_dir.is_dir() {
            return Err(DeployError::SourceMissing(source_dir.to_path_buf()));
        }

        let slot = self.deploy_root.join(deploy_key);
        std::fs::create_dir_all(&slot)?;

        let source = source_dir.to_path_buf();
        let destination = slot.clone();
        // Recursive copy can be large; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let mut options = fs_extra::dir::CopyOptions::new();
            options.overwrite = true;
            options.content_only = true;
            fs_extra::dir::copy(&source, &destination, &options)
        })
        .await
        .map_err(|e| DeployError::Copy(e.to_string()))?
        .map_err(|e| DeployError::Copy(e.to_string()))?;

        let url = self.public_url(deploy_key);
        info!(deploy_key, slot = %slot.display(), "deployed to slot");
        Ok(url)
    }

    /// Public URL for a deploy key: `<deploy_host>/<key>/`.
    pub fn public_url(&self, deploy_key: &str) -> String {
        format!("{}/{}/", self.deploy_host.trim_end_matches('/'), deploy_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_deploy_key_shape() {
        let key = generate_deploy_key();
        assert_eq!(key.len(), DEPLOY_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_deploy_copies_content() {
        let source = tempdir().unwrap();
        let root = tempdir().unwrap();
        fs::write(source.path().join("index.html"), "<p>v1</p>").unwrap();
        fs::create_dir(source.path().join("assets")).unwrap();
        fs::write(source.path().join("assets/app.js"), "1;").unwrap();

        let manager = DeployManager::new(root.path(), "https://sites.example.com");
        let url = manager.deploy("a1B2c3", source.path()).await.unwrap();

        assert_eq!(url, "https://sites.example.com/a1B2c3/");
        let slot = root.path().join("a1B2c3");
        assert_eq!(fs::read_to_string(slot.join("index.html")).unwrap(), "<p>v1</p>");
        assert!(slot.join("assets/app.js").exists());
    }

    #[tokio::test]
    async fn test_redeploy_replaces_slot_contents() {
        let source = tempdir().unwrap();
        let root = tempdir().unwrap();
        fs::write(source.path().join("index.html"), "v1").unwrap();

        let manager = DeployManager::new(root.path(), "https://host");
        let first = manager.deploy("k3yXyZ", source.path()).await.unwrap();

        fs::write(source.path().join("index.html"), "v2").unwrap();
        let second = manager.deploy("k3yXyZ", source.path()).await.unwrap();

        assert_eq!(first, second);
        let slot = root.path().join("k3yXyZ");
        assert_eq!(fs::read_to_string(slot.join("index.html")).unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_missing_source_aborts_without_side_effects() {
        let root = tempdir().unwrap();
        let manager = DeployManager::new(root.path(), "https://host");

        let err = manager
            .deploy("nope42", Path::new("/nonexistent/source"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::SourceMissing(_)));
        assert!(!root.path().join("nope42").exists());
    }
}
