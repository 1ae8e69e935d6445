//! Target persistence.
//!
//! One JSON document per target under `<data_root>/targets/<id>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pagesmith_codegen::CodeLayout;
use tracing::info;

use crate::error::{SessionError, SessionResult};
use crate::types::Target;

/// Store for target records.
#[derive(Clone)]
pub struct TargetStore {
    data_root: PathBuf,
}

impl TargetStore {
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self {
            data_root: data_root.as_ref().to_path_buf(),
        }
    }

    fn targets_dir(&self) -> PathBuf {
        self.data_root.join("targets")
    }

    fn target_path(&self, id: i64) -> PathBuf {
        self.targets_dir().join(format!("{}.json", id))
    }

    /// Create and persist a new target.
    pub fn create(
        &self,
        init_prompt: &str,
        owner_id: i64,
        layout: CodeLayout,
    ) -> SessionResult<Target> {
        let target = Target::new(init_prompt, owner_id, layout);
        self.save(&target)?;
        info!(target_id = target.id, %layout, "created target");
        Ok(target)
    }

    pub fn get(&self, id: i64) -> SessionResult<Target> {
        let path = self.target_path(id);
        if !path.exists() {
            return Err(SessionError::TargetNotFound(id));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, target: &Target) -> SessionResult<()> {
        fs::create_dir_all(self.targets_dir())?;
        let content = serde_json::to_string_pretty(target)?;
        fs::write(self.target_path(target.id), content)?;
        Ok(())
    }

    /// Record a successful deploy against the target.
    pub fn record_deploy(
        &self,
        id: i64,
        deploy_key: &str,
        deployed_at: DateTime<Utc>,
    ) -> SessionResult<Target> {
        let mut target = self.get(id)?;
        target.deploy_key = Some(deploy_key.to_string());
        target.deployed_at = Some(deployed_at);
        self.save(&target)?;
        Ok(target)
    }

    /// Record the screenshot cover URL for a target.
    pub fn set_cover(&self, id: i64, cover_url: &str) -> SessionResult<()> {
        let mut target = self.get(id)?;
        target.cover_url = Some(cover_url.to_string());
        self.save(&target)
    }

    pub fn delete(&self, id: i64) -> SessionResult<()> {
        let path = self.target_path(id);
        if !path.exists() {
            return Err(SessionError::TargetNotFound(id));
        }
        fs::remove_file(path)?;
        info!(target_id = id, "deleted target");
        Ok(())
    }

    /// All stored targets, in no particular order.
    pub fn list(&self) -> SessionResult<Vec<Target>> {
        let dir = self.targets_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut targets = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                let content = fs::read_to_string(path)?;
                targets.push(serde_json::from_str(&content)?);
            }
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_get_round_trip() {
        let temp = tempdir().unwrap();
        let store = TargetStore::new(temp.path());

        let target = store
            .create("a pottery shop page", 3, CodeLayout::MultiFile)
            .unwrap();
        let loaded = store.get(target.id).unwrap();

        assert_eq!(loaded.name, "a pottery sh");
        assert_eq!(loaded.layout, CodeLayout::MultiFile);
        assert_eq!(loaded.owner_id, 3);
    }

    #[test]
    fn test_get_missing_target() {
        let temp = tempdir().unwrap();
        let store = TargetStore::new(temp.path());
        assert!(matches!(
            store.get(12345),
            Err(SessionError::TargetNotFound(12345))
        ));
    }

    #[test]
    fn test_record_deploy_persists() {
        let temp = tempdir().unwrap();
        let store = TargetStore::new(temp.path());
        let target = store.create("p", 1, CodeLayout::Html).unwrap();

        let now = Utc::now();
        store.record_deploy(target.id, "a1B2c3", now).unwrap();

        let loaded = store.get(target.id).unwrap();
        assert_eq!(loaded.deploy_key.as_deref(), Some("a1B2c3"));
        assert_eq!(loaded.deployed_at, Some(now));
    }

    #[test]
    fn test_delete_removes_record() {
        let temp = tempdir().unwrap();
        let store = TargetStore::new(temp.path());
        let target = store.create("p", 1, CodeLayout::Html).unwrap();

        store.delete(target.id).unwrap();
        assert!(store.get(target.id).is_err());
        assert!(store.delete(target.id).is_err());
    }

    #[test]
    fn test_list_targets() {
        let temp = tempdir().unwrap();
        let store = TargetStore::new(temp.path());
        store.create("one", 1, CodeLayout::Html).unwrap();
        store.create("two", 1, CodeLayout::VueProject).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
    }
}
