//! Screenshot capture and upload.
//!
//! Capture and object storage are external collaborators; this module
//! holds their interfaces and the composing service. The deploy pipeline
//! consumes the service on a detached task: a screenshot failure is
//! logged and never propagated to the deploy caller.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tracing::info;

use crate::error::{DeployError, DeployResult};

/// Captures a rendered page as image bytes.
#[async_trait]
pub trait Screenshotter: Send + Sync {
    async fn capture(&self, url: &str) -> DeployResult<Vec<u8>>;
}

/// Stores uploaded bytes under a key and returns a public URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> DeployResult<String>;
}

/// Screenshotter backed by a headless-browser CLI.
///
/// The program is invoked with its configured arguments plus
/// `--screenshot=<tmp file>` and the page URL, then the file is read back
/// and removed.
pub struct CommandScreenshotter {
    program: String,
    args: Vec<String>,
}

impl CommandScreenshotter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Headless Chromium with the usual server flags.
    pub fn chromium() -> Self {
        Self::new(
            "chromium",
            vec!["--headless".into(), "--disable-gpu".into(), "--no-sandbox".into()],
        )
    }
}

#[async_trait]
impl Screenshotter for CommandScreenshotter {
    async fn capture(&self, url: &str) -> DeployResult<Vec<u8>> {
        let out_path = std::env::temp_dir().join(format!(
            "pagesmith-shot-{}.png",
            uuid::Uuid::new_v4()
        ));

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--screenshot={}", out_path.display()))
            .arg(url)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| DeployError::Screenshot(format!("failed to spawn {}: {}", self.program, e)))?;

        if !status.success() {
            let _ = std::fs::remove_file(&out_path);
            return Err(DeployError::Screenshot(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        let bytes = std::fs::read(&out_path)
            .map_err(|e| DeployError::Screenshot(format!("no screenshot produced: {}", e)))?;
        let _ = std::fs::remove_file(&out_path);
        Ok(bytes)
    }
}

/// Object store backed by a local public directory.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> DeployResult<String> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(format!(
            "{}/{}",
            self.public_base.trim_end_matches('/'),
            key
        ))
    }
}

/// Captures a published page and uploads it, returning the image URL.
pub struct ScreenshotService {
    screenshotter: Box<dyn Screenshotter>,
    store: Box<dyn ObjectStore>,
}

impl ScreenshotService {
    pub fn new(screenshotter: Box<dyn Screenshotter>, store: Box<dyn ObjectStore>) -> Self {
        Self {
            screenshotter,
            store,
        }
    }

    pub async fn capture_and_upload(&self, url: &str) -> DeployResult<String> {
        let bytes = self.screenshotter.capture(url).await?;
        let key = screenshot_key();
        let uploaded = self.store.upload(&key, bytes).await?;
        info!(url, key, "uploaded screenshot");
        Ok(uploaded)
    }
}

/// Date-partitioned upload key: `screenshots/<yyyy/MM/dd>/<8-hex>_compressed.jpg`.
fn screenshot_key() -> String {
    let date_path = Utc::now().format("%Y/%m/%d");
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("screenshots/{}/{}_compressed.jpg", date_path, &id[..8])
}
