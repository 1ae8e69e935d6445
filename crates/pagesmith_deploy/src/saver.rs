//! File materialization.
//!
//! Saving is a fixed three-step pipeline: validate the artifact, allocate
//! the target's output directory, write the files. Validation runs before
//! any write, so a rejected artifact leaves the filesystem untouched.

use std::fs;
use std::path::{Component, Path, PathBuf};

use pagesmith_codegen::{CodeArtifact, CodeLayout};
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};

/// Writes structured artifacts to durable local storage.
#[derive(Clone)]
pub struct FileMaterializer {
    output_root: PathBuf,
}

impl FileMaterializer {
    pub fn new(output_root: impl AsRef<Path>) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
        }
    }

    /// Materialize an artifact under `<output_root>/<layout>_<target_id>`.
    pub fn save(&self, artifact: &CodeArtifact, target_id: i64) -> DeployResult<PathBuf> {
        validate(artifact)?;
        let dir = self.allocate(artifact.layout(), target_id)?;

        match artifact {
            CodeArtifact::Html { html } => {
                write_file(&dir, "index.html", html)?;
            }
            CodeArtifact::MultiFile { html, css, js } => {
                write_file(&dir, "index.html", html)?;
                write_file(&dir, "style.css", css)?;
                write_file(&dir, "script.js", js)?;
            }
        }

        info!(target_id, layout = %artifact.layout(), dir = %dir.display(), "materialized artifact");
        Ok(dir)
    }

    /// Write one file of a tool-driven project, relative to the target's
    /// project root. Each write is independently authorized and replaces
    /// any previous content.
    pub fn write_project_file(
        &self,
        target_id: i64,
        rel_path: &str,
        content: &str,
    ) -> DeployResult<PathBuf> {
        let root = self.allocate(CodeLayout::VueProject, target_id)?;
        let path = resolve_within(&root, rel_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        debug!(target_id, file = rel_path, "wrote project file");
        Ok(root)
    }

    /// The output directory a target's artifact materializes into. The
    /// directory is not created.
    pub fn output_dir(&self, layout: CodeLayout, target_id: i64) -> PathBuf {
        self.output_root.join(layout.output_dir_name(target_id))
    }

    // Directory creation is idempotent.
    fn allocate(&self, layout: CodeLayout, target_id: i64) -> DeployResult<PathBuf> {
        let dir = self.output_dir(layout, target_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Variant-specific non-empty checks. Runs before any filesystem action.
fn validate(artifact: &CodeArtifact) -> DeployResult<()> {
    match artifact {
        CodeArtifact::Html { html } => {
            require(html, "html", artifact.layout())?;
        }
        CodeArtifact::MultiFile { html, css, js } => {
            require(html, "html", artifact.layout())?;
            require(css, "css", artifact.layout())?;
            require(js, "js", artifact.layout())?;
        }
    }
    Ok(())
}

fn require(value: &str, field: &'static str, layout: CodeLayout) -> DeployResult<()> {
    if value.trim().is_empty() {
        return Err(DeployError::MissingField {
            layout: layout.as_str(),
            field,
        });
    }
    Ok(())
}

fn write_file(dir: &Path, name: &str, content: &str) -> DeployResult<()> {
    fs::write(dir.join(name), content)?;
    Ok(())
}

/// Join `rel_path` onto `root`, rejecting absolute paths and any `..`
/// component.
fn resolve_within(root: &Path, rel_path: &str) -> DeployResult<PathBuf> {
    let rel = Path::new(rel_path);
    if rel.is_absolute() {
        return Err(DeployError::PathTraversal(rel_path.to_string()));
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(DeployError::PathTraversal(rel_path.to_string())),
        }
    }
    Ok(root.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_html_save_round_trip() {
        let temp = tempdir().unwrap();
        let materializer = FileMaterializer::new(temp.path());

        let artifact = CodeArtifact::Html {
            html: "<html><body>hi</body></html>".into(),
        };
        let dir = materializer.save(&artifact, 42).unwrap();

        assert!(dir.ends_with("html_42"));
        let read_back = fs::read_to_string(dir.join("index.html")).unwrap();
        assert_eq!(read_back, "<html><body>hi</body></html>");
    }

    #[test]
    fn test_multi_file_save_writes_all_three() {
        let temp = tempdir().unwrap();
        let materializer = FileMaterializer::new(temp.path());

        let artifact = CodeArtifact::MultiFile {
            html: "<p>h</p>".into(),
            css: "p{}".into(),
            js: "1;".into(),
        };
        let dir = materializer.save(&artifact, 42).unwrap();

        assert!(dir.ends_with("multi_file_42"));
        assert_eq!(fs::read_to_string(dir.join("index.html")).unwrap(), "<p>h</p>");
        assert_eq!(fs::read_to_string(dir.join("style.css")).unwrap(), "p{}");
        assert_eq!(fs::read_to_string(dir.join("script.js")).unwrap(), "1;");
    }

    #[test]
    fn test_blank_field_rejected_before_any_write() {
        let temp = tempdir().unwrap();
        let materializer = FileMaterializer::new(temp.path());

        let artifact = CodeArtifact::MultiFile {
            html: "<p>h</p>".into(),
            css: "  ".into(),
            js: "1;".into(),
        };
        let err = materializer.save(&artifact, 7).unwrap_err();

        match err {
            DeployError::MissingField { field, .. } => assert_eq!(field, "css"),
            other => panic!("unexpected error: {other}"),
        }
        // Validation failed before allocation: nothing on disk.
        assert!(!materializer.output_dir(CodeLayout::MultiFile, 7).exists());
    }

    #[test]
    fn test_resave_overwrites_in_place() {
        let temp = tempdir().unwrap();
        let materializer = FileMaterializer::new(temp.path());

        let first = CodeArtifact::Html { html: "v1".into() };
        let second = CodeArtifact::Html { html: "v2".into() };
        let dir = materializer.save(&first, 1).unwrap();
        materializer.save(&second, 1).unwrap();

        assert_eq!(fs::read_to_string(dir.join("index.html")).unwrap(), "v2");
    }

    #[test]
    fn test_project_file_writes_incrementally() {
        let temp = tempdir().unwrap();
        let materializer = FileMaterializer::new(temp.path());

        let root = materializer
            .write_project_file(9, "src/App.vue", "<template/>")
            .unwrap();
        materializer
            .write_project_file(9, "package.json", "{}")
            .unwrap();

        assert!(root.ends_with("vue_project_9"));
        assert!(root.join("src/App.vue").exists());
        assert!(root.join("package.json").exists());
    }

    #[test]
    fn test_project_file_traversal_rejected() {
        let temp = tempdir().unwrap();
        let materializer = FileMaterializer::new(temp.path());

        assert!(matches!(
            materializer.write_project_file(9, "../outside.txt", "x"),
            Err(DeployError::PathTraversal(_))
        ));
        assert!(matches!(
            materializer.write_project_file(9, "/etc/hosts", "x"),
            Err(DeployError::PathTraversal(_))
        ));
    }
}
