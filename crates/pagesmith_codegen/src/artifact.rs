//! Structured code artifacts.

use serde::{Deserialize, Serialize};

use crate::layout::CodeLayout;

/// A structured generation result, one variant per textual layout.
///
/// Tool-driven layouts have no artifact: their files are written
/// incrementally as the stream produces tool calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum CodeArtifact {
    Html {
        html: String,
    },
    MultiFile {
        html: String,
        css: String,
        js: String,
    },
}

impl CodeArtifact {
    /// The layout this artifact belongs to.
    pub fn layout(&self) -> CodeLayout {
        match self {
            Self::Html { .. } => CodeLayout::Html,
            Self::MultiFile { .. } => CodeLayout::MultiFile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_layout() {
        let a = CodeArtifact::Html {
            html: "<p>hi</p>".into(),
        };
        assert_eq!(a.layout(), CodeLayout::Html);

        let b = CodeArtifact::MultiFile {
            html: "h".into(),
            css: "c".into(),
            js: "j".into(),
        };
        assert_eq!(b.layout(), CodeLayout::MultiFile);
    }
}
