//! Code layout selector.
//!
//! A target's layout is chosen once at creation time and never revisited;
//! it drives parsing, materialization and the deploy source directory.

use serde::{Deserialize, Serialize};

/// The shape of a generation target's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeLayout {
    /// One self-contained HTML page.
    Html,
    /// Separate HTML, CSS and JS files.
    MultiFile,
    /// A Vue project driven by tool-call file writes, built before deploy.
    VueProject,
}

impl CodeLayout {
    /// Wire value, also used in output directory names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::MultiFile => "multi_file",
            Self::VueProject => "vue_project",
        }
    }

    /// Whether deploying this layout requires a build step first.
    pub fn needs_build(&self) -> bool {
        matches!(self, Self::VueProject)
    }

    /// Whether generation is driven by tool-call file writes rather than text.
    pub fn is_tool_driven(&self) -> bool {
        matches!(self, Self::VueProject)
    }

    /// Output directory name for a target, `<layout>_<target_id>`.
    pub fn output_dir_name(&self, target_id: i64) -> String {
        format!("{}_{}", self.as_str(), target_id)
    }
}

impl std::str::FromStr for CodeLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(Self::Html),
            "multi_file" => Ok(Self::MultiFile),
            "vue_project" => Ok(Self::VueProject),
            other => Err(format!("unknown code layout: {other}")),
        }
    }
}

impl std::fmt::Display for CodeLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values_round_trip() {
        for layout in [CodeLayout::Html, CodeLayout::MultiFile, CodeLayout::VueProject] {
            let parsed: CodeLayout = layout.as_str().parse().unwrap();
            assert_eq!(parsed, layout);
        }
        assert!("svelte".parse::<CodeLayout>().is_err());
    }

    #[test]
    fn test_output_dir_name() {
        assert_eq!(CodeLayout::MultiFile.output_dir_name(42), "multi_file_42");
        assert_eq!(CodeLayout::Html.output_dir_name(7), "html_7");
    }

    #[test]
    fn test_build_requirements() {
        assert!(CodeLayout::VueProject.needs_build());
        assert!(!CodeLayout::Html.needs_build());
        assert!(!CodeLayout::MultiFile.needs_build());
    }
}
