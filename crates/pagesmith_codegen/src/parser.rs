//! Raw-text parsing into structured artifacts.
//!
//! Parsing is a pure function over the accumulated model output; it never
//! touches the filesystem. Missing regions for the multi-file layout are
//! deferred to save-time validation, so re-prompting can recover them.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::CodeArtifact;
use crate::error::{CodegenError, CodegenResult};
use crate::layout::CodeLayout;

static HTML_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```html\s*\n(.*?)```").unwrap());
static CSS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```css\s*\n(.*?)```").unwrap());
static JS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:js|javascript)\s*\n(.*?)```").unwrap());

/// Parse accumulated generation output for the given layout.
pub fn parse(raw: &str, layout: CodeLayout) -> CodegenResult<CodeArtifact> {
    match layout {
        CodeLayout::Html => Ok(parse_html(raw)),
        CodeLayout::MultiFile => Ok(parse_multi_file(raw)),
        CodeLayout::VueProject => Err(CodegenError::UnsupportedLayout(
            layout.as_str().to_string(),
        )),
    }
}

/// Single-file layout: the first fenced HTML region, or the whole text when
/// no fence is present.
fn parse_html(raw: &str) -> CodeArtifact {
    let html = extract(&HTML_BLOCK, raw).unwrap_or_else(|| raw.trim().to_string());
    CodeArtifact::Html { html }
}

/// Multi-file layout: three independently fenced regions. A missing region
/// becomes an empty string and is rejected later by save-time validation.
fn parse_multi_file(raw: &str) -> CodeArtifact {
    CodeArtifact::MultiFile {
        html: extract(&HTML_BLOCK, raw).unwrap_or_default(),
        css: extract(&CSS_BLOCK, raw).unwrap_or_default(),
        js: extract(&JS_BLOCK, raw).unwrap_or_default(),
    }
}

fn extract(pattern: &Regex, raw: &str) -> Option<String> {
    pattern
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
