//! Built-in recovery stages

use super::{Preprocessor, Repair};
use regex_lite::Regex;
use std::sync::OnceLock;

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)```(?:json)?").expect("fence pattern is valid"))
}

fn boundary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\}\s*\{").expect("boundary pattern is valid"))
}

fn misclosed_array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"("|\d|true|false)\s*\}((?:\s*\})+\s*)$"#)
            .expect("misclosed array pattern is valid")
    })
}

/// Removes every markdown fence marker (```` ``` ```` and ```` ```json ````)
#[derive(Debug, Clone, Copy, Default)]
pub struct StripFences;

impl Preprocessor for StripFences {
    fn name(&self) -> &'static str {
        "strip_fences"
    }

    fn apply(&self, text: &str) -> Option<String> {
        let pattern = fence_pattern();
        if !pattern.is_match(text) {
            return None;
        }
        Some(pattern.replace_all(text, "").trim().to_string())
    }
}

/// Keeps only the first of several back-to-back JSON objects.
///
/// Cuts just after the first `}` that is followed (across whitespace) by `{`.
/// The scan is textual, so a boundary inside a string literal also matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncateAtConcatenation;

impl Preprocessor for TruncateAtConcatenation {
    fn name(&self) -> &'static str {
        "truncate_at_concatenation"
    }

    fn apply(&self, text: &str) -> Option<String> {
        boundary_pattern()
            .find(text)
            .map(|m| text[..=m.start()].to_string())
    }
}

/// Fixes a trailing array that was closed with `}` instead of `]`.
///
/// Applies when a scalar (string, number, boolean) is followed by two or
/// more closing braces at the very end of the text: the first of those
/// braces becomes `]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloseMisbracketedArray;

impl Repair for CloseMisbracketedArray {
    fn name(&self) -> &'static str {
        "close_misbracketed_array"
    }

    fn repair(&self, text: &str) -> Option<String> {
        let pattern = misclosed_array_pattern();
        if !pattern.is_match(text) {
            return None;
        }
        Some(pattern.replace(text, "${1}]${2}").into_owned())
    }
}
