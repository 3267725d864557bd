//! Fenced code block extraction from agent messages

use crate::types::CodeFragment;
use regex::Regex;
use std::sync::OnceLock;

/// Language assumed for fences without a tag
pub const DEFAULT_LANGUAGE: &str = "python";

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*([\w+-]*)[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
            .expect("fence pattern is valid")
    })
}

/// Every fenced block in `message`, in order of appearance
pub fn extract_code_blocks(message: &str) -> Vec<CodeFragment> {
    fence_pattern()
        .captures_iter(message)
        .map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str())
                .filter(|lang| !lang.is_empty())
                .unwrap_or(DEFAULT_LANGUAGE);
            let source = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            CodeFragment::new(source).with_language(language)
        })
        .collect()
}

/// Only the blocks that can run in a python session
pub fn extract_python_blocks(message: &str) -> Vec<CodeFragment> {
    extract_code_blocks(message)
        .into_iter()
        .filter(CodeFragment::is_python)
        .collect()
}
