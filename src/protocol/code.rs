//! Fenced code-block extractor.
//!
//! Responses are expected to carry exactly one ```c block. The strict
//! pattern requires a newline right after the language tag; the lenient
//! one takes anything between the fences. First match wins.

use regex::Regex;

fn never_matching() -> Regex {
    Regex::new("$^").unwrap_or_else(|_| unreachable!())
}

fn strict_fence() -> Regex {
    Regex::new(r"(?si)```c\s*\n(.*?)\n```").unwrap_or_else(|_| never_matching())
}

fn lenient_fence() -> Regex {
    Regex::new(r"(?si)```c(.*?)```").unwrap_or_else(|_| never_matching())
}

/// Extract the single fenced code payload, trimmed. `None` when neither
/// pattern matches or the matched body is blank.
pub fn extract_code(text: &str) -> Option<String> {
    for pattern in [strict_fence(), lenient_fence()] {
        if let Some(caps) = pattern.captures(text) {
            let code = caps.get(1).map(|m| m.as_str().trim())?;
            if !code.is_empty() {
                return Some(code.to_string());
            }
        }
    }
    None
}

/// Lenient variant for the full-patch flow: when no fence is present the
/// whole trimmed text stands in for the code.
pub fn extract_code_or_text(text: &str) -> String {
    extract_code(text).unwrap_or_else(|| text.trim().to_string())
}
