use regex::Regex;
use std::sync::OnceLock;

fn java_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```java\b\s*(.*?)```").expect("valid fence regex"))
}

fn bare_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```[ \t]*\r?\n(.*?)```").expect("valid fence regex"))
}

/// Pull the suggested code out of a model response.
///
/// The first ```` ```java ```` block wins. An untagged fence is accepted when
/// no tagged one exists. Returns `None` when nothing non-empty is fenced.
pub fn extract_code_block(response: &str) -> Option<String> {
    let captured = java_fence()
        .captures(response)
        .or_else(|| bare_fence().captures(response))?;
    let code = captured.get(1)?.as_str().trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
