//! Correction prompt assembly
//!
//! A prompt is the source of the type that declares the failing method,
//! followed by the configured prefix, the checker diagnostics, and the
//! configured suffix, one per line.

use crate::java::declaring_type_source;

/// Fixed framing around the diagnostics
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub prefix: String,
    pub suffix: String,
}

impl PromptTemplate {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Build the prompt for `method_name` in `source` given the current diagnostics.
    ///
    /// When no type in `source` declares the method (the minimizer may have
    /// mangled the file), the whole file is sent instead.
    pub fn build(&self, source: &str, method_name: &str, diagnostics: &str) -> String {
        let context = declaring_type_source(source, method_name).unwrap_or_else(|| {
            tracing::warn!(method = method_name, "no declaring type found, sending whole file");
            source.to_string()
        });
        format!(
            "{}\n{}\n{}\n{}",
            context, self.prefix, diagnostics, self.suffix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "package p;\n\nimport java.net.Socket;\n\npublic class C {\n    void testSocket(int port) {}\n}\n";

    #[test]
    fn test_prompt_layout() {
        let template = PromptTemplate::new("Fix these:", "Reply in ```java.");
        let prompt = template.build(SOURCE, "testSocket", "error: leak");
        assert_eq!(
            prompt,
            "public class C {\n    void testSocket(int port) {}\n}\nFix these:\nerror: leak\nReply in ```java."
        );
    }

    #[test]
    fn test_prompt_excludes_imports() {
        let template = PromptTemplate::new("a", "b");
        let prompt = template.build(SOURCE, "testSocket", "e");
        assert!(!prompt.contains("import java.net.Socket"));
    }

    #[test]
    fn test_unknown_method_falls_back_to_file() {
        let template = PromptTemplate::new("a", "b");
        let prompt = template.build(SOURCE, "absent", "e");
        assert!(prompt.starts_with("package p;"));
    }
}
