//! Target descriptor parsing and validation
//!
//! A target is a `(file, method)` pair such as
//! `com/example/Foo.java` + `com.example.Foo#bar(int, String)`.
//! Validation here is purely syntactic; `original_file` checks the
//! descriptor against the filesystem.

use crate::error::FormatError;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Source extension of the files amend repairs
pub const SOURCE_EXTENSION: &str = "java";

fn file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_0-9]+/)*[A-Za-z_0-9]+\.java$").expect("valid file regex")
    })
}

fn method_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_0-9]+(?:\.[A-Za-z_0-9]+)*)#([A-Za-z_0-9]+)\(([^)]*)\)$")
            .expect("valid method regex")
    })
}

fn comma_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r", ?").expect("valid comma regex"))
}

/// Insert a single space after every comma that is not already followed by one.
///
/// Idempotent: `ensure_space_after_commas(ensure_space_after_commas(s)) == ensure_space_after_commas(s)`.
pub fn ensure_space_after_commas(input: &str) -> String {
    comma_pattern().replace_all(input, ", ").into_owned()
}

/// Identifies the method to repair. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    root: PathBuf,
    relative_file: String,
    owner_type: String,
    method_name: String,
    parameter_types: Vec<String>,
}

impl TargetDescriptor {
    /// Validate a file path and a method reference against the target grammar.
    pub fn parse(
        root: impl AsRef<Path>,
        relative_file: &str,
        method_ref: &str,
    ) -> Result<Self, FormatError> {
        if !file_pattern().is_match(relative_file) {
            return Err(FormatError::File(relative_file.to_string()));
        }

        let normalized = ensure_space_after_commas(method_ref.trim());
        let caps = method_pattern()
            .captures(&normalized)
            .ok_or_else(|| FormatError::Method(method_ref.to_string()))?;

        let owner_type = caps[1].to_string();
        let method_name = caps[2].to_string();
        let parameter_types = split_parameter_types(&caps[3]);

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            relative_file: relative_file.to_string(),
            owner_type,
            method_name,
            parameter_types,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Slash-separated path relative to the project root
    pub fn relative_file(&self) -> &str {
        &self.relative_file
    }

    /// Fully-qualified owner type, e.g. `com.example.Foo`
    pub fn owner_type(&self) -> &str {
        &self.owner_type
    }

    /// Simple name of the owner type, e.g. `Foo`
    pub fn owner_simple_name(&self) -> &str {
        self.owner_type
            .rsplit('.')
            .next()
            .unwrap_or(&self.owner_type)
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    /// Normalized `owner#name(T1, T2)` form handed to the minimizer.
    pub fn method_reference(&self) -> String {
        format!(
            "{}#{}({})",
            self.owner_type,
            self.method_name,
            self.parameter_types.join(", ")
        )
    }

    /// Resolve the descriptor against its root.
    ///
    /// The file must exist, and the root must be a literal prefix of the
    /// resolved absolute path.
    pub fn original_file(&self) -> Result<PathBuf, FormatError> {
        let root = self.root.canonicalize().map_err(|e| {
            FormatError::Path(format!(
                "cannot resolve root '{}': {}",
                self.root.display(),
                e
            ))
        })?;
        let joined = root.join(&self.relative_file);
        let resolved = joined.canonicalize().map_err(|e| {
            FormatError::Path(format!("'{}' does not exist: {}", joined.display(), e))
        })?;

        if !resolved.starts_with(&root) {
            return Err(FormatError::Path(format!(
                "root '{}' is not a prefix of '{}'",
                root.display(),
                resolved.display()
            )));
        }
        if !resolved.is_file() {
            return Err(FormatError::Path(format!(
                "'{}' is not a file",
                resolved.display()
            )));
        }

        Ok(resolved)
    }

    /// Re-resolve the relative file under another root (the working copy)
    pub fn file_under(&self, root: &Path) -> PathBuf {
        self.relative_file
            .split('/')
            .fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.method_reference(), self.relative_file)
    }
}

/// Split `int, Map<K, V>, String[]` on top-level commas only.
fn split_parameter_types(raw: &str) -> Vec<String> {
    let mut types = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in raw.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    types.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        types.push(trimmed.to_string());
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_spaced_parameters() {
        let target = TargetDescriptor::parse("/proj", "a/b/C.java", "a.b.C#m(int, String)").unwrap();
        assert_eq!(target.owner_type(), "a.b.C");
        assert_eq!(target.owner_simple_name(), "C");
        assert_eq!(target.method_name(), "m");
        assert_eq!(target.parameter_types(), &["int".to_string(), "String".to_string()]);
    }

    #[test]
    fn test_parse_normalizes_unspaced_commas() {
        let target = TargetDescriptor::parse("/proj", "a/b/C.java", "a.b.C#m(int,String)").unwrap();
        assert_eq!(target.method_reference(), "a.b.C#m(int, String)");
    }

    #[test]
    fn test_parse_empty_parameter_list() {
        let target = TargetDescriptor::parse("/proj", "C.java", "C#run()").unwrap();
        assert!(target.parameter_types().is_empty());
        assert_eq!(target.method_reference(), "C#run()");
    }

    #[test]
    fn test_parse_rejects_bad_file() {
        let err = TargetDescriptor::parse("/proj", "bad path", "a.b.C#m()").unwrap_err();
        assert!(matches!(err, FormatError::File(_)));

        let err = TargetDescriptor::parse("/proj", "a/b/C.kt", "a.b.C#m()").unwrap_err();
        assert!(matches!(err, FormatError::File(_)));

        let err = TargetDescriptor::parse("/proj", "../C.java", "a.b.C#m()").unwrap_err();
        assert!(matches!(err, FormatError::File(_)));
    }

    #[test]
    fn test_parse_rejects_bad_method() {
        for bad in ["a.b.C.m(int)", "a.b.C#m", "#m()", "a.b.C#m(int))", "a..b#m()"] {
            let err = TargetDescriptor::parse("/proj", "a/b/C.java", bad).unwrap_err();
            assert!(matches!(err, FormatError::Method(_)), "accepted {bad}");
        }
    }

    #[test]
    fn test_comma_normalization_is_idempotent() {
        for input in ["a,b", "a, b", "a,b, c,d", "no commas", "x,,y", ""] {
            let once = ensure_space_after_commas(input);
            let twice = ensure_space_after_commas(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
        assert_eq!(ensure_space_after_commas("m(int,String)"), "m(int, String)");
    }

    #[test]
    fn test_generic_parameters_split_on_top_level_commas() {
        let target =
            TargetDescriptor::parse("/proj", "C.java", "C#m(Map<String,Integer>, int)").unwrap();
        assert_eq!(
            target.parameter_types(),
            &["Map<String, Integer>".to_string(), "int".to_string()]
        );
    }

    #[test]
    fn test_original_file_resolves_under_root() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("com/example");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("C.java"), "class C {}").unwrap();

        let target =
            TargetDescriptor::parse(dir.path(), "com/example/C.java", "com.example.C#m()").unwrap();
        let resolved = target.original_file().unwrap();
        assert!(resolved.ends_with("com/example/C.java"));
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_original_file_missing_is_path_error() {
        let dir = tempdir().unwrap();
        let target = TargetDescriptor::parse(dir.path(), "Missing.java", "Missing#m()").unwrap();
        assert!(matches!(target.original_file(), Err(FormatError::Path(_))));
    }

    #[test]
    fn test_file_under_mirrors_layout() {
        let target =
            TargetDescriptor::parse("/proj", "com/example/C.java", "com.example.C#m()").unwrap();
        let path = target.file_under(Path::new("/tmp/work"));
        assert_eq!(path, PathBuf::from("/tmp/work/com/example/C.java"));
    }
}
