//! In-place method replacement
//!
//! The replacement is a byte-span edit on the original text: everything
//! outside the replaced declaration (comments, blank lines, other members)
//! is carried over untouched.

use super::parser::{
    line_indent, methods_named, modifiers_of, node_text, parse_java, parse_method_text,
    primary_type, signature_of,
};
use crate::error::SpliceError;
use std::fs;
use std::path::Path;

/// Replace the method in `contents` whose signature equals the one in `method_text`.
///
/// The method is looked up by name in the file's primary type, then matched
/// by signature (return type and ordered parameter types). A suggestion that
/// carries no modifiers inherits the original declaration's modifiers.
pub fn splice(
    contents: &str,
    method_text: &str,
    file_stem: Option<&str>,
) -> Result<String, SpliceError> {
    splice_named(contents, method_text, file_stem, None)
}

/// Like [`splice`], but the suggestion must rewrite the method called `method_name`.
///
/// A multi-method suggestion contributes only its `method_name` declaration.
pub fn splice_named(
    contents: &str,
    method_text: &str,
    file_stem: Option<&str>,
    method_name: Option<&str>,
) -> Result<String, SpliceError> {
    let suggestion = parse_method_text(method_text, method_name)?;
    if let Some(expected) = method_name {
        if suggestion.signature.method_name != expected {
            return Err(SpliceError::UnexpectedMethod {
                expected: expected.to_string(),
                found: suggestion.signature.method_name.clone(),
            });
        }
    }

    let tree = parse_java(contents)?;
    let root = tree.root_node();
    let original_had_errors = root.has_error();

    let primary = primary_type(root, contents, file_stem).ok_or(SpliceError::NoPrimaryType)?;
    let candidates = methods_named(primary, contents, &suggestion.signature.method_name);
    if candidates.is_empty() {
        return Err(SpliceError::MethodNotFound(
            suggestion.signature.method_name.clone(),
        ));
    }

    let mut seen = Vec::with_capacity(candidates.len());
    let mut site = None;
    for candidate in candidates {
        let signature = signature_of(candidate, contents)?;
        if signature == suggestion.signature {
            site = Some(candidate);
            break;
        }
        seen.push(signature.to_string());
    }
    let site = site.ok_or_else(|| SpliceError::SignatureMismatch {
        expected: seen.join("; "),
        found: suggestion.signature.to_string(),
    })?;

    let indent = line_indent(contents, site.start_byte());
    let from = suggestion.base_indent.as_str();

    let mut rendered = String::new();
    match &suggestion.modifiers {
        Some(modifiers) => rendered.push_str(&reindent(modifiers, from, &indent)),
        None => {
            if let Some(original) = modifiers_of(site) {
                rendered.push_str(node_text(&original, contents));
            }
        }
    }
    if !rendered.is_empty() {
        rendered.push(' ');
    }
    rendered.push_str(&reindent(&suggestion.header, from, &indent));
    rendered.push(' ');
    rendered.push_str(&reindent(&suggestion.body, from, &indent));

    let mut output = String::with_capacity(contents.len() + rendered.len());
    output.push_str(&contents[..site.start_byte()]);
    output.push_str(&rendered);
    output.push_str(&contents[site.end_byte()..]);

    if !original_had_errors && parse_java(&output)?.root_node().has_error() {
        return Err(SpliceError::Unparseable(
            "replacement produced invalid source".to_string(),
        ));
    }

    Ok(output)
}

/// Splice into a file on disk. The file is only rewritten when the splice succeeds.
pub fn splice_file(
    path: &Path,
    method_text: &str,
    method_name: Option<&str>,
) -> Result<(), SpliceError> {
    let contents = fs::read_to_string(path)?;
    let stem = path.file_stem().and_then(|s| s.to_str());
    let updated = splice_named(&contents, method_text, stem, method_name)?;
    fs::write(path, updated)?;
    Ok(())
}

/// Move every line after the first from indentation `from` to `to`.
///
/// Lines that start inside a text block (`"""`) are copied verbatim, since
/// their leading whitespace is part of the string's value.
fn reindent(text: &str, from: &str, to: &str) -> String {
    let mut lines = text.lines();
    let mut out = String::with_capacity(text.len());
    let mut in_text_block = false;
    if let Some(first) = lines.next() {
        out.push_str(first);
        in_text_block = toggles_text_block(first);
    }
    for line in lines {
        out.push('\n');
        let starts_inside = in_text_block;
        if toggles_text_block(line) {
            in_text_block = !in_text_block;
        }
        if starts_inside {
            out.push_str(line);
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        out.push_str(to);
        match line.strip_prefix(from) {
            Some(rest) if !from.is_empty() => out.push_str(rest),
            _ if from.is_empty() => out.push_str(line),
            _ => out.push_str(line.trim_start()),
        }
    }
    out
}

/// Whether `line` opens or closes a text block an odd number of times
fn toggles_text_block(line: &str) -> bool {
    line.matches("\"\"\"").count() % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ORIGINAL: &str = r#"package com.example;

import java.net.Socket;

public class C {
    // keep me
    public void testSocket(int port) throws Exception {
        Socket s = new Socket("localhost", port);
        s.getOutputStream().write(1);
    }

    int other() {
        return 1;
    }
}
"#;

    const FIX: &str = r#"public void testSocket(int port) throws Exception {
    try (Socket s = new Socket("localhost", port)) {
        s.getOutputStream().write(1);
    }
}"#;

    #[test]
    fn test_splice_replaces_only_the_target() {
        let out = splice(ORIGINAL, FIX, Some("C")).unwrap();
        assert!(out.contains("try (Socket s = new Socket(\"localhost\", port))"));
        assert!(out.contains("    // keep me\n    public void testSocket"));
        assert!(out.contains("    int other() {\n        return 1;\n    }"));
        assert!(out.starts_with("package com.example;\n\nimport java.net.Socket;\n"));
        assert!(!out.contains("Socket s = new Socket(\"localhost\", port);\n        s.getOutputStream"));
    }

    #[test]
    fn test_splice_reindents_suggestion() {
        let out = splice(ORIGINAL, FIX, Some("C")).unwrap();
        assert!(out.contains(
            "    public void testSocket(int port) throws Exception {\n        try (Socket s"
        ));
        assert!(out.contains("            s.getOutputStream().write(1);\n        }\n    }"));
    }

    #[test]
    fn test_splice_accepts_whole_class_suggestion() {
        let suggestion = format!("public class C {{\n    {}\n}}", FIX.replace('\n', "\n    "));
        let out = splice(ORIGINAL, &suggestion, Some("C")).unwrap();
        assert!(out.contains("try (Socket s"));
    }

    #[test]
    fn test_splice_inherits_original_modifiers() {
        let bare = "void testSocket(int port) throws Exception {\n    System.out.println(port);\n}";
        let out = splice(ORIGINAL, bare, Some("C")).unwrap();
        assert!(out.contains("    public void testSocket(int port) throws Exception {\n        System.out.println(port);\n    }"));
    }

    #[test]
    fn test_signature_mismatch_is_rejected() {
        let wrong = "public void testSocket(long port) throws Exception { }";
        let err = splice(ORIGINAL, wrong, Some("C")).unwrap_err();
        match err {
            SpliceError::SignatureMismatch { expected, found } => {
                assert!(expected.contains("void testSocket(int port)"));
                assert!(found.contains("long port"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_method_is_rejected() {
        let err = splice(ORIGINAL, "void absent() { }", Some("C")).unwrap_err();
        assert!(matches!(err, SpliceError::MethodNotFound(name) if name == "absent"));
    }

    #[test]
    fn test_overload_selected_by_signature() {
        let original = "public class O {\n    void run(int a) {\n        a++;\n    }\n\n    void run(String s) {\n        s.trim();\n    }\n}\n";
        let out = splice(original, "void run(String other) {\n    other.isEmpty();\n}", Some("O")).unwrap();
        assert!(out.contains("void run(int a) {\n        a++;\n    }"));
        assert!(out.contains("void run(String other) {\n        other.isEmpty();\n    }"));
        assert!(!out.contains("s.trim()"));
    }

    #[test]
    fn test_unparseable_suggestion() {
        let err = splice(ORIGINAL, "public void testSocket(int port) {", Some("C")).unwrap_err();
        assert!(matches!(err, SpliceError::Unparseable(_)));
    }

    #[test]
    fn test_splice_file_leaves_file_untouched_on_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("C.java");
        fs::write(&path, ORIGINAL).unwrap();

        assert!(splice_file(&path, "void absent() { }", None).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), ORIGINAL);

        splice_file(&path, FIX, Some("testSocket")).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("try (Socket s"));
    }

    #[test]
    fn test_whole_class_reply_splices_the_named_method() {
        let original = "public class C {\n    private int port() {\n        return 80;\n    }\n\n    public void testSocket(int port) throws Exception {\n        Socket s = new Socket(\"localhost\", port);\n    }\n}\n";
        let reply = "public class C {\n    private int port() {\n        return 8080;\n    }\n\n    public void testSocket(int port) throws Exception {\n        try (Socket s = new Socket(\"localhost\", port)) {\n        }\n    }\n}";

        let out = splice_named(original, reply, Some("C"), Some("testSocket")).unwrap();
        assert!(out.contains("try (Socket s"));
        assert!(out.contains("return 80;"));
        assert!(!out.contains("return 8080;"));
    }

    #[test]
    fn test_suggestion_for_another_method_is_rejected() {
        let err = splice_named(ORIGINAL, "int other() {\n    return 2;\n}", Some("C"), Some("testSocket"))
            .unwrap_err();
        match err {
            SpliceError::UnexpectedMethod { expected, found } => {
                assert_eq!(expected, "testSocket");
                assert_eq!(found, "other");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_file_without_type_is_no_primary_type() {
        let err = splice("package com.example;\n\nimport java.net.Socket;\n", FIX, None).unwrap_err();
        assert!(matches!(err, SpliceError::NoPrimaryType));
    }

    #[test]
    fn test_text_block_contents_keep_their_indentation() {
        let original = "public class T {\n    String help() {\n        return \"\";\n    }\n}\n";
        let fix = "String help() {\n    return \"\"\"\n  usage:\n    amend run\n  \"\"\";\n}";
        let out = splice(original, fix, Some("T")).unwrap();
        assert!(out.contains("        return \"\"\"\n  usage:\n    amend run\n  \"\"\";\n    }"));
    }

    #[test]
    fn test_reindent() {
        assert_eq!(reindent("{\n    a;\n}", "", "  "), "{\n      a;\n  }");
        assert_eq!(reindent("{\n        a;\n    }", "    ", "\t"), "{\n\t    a;\n\t}");
        assert_eq!(reindent("{\n\n  a;\n}", "", ""), "{\n\n  a;\n}");
        assert_eq!(
            reindent("{\n    s = \"\"\"\n  x\n\n  \"\"\";\n}", "", "  "),
            "{\n      s = \"\"\"\n  x\n\n  \"\"\";\n  }"
        );
    }
}
