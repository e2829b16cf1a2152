//! Tree-sitter based queries over Java sources

use super::{MethodSignature, Parameter};
use crate::error::SpliceError;
use std::cell::RefCell;
use tree_sitter::{Node, Parser, Tree};

// ═══════════════════════════════════════════════════════════════════════════
//  THREAD-LOCAL PARSER
// ═══════════════════════════════════════════════════════════════════════════
//
// Tree-sitter parsers are expensive to create but reusable. Every splice
// parses at least twice (suggestion + target file), so keep one per thread.

thread_local! {
    static JAVA_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Ignore error here - will be caught at parse time if language fails
        let _ = p.set_language(&tree_sitter_java::LANGUAGE.into());
        p
    });
}

/// Name of the class used to wrap a bare method so it parses as a compilation unit
const SHELL_CLASS: &str = "AmendMethodShell";

const TYPE_DECLARATION_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

pub(crate) fn parse_java(content: &str) -> Result<Tree, SpliceError> {
    JAVA_PARSER
        .with(|p| p.borrow_mut().parse(content, None))
        .ok_or_else(|| SpliceError::Unparseable("parser produced no tree".to_string()))
}

/// A suggested method broken into the pieces the splicer reassembles.
#[derive(Debug, Clone)]
pub(crate) struct ParsedMethod {
    pub signature: MethodSignature,
    /// Modifiers and annotations, if the suggestion carries any
    pub modifiers: Option<String>,
    /// Everything between the modifiers and the body: type parameters,
    /// return type, name, parameters, throws clause
    pub header: String,
    /// The body block including braces
    pub body: String,
    /// Indentation of the line holding the body's closing brace
    pub base_indent: String,
}

/// Parse a free-form method blob (bare method or a whole class) into its parts.
///
/// With `method_name`, the first method declaration of that name wins, so a
/// whole-class reply yields the target rather than whichever helper comes
/// first. Without it, or when no declaration has that name, the first method
/// declaration wins. Syntax errors are fatal.
pub(crate) fn parse_method_text(
    text: &str,
    method_name: Option<&str>,
) -> Result<ParsedMethod, SpliceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SpliceError::Unparseable("empty method text".to_string()));
    }

    let tree = parse_java(text)?;
    if !tree.root_node().has_error() {
        if let Some(method) = pick_method(tree.root_node(), text, method_name) {
            return method_parts(method, text);
        }
    }

    let wrapped = format!("class {} {{\n{}\n}}\n", SHELL_CLASS, text);
    let tree = parse_java(&wrapped)?;
    if tree.root_node().has_error() {
        return Err(SpliceError::Unparseable(
            "suggestion contains syntax errors".to_string(),
        ));
    }
    let method = pick_method(tree.root_node(), &wrapped, method_name)
        .ok_or_else(|| SpliceError::Unparseable("no method declaration found".to_string()))?;
    method_parts(method, &wrapped)
}

fn pick_method<'t>(root: Node<'t>, content: &str, method_name: Option<&str>) -> Option<Node<'t>> {
    let methods = all_methods(root);
    method_name
        .and_then(|name| {
            methods.iter().copied().find(|m| {
                m.child_by_field_name("name")
                    .map(|n| node_text(&n, content) == name)
                    .unwrap_or(false)
            })
        })
        .or_else(|| methods.first().copied())
}

fn method_parts(method: Node<'_>, content: &str) -> Result<ParsedMethod, SpliceError> {
    let signature = signature_of(method, content)?;
    let body = method
        .child_by_field_name("body")
        .ok_or_else(|| SpliceError::Unparseable("method has no body".to_string()))?;

    let modifiers = modifiers_of(method);
    let header_start = modifiers
        .map(|m| m.end_byte())
        .unwrap_or_else(|| method.start_byte());

    Ok(ParsedMethod {
        signature,
        modifiers: modifiers.map(|m| node_text(&m, content).to_string()),
        header: content[header_start..body.start_byte()].trim().to_string(),
        body: node_text(&body, content).to_string(),
        base_indent: line_indent(content, body.end_byte().saturating_sub(1)),
    })
}

/// Build a signature from a `method_declaration` node.
pub(crate) fn signature_of(method: Node<'_>, content: &str) -> Result<MethodSignature, SpliceError> {
    let return_type = method
        .child_by_field_name("type")
        .map(|n| node_text(&n, content).to_string())
        .ok_or(SpliceError::InvalidSignature("return type"))?;
    let method_name = method
        .child_by_field_name("name")
        .map(|n| node_text(&n, content).to_string())
        .ok_or(SpliceError::InvalidSignature("method name"))?;
    let params = method
        .child_by_field_name("parameters")
        .ok_or(SpliceError::InvalidSignature("parameter list"))?;

    Ok(MethodSignature {
        return_type,
        method_name,
        parameters: parse_parameters(params, content)?,
    })
}

fn parse_parameters(params: Node<'_>, content: &str) -> Result<Vec<Parameter>, SpliceError> {
    let mut parameters = Vec::new();
    let mut cursor = params.walk();

    for child in params.named_children(&mut cursor) {
        match child.kind() {
            "formal_parameter" => {
                let type_node = child.child_by_field_name("type");
                let name_node = child.child_by_field_name("name");
                let (Some(type_node), Some(name_node)) = (type_node, name_node) else {
                    return Err(SpliceError::InvalidParameter(
                        node_text(&child, content).to_string(),
                    ));
                };
                let mut type_name = node_text(&type_node, content).to_string();
                if let Some(dims) = child.child_by_field_name("dimensions") {
                    type_name.push_str(node_text(&dims, content));
                }
                parameters.push(Parameter {
                    type_name,
                    name: node_text(&name_node, content).to_string(),
                });
            }
            "spread_parameter" => parameters.push(parse_spread_parameter(child, content)?),
            // `Foo this` is not a real parameter
            "receiver_parameter" | "line_comment" | "block_comment" => {}
            _ => {
                return Err(SpliceError::InvalidParameter(
                    node_text(&child, content).to_string(),
                ))
            }
        }
    }

    Ok(parameters)
}

/// `String... args` becomes `(String..., args)`
fn parse_spread_parameter(node: Node<'_>, content: &str) -> Result<Parameter, SpliceError> {
    let invalid = || SpliceError::InvalidParameter(node_text(&node, content).to_string());

    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    let declarator = children
        .iter()
        .find(|c| c.kind() == "variable_declarator")
        .ok_or_else(invalid)?;
    let name = declarator
        .child_by_field_name("name")
        .map(|n| node_text(&n, content).to_string())
        .ok_or_else(invalid)?;
    let type_start = children
        .iter()
        .find(|c| c.kind() != "modifiers")
        .map(|c| c.start_byte())
        .ok_or_else(invalid)?;

    let type_name = content[type_start..declarator.start_byte()].trim().to_string();
    if type_name.is_empty() {
        return Err(invalid());
    }
    Ok(Parameter { type_name, name })
}

/// Every method declaration in document order, nested types included.
fn all_methods(root: Node<'_>) -> Vec<Node<'_>> {
    let mut methods = Vec::new();
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.kind() == "method_declaration" {
            methods.push(node);
        }

        if cursor.goto_first_child() {
            continue;
        }

        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return methods;
            }
        }
    }
}

pub(crate) fn is_type_declaration(node: &Node<'_>) -> bool {
    TYPE_DECLARATION_KINDS.contains(&node.kind())
}

pub(crate) fn type_name<'a>(node: &Node<'_>, content: &'a str) -> Option<&'a str> {
    node.child_by_field_name("name")
        .map(|n| node_text(&n, content))
}

pub(crate) fn modifiers_of<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == "modifiers");
    found
}

fn has_modifier(node: Node<'_>, keyword: &str) -> bool {
    let Some(modifiers) = modifiers_of(node) else {
        return false;
    };
    let mut cursor = modifiers.walk();
    let found = modifiers.children(&mut cursor).any(|c| c.kind() == keyword);
    found
}

/// Select the type a file is "about".
///
/// Preference: the type named like the file, then the first public type,
/// then the first top-level type.
pub(crate) fn primary_type<'t>(
    root: Node<'t>,
    content: &str,
    file_stem: Option<&str>,
) -> Option<Node<'t>> {
    let mut cursor = root.walk();
    let types: Vec<Node<'t>> = root
        .named_children(&mut cursor)
        .filter(|n| is_type_declaration(n))
        .collect();

    if let Some(stem) = file_stem {
        if let Some(named) = types.iter().find(|t| type_name(t, content) == Some(stem)) {
            return Some(*named);
        }
    }

    types
        .iter()
        .find(|t| has_modifier(**t, "public"))
        .or_else(|| types.first())
        .copied()
}

/// Method declarations that are direct members of a type body.
pub(crate) fn body_methods(type_node: Node<'_>) -> Vec<Node<'_>> {
    let Some(body) = type_node.child_by_field_name("body") else {
        return Vec::new();
    };

    let mut methods = Vec::new();
    let mut cursor = body.walk();
    for child in body.named_children(&mut cursor) {
        match child.kind() {
            "method_declaration" => methods.push(child),
            "enum_body_declarations" => {
                let mut inner = child.walk();
                methods.extend(
                    child
                        .named_children(&mut inner)
                        .filter(|n| n.kind() == "method_declaration"),
                );
            }
            _ => {}
        }
    }
    methods
}

pub(crate) fn methods_named<'t>(type_node: Node<'t>, content: &str, name: &str) -> Vec<Node<'t>> {
    body_methods(type_node)
        .into_iter()
        .filter(|m| {
            m.child_by_field_name("name")
                .map(|n| node_text(&n, content) == name)
                .unwrap_or(false)
        })
        .collect()
}

/// Source text of the method named `name` in the file's primary type.
///
/// When several overloads share the name, `parameter_types` picks among them
/// (package qualifiers are ignored for the comparison).
pub fn find_method_text(
    content: &str,
    file_stem: Option<&str>,
    name: &str,
    parameter_types: Option<&[String]>,
) -> Result<String, SpliceError> {
    let tree = parse_java(content)?;
    let primary =
        primary_type(tree.root_node(), content, file_stem).ok_or(SpliceError::NoPrimaryType)?;
    let candidates = methods_named(primary, content, name);

    let chosen = match (candidates.as_slice(), parameter_types) {
        ([], _) => None,
        ([only], _) => Some(*only),
        (many, Some(wanted)) => many.iter().copied().find(|m| {
            signature_of(*m, content)
                .map(|sig| {
                    sig.parameters.len() == wanted.len()
                        && sig
                            .parameters
                            .iter()
                            .zip(wanted)
                            .all(|(p, w)| super::same_type_unqualified(&p.type_name, w))
                })
                .unwrap_or(false)
        }),
        (many, None) => many.first().copied(),
    };

    chosen
        .map(|m| node_text(&m, content).to_string())
        .ok_or_else(|| SpliceError::MethodNotFound(name.to_string()))
}

/// Source of the first type declaration (in document order) that directly declares `method_name`.
pub fn declaring_type_source(content: &str, method_name: &str) -> Option<String> {
    let tree = parse_java(content).ok()?;
    let mut cursor = tree.root_node().walk();

    loop {
        let node = cursor.node();
        if is_type_declaration(&node) && !methods_named(node, content, method_name).is_empty() {
            return Some(node_text(&node, content).to_string());
        }

        if cursor.goto_first_child() {
            continue;
        }

        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// `package.Type#method(T1, T2)` for every public method of every public top-level type.
pub fn public_method_references(content: &str) -> Vec<String> {
    let Ok(tree) = parse_java(content) else {
        return Vec::new();
    };
    let root = tree.root_node();

    let mut cursor = root.walk();
    let top_level: Vec<Node<'_>> = root.named_children(&mut cursor).collect();

    let package = top_level
        .iter()
        .find(|n| n.kind() == "package_declaration")
        .and_then(|pkg| {
            let mut inner = pkg.walk();
            let name = pkg
                .named_children(&mut inner)
                .find(|c| matches!(c.kind(), "identifier" | "scoped_identifier"));
            name
        })
        .map(|n| node_text(&n, content).to_string());
    let prefix = package.map(|p| format!("{}.", p)).unwrap_or_default();

    let mut references = Vec::new();
    for type_node in top_level.iter().filter(|n| is_type_declaration(n)) {
        if !has_modifier(*type_node, "public") {
            continue;
        }
        let Some(name) = type_name(type_node, content) else {
            continue;
        };

        for method in body_methods(*type_node) {
            if !has_modifier(method, "public") {
                continue;
            }
            if let Ok(sig) = signature_of(method, content) {
                references.push(format!(
                    "{}{}#{}({})",
                    prefix,
                    name,
                    sig.method_name,
                    sig.parameter_types().join(", ")
                ));
            }
        }
    }
    references
}

pub(crate) fn node_text<'a>(node: &Node<'_>, content: &'a str) -> &'a str {
    &content[node.start_byte()..node.end_byte()]
}

/// Leading whitespace of the line containing byte offset `at`.
pub(crate) fn line_indent(content: &str, at: usize) -> String {
    let at = at.min(content.len());
    let line_start = content[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
    content[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOCKET_CLASS: &str = r#"package com.example;

import java.net.Socket;

public class C {
    public void testSocket(int port) throws Exception {
        Socket s = new Socket("localhost", port);
        s.getOutputStream().write(1);
    }

    private int helper(String a, int... rest) {
        return rest.length;
    }
}
"#;

    #[test]
    fn test_parse_bare_method() {
        let parsed = parse_method_text("public int add(int a, int b) {\n    return a + b;\n}", None).unwrap();
        assert_eq!(parsed.signature.method_name, "add");
        assert_eq!(parsed.signature.return_type, "int");
        assert_eq!(parsed.signature.parameter_types(), vec!["int", "int"]);
        assert_eq!(parsed.modifiers.as_deref(), Some("public"));
        assert_eq!(parsed.header, "int add(int a, int b)");
        assert!(parsed.body.starts_with('{') && parsed.body.ends_with('}'));
    }

    #[test]
    fn test_parse_method_inside_class() {
        let parsed = parse_method_text(SOCKET_CLASS, None).unwrap();
        assert_eq!(parsed.signature.method_name, "testSocket");
        assert!(parsed.header.contains("throws Exception"));
        assert_eq!(parsed.base_indent, "    ");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_method_text("this is not java {", None),
            Err(SpliceError::Unparseable(_))
        ));
        assert!(matches!(
            parse_method_text("   ", None),
            Err(SpliceError::Unparseable(_))
        ));
    }

    #[test]
    fn test_named_method_is_picked_from_whole_class() {
        let reply = "public class C {\n    private int port() {\n        return 80;\n    }\n\n    public void testSocket(int port) throws Exception {\n        System.out.println(port);\n    }\n}";

        let parsed = parse_method_text(reply, Some("testSocket")).unwrap();
        assert_eq!(parsed.signature.method_name, "testSocket");
        assert!(parsed.body.contains("println"));

        let unnamed = parse_method_text(reply, None).unwrap();
        assert_eq!(unnamed.signature.method_name, "port");

        let unknown = parse_method_text(reply, Some("absent")).unwrap();
        assert_eq!(unknown.signature.method_name, "port");
    }

    #[test]
    fn test_signature_of_non_method_is_invalid_signature() {
        let content = "class A { }";
        let tree = parse_java(content).unwrap();
        let class = find_kind(tree.root_node(), "class_declaration").unwrap();
        assert!(matches!(
            signature_of(class, content),
            Err(SpliceError::InvalidSignature("return type"))
        ));
    }

    #[test]
    fn test_unexpected_parameter_node_is_invalid_parameter() {
        let content = "class A { void m() { call(1); } }";
        let tree = parse_java(content).unwrap();
        let arguments = find_kind(tree.root_node(), "argument_list").unwrap();
        match parse_parameters(arguments, content) {
            Err(SpliceError::InvalidParameter(text)) => assert_eq!(text, "1"),
            other => panic!("expected invalid parameter, got {other:?}"),
        }
    }

    #[test]
    fn test_receiver_parameter_is_skipped() {
        let parsed = parse_method_text("void m(A this, int x) { }", None).unwrap();
        assert_eq!(parsed.signature.parameter_types(), vec!["int"]);
    }

    fn find_kind<'t>(root: Node<'t>, kind: &str) -> Option<Node<'t>> {
        let mut cursor = root.walk();
        loop {
            let node = cursor.node();
            if node.kind() == kind {
                return Some(node);
            }
            if cursor.goto_first_child() {
                continue;
            }
            while !cursor.goto_next_sibling() {
                if !cursor.goto_parent() {
                    return None;
                }
            }
        }
    }

    #[test]
    fn test_varargs_parameter() {
        let parsed = parse_method_text("int f(String a, int... rest) { return 0; }", None).unwrap();
        assert_eq!(parsed.signature.parameter_types(), vec!["String", "int..."]);
        assert_eq!(parsed.signature.parameters[1].name, "rest");
    }

    #[test]
    fn test_primary_type_prefers_file_stem() {
        let content = "class Helper {}\npublic class Main {}\nclass C {}\n";
        let tree = parse_java(content).unwrap();
        let root = tree.root_node();

        let by_stem = primary_type(root, content, Some("C")).unwrap();
        assert_eq!(type_name(&by_stem, content), Some("C"));

        let by_public = primary_type(root, content, None).unwrap();
        assert_eq!(type_name(&by_public, content), Some("Main"));
    }

    #[test]
    fn test_find_method_text() {
        let text = find_method_text(SOCKET_CLASS, Some("C"), "testSocket", None).unwrap();
        assert!(text.starts_with("public void testSocket(int port)"));
        assert!(text.ends_with('}'));

        let missing = find_method_text(SOCKET_CLASS, Some("C"), "nope", None);
        assert!(matches!(missing, Err(SpliceError::MethodNotFound(_))));
    }

    #[test]
    fn test_find_method_text_disambiguates_overloads() {
        let content = r#"public class O {
    void run(int a) { }
    void run(java.lang.String s) { }
}
"#;
        let wanted = vec!["String".to_string()];
        let text = find_method_text(content, Some("O"), "run", Some(wanted.as_slice())).unwrap();
        assert!(text.contains("java.lang.String s"));
    }

    #[test]
    fn test_declaring_type_source_finds_nested_type() {
        let content = r#"public class Outer {
    void a() {}
    static class Inner {
        void target() {}
    }
}
"#;
        let source = declaring_type_source(content, "target").unwrap();
        assert!(source.starts_with("static class Inner"));

        let outer = declaring_type_source(content, "a").unwrap();
        assert!(outer.starts_with("public class Outer"));
    }

    #[test]
    fn test_public_method_references() {
        let refs = public_method_references(SOCKET_CLASS);
        assert_eq!(refs, vec!["com.example.C#testSocket(int)".to_string()]);
    }

    #[test]
    fn test_line_indent() {
        let content = "a\n    b\n\tc";
        assert_eq!(line_indent(content, 6), "    ");
        assert_eq!(line_indent(content, content.len() - 1), "\t");
        assert_eq!(line_indent(content, 0), "");
    }
}
