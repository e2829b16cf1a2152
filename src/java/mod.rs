//! Java source model: method signatures and tree-sitter backed queries

pub mod parser;
pub mod splice;

use std::fmt;

pub use parser::{declaring_type_source, find_method_text, public_method_references};
pub use splice::{splice, splice_file, splice_named};

/// One formal parameter. Only the type takes part in signature equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub type_name: String,
    pub name: String,
}

/// Return type, name, and ordered parameters of a method.
#[derive(Debug, Clone, Eq)]
pub struct MethodSignature {
    pub return_type: String,
    pub method_name: String,
    pub parameters: Vec<Parameter>,
}

impl MethodSignature {
    /// Parameter types in declaration order
    pub fn parameter_types(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.type_name.as_str()).collect()
    }
}

impl PartialEq for MethodSignature {
    fn eq(&self, other: &Self) -> bool {
        self.method_name == other.method_name
            && same_type(&self.return_type, &other.return_type)
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| same_type(&a.type_name, &b.type_name))
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.type_name, p.name))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} {}({})", self.return_type, self.method_name, params)
    }
}

/// Type text comparison that ignores whitespace (`Map<K,V>` == `Map<K, V>`).
pub(crate) fn same_type(a: &str, b: &str) -> bool {
    a.chars()
        .filter(|c| !c.is_whitespace())
        .eq(b.chars().filter(|c| !c.is_whitespace()))
}

/// Like [`same_type`], but `java.lang.String` matches `String`.
pub(crate) fn same_type_unqualified(a: &str, b: &str) -> bool {
    erase_qualifiers(a) == erase_qualifiers(b)
}

fn erase_qualifiers(type_name: &str) -> String {
    let chars: Vec<char> = type_name.chars().filter(|c| !c.is_whitespace()).collect();
    let mut out = String::with_capacity(chars.len());
    let mut ident = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            ident.push(c);
        } else if c == '.'
            && !ident.is_empty()
            && chars
                .get(i + 1)
                .is_some_and(|n| n.is_alphabetic() || *n == '_')
        {
            // package or outer-class segment
            ident.clear();
        } else {
            out.push_str(&ident);
            ident.clear();
            out.push(c);
        }
    }
    out.push_str(&ident);
    out
}
