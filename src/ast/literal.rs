//! Literal-expression evaluation over the typed-superset AST.
//!
//! The analyzer only ever needs constant strings (import specifiers, decorator
//! fields, route paths) and constant object graphs (the app-constants module).
//! Anything outside that vocabulary is a hard error carrying the offending
//! node text and file path.

use anyhow::{Result, bail};
use serde_json::Value;
use tree_sitter::Node;

use super::node_text;

/// Evaluate a node known to be a constant string expression.
///
/// Supported forms:
/// - single- or double-quoted string literals
/// - template strings without substitutions
/// - `+` concatenation of any of the above (nested arbitrarily)
/// - parenthesized forms of the above
pub fn eval_string(node: Node, source: &str, file: &str) -> Result<String> {
    match node.kind() {
        "string" => Ok(unquote(node, source)),
        "template_string" => {
            let mut out = String::new();
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "string_fragment" => out.push_str(node_text(child, source)),
                    "escape_sequence" => out.push_str(&unescape(node_text(child, source))),
                    "template_substitution" => bail!(
                        "Could not evaluate expression '{}' in {}",
                        node_text(node, source),
                        file
                    ),
                    _ => {}
                }
            }
            Ok(out)
        }
        "binary_expression" => {
            let operator = node
                .child_by_field_name("operator")
                .map(|n| node_text(n, source))
                .unwrap_or("");
            let (left, right) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            );
            match (operator, left, right) {
                ("+", Some(l), Some(r)) => {
                    Ok(eval_string(l, source, file)? + &eval_string(r, source, file)?)
                }
                _ => bail!(
                    "Could not evaluate expression '{}' in {}",
                    node_text(node, source),
                    file
                ),
            }
        }
        "parenthesized_expression" => match node.named_child(0) {
            Some(inner) => eval_string(inner, source, file),
            None => bail!(
                "Could not evaluate expression '{}' in {}",
                node_text(node, source),
                file
            ),
        },
        _ => bail!(
            "Could not evaluate expression '{}' in {}",
            node_text(node, source),
            file
        ),
    }
}

/// Concatenate a string literal's fragments, resolving escape sequences.
fn unquote(string_node: Node, source: &str) -> String {
    let mut out = String::new();
    let mut cursor = string_node.walk();
    for child in string_node.children(&mut cursor) {
        match child.kind() {
            "string_fragment" => out.push_str(node_text(child, source)),
            "escape_sequence" => out.push_str(&unescape(node_text(child, source))),
            _ => {}
        }
    }
    out
}

/// Resolve a single `\x`-style escape sequence to its character.
fn unescape(escape: &str) -> String {
    match escape {
        "\\n" => "\n".to_owned(),
        "\\t" => "\t".to_owned(),
        "\\r" => "\r".to_owned(),
        "\\\\" => "\\".to_owned(),
        "\\'" => "'".to_owned(),
        "\\\"" => "\"".to_owned(),
        "\\`" => "`".to_owned(),
        other => other.strip_prefix('\\').unwrap_or(other).to_owned(),
    }
}

/// Convert a constant object literal into a JSON value tree.
///
/// Strings, numbers, booleans, null, arrays, and nested objects map directly.
/// Values outside the constant vocabulary (identifiers, function calls) become
/// `null` — the constants registry only ever looks up string leaves, so
/// non-constant members simply fail the lookup later.
pub fn object_value(node: Node, source: &str, file: &str) -> Result<Value> {
    match node.kind() {
        "object" => {
            let mut map = serde_json::Map::new();
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() != "pair" {
                    continue;
                }
                let key_node = match child.child_by_field_name("key") {
                    Some(k) => k,
                    None => continue,
                };
                let key = match key_node.kind() {
                    "property_identifier" | "number" => node_text(key_node, source).to_owned(),
                    "string" => unquote(key_node, source),
                    _ => continue,
                };
                let value = match child.child_by_field_name("value") {
                    Some(v) => object_value(v, source, file)?,
                    None => Value::Null,
                };
                map.insert(key, value);
            }
            Ok(Value::Object(map))
        }
        "array" => {
            let mut items = Vec::new();
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "comment" {
                    continue;
                }
                items.push(object_value(child, source, file)?);
            }
            Ok(Value::Array(items))
        }
        "string" | "template_string" => Ok(Value::String(eval_string(node, source, file)?)),
        "number" => {
            let text = node_text(node, source);
            if let Ok(int) = text.parse::<i64>() {
                Ok(Value::from(int))
            } else if let Ok(float) = text.parse::<f64>() {
                Ok(Value::from(float))
            } else {
                Ok(Value::Null)
            }
        }
        "unary_expression" => {
            // Negative number constants.
            let text = node_text(node, source);
            if let Ok(int) = text.parse::<i64>() {
                Ok(Value::from(int))
            } else if let Ok(float) = text.parse::<f64>() {
                Ok(Value::from(float))
            } else {
                Ok(Value::Null)
            }
        }
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "null" => Ok(Value::Null),
        "binary_expression" | "parenthesized_expression" => {
            match eval_string(node, source, file) {
                Ok(s) => Ok(Value::String(s)),
                Err(_) => Ok(Value::Null),
            }
        }
        "as_expression" | "satisfies_expression" => match node.named_child(0) {
            Some(inner) => object_value(inner, source, file),
            None => Ok(Value::Null),
        },
        _ => Ok(Value::Null),
    }
}
