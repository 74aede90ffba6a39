//! The app-constants object graph.
//!
//! Route paths may be written as property-access chains on a well-known
//! constants root instead of string literals. The registry parses the
//! constants module's exported object literal into a JSON value tree once and
//! answers chain lookups against it.

use anyhow::{Context, Result};
use serde_json::Value;
use tree_sitter::Node;

use crate::ast::literal::object_value;
use crate::ast::{SourceCache, node_text};
use crate::context::AnalyzerContext;
use crate::overrides::CONSTANTS_MODULE;

pub struct ConstantsRegistry {
    tree: Value,
}

impl ConstantsRegistry {
    /// Parse `assets/constants.ts` into the constants tree. A repository
    /// without a constants module yields an empty tree — lookups simply fail.
    pub fn load(ctx: &AnalyzerContext, cache: &mut SourceCache) -> Result<Self> {
        if !ctx.is_file(CONSTANTS_MODULE) {
            return Ok(Self { tree: Value::Null });
        }

        let parsed = cache
            .load(ctx, CONSTANTS_MODULE)
            .with_context(|| format!("failed to load constants module {CONSTANTS_MODULE}"))?;

        let root = parsed.tree.root_node();
        let object = find_exported_object(root, &parsed.source);
        let tree = match object {
            Some(node) => object_value(node, &parsed.source, CONSTANTS_MODULE)?,
            None => Value::Null,
        };
        Ok(Self { tree })
    }

    #[cfg(test)]
    pub fn from_value(tree: Value) -> Self {
        Self { tree }
    }

    /// Walk a property-access chain against the constants tree. Only string
    /// leaves resolve; a chain ending anywhere else yields `None`.
    pub fn lookup(&self, chain: &[String]) -> Option<&str> {
        let mut current = &self.tree;
        for key in chain {
            current = current.as_object()?.get(key)?;
        }
        current.as_str()
    }
}

/// Locate the constants object literal: the default-export value (directly or
/// through an identifier), or failing that the first top-level `const`
/// initialized with an object.
fn find_exported_object<'t>(root: Node<'t>, source: &str) -> Option<Node<'t>> {
    let mut default_export_value: Option<Node> = None;

    let mut cursor = root.walk();
    for top in root.children(&mut cursor) {
        if top.kind() != "export_statement" {
            continue;
        }
        let has_default = {
            let mut export_cursor = top.walk();
            top.children(&mut export_cursor)
                .any(|c| c.kind() == "default")
        };
        if !has_default {
            continue;
        }
        let mut export_cursor = top.walk();
        for child in top.children(&mut export_cursor) {
            if matches!(child.kind(), "object" | "identifier" | "as_expression") {
                default_export_value = Some(child);
            }
        }
    }

    match default_export_value {
        Some(node) if node.kind() == "object" => Some(node),
        Some(node) if node.kind() == "as_expression" => {
            node.named_child(0).filter(|n| n.kind() == "object")
        }
        Some(node) if node.kind() == "identifier" => {
            let name = node_text(node, source);
            find_declarator_object(root, source, Some(name))
        }
        _ => find_declarator_object(root, source, None),
    }
}

/// First top-level declarator with an object initializer, optionally filtered
/// by name.
fn find_declarator_object<'t>(
    root: Node<'t>,
    source: &str,
    name: Option<&str>,
) -> Option<Node<'t>> {
    let mut found = None;
    crate::ast::walk_tree(root, &mut |node| {
        if found.is_some() {
            return false;
        }
        if node.kind() == "variable_declarator" {
            let matches_name = match name {
                Some(wanted) => node
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source) == wanted)
                    .unwrap_or(false),
                None => true,
            };
            if matches_name {
                if let Some(value) = node.child_by_field_name("value") {
                    let value = if value.kind() == "as_expression" {
                        value.named_child(0).unwrap_or(value)
                    } else {
                        value
                    };
                    if value.kind() == "object" {
                        found = Some(value);
                    }
                }
            }
            return false;
        }
        true
    });
    found
}
