//! Framework symbol extraction.
//!
//! The analyzed codebase registers components, directives, pipes, and modules
//! through decorators on class declarations. The four recognized decorator
//! names form a closed vocabulary; anything else on a class is ignored. These
//! are source-level markers of the codebase under analysis — the extractor
//! dispatches purely on the callee identifier's text.

use anyhow::{Result, bail};
use serde::Serialize;
use tree_sitter::{Node, Tree};

use crate::ast::literal::eval_string;
use crate::ast::node_text;
use crate::context::AnalyzerContext;
use crate::resolver::ImportResolver;

/// A framework annotation attached to a typed/untyped source file.
///
/// One file may contribute several (e.g. a module plus a component declared in
/// the same file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum FrameworkInfo {
    Module {
        class_name: String,
    },
    Component {
        class_name: String,
        selector: Option<String>,
        /// Resolved repo-relative path of the component's template. Always an
        /// existing `.html` file when present.
        template_file_path: Option<String>,
    },
    Directive {
        class_name: String,
        selector: Option<String>,
    },
    Pipe {
        class_name: String,
        /// Sourced from the decorator's `name` property, not `selector`.
        selector: Option<String>,
    },
}

impl FrameworkInfo {
    pub fn class_name(&self) -> &str {
        match self {
            Self::Module { class_name }
            | Self::Component { class_name, .. }
            | Self::Directive { class_name, .. }
            | Self::Pipe { class_name, .. } => class_name,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, Self::Module { .. })
    }
}

/// Extract every framework annotation from a parsed source file.
pub fn extract_framework_infos(
    tree: &Tree,
    source: &str,
    file: &str,
    resolver: &ImportResolver,
    ctx: &AnalyzerContext,
) -> Result<Vec<FrameworkInfo>> {
    let mut infos = Vec::new();
    let root = tree.root_node();

    let mut cursor = root.walk();
    for top in root.children(&mut cursor) {
        match top.kind() {
            "class_declaration" => {
                extract_from_class(top, &[], source, file, resolver, ctx, &mut infos)?;
            }
            "export_statement" => {
                // `@Component(...) export class X` parses with the decorators
                // attached to the export statement rather than the class.
                let mut outer_decorators = Vec::new();
                let mut class_node = None;
                let mut export_cursor = top.walk();
                for child in top.children(&mut export_cursor) {
                    match child.kind() {
                        "decorator" => outer_decorators.push(child),
                        "class_declaration" => class_node = Some(child),
                        _ => {}
                    }
                }
                if let Some(class) = class_node {
                    extract_from_class(
                        class,
                        &outer_decorators,
                        source,
                        file,
                        resolver,
                        ctx,
                        &mut infos,
                    )?;
                }
            }
            _ => {}
        }
    }

    Ok(infos)
}

/// Inspect every decorator call on one class declaration.
fn extract_from_class<'t>(
    class_node: Node<'t>,
    outer_decorators: &[Node<'t>],
    source: &str,
    file: &str,
    resolver: &ImportResolver,
    ctx: &AnalyzerContext,
    infos: &mut Vec<FrameworkInfo>,
) -> Result<()> {
    let class_name = match class_node.child_by_field_name("name") {
        Some(name) => node_text(name, source).to_owned(),
        None => return Ok(()),
    };

    let mut decorators: Vec<Node> = outer_decorators.to_vec();
    let mut cursor = class_node.walk();
    for child in class_node.children(&mut cursor) {
        if child.kind() == "decorator" {
            decorators.push(child);
        }
    }

    for decorator in decorators {
        let call = match decorator.named_child(0) {
            Some(n) if n.kind() == "call_expression" => n,
            _ => continue,
        };
        let callee = match call.child_by_field_name("function") {
            Some(n) if n.kind() == "identifier" => node_text(n, source),
            _ => continue,
        };

        match callee {
            "NgModule" => infos.push(FrameworkInfo::Module {
                class_name: class_name.clone(),
            }),
            "Component" => {
                let object = decorator_object(call, &class_name, file)?;
                let selector = object
                    .map(|obj| object_string_field(obj, "selector", source, file))
                    .transpose()?
                    .flatten();
                let template_url = object
                    .map(|obj| object_string_field(obj, "templateUrl", source, file))
                    .transpose()?
                    .flatten();
                let template_file_path = template_url
                    .map(|url| resolve_template(&url, &class_name, file, resolver, ctx))
                    .transpose()?;
                infos.push(FrameworkInfo::Component {
                    class_name: class_name.clone(),
                    selector,
                    template_file_path,
                });
            }
            "Directive" => {
                let object = decorator_object(call, &class_name, file)?;
                let selector = object
                    .map(|obj| object_string_field(obj, "selector", source, file))
                    .transpose()?
                    .flatten();
                infos.push(FrameworkInfo::Directive {
                    class_name: class_name.clone(),
                    selector,
                });
            }
            "Pipe" => {
                let object = decorator_object(call, &class_name, file)?;
                let selector = object
                    .map(|obj| object_string_field(obj, "name", source, file))
                    .transpose()?
                    .flatten();
                infos.push(FrameworkInfo::Pipe {
                    class_name: class_name.clone(),
                    selector,
                });
            }
            _ => {}
        }
    }

    Ok(())
}

/// The decorator's sole object-literal argument, if any arguments are present.
fn decorator_object<'t>(
    call: Node<'t>,
    class_name: &str,
    file: &str,
) -> Result<Option<Node<'t>>> {
    let arguments = match call.child_by_field_name("arguments") {
        Some(a) => a,
        None => return Ok(None),
    };
    let mut cursor = arguments.walk();
    let first = arguments
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment");
    match first {
        None => Ok(None),
        Some(node) if node.kind() == "object" => Ok(Some(node)),
        Some(_) => bail!("No object argument on class {class_name} in {file}"),
    }
}

/// Look up a string-valued property of a decorator object literal.
fn object_string_field(
    object: Node,
    key: &str,
    source: &str,
    file: &str,
) -> Result<Option<String>> {
    let mut cursor = object.walk();
    for pair in object.children(&mut cursor) {
        if pair.kind() != "pair" {
            continue;
        }
        let key_node = match pair.child_by_field_name("key") {
            Some(k) => k,
            None => continue,
        };
        let key_text = node_text(key_node, source);
        let key_text = key_text.trim_matches(|c| c == '\'' || c == '"');
        if key_text != key {
            continue;
        }
        let value = match pair.child_by_field_name("value") {
            Some(v) => v,
            None => continue,
        };
        return Ok(Some(eval_string(value, source, file)?));
    }
    Ok(None)
}

/// Resolve a `templateUrl` value and enforce the existing-`.html` invariant.
fn resolve_template(
    url: &str,
    class_name: &str,
    file: &str,
    resolver: &ImportResolver,
    ctx: &AnalyzerContext,
) -> Result<String> {
    let resolved = resolver.resolve(url, file);
    match resolved {
        Some(path) if path.ends_with(".html") && ctx.is_file(&path) => Ok(path),
        Some(path) => bail!(
            "Template '{path}' referenced by class {class_name} in {file} does not exist"
        ),
        None => bail!(
            "Template URL '{url}' referenced by class {class_name} in {file} could not be resolved"
        ),
    }
}
