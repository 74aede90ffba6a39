//! Outgoing-edge extraction for typed (`.ts`) and untyped (`.js`) source files.

use anyhow::{Result, bail};
use tree_sitter::{Node, Tree};

use crate::ast::literal::eval_string;
use crate::ast::node_text;
use crate::context::AnalyzerContext;
use crate::framework::FrameworkInfo;
use crate::graph::EdgeKind;
use crate::resolver::{ImportResolver, has_known_extension};

/// Suffix convention: a `.import.ts` bundle entry point implicitly depends on
/// its sibling `.mainpage.html` shell.
const IMPORT_ENTRY_SUFFIX: &str = ".import.ts";
const MAINPAGE_SUFFIX: &str = ".mainpage.html";

/// Enumerate the outgoing edges of one source file, in first-seen order:
///
/// 1. a recursive source-order AST walk collecting static imports (including
///    re-exports with a source), `require(...)` calls, `import x = require()`
///    clauses, and dynamic `import(...)` calls;
/// 2. template edges for every component declared in this file;
/// 3. the `.import.ts` → `.mainpage.html` sibling convention.
///
/// A resolved specifier naming a nonexistent file with a concrete extension is
/// a fatal resolution error — the analyzed codebase guarantees imports exist.
/// Library-external specifiers and extensionless unknowns produce no edge.
pub fn extract_source_edges(
    tree: &Tree,
    source: &str,
    file: &str,
    resolver: &ImportResolver,
    own_infos: &[FrameworkInfo],
    ctx: &AnalyzerContext,
) -> Result<Vec<(String, EdgeKind)>> {
    let mut edges = EdgeList::new();

    walk(tree.root_node(), source, file, resolver, ctx, &mut edges)?;

    for info in own_infos {
        if let FrameworkInfo::Component {
            template_file_path: Some(template),
            ..
        } = info
        {
            edges.push(template.clone(), EdgeKind::Template);
        }
    }

    if let Some(stem) = file.strip_suffix(IMPORT_ENTRY_SUFFIX) {
        let mainpage = format!("{stem}{MAINPAGE_SUFFIX}");
        if ctx.is_file(&mainpage) {
            edges.push(mainpage, EdgeKind::MainPage);
        }
    }

    Ok(edges.into_vec())
}

/// Recursive walk, visiting each node before its children in source order.
fn walk(
    node: Node,
    source: &str,
    file: &str,
    resolver: &ImportResolver,
    ctx: &AnalyzerContext,
    edges: &mut EdgeList,
) -> Result<()> {
    match node.kind() {
        "import_statement" | "export_statement" => {
            // `import ... from 'm'` and `export ... from 'm'` both carry a
            // source field; a source-less export carries no edge.
            if let Some(source_node) = node.child_by_field_name("source") {
                let specifier = eval_string(source_node, source, file)?;
                resolve_and_push(
                    &specifier,
                    EdgeKind::Import {
                        specifier: specifier.clone(),
                    },
                    file,
                    resolver,
                    ctx,
                    edges,
                )?;
            }
        }
        "import_require_clause" => {
            // `import fs = require('fs')`
            if let Some(string_node) = crate::ast::find_child_of_kind(node, "string") {
                let specifier = eval_string(string_node, source, file)?;
                resolve_and_push(
                    &specifier,
                    EdgeKind::Require {
                        specifier: specifier.clone(),
                    },
                    file,
                    resolver,
                    ctx,
                    edges,
                )?;
            }
        }
        "call_expression" => {
            if let Some(callee) = node.child_by_field_name("function") {
                let kind = match callee.kind() {
                    "import" => Some(CallKind::DynamicImport),
                    "identifier" if node_text(callee, source) == "require" => {
                        Some(CallKind::Require)
                    }
                    _ => None,
                };
                if let Some(call_kind) = kind {
                    if let Some(argument) = first_argument(node) {
                        let specifier = eval_string(argument, source, file)?;
                        let edge_kind = match call_kind {
                            CallKind::DynamicImport => EdgeKind::DynamicImport {
                                specifier: specifier.clone(),
                            },
                            CallKind::Require => EdgeKind::Require {
                                specifier: specifier.clone(),
                            },
                        };
                        resolve_and_push(&specifier, edge_kind, file, resolver, ctx, edges)?;
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        walk(child, source, file, resolver, ctx, edges)?;
    }
    Ok(())
}

enum CallKind {
    DynamicImport,
    Require,
}

/// First non-comment argument of a call expression.
fn first_argument(call: Node) -> Option<Node> {
    let arguments = call.child_by_field_name("arguments")?;
    let mut cursor = arguments.walk();
    arguments
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")
}

/// Resolve a specifier and record the edge, enforcing the existence invariant.
fn resolve_and_push(
    specifier: &str,
    kind: EdgeKind,
    file: &str,
    resolver: &ImportResolver,
    ctx: &AnalyzerContext,
    edges: &mut EdgeList,
) -> Result<()> {
    let target = match resolver.resolve(specifier, file) {
        Some(t) => t,
        None => return Ok(()), // library-external — no edge
    };
    if ctx.is_file(&target) {
        edges.push(target, kind);
    } else if has_known_extension(&target) {
        bail!("'{target}' imported by '{file}' (specifier '{specifier}') does not exist");
    }
    // Extensionless unknown paths are recoverable: no edge.
    Ok(())
}

/// Ordered edge accumulator with first-seen target dedup.
struct EdgeList {
    seen: std::collections::HashSet<String>,
    edges: Vec<(String, EdgeKind)>,
}

impl EdgeList {
    fn new() -> Self {
        Self {
            seen: std::collections::HashSet::new(),
            edges: Vec::new(),
        }
    }

    fn push(&mut self, target: String, kind: EdgeKind) {
        if self.seen.insert(target.clone()) {
            self.edges.push((target, kind));
        }
    }

    fn into_vec(self) -> Vec<(String, EdgeKind)> {
        self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_source;
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn extract(
        dir: &tempfile::TempDir,
        file: &str,
        src: &str,
        infos: &[FrameworkInfo],
    ) -> Result<Vec<(String, EdgeKind)>> {
        let ctx = AnalyzerContext::load(dir.path()).unwrap();
        let resolver = ImportResolver::new(&ctx);
        let tree = parse_source(file, src).unwrap();
        extract_source_edges(&tree, src, file, &resolver, infos, &ctx)
    }

    #[test]
    fn test_static_imports_in_source_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/b.ts", "");
        write(dir.path(), "core/templates/a.ts", "");
        let src = "import { B } from './b';\nimport { A } from './a';\n";
        let edges = extract(&dir, "core/templates/main.ts", src, &[]).unwrap();
        let targets: Vec<&str> = edges.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(targets, vec!["core/templates/b.ts", "core/templates/a.ts"]);
    }

    #[test]
    fn test_duplicate_imports_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/b.ts", "");
        let src = "import { B } from './b';\nconst again = require('./b');\n";
        let edges = extract(&dir, "core/templates/main.ts", src, &[]).unwrap();
        assert_eq!(edges.len(), 1);
        assert!(matches!(edges[0].1, EdgeKind::Import { .. }));
    }

    #[test]
    fn test_dynamic_import_detected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/pages/lazy.module.ts", "");
        let src = "const loadIt = () => import('./pages/lazy.module').then(m => m.LazyModule);";
        let edges = extract(&dir, "core/templates/routing.ts", src, &[]).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0, "core/templates/pages/lazy.module.ts");
        assert!(matches!(edges[0].1, EdgeKind::DynamicImport { .. }));
    }

    #[test]
    fn test_require_call_detected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/legacy.js", "");
        let src = "var legacy = require('./legacy');";
        let edges = extract(&dir, "core/templates/main.js", src, &[]).unwrap();
        assert_eq!(edges.len(), 1);
        assert!(matches!(edges[0].1, EdgeKind::Require { .. }));
    }

    #[test]
    fn test_concatenated_specifier_evaluated() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/pages/learn/learn.ts", "");
        let src = "const mod = require('./pages/' + 'learn/learn');";
        let edges = extract(&dir, "core/templates/main.ts", src, &[]).unwrap();
        assert_eq!(edges[0].0, "core/templates/pages/learn/learn.ts");
    }

    #[test]
    fn test_external_imports_produce_no_edges() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/@angular/core")).unwrap();
        let src = "import { Component } from '@angular/core';\nimport * as fs from 'fs';\n";
        let edges = extract(&dir, "core/templates/main.ts", src, &[]).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn test_missing_target_with_extension_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let src = "import { X } from './gone.service.ts';";
        let err = extract(&dir, "core/templates/main.ts", src, &[]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("core/templates/gone.service.ts"));
        assert!(message.contains("core/templates/main.ts"));
    }

    #[test]
    fn test_extensionless_unknown_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let src = "import { X } from './maybe-generated';";
        let edges = extract(&dir, "core/templates/main.ts", src, &[]).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn test_component_template_edge_appended() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/pages/x/x.component.html", "");
        write(dir.path(), "core/templates/pages/x/helper.ts", "");
        let src = "import { H } from './helper';";
        let infos = vec![FrameworkInfo::Component {
            class_name: "XComponent".to_owned(),
            selector: Some("oppia-x".to_owned()),
            template_file_path: Some("core/templates/pages/x/x.component.html".to_owned()),
        }];
        let edges = extract(&dir, "core/templates/pages/x/x.component.ts", src, &infos).unwrap();
        let targets: Vec<&str> = edges.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(
            targets,
            vec![
                "core/templates/pages/x/helper.ts",
                "core/templates/pages/x/x.component.html",
            ]
        );
        assert!(matches!(edges[1].1, EdgeKind::Template));
    }

    #[test]
    fn test_import_entry_gains_mainpage_edge() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/pages/about/about-page.mainpage.html", "");
        let edges = extract(
            &dir,
            "core/templates/pages/about/about-page.import.ts",
            "",
            &[],
        )
        .unwrap();
        assert_eq!(
            edges,
            vec![(
                "core/templates/pages/about/about-page.mainpage.html".to_owned(),
                EdgeKind::MainPage
            )]
        );
    }

    #[test]
    fn test_import_entry_without_mainpage_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let edges = extract(&dir, "core/templates/pages/solo/solo.import.ts", "", &[]).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn test_reexport_with_source_counts_as_import() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "core/templates/util.ts", "");
        let src = "export { helper } from './util';";
        let edges = extract(&dir, "core/templates/index.ts", src, &[]).unwrap();
        assert_eq!(edges[0].0, "core/templates/util.ts");
    }
}
