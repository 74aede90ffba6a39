pub mod literal;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use tree_sitter::{Node, Parser, Tree};

use crate::context::AnalyzerContext;

// Every rayon worker gets its own Parser, created lazily with the right
// grammar, so the parallel extraction phase never locks.
thread_local! {
    static PARSER_TS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()).unwrap();
        p
    });
    static PARSER_JS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_javascript::LANGUAGE.into()).unwrap();
        p
    });
}

/// Parse a typed (`.ts`) or untyped (`.js`) source file.
///
/// # Errors
/// Fails when tree-sitter cannot produce a tree for the input at all.
pub fn parse_source(file: &str, source: &str) -> Result<Tree> {
    let tree = if file.ends_with(".js") {
        PARSER_JS.with(|p| p.borrow_mut().parse(source.as_bytes(), None))
    } else {
        PARSER_TS.with(|p| p.borrow_mut().parse(source.as_bytes(), None))
    };
    tree.ok_or_else(|| anyhow!("tree-sitter returned None for {file}"))
}

/// UTF-8 text of a node, or the empty string for invalid slices.
pub fn node_text<'a>(node: Node<'a>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// A parsed source file retained for repeated AST queries.
pub struct ParsedSource {
    pub file: String,
    pub source: String,
    pub tree: Tree,
}

/// Lazy parse-and-cache store for source files that are consulted repeatedly
/// outside the bulk extraction fan-out — routing modules, the constants
/// module, lazily loaded page modules.
///
/// The bulk edge extractors do NOT go through this cache: they parse once per
/// file inside the parallel phase and drop the tree immediately to keep
/// resident memory bounded on large repositories.
#[derive(Default)]
pub struct SourceCache {
    cache: HashMap<String, Rc<ParsedSource>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse `file` (a repo-relative id), returning the cached copy
    /// on every subsequent call.
    pub fn load(&mut self, ctx: &AnalyzerContext, file: &str) -> Result<Rc<ParsedSource>> {
        if let Some(parsed) = self.cache.get(file) {
            return Ok(Rc::clone(parsed));
        }
        let source = ctx.read_to_string(file)?;
        let tree = parse_source(file, &source)?;
        let parsed = Rc::new(ParsedSource {
            file: file.to_owned(),
            source,
            tree,
        });
        self.cache.insert(file.to_owned(), Rc::clone(&parsed));
        Ok(parsed)
    }
}

/// Depth-first walk visiting each node before its children; within one level,
/// children are visited in source order. The callback returns `false` to
/// prune the subtree below a node.
pub fn walk_tree<'t>(root: Node<'t>, visit: &mut dyn FnMut(Node<'t>) -> bool) {
    if !visit(root) {
        return;
    }
    let mut cursor = root.walk();
    let children: Vec<Node> = root.children(&mut cursor).collect();
    for child in children {
        walk_tree(child, visit);
    }
}

/// Find the first direct child of `node` with the given kind.
pub fn find_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|child| child.kind() == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typescript_source() {
        let tree = parse_source("a.ts", "const x: string = 'y';").unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_parse_javascript_source() {
        let tree = parse_source("a.js", "var x = require('fs');").unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_walk_tree_is_source_ordered() {
        let src = "import a from './a'; import b from './b';";
        let tree = parse_source("t.ts", src).unwrap();
        let mut seen = Vec::new();
        walk_tree(tree.root_node(), &mut |node| {
            if node.kind() == "string_fragment" {
                seen.push(node_text(node, src).to_owned());
            }
            true
        });
        assert_eq!(seen, vec!["./a".to_owned(), "./b".to_owned()]);
    }

    #[test]
    fn test_source_cache_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mod.ts"), "export const a = 1;").unwrap();
        let ctx = AnalyzerContext::load(dir.path()).unwrap();

        let mut cache = SourceCache::new();
        let first = cache.load(&ctx, "mod.ts").unwrap();
        let second = cache.load(&ctx, "mod.ts").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }
}
