use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::Directed;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use serde::Serialize;

/// How a tracked file participates in the graph, classified by extension.
/// Only typed/untyped sources and markup carry outgoing edges; stylesheets and
/// opaque files are terminal nodes carried only when referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    TypedSource,
    UntypedSource,
    Markup,
    Stylesheet,
    Opaque,
}

/// Classify a repo-relative file id by its extension suffix.
pub fn classify_file(path: &str) -> FileKind {
    if path.ends_with(".ts") {
        FileKind::TypedSource
    } else if path.ends_with(".js") {
        FileKind::UntypedSource
    } else if path.ends_with(".html") {
        FileKind::Markup
    } else if path.ends_with(".css") {
        FileKind::Stylesheet
    } else {
        FileKind::Opaque
    }
}

/// The kind of directed dependency edge between two files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// Static import declaration. `specifier` is the raw string from source.
    Import { specifier: String },
    /// Dynamic `import(...)` call.
    DynamicImport { specifier: String },
    /// `require(...)` call (or `import x = require(...)`).
    Require { specifier: String },
    /// Component class → its template file.
    Template,
    /// `.import.ts` entry point → its sibling `.mainpage.html`.
    MainPage,
    /// HTML file → source file declaring a component/directive whose selector
    /// appears in the markup.
    Selector { selector: String },
    /// HTML file → source file declaring a pipe referenced in text or an
    /// attribute value.
    Pipe { selector: String },
    /// HTML file → module named by a `@load(...)` directive in element text.
    Load,
    /// HTML file → stylesheet referenced by a `<link>`/`<preload>` tag.
    Stylesheet,
    /// Entry from the manual-overrides table.
    Manual,
}

/// A file node in the dependency graph.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub path: String,
    pub kind: FileKind,
}

/// The file-to-file dependency multigraph: a directed petgraph `StableGraph`
/// with an O(1) path lookup index.
///
/// Nodes are repo-relative file ids; node insertion order is discovery order
/// and, because nothing is ever removed, `node_indices()` replays it. Edges
/// between a given pair are unique (first kind wins) and per-node dependency
/// lists come back in first-seen order.
pub struct DependencyGraph {
    pub graph: StableGraph<FileNode, EdgeKind, Directed>,
    pub file_index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            file_index: HashMap::new(),
        }
    }

    /// Add a file node. Returns the existing index if the file is already present.
    pub fn add_file(&mut self, path: &str) -> NodeIndex {
        if let Some(&existing) = self.file_index.get(path) {
            return existing;
        }
        let idx = self.graph.add_node(FileNode {
            path: path.to_owned(),
            kind: classify_file(path),
        });
        self.file_index.insert(path.to_owned(), idx);
        idx
    }

    /// Add a dependency edge, creating missing nodes. Duplicate edges between
    /// the same pair are suppressed — the first discovered kind is kept.
    pub fn add_dependency(&mut self, from: &str, to: &str, kind: EdgeKind) {
        let from_idx = self.add_file(from);
        let to_idx = self.add_file(to);
        if self.graph.find_edge(from_idx, to_idx).is_some() {
            return;
        }
        self.graph.add_edge(from_idx, to_idx, kind);
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.file_index.contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.file_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// File ids in discovery order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(|idx| self.graph[idx].path.as_str())
    }

    /// The path stored at a node index.
    pub fn path_of(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].path
    }

    /// Outgoing dependencies of a file in first-seen order.
    pub fn dependencies_of(&self, path: &str) -> Vec<&str> {
        let idx = match self.file_index.get(path) {
            Some(&idx) => idx,
            None => return Vec::new(),
        };
        self.ordered_neighbors(idx, petgraph::Direction::Outgoing)
            .into_iter()
            .map(|n| self.graph[n].path.as_str())
            .collect()
    }

    /// Files that depend on `idx`, in edge-insertion order.
    pub fn referrers_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.ordered_neighbors(idx, petgraph::Direction::Incoming)
    }

    /// Neighbor indices sorted by edge insertion order. Petgraph iterates
    /// adjacency lists most-recent-first; sorting by edge id restores the
    /// deterministic discovery order the output format requires.
    fn ordered_neighbors(
        &self,
        idx: NodeIndex,
        direction: petgraph::Direction,
    ) -> Vec<NodeIndex> {
        let mut edges: Vec<(usize, NodeIndex)> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    petgraph::Direction::Outgoing => e.target(),
                    petgraph::Direction::Incoming => e.source(),
                };
                (e.id().index(), other)
            })
            .collect();
        edges.sort_unstable_by_key(|(edge_id, _)| *edge_id);
        edges.into_iter().map(|(_, n)| n).collect()
    }

    /// The full dependency mapping as an ordered map for serialization:
    /// files in discovery order, dependencies in first-seen order.
    pub fn to_ordered_map(&self) -> IndexMap<String, Vec<String>> {
        let mut map = IndexMap::new();
        for idx in self.graph.node_indices() {
            let path = self.graph[idx].path.clone();
            let deps = self
                .ordered_neighbors(idx, petgraph::Direction::Outgoing)
                .into_iter()
                .map(|n| self.graph[n].path.clone())
                .collect();
            map.insert(path, deps);
        }
        map
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
