//! Root-file projection: collapse the file-to-file dependency graph into a
//! per-file set of root files by reverse reachability.
//!
//! Pass 1 walks the reverse graph while skipping framework module files so
//! intermediate modules do not absorb roots prematurely. Pass 2 then expands
//! every root that is not itself a page module *through* module files, until a
//! page boundary or an unreferenced entry file is reached.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};
use indexmap::{IndexMap, IndexSet};
use petgraph::stable_graph::NodeIndex;

use crate::context::AnalyzerContext;
use crate::framework::FrameworkInfo;
use crate::graph::DependencyGraph;
use crate::overrides::{ACCEPTANCE_TEST_DIR, ALWAYS_VALID_ROOTS, CI_SUITE_CONFIG_DIR};

/// Frontend unit-test files never count as referrers and are always valid
/// roots for themselves. Spec files under the acceptance-test directory are
/// end-to-end suites, not frontend unit tests, so the exception keeps them in
/// the reverse graph.
pub fn is_frontend_test_file(path: &str) -> bool {
    path.ends_with(".spec.ts") && !path.starts_with(&format!("{ACCEPTANCE_TEST_DIR}/"))
}

pub struct RootProjector<'a> {
    graph: &'a DependencyGraph,
    /// Files declaring at least one framework Module annotation.
    angular_modules: HashSet<NodeIndex>,
    /// Files registered as lazy targets of top-level URLs; terminal for the walk.
    page_modules: HashSet<NodeIndex>,
    /// Memoized reverse queries, keyed by (file, ignore_modules).
    refs_cache: HashMap<(NodeIndex, bool), Vec<NodeIndex>>,
}

impl<'a> RootProjector<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        framework: &IndexMap<String, Vec<FrameworkInfo>>,
        page_modules: &IndexSet<String>,
    ) -> Self {
        let angular_modules = framework
            .iter()
            .filter(|(_, infos)| infos.iter().any(FrameworkInfo::is_module))
            .filter_map(|(file, _)| graph.file_index.get(file.as_str()).copied())
            .collect();
        let page_module_indices = page_modules
            .iter()
            .filter_map(|file| graph.file_index.get(file.as_str()).copied())
            .collect();
        Self {
            graph,
            angular_modules,
            page_modules: page_module_indices,
            refs_cache: HashMap::new(),
        }
    }

    /// All files whose dependency list contains `x`, excluding frontend test
    /// files and, when `ignore_modules` is set, framework module files.
    fn refs(&mut self, x: NodeIndex, ignore_modules: bool) -> Vec<NodeIndex> {
        if let Some(cached) = self.refs_cache.get(&(x, ignore_modules)) {
            return cached.clone();
        }
        let result: Vec<NodeIndex> = self
            .graph
            .referrers_of(x)
            .into_iter()
            .filter(|&k| !is_frontend_test_file(self.graph.path_of(k)))
            .filter(|&k| !(ignore_modules && self.angular_modules.contains(&k)))
            .collect();
        self.refs_cache.insert((x, ignore_modules), result.clone());
        result
    }

    /// The recursive reverse walk. `visited` cuts cycles: a file reached again
    /// along the same traversal contributes nothing.
    fn walk(
        &mut self,
        x: NodeIndex,
        ignore_modules: bool,
        visited: &mut HashSet<NodeIndex>,
    ) -> Vec<NodeIndex> {
        if !visited.insert(x) {
            return Vec::new();
        }
        let refs = self.refs(x, ignore_modules);
        if refs.is_empty() || self.page_modules.contains(&x) {
            return vec![x];
        }
        let mut roots = IndexSet::new();
        for r in refs {
            for root in self.walk(r, ignore_modules, visited) {
                roots.insert(root);
            }
        }
        roots.into_iter().collect()
    }

    /// Roots of a single file. An empty traversal result means the walk was
    /// swallowed entirely by a cycle with no outside referrer, in which case
    /// the file is its own root — the same rule that covers files with no
    /// incoming edges at all.
    ///
    /// The cache holds completed top-level results only; it is consulted here,
    /// never mid-walk, so a shared cache computes exactly what a fresh one
    /// would.
    fn roots_of(
        &mut self,
        x: NodeIndex,
        ignore_modules: bool,
        cache: &mut HashMap<NodeIndex, Vec<NodeIndex>>,
    ) -> Vec<NodeIndex> {
        if let Some(cached) = cache.get(&x) {
            return cached.clone();
        }
        let mut visited = HashSet::new();
        let mut result = self.walk(x, ignore_modules, &mut visited);
        if result.is_empty() {
            result = vec![x];
        }
        cache.insert(x, result.clone());
        result
    }

    /// Two-pass projection over every file in the graph, in discovery order.
    pub fn project(&mut self) -> IndexMap<String, Vec<String>> {
        let indices: Vec<NodeIndex> = self.graph.graph.node_indices().collect();

        // Pass 1 (module-filtered): preliminary roots, cached across files.
        let mut pass1_cache: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut pass1: Vec<(NodeIndex, Vec<NodeIndex>)> = Vec::new();
        for &idx in &indices {
            let roots = self.roots_of(idx, true, &mut pass1_cache);
            pass1.push((idx, roots));
        }

        // Pass 2 (module-inclusive): expand every preliminary root through the
        // module files pass 1 deliberately skipped, with a fresh cache.
        let mut pass2_cache: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut projection = IndexMap::new();
        for (idx, preliminary) in pass1 {
            let mut expanded = IndexSet::new();
            for root in preliminary {
                for final_root in self.roots_of(root, false, &mut pass2_cache) {
                    expanded.insert(final_root);
                }
            }
            let paths: Vec<String> = expanded
                .into_iter()
                .map(|n| self.graph.path_of(n).to_owned())
                .collect();
            projection.insert(self.graph.path_of(idx).to_owned(), paths);
        }

        projection
    }
}

/// One CI suite declaration; only the `module` field is consulted.
#[derive(serde::Deserialize)]
struct CiSuite {
    module: String,
}

#[derive(serde::Deserialize)]
struct CiSuiteConfig {
    suites: Vec<CiSuite>,
}

/// Build the always-valid root whitelist: the fixed anchors plus every
/// `suites[].module` entry from the CI suite configuration directory. The
/// directory may be absent; a present-but-malformed config file is fatal.
pub fn load_root_whitelist(ctx: &AnalyzerContext) -> Result<IndexSet<String>> {
    let mut whitelist: IndexSet<String> =
        ALWAYS_VALID_ROOTS.iter().map(|s| (*s).to_owned()).collect();

    let config_dir = ctx.abs(CI_SUITE_CONFIG_DIR);
    if !config_dir.is_dir() {
        return Ok(whitelist);
    }

    let mut entries: Vec<std::path::PathBuf> = std::fs::read_dir(&config_dir)
        .map(|iter| {
            iter.filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
                .collect()
        })
        .unwrap_or_default();
    entries.sort_unstable();

    for entry in entries {
        let contents = std::fs::read_to_string(&entry)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", entry.display()))?;
        let config: CiSuiteConfig = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", entry.display()))?;
        for suite in config.suites {
            whitelist.insert(suite.module);
        }
    }

    Ok(whitelist)
}

/// Check that every emitted root belongs to the page-module set, the
/// whitelist, or is a frontend test file. Fails with the full offender list.
pub fn validate_roots(
    projection: &IndexMap<String, Vec<String>>,
    page_modules: &IndexSet<String>,
    whitelist: &IndexSet<String>,
) -> Result<()> {
    let mut offenders: IndexMap<&str, &str> = IndexMap::new();
    for (file, roots) in projection {
        for root in roots {
            let valid = page_modules.contains(root.as_str())
                || whitelist.contains(root.as_str())
                || is_frontend_test_file(root);
            if !valid {
                offenders.entry(root.as_str()).or_insert(file.as_str());
            }
        }
    }

    if offenders.is_empty() {
        return Ok(());
    }

    let mut lines: Vec<String> = offenders
        .iter()
        .map(|(root, reached_from)| {
            format!(
                "Invalid root file '{root}' (reached from '{reached_from}'): \
                 not a page module, whitelisted root, or frontend test file"
            )
        })
        .collect();
    lines.sort_unstable();
    bail!("{}", lines.join("\n"));
}
