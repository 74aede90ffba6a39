use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;

use crate::edges::EdgeSet;
use crate::framework::FrameworkInfo;
use crate::graph::FileKind;

/// Artifact file names written at the repository root.
pub const DEPENDENCIES_MAPPING_FILE: &str = "dependencies-mapping.json";
pub const ROOT_FILES_MAPPING_FILE: &str = "root-files-mapping.json";

/// Aggregate statistics produced by an analysis run.
#[derive(Debug, Serialize)]
pub struct AnalyzeStats {
    pub file_count: usize,
    /// Typed-source (.ts) file count.
    pub typed_source_count: usize,
    /// Untyped-source (.js) file count.
    pub untyped_source_count: usize,
    /// Markup (.html) file count.
    pub markup_count: usize,
    /// Stylesheet (.css) file count.
    pub stylesheet_count: usize,
    pub modules: usize,
    pub components: usize,
    pub directives: usize,
    pub pipes: usize,
    /// Total dependency edges in the graph.
    pub edge_count: usize,
    /// Registered route patterns.
    pub route_count: usize,
    /// Page modules registered as lazy route targets.
    pub page_module_count: usize,
    /// Distinct root files across the final projection.
    pub distinct_root_count: usize,
    /// Wall-clock time for the run in seconds.
    pub elapsed_secs: f64,
}

impl AnalyzeStats {
    pub fn collect(
        edge_set: &EdgeSet,
        route_count: usize,
        page_module_count: usize,
        projection: &IndexMap<String, Vec<String>>,
        elapsed_secs: f64,
    ) -> Self {
        let mut typed_source_count = 0;
        let mut untyped_source_count = 0;
        let mut markup_count = 0;
        let mut stylesheet_count = 0;
        for idx in edge_set.graph.graph.node_indices() {
            match edge_set.graph.graph[idx].kind {
                FileKind::TypedSource => typed_source_count += 1,
                FileKind::UntypedSource => untyped_source_count += 1,
                FileKind::Markup => markup_count += 1,
                FileKind::Stylesheet => stylesheet_count += 1,
                FileKind::Opaque => {}
            }
        }

        let mut modules = 0;
        let mut components = 0;
        let mut directives = 0;
        let mut pipes = 0;
        for infos in edge_set.framework.values() {
            for info in infos {
                match info {
                    FrameworkInfo::Module { .. } => modules += 1,
                    FrameworkInfo::Component { .. } => components += 1,
                    FrameworkInfo::Directive { .. } => directives += 1,
                    FrameworkInfo::Pipe { .. } => pipes += 1,
                }
            }
        }

        let distinct_roots: std::collections::HashSet<&str> = projection
            .values()
            .flat_map(|roots| roots.iter().map(String::as_str))
            .collect();

        Self {
            file_count: edge_set.graph.file_count(),
            typed_source_count,
            untyped_source_count,
            markup_count,
            stylesheet_count,
            modules,
            components,
            directives,
            pipes,
            edge_count: edge_set.graph.edge_count(),
            route_count,
            page_module_count,
            distinct_root_count: distinct_roots.len(),
            elapsed_secs,
        }
    }
}

/// Print a summary of the analysis run to stdout: pretty-printed JSON when
/// `json` is set, a short human-readable block otherwise.
pub fn print_summary(stats: &AnalyzeStats, json: bool) {
    if json {
        match serde_json::to_string_pretty(stats) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error serialising stats: {}", e),
        }
        return;
    }

    println!(
        "Analyzed {} files in {:.2}s",
        stats.file_count, stats.elapsed_secs
    );
    println!(
        "  {} typed sources, {} untyped sources, {} markup, {} stylesheets",
        stats.typed_source_count,
        stats.untyped_source_count,
        stats.markup_count,
        stats.stylesheet_count,
    );
    println!(
        "  {} modules, {} components, {} directives, {} pipes",
        stats.modules, stats.components, stats.directives, stats.pipes,
    );
    println!("  {} dependency edges", stats.edge_count);
    println!(
        "  {} routes over {} page modules, {} distinct roots",
        stats.route_count, stats.page_module_count, stats.distinct_root_count,
    );
}

/// Write a pretty-printed JSON artifact at the repository root.
pub fn write_json_artifact<T: Serialize>(root: &Path, name: &str, value: &T) -> Result<()> {
    let path = root.join(name);
    let mut contents = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {name}"))?;
    contents.push('\n');
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}
