pub mod html;
pub mod source;

use std::collections::HashMap;

use anyhow::{Result, bail};
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::ast;
use crate::context::AnalyzerContext;
use crate::framework::{FrameworkInfo, extract_framework_infos};
use crate::graph::{DependencyGraph, EdgeKind};
use crate::overrides::MANUAL_DEPENDENCIES;
use crate::resolver::ImportResolver;

use html::extract_html_edges;
use source::extract_source_edges;

/// The edge-set builder's output: the framework-info map and the dependency
/// graph, both keyed by repo-relative file id in discovery order. This module
/// exclusively owns both; the root projector only reads them.
pub struct EdgeSet {
    pub framework: IndexMap<String, Vec<FrameworkInfo>>,
    pub graph: DependencyGraph,
}

/// Returns true for frontend unit-test files, which never emit framework
/// symbols by convention.
fn is_spec_file(file: &str) -> bool {
    file.ends_with(".spec.ts") || file.ends_with(".spec.js")
}

fn is_source_file(file: &str) -> bool {
    file.ends_with(".ts") || file.ends_with(".js")
}

/// Drive the extractors over the full file list.
///
/// Phase 1 parses every typed/untyped source in parallel (CPU-bound — rayon
/// `par_iter`), producing framework infos and source edges per file; trees are
/// dropped immediately after extraction. Phase 2 extracts HTML edges in
/// parallel using the completed framework map as a lookup table. Phase 3
/// assembles the graph sequentially in discovery order, seeding each file with
/// its manual overrides before the extracted edges.
pub fn build_edge_set(
    ctx: &AnalyzerContext,
    files: &[String],
    resolver: &ImportResolver,
    verbose: bool,
) -> Result<EdgeSet> {
    // Phase 1: typed/untyped sources.
    let source_results: Vec<(String, Vec<FrameworkInfo>, Vec<(String, EdgeKind)>)> = files
        .par_iter()
        .filter(|file| is_source_file(file))
        .map(|file| -> Result<(String, Vec<FrameworkInfo>, Vec<(String, EdgeKind)>)> {
            let source = ctx.read_to_string(file)?;
            let tree = ast::parse_source(file, &source)?;
            let infos = if is_spec_file(file) {
                Vec::new()
            } else {
                extract_framework_infos(&tree, &source, file, resolver, ctx)?
            };
            let edges = extract_source_edges(&tree, &source, file, resolver, &infos, ctx)?;
            Ok((file.clone(), infos, edges))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut framework: IndexMap<String, Vec<FrameworkInfo>> = IndexMap::new();
    let mut source_edges: HashMap<String, Vec<(String, EdgeKind)>> = HashMap::new();
    for (file, infos, edges) in source_results {
        if verbose {
            eprintln!("  {} framework symbols, {} edges from {file}", infos.len(), edges.len());
        }
        framework.insert(file.clone(), infos);
        source_edges.insert(file, edges);
    }

    // Phase 2: markup, with the framework map complete.
    let html_results: Vec<(String, Vec<(String, EdgeKind)>)> = files
        .par_iter()
        .filter(|file| file.ends_with(".html"))
        .map(|file| -> Result<(String, Vec<(String, EdgeKind)>)> {
            let content = ctx.read_to_string(file)?;
            let edges = extract_html_edges(&content, file, &framework, resolver, ctx)?;
            Ok((file.clone(), edges))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut html_edges: HashMap<String, Vec<(String, EdgeKind)>> = HashMap::new();
    for (file, edges) in html_results {
        if verbose {
            eprintln!("  {} edges from {file}", edges.len());
        }
        html_edges.insert(file, edges);
    }

    // Phase 3: sequential graph assembly in discovery order.
    let mut graph = DependencyGraph::new();
    for file in files {
        graph.add_file(file);

        for (overridden, targets) in MANUAL_DEPENDENCIES {
            if *overridden == file.as_str() {
                for target in *targets {
                    if !ctx.is_file(target) {
                        bail!("'{target}' (manual dependency of '{file}') does not exist");
                    }
                    graph.add_dependency(file, target, EdgeKind::Manual);
                }
            }
        }

        let extracted = source_edges
            .get(file.as_str())
            .or_else(|| html_edges.get(file.as_str()));
        if let Some(edges) = extracted {
            for (target, kind) in edges {
                graph.add_dependency(file, target, kind.clone());
            }
        }
    }

    Ok(EdgeSet { framework, graph })
}
