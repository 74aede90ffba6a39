pub mod ast;
pub mod cli;
pub mod config;
pub mod context;
pub mod edges;
pub mod framework;
pub mod graph;
pub mod matcher;
pub mod output;
pub mod overrides;
pub mod projector;
pub mod resolver;
pub mod routes;
pub mod walker;

use std::path::Path;

use anyhow::Result;
use indexmap::IndexMap;

use ast::SourceCache;
use context::AnalyzerContext;
use edges::{EdgeSet, build_edge_set};
use matcher::UrlModuleMatcher;
use output::{
    AnalyzeStats, DEPENDENCIES_MAPPING_FILE, ROOT_FILES_MAPPING_FILE, write_json_artifact,
};
use overrides::DEFAULT_URL_PREFIX;
use projector::{RootProjector, load_root_whitelist, validate_roots};
use resolver::ImportResolver;
use routes::RouteRegistry;
use routes::constants::ConstantsRegistry;

/// Everything an analysis run produces, for callers that want more than the
/// exit status (the `routes` subcommand, integration tests, downstream
/// consumers embedding the analyzer).
pub struct AnalysisOutcome {
    pub edge_set: EdgeSet,
    pub registry: RouteRegistry,
    pub projection: IndexMap<String, Vec<String>>,
    pub stats: AnalyzeStats,
}

/// The full single-shot pipeline: walk, extract, build the graph, project
/// roots, validate, and write the JSON artifacts at the repository root.
///
/// Artifacts are written before validation so a failing run still leaves the
/// mappings on disk for inspection; the returned error carries the offender
/// list for the exit-code decision.
pub fn analyze_repository(root: &Path, verbose: bool) -> Result<AnalysisOutcome> {
    let start = std::time::Instant::now();

    let ctx = AnalyzerContext::load(root)?;
    let files = walker::walk_repository(&ctx, verbose)?;
    let resolver = ImportResolver::new(&ctx);

    let mut cache = SourceCache::new();
    let constants = ConstantsRegistry::load(&ctx, &mut cache)?;
    let registry = RouteRegistry::build(&ctx, &mut cache, &resolver, &constants)?;
    let page_modules = registry.page_modules();

    let edge_set = build_edge_set(&ctx, &files, &resolver, verbose)?;
    write_json_artifact(
        ctx.root(),
        DEPENDENCIES_MAPPING_FILE,
        &edge_set.graph.to_ordered_map(),
    )?;

    let mut projector = RootProjector::new(&edge_set.graph, &edge_set.framework, &page_modules);
    let projection = projector.project();
    write_json_artifact(ctx.root(), ROOT_FILES_MAPPING_FILE, &projection)?;

    let whitelist = load_root_whitelist(&ctx)?;
    validate_roots(&projection, &page_modules, &whitelist)?;

    let stats = AnalyzeStats::collect(
        &edge_set,
        registry.routes.len(),
        page_modules.len(),
        &projection,
        start.elapsed().as_secs_f64(),
    );

    Ok(AnalysisOutcome {
        edge_set,
        registry,
        projection,
        stats,
    })
}

/// Build only the route registry for a repository (the `routes` and `match`
/// subcommands do not need the dependency graph).
pub fn build_route_registry(root: &Path) -> Result<(AnalyzerContext, RouteRegistry)> {
    let ctx = AnalyzerContext::load(root)?;
    let resolver = ImportResolver::new(&ctx);
    let mut cache = SourceCache::new();
    let constants = ConstantsRegistry::load(&ctx, &mut cache)?;
    let registry = RouteRegistry::build(&ctx, &mut cache, &resolver, &constants)?;
    Ok((ctx, registry))
}

/// Register every URL from `urls` (one per line) against the route table and
/// run the compare-to-golden step.
pub fn match_urls_against_golden(
    root: &Path,
    golden: &Path,
    urls_file: &Path,
    url_prefix_override: Option<&str>,
) -> Result<()> {
    let (ctx, registry) = build_route_registry(root)?;

    let url_prefix = url_prefix_override
        .map(str::to_owned)
        .or_else(|| ctx.config.url_prefix.clone())
        .unwrap_or_else(|| DEFAULT_URL_PREFIX.to_owned());

    let mut url_matcher = UrlModuleMatcher::new(&registry, &url_prefix);
    url_matcher.set_golden_file_path(golden.to_path_buf());

    let urls = std::fs::read_to_string(urls_file)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", urls_file.display()))?;
    for line in urls.lines() {
        let url = line.trim();
        if !url.is_empty() {
            url_matcher.register_url(url);
        }
    }

    url_matcher.compare_and_output_modules()
}
