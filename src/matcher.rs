//! URL → page-module matching and the compare-to-golden step.
//!
//! The browser test harness calls [`UrlModuleMatcher::register_url`] on every
//! navigation; at the end of the run [`UrlModuleMatcher::compare_and_output_modules`]
//! diffs the collected page-module set against the suite's golden manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use indexmap::IndexSet;

use crate::overrides::golden_exclusions_for;
use crate::routes::{Route, RouteRegistry};

pub struct UrlModuleMatcher<'a> {
    registry: &'a RouteRegistry,
    url_prefix: String,
    golden_path: Option<PathBuf>,
    /// Page modules implicated by registered URLs, in first-seen order.
    collected: IndexSet<String>,
    /// Deduplicated human-readable match failures, surfaced as one batch.
    errors: IndexSet<String>,
}

impl<'a> UrlModuleMatcher<'a> {
    pub fn new(registry: &'a RouteRegistry, url_prefix: &str) -> Self {
        Self {
            registry,
            url_prefix: url_prefix.to_owned(),
            golden_path: None,
            collected: IndexSet::new(),
            errors: IndexSet::new(),
        }
    }

    /// Install the golden manifest for this run.
    pub fn set_golden_file_path(&mut self, path: PathBuf) {
        self.golden_path = Some(path);
    }

    /// Record a URL visited by the browser under test.
    ///
    /// URLs outside the configured host prefix are ignored. Every matching
    /// route contributes its page module (minus the per-golden exclusions);
    /// a URL matching no route records a deduplicated error instead.
    /// Registering the same URL twice is idempotent.
    pub fn register_url(&mut self, url: &str) {
        let path = match url.strip_prefix(&self.url_prefix) {
            Some(p) => p,
            None => return,
        };
        let path = path.split(['?', '#']).next().unwrap_or("");

        let exclusions = self
            .golden_path
            .as_deref()
            .and_then(Path::to_str)
            .map(golden_exclusions_for)
            .unwrap_or(&[]);

        let mut matched = false;
        for (route, module) in &self.registry.routes {
            if route_matches(route, path) {
                matched = true;
                if !exclusions.contains(&module.as_str()) {
                    self.collected.insert(module.clone());
                }
            }
        }

        if !matched {
            self.errors
                .insert(format!("No page module found for URL '{path}'"));
        }
    }

    /// Write the generated manifest next to the golden and diff against it.
    ///
    /// The generated file is always written; the pass/fail decision is
    /// independent. Fails if any registered URL had no matching route, any
    /// collected module is missing from the golden, or any golden module was
    /// not collected. A missing golden reads as empty.
    pub fn compare_and_output_modules(&self) -> Result<()> {
        let golden_path = self
            .golden_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no golden manifest installed for this run"))?;

        let golden: IndexSet<String> = std::fs::read_to_string(golden_path)
            .map(|contents| {
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let mut observed: Vec<&str> = self.collected.iter().map(String::as_str).collect();
        observed.sort_unstable();

        let generated_path = generated_manifest_path(golden_path);
        let mut contents = observed.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        std::fs::write(&generated_path, contents)
            .with_context(|| format!("failed to write {}", generated_path.display()))?;

        let mut failures: Vec<String> = Vec::new();
        for error in &self.errors {
            failures.push(error.clone());
        }
        for module in &self.collected {
            if !golden.contains(module) {
                failures.push(format!(
                    "Page module '{module}' was exercised but is not in the golden manifest \
                     {}",
                    golden_path.display()
                ));
            }
        }
        for module in &golden {
            if !self.collected.contains(module) {
                failures.push(format!(
                    "Page module '{module}' is in the golden manifest {} but was never \
                     exercised",
                    golden_path.display()
                ));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            bail!("{}", failures.join("\n"));
        }
    }
}

/// Sibling of the golden manifest reflecting what the run actually observed.
pub fn generated_manifest_path(golden: &Path) -> PathBuf {
    let stem = golden
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("golden");
    golden.with_file_name(format!("{stem}-generated.txt"))
}

/// Match a prefix-stripped URL path against one route pattern.
pub fn route_matches(route: &Route, url: &str) -> bool {
    // Exact match short-circuits segment parsing — this is what lets the
    // empty route path match the bare host URL.
    if route.path == url {
        return true;
    }

    let segments: Vec<&str> = url
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return false;
    }

    let parts: Vec<&str> = route.path.split('/').collect();
    if parts.len() > segments.len() {
        return false;
    }

    if route.path_match.as_deref() == Some("full") && parts.len() < segments.len() {
        return false;
    }

    parts
        .iter()
        .zip(segments.iter())
        .all(|(part, segment)| part.starts_with(':') || part == segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn route(path: &str, path_match: Option<&str>) -> Route {
        Route {
            path: path.to_owned(),
            path_match: path_match.map(str::to_owned),
        }
    }

    fn registry(entries: &[(&str, Option<&str>, &str)]) -> RouteRegistry {
        let mut routes = IndexMap::new();
        for (path, path_match, module) in entries {
            routes.insert(route(path, *path_match), (*module).to_owned());
        }
        RouteRegistry { routes }
    }

    #[test]
    fn test_exact_match() {
        assert!(route_matches(&route("about", None), "about"));
        assert!(route_matches(&route("", None), ""));
    }

    #[test]
    fn test_parameter_segment_matches_anything() {
        let r = route("topic_editor/:topic_id", None);
        assert!(route_matches(&r, "topic_editor/abc123"));
        assert!(!route_matches(&r, "story_editor/abc123"));
    }

    #[test]
    fn test_prefix_match_without_path_match_full() {
        let r = route("topic_editor/:topic_id", None);
        assert!(route_matches(&r, "topic_editor/abc123/extra"));
    }

    #[test]
    fn test_path_match_full_rejects_extra_segments() {
        let r = route("topic_editor/:topic_id", Some("full"));
        assert!(route_matches(&r, "topic_editor/abc123"));
        assert!(!route_matches(&r, "topic_editor/abc123/extra"));
    }

    #[test]
    fn test_route_longer_than_url_never_matches() {
        let r = route("a/b/c", None);
        assert!(!route_matches(&r, "a/b"));
    }

    #[test]
    fn test_empty_url_only_matches_empty_route_exactly() {
        assert!(!route_matches(&route("about", None), ""));
        assert!(route_matches(&route("", None), ""));
    }

    #[test]
    fn test_register_url_strips_prefix_and_ignores_foreign_hosts() {
        let reg = registry(&[("learn", None, "pages/learn/learn.module.ts")]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.register_url("http://localhost:8181/learn");
        matcher.register_url("https://example.com/learn");
        assert_eq!(matcher.collected.len(), 1);
        assert!(matcher.errors.is_empty());
    }

    #[test]
    fn test_register_url_drops_query_and_fragment() {
        let reg = registry(&[("learn", Some("full"), "pages/learn/learn.module.ts")]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.register_url("http://localhost:8181/learn?ref=home#section");
        assert_eq!(matcher.collected.len(), 1);
    }

    #[test]
    fn test_unmatched_url_records_deduplicated_error() {
        let reg = registry(&[]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.register_url("http://localhost:8181/nowhere");
        matcher.register_url("http://localhost:8181/nowhere");
        assert_eq!(matcher.errors.len(), 1);
    }

    #[test]
    fn test_compare_succeeds_when_collected_equals_golden() {
        let dir = tempfile::tempdir().unwrap();
        let golden = dir.path().join("suite.txt");
        std::fs::write(&golden, "pages/learn/learn.module.ts\n").unwrap();

        let reg = registry(&[("learn", None, "pages/learn/learn.module.ts")]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.set_golden_file_path(golden.clone());
        matcher.register_url("http://localhost:8181/learn");

        assert!(matcher.compare_and_output_modules().is_ok());
        let generated =
            std::fs::read_to_string(dir.path().join("suite-generated.txt")).unwrap();
        assert_eq!(generated, "pages/learn/learn.module.ts\n");
    }

    #[test]
    fn test_compare_fails_on_missing_golden_entry() {
        let dir = tempfile::tempdir().unwrap();
        let golden = dir.path().join("suite.txt");
        std::fs::write(
            &golden,
            "pages/learn/learn.module.ts\npages/about/about.module.ts\n",
        )
        .unwrap();

        let reg = registry(&[("learn", None, "pages/learn/learn.module.ts")]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.set_golden_file_path(golden);
        matcher.register_url("http://localhost:8181/learn");

        let err = matcher.compare_and_output_modules().unwrap_err();
        assert!(err.to_string().contains("about.module.ts"));
        assert!(err.to_string().contains("never exercised"));
    }

    #[test]
    fn test_compare_fails_on_extra_collected_module() {
        let dir = tempfile::tempdir().unwrap();
        let golden = dir.path().join("suite.txt");
        // Golden intentionally missing; reads as empty.
        let reg = registry(&[("learn", None, "pages/learn/learn.module.ts")]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.set_golden_file_path(golden.clone());
        matcher.register_url("http://localhost:8181/learn");

        let err = matcher.compare_and_output_modules().unwrap_err();
        assert!(err.to_string().contains("not in the golden manifest"));
        // The generated manifest is still written.
        assert!(dir.path().join("suite-generated.txt").exists());
    }

    #[test]
    fn test_compare_batches_url_errors() {
        let dir = tempfile::tempdir().unwrap();
        let golden = dir.path().join("suite.txt");
        std::fs::write(&golden, "").unwrap();

        let reg = registry(&[]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.set_golden_file_path(golden);
        matcher.register_url("http://localhost:8181/ghost");

        let err = matcher.compare_and_output_modules().unwrap_err();
        assert!(err.to_string().contains("No page module found for URL 'ghost'"));
    }

    #[test]
    fn test_per_golden_exclusion_list() {
        let dir = tempfile::tempdir().unwrap();
        let golden = dir.path().join("lightweight-pages.txt");
        std::fs::write(&golden, "").unwrap();

        let excluded = "core/templates/pages/error-pages/error-404/error-404-page.module.ts";
        let reg = registry(&[("error/404", None, excluded)]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.set_golden_file_path(golden);
        matcher.register_url("http://localhost:8181/error/404");

        // The route matched (no URL error) but the module is excluded from
        // collection for this golden, so the empty golden still passes.
        assert!(matcher.compare_and_output_modules().is_ok());
    }

    #[test]
    fn test_all_matching_routes_accumulate() {
        let reg = registry(&[
            ("learn/:id", None, "pages/learn/learn.module.ts"),
            ("learn/math", None, "pages/math/math.module.ts"),
        ]);
        let mut matcher = UrlModuleMatcher::new(&reg, "http://localhost:8181/");
        matcher.register_url("http://localhost:8181/learn/math");
        assert_eq!(matcher.collected.len(), 2);
    }
}
