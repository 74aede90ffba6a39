//! Frozen tables: well-known paths, manual overrides, and root whitelists.
//!
//! Manual overrides exist where inference is insufficient — dependencies wired
//! through the bundler configuration rather than the source text, and routes
//! registered outside the routing modules.

/// Well-known routing modules, in extraction order: the main root and the
/// lightweight root.
pub const ROUTING_MODULES: &[&str] = &[
    "core/templates/pages/root/routing/app.routing.module.ts",
    "core/templates/pages/lightweight-root/routing/app.routing.module.ts",
];

/// The constants module re-exported as an object graph; consulted when a route
/// `path` references `AppConstants.*`.
pub const CONSTANTS_MODULE: &str = "assets/constants.ts";

/// The identifier routes use to reference the constants object graph.
pub const CONSTANTS_ROOT_IDENTIFIER: &str = "AppConstants";

/// Directory of CI suite configuration JSON files; each file's
/// `suites[].module` entries extend the valid-root whitelist.
pub const CI_SUITE_CONFIG_DIR: &str = "core/tests/ci-test-suite-configs";

/// `.spec.ts` files under this directory are end-to-end acceptance suites, not
/// frontend unit tests, and therefore participate in reverse-reachability.
pub const ACCEPTANCE_TEST_DIR: &str = "core/tests/acceptance";

/// Prefix stripped from URLs registered by the browser harness.
pub const DEFAULT_URL_PREFIX: &str = "http://localhost:8181/";

/// Root files that are always valid regardless of route registration:
/// documentation leaves nothing imports, and the anchor module that forces
/// every end-to-end suite to run when touched.
pub const ALWAYS_VALID_ROOTS: &[&str] = &["README.md", "core/templates/run-all-tests.ts"];

/// Files whose dependencies are expressed declaratively because the analyzer
/// cannot infer them from the source text (bundler-injected definitions).
/// Applied as graph seeds before the per-file extractors run.
pub const MANUAL_DEPENDENCIES: &[(&str, &[&str])] = &[(
    "core/templates/services/rich-text-components.service.ts",
    &["assets/rich_text_components_definitions.ts"],
)];

/// Routes registered outside the routing modules, mapped straight to their
/// page modules. These become the initial entries of the route registry.
pub const MANUAL_ROUTE_MODULES: &[(&str, Option<&str>, &str)] = &[
    (
        "topic_editor/:topic_id",
        Some("full"),
        "core/templates/pages/topic-editor-page/topic-editor-page.module.ts",
    ),
    (
        "create/:exploration_id",
        Some("full"),
        "core/templates/pages/exploration-editor-page/exploration-editor-page.module.ts",
    ),
];

/// Page modules excluded from URL-match collection for a given golden
/// manifest, keyed by the golden file name. Some suites visit URLs that load a
/// module outside the suite's assertion scope (e.g. the error page).
pub const GOLDEN_MODULE_EXCLUSIONS: &[(&str, &[&str])] = &[(
    "lightweight-pages.txt",
    &["core/templates/pages/error-pages/error-404/error-404-page.module.ts"],
)];

/// Returns the modules excluded for the golden manifest at `golden_path`.
pub fn golden_exclusions_for(golden_path: &str) -> &'static [&'static str] {
    for (key, modules) in GOLDEN_MODULE_EXCLUSIONS {
        if golden_path.ends_with(key) {
            return modules;
        }
    }
    &[]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_exclusions_match_by_file_name() {
        let excluded = golden_exclusions_for("core/tests/goldens/lightweight-pages.txt");
        assert_eq!(excluded.len(), 1);
        assert!(golden_exclusions_for("core/tests/goldens/other.txt").is_empty());
    }
}
