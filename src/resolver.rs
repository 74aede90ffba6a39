use crate::context::{AnalyzerContext, join_paths, normalize_path, parent_dir};

/// Host-provided standard modules that are always treated as repo-external.
pub const HOST_BUILTIN_MODULES: &[&str] = &["fs", "path", "console", "child_process"];

/// Directory under the repo root holding vendored libraries; any bare
/// specifier whose first segment names a directory here is repo-external.
pub const VENDORED_LIBRARY_ROOT: &str = "node_modules";

/// Bundler-defined virtual aliases (frozen set). The identity entries exist so
/// bare specifiers under these roots resolve in place instead of falling
/// through to the templates-directory default.
pub const VIRTUAL_ALIASES: &[(&str, &str)] = &[
    ("assets/constants", "assets/constants.ts"),
    (
        "assets/rich_text_component_definitions",
        "assets/rich_text_components_definitions.ts",
    ),
    ("assets", "assets"),
    ("core/templates", "core/templates"),
    ("extensions", "extensions"),
];

/// Default root joined onto bare specifiers that survive the library check and
/// match no alias.
pub const DEFAULT_IMPORT_ROOT: &str = "core/templates";

/// Extensions a fully resolved file id can legitimately carry. A resolved path
/// ending in none of these is "extensionless" and triggers `.ts`/`.js` probing.
const KNOWN_EXTENSIONS: &[&str] = &[".ts", ".js", ".html", ".css", ".md", ".json", ".txt"];

/// Returns true if `path` already names a concrete file kind.
pub fn has_known_extension(path: &str) -> bool {
    KNOWN_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Resolves import specifiers to repo-relative file ids.
///
/// Built once per run from the analyzer context; the alias table is the union
/// of `tsconfig.json` path aliases and the frozen virtual-alias set, matched
/// longest prefix first. Resolution never fails: repo-external and
/// unresolvable specifiers yield `None`, which callers treat as "no edge".
pub struct ImportResolver<'a> {
    ctx: &'a AnalyzerContext,
    /// (pattern, target) pairs sorted by descending pattern length.
    aliases: Vec<(String, String)>,
}

impl<'a> ImportResolver<'a> {
    pub fn new(ctx: &'a AnalyzerContext) -> Self {
        let mut aliases: Vec<(String, String)> = ctx.config.path_aliases.clone();
        for (pattern, target) in VIRTUAL_ALIASES {
            aliases.push(((*pattern).to_owned(), (*target).to_owned()));
        }
        // Longest prefix first so `assets/constants` wins over `assets`.
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        Self { ctx, aliases }
    }

    /// Resolve `spec` as written in `from_file` to a repo-relative file id.
    ///
    /// Returns `None` for repo-external specifiers (host builtins and vendored
    /// libraries). The returned id is not guaranteed to exist: extensionless
    /// specifiers that match no `.ts`/`.js` sibling come back unchanged.
    pub fn resolve(&self, spec: &str, from_file: &str) -> Option<String> {
        if self.is_library_external(spec) {
            return None;
        }

        let resolved = if let Some(rewritten) = self.rewrite_alias(spec) {
            rewritten
        } else if spec.starts_with('.') {
            join_paths(parent_dir(from_file), spec)
        } else {
            join_paths(DEFAULT_IMPORT_ROOT, spec)
        };

        Some(self.probe_extension(resolved))
    }

    /// A specifier is library-external iff it is not relative AND its first
    /// segment names a host builtin or a vendored-library directory.
    fn is_library_external(&self, spec: &str) -> bool {
        if spec.starts_with('.') {
            return false;
        }
        let first_segment = spec.split('/').next().unwrap_or(spec);
        HOST_BUILTIN_MODULES.contains(&first_segment)
            || self
                .ctx
                .is_dir(&format!("{VENDORED_LIBRARY_ROOT}/{first_segment}"))
    }

    /// Rewrite the longest matching alias prefix, if any.
    fn rewrite_alias(&self, spec: &str) -> Option<String> {
        for (pattern, target) in &self.aliases {
            if spec == pattern.as_str() {
                return Some(normalize_path(target));
            }
            if let Some(rest) = spec.strip_prefix(pattern) {
                if rest.starts_with('/') {
                    return Some(normalize_path(&format!("{target}{rest}")));
                }
            }
        }
        None
    }

    /// Append the first of `.ts`/`.js` that names an existing file; a path that
    /// already carries a concrete extension, or matches neither probe, is
    /// returned unchanged.
    fn probe_extension(&self, path: String) -> String {
        if has_known_extension(&path) {
            return path;
        }
        let ts = format!("{path}.ts");
        if self.ctx.is_file(&ts) {
            return ts;
        }
        let js = format!("{path}.js");
        if self.ctx.is_file(&js) {
            return js;
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("core/templates/services")).unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/lodash")).unwrap();
        fs::write(
            dir.path().join("core/templates/services/alerts.service.ts"),
            "",
        )
        .unwrap();
        fs::write(dir.path().join("core/templates/app.constants.js"), "").unwrap();
        fs::write(dir.path().join("assets/constants.ts"), "").unwrap();
        dir
    }

    fn context_for(root: &Path) -> AnalyzerContext {
        AnalyzerContext::load(root).unwrap()
    }

    #[test]
    fn test_host_builtins_are_external() {
        let dir = fixture();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        for builtin in ["fs", "path", "console", "child_process"] {
            assert_eq!(resolver.resolve(builtin, "core/templates/x.ts"), None);
        }
    }

    #[test]
    fn test_vendored_library_is_external() {
        let dir = fixture();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(resolver.resolve("lodash", "core/templates/x.ts"), None);
        assert_eq!(resolver.resolve("lodash/merge", "core/templates/x.ts"), None);
    }

    #[test]
    fn test_relative_specifier_with_extension_probe() {
        let dir = fixture();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(
            resolver
                .resolve("./services/alerts.service", "core/templates/app.ts")
                .as_deref(),
            Some("core/templates/services/alerts.service.ts")
        );
    }

    #[test]
    fn test_extension_probe_prefers_ts_over_js() {
        let dir = fixture();
        fs::write(dir.path().join("core/templates/app.constants.ts"), "").unwrap();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(
            resolver
                .resolve("./app.constants", "core/templates/main.ts")
                .as_deref(),
            Some("core/templates/app.constants.ts")
        );
    }

    #[test]
    fn test_extension_probe_falls_back_to_js() {
        let dir = fixture();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(
            resolver
                .resolve("./app.constants", "core/templates/main.ts")
                .as_deref(),
            Some("core/templates/app.constants.js")
        );
    }

    #[test]
    fn test_virtual_alias_rewrite() {
        let dir = fixture();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(
            resolver
                .resolve("assets/constants", "core/templates/main.ts")
                .as_deref(),
            Some("assets/constants.ts")
        );
    }

    #[test]
    fn test_longest_alias_prefix_wins() {
        let dir = fixture();
        fs::write(dir.path().join("assets/images.ts"), "").unwrap();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        // `assets/images` must go through the identity `assets` alias, not
        // the more specific `assets/constants` one.
        assert_eq!(
            resolver
                .resolve("assets/images", "core/templates/main.ts")
                .as_deref(),
            Some("assets/images.ts")
        );
    }

    #[test]
    fn test_tsconfig_alias_rewrite() {
        let dir = fixture();
        fs::write(
            dir.path().join("tsconfig.json"),
            r#"{"compilerOptions": {"paths": {"services/*": ["core/templates/services/*"]}}}"#,
        )
        .unwrap();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(
            resolver
                .resolve("services/alerts.service", "core/templates/main.ts")
                .as_deref(),
            Some("core/templates/services/alerts.service.ts")
        );
    }

    #[test]
    fn test_bare_specifier_joins_templates_root() {
        let dir = fixture();
        fs::write(dir.path().join("core/templates/third-party.ts"), "").unwrap();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(
            resolver
                .resolve("third-party", "core/templates/pages/x.ts")
                .as_deref(),
            Some("core/templates/third-party.ts")
        );
    }

    #[test]
    fn test_unknown_extensionless_returned_unchanged() {
        let dir = fixture();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(
            resolver
                .resolve("./does-not-exist", "core/templates/main.ts")
                .as_deref(),
            Some("core/templates/does-not-exist")
        );
    }

    #[test]
    fn test_template_url_with_extension_untouched() {
        let dir = fixture();
        let ctx = context_for(dir.path());
        let resolver = ImportResolver::new(&ctx);
        assert_eq!(
            resolver
                .resolve("./banner.component.html", "core/templates/pages/banner.ts")
                .as_deref(),
            Some("core/templates/pages/banner.component.html")
        );
    }
}
