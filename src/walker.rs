use std::path::Path;

use anyhow::Result;

use crate::context::AnalyzerContext;

/// File extensions the analyzer tracks. Typed/untyped sources and markup carry
/// edges; stylesheets and documentation are terminal nodes.
pub const INCLUDE_EXTENSIONS: &[&str] = &["ts", "js", "html", "css", "md"];

/// Paths that are never part of the analyzed tree regardless of .gitignore:
/// vendored libraries and the analyzer's own artifacts.
const INTERNAL_EXCLUSIONS: &[&str] = &[
    "node_modules",
    "third_party",
    "dist",
    "build",
    "dependencies-mapping.json",
    "root-files-mapping.json",
];

/// Walk the repository and collect every tracked file as a repo-relative
/// POSIX-style path string.
///
/// The exclusion layers are `.gitignore`, the built-in analyzer exclusions
/// (vendored libraries, generated artifacts), and any `rootmap.toml` globs.
/// The result is sorted so that enumeration is deterministic and stable
/// across runs given the same filesystem snapshot.
///
/// With `verbose`, every discovered path is traced to stderr.
pub fn walk_repository(ctx: &AnalyzerContext, verbose: bool) -> Result<Vec<String>> {
    let walker = ignore::WalkBuilder::new(ctx.root())
        .standard_filters(true)
        // The analyzed tree may be a bare checkout with no .git directory;
        // .gitignore must still apply.
        .require_git(false)
        .build();

    let mut files = Vec::new();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                eprintln!("warning: {err}");
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        let rel = match relative_id(ctx.root(), path) {
            Some(r) => r,
            None => continue,
        };

        if is_internally_excluded(&rel) {
            continue;
        }

        if is_excluded_by_config(&rel, &ctx.config.exclude) {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !INCLUDE_EXTENSIONS.contains(&ext) {
            continue;
        }

        if verbose {
            eprintln!("{rel}");
        }

        files.push(rel);
    }

    files.sort_unstable();
    Ok(files)
}

/// Convert an absolute walked path into a repo-relative POSIX id.
fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut id = String::new();
    for component in rel.components() {
        let segment = component.as_os_str().to_str()?;
        if !id.is_empty() {
            id.push('/');
        }
        id.push_str(segment);
    }
    if id.is_empty() { None } else { Some(id) }
}

/// Returns true if the id starts with (or is) one of the built-in exclusions.
fn is_internally_excluded(rel: &str) -> bool {
    INTERNAL_EXCLUSIONS.iter().any(|excl| {
        rel == *excl || rel.starts_with(&format!("{excl}/"))
    })
}

/// Returns true if `rel` matches any exclusion glob from `rootmap.toml`.
fn is_excluded_by_config(rel: &str, patterns: &[String]) -> bool {
    for pattern in patterns {
        if let Ok(matcher) = glob::Pattern::new(pattern) {
            if matcher.matches(rel) {
                return true;
            }
            // Also treat a bare directory name as excluding its subtree.
            if rel.split('/').any(|segment| matcher.matches(segment)) {
                return true;
            }
        }
    }
    false
}
