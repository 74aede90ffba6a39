use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::AnalyzerConfig;

/// Everything the analyzer needs to know about the repository under analysis.
///
/// Built once at startup and passed by reference into every extractor — there
/// is no process-wide mutable state. All file identifiers handed around the
/// analyzer are repo-relative POSIX-style path strings; this type owns the
/// mapping back to the real filesystem.
pub struct AnalyzerContext {
    root: PathBuf,
    pub config: AnalyzerConfig,
}

impl AnalyzerContext {
    /// Load the context for a repository root, reading `tsconfig.json` and
    /// `rootmap.toml` if present.
    pub fn load(root: &Path) -> Result<Self> {
        let config = AnalyzerConfig::load(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a repo-relative file id.
    pub fn abs(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Whether a repo-relative id names an existing regular file.
    pub fn is_file(&self, rel: &str) -> bool {
        self.abs(rel).is_file()
    }

    /// Whether a repo-relative id names an existing directory.
    pub fn is_dir(&self, rel: &str) -> bool {
        self.abs(rel).is_dir()
    }

    /// Read a repo-relative file to a string.
    pub fn read_to_string(&self, rel: &str) -> Result<String> {
        std::fs::read_to_string(self.abs(rel))
            .with_context(|| format!("failed to read {rel}"))
    }
}

/// Lexically normalize a POSIX-style path: resolve `.` and `..` segments and
/// collapse duplicate separators. Never touches the filesystem — the analyzer
/// normalizes ids for files that may not exist yet.
pub fn normalize_path(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // Popping past the repo root clamps at the root rather than
                // escaping it; such an id can never name a tracked file.
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

/// Join a repo-relative directory and a (possibly relative) specifier, then normalize.
pub fn join_paths(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        normalize_path(rel)
    } else {
        normalize_path(&format!("{dir}/{rel}"))
    }
}

/// The repo-relative directory containing `file` (empty string at the root).
pub fn parent_dir(file: &str) -> &str {
    match file.rfind('/') {
        Some(idx) => &file[..idx],
        None => "",
    }
}
