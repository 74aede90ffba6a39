use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Configuration loaded from `rootmap.toml` at the repository root.
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    /// Additional path patterns to exclude from the walk (beyond .gitignore and
    /// the built-in analyzer exclusions).
    pub exclude: Option<Vec<String>>,
    /// Override for the URL prefix stripped by the URL→module matcher.
    pub url_prefix: Option<String>,
}

impl TomlConfig {
    /// Load configuration from `rootmap.toml` in the given root directory.
    ///
    /// The file is optional; an absent or unparsable one falls back to the
    /// empty default (with a warning for the unparsable case).
    pub fn load(root: &Path) -> Self {
        let config_path = root.join("rootmap.toml");

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("warning: failed to parse rootmap.toml: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!("warning: failed to read rootmap.toml: {err}. Using defaults.");
                Self::default()
            }
        }
    }
}

/// Minimal `tsconfig.json` representation — only `compilerOptions.paths` is consulted.
#[derive(Debug, Deserialize)]
struct TsConfig {
    #[serde(rename = "compilerOptions")]
    compiler_options: Option<CompilerOptions>,
}

#[derive(Debug, Deserialize)]
struct CompilerOptions {
    paths: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Resolved analyzer configuration: compiler path aliases plus walk exclusions.
#[derive(Debug, Default)]
pub struct AnalyzerConfig {
    /// Path aliases from `tsconfig.json` `compilerOptions.paths`, with any
    /// trailing `/*` stripped from both pattern and target. Insertion order
    /// follows the tsconfig object.
    pub path_aliases: Vec<(String, String)>,
    /// Exclude globs from `rootmap.toml`.
    pub exclude: Vec<String>,
    /// URL prefix for the matcher (`rootmap.toml` override or the built-in default).
    pub url_prefix: Option<String>,
}

impl AnalyzerConfig {
    /// Load all configuration for a repository root.
    ///
    /// A missing `tsconfig.json` yields no aliases; an unreadable or malformed
    /// one is a fatal config error.
    pub fn load(root: &Path) -> Result<Self> {
        let toml_config = TomlConfig::load(root);

        let mut config = Self {
            path_aliases: Vec::new(),
            exclude: toml_config.exclude.unwrap_or_default(),
            url_prefix: toml_config.url_prefix,
        };

        let tsconfig_path = root.join("tsconfig.json");
        if tsconfig_path.exists() {
            let contents = std::fs::read_to_string(&tsconfig_path)
                .with_context(|| format!("failed to read {}", tsconfig_path.display()))?;
            let tsconfig: TsConfig = serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse {}", tsconfig_path.display()))?;

            if let Some(paths) = tsconfig.compiler_options.and_then(|o| o.paths) {
                for (pattern, targets) in paths {
                    // tsconfig maps each pattern to a list of candidate targets;
                    // only the first one participates in resolution.
                    let target = match targets.as_array().and_then(|a| a.first()) {
                        Some(serde_json::Value::String(s)) => s.clone(),
                        _ => continue,
                    };
                    config
                        .path_aliases
                        .push((strip_star(&pattern), strip_star(&target)));
                }
            }
        }

        Ok(config)
    }
}

/// Strip a trailing `/*` from an alias pattern or target.
fn strip_star(s: &str) -> String {
    s.strip_suffix("/*").unwrap_or(s).to_owned()
}
