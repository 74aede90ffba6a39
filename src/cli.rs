use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Static dependency-graph analyzer for Angular-style web repositories.
///
/// rootmap maps every tracked file to the set of root files (page modules,
/// test manifests, entry anchors) that transitively depend on it, so that
/// downstream tooling can select impacted end-to-end suites and assert the
/// page modules exercised by browser tests.
#[derive(Parser, Debug)]
#[command(
    name = "rootmap",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Invoked with no subcommand, the analyzer runs a full `analyze` pass
    /// over the current directory.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for subcommand results.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// Compact one-line-per-result format (default).
    #[default]
    Compact,
    /// Structured JSON for downstream tooling.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full analysis: walk the repository, extract edges, project
    /// root files, validate them, and write the JSON artifacts.
    Analyze {
        /// Repository root to analyze (defaults to the current directory).
        path: Option<PathBuf>,

        /// Print each discovered file and per-file extraction counts.
        #[arg(short, long)]
        verbose: bool,

        /// Output the run summary as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Parse the routing modules and dump the route table
    /// (pattern → page module).
    Routes {
        /// Repository root to analyze (defaults to the current directory).
        path: Option<PathBuf>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Register a batch of visited URLs against the route table and diff the
    /// implicated page modules against a golden manifest.
    ///
    /// This is the offline face of the interface the browser test harness
    /// drives programmatically.
    Match {
        /// Repository root to analyze (defaults to the current directory).
        path: Option<PathBuf>,

        /// Golden manifest: one expected page-module path per line.
        #[arg(long)]
        golden: PathBuf,

        /// File of visited URLs, one per line.
        #[arg(long)]
        urls: PathBuf,

        /// URL prefix to strip before matching (overrides configuration).
        #[arg(long)]
        url_prefix: Option<String>,
    },
}
