use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use rootmap::cli::{Cli, Commands, OutputFormat};
use rootmap::output::print_summary;
use rootmap::{analyze_repository, build_route_registry, match_urls_against_golden};

fn repo_root(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None => std::env::current_dir()
            .map_err(|e| anyhow::anyhow!("cannot determine current directory: {e}")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // No subcommand means a full analysis of the current directory — the
    // analyzer's inputs are implicit in the repository itself.
    let command = cli.command.unwrap_or(Commands::Analyze {
        path: None,
        verbose: false,
        json: false,
    });

    match command {
        Commands::Analyze {
            path,
            verbose,
            json,
        } => {
            let root = repo_root(path)?;
            let outcome = analyze_repository(&root, verbose)?;
            print_summary(&outcome.stats, json);
        }

        Commands::Routes { path, format } => {
            let root = repo_root(path)?;
            let (_ctx, registry) = build_route_registry(&root)?;

            match format {
                OutputFormat::Compact => {
                    for (route, module) in &registry.routes {
                        match &route.path_match {
                            Some(path_match) => {
                                println!("{} [{}] -> {}", route.path, path_match, module)
                            }
                            None => println!("{} -> {}", route.path, module),
                        }
                    }
                }
                OutputFormat::Json => {
                    let entries: Vec<serde_json::Value> = registry
                        .routes
                        .iter()
                        .map(|(route, module)| {
                            serde_json::json!({
                                "path": route.path,
                                "pathMatch": route.path_match,
                                "module": module,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                }
            }
        }

        Commands::Match {
            path,
            golden,
            urls,
            url_prefix,
        } => {
            let root = repo_root(path)?;
            match_urls_against_golden(&root, &golden, &urls, url_prefix.as_deref())?;
            println!("URL matches agree with {}", golden.display());
        }
    }

    Ok(())
}
