//! gorun - Script-like runner for Go source files
//!
//! CLI entry point: manifest actions, then compile-and-run.

use console::style;
use gorun::cache::SourceUnit;
use gorun::cli::{commands, Cli};
use gorun::config::ConfigManager;
use gorun::error::GorunResult;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GorunResult<()> {
    let cli = Cli::parse_with_env();

    if let Some(shell) = cli.completions {
        commands::completions(shell);
        return Ok(());
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug.
    // Logs go to stderr; stdout belongs to the program being run.
    let filter = match cli.verbose {
        0 => EnvFilter::new("gorun=warn"),
        1 => EnvFilter::new("gorun=info"),
        _ => EnvFilter::new("gorun=debug"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let Some(raw_source) = cli.program.first() else {
        return Err(gorun::GorunError::User("no source file given".to_string()));
    };

    if cli.has_manifest_action() {
        let source = SourceUnit::resolve(Path::new(raw_source))?;
        if cli.diff {
            commands::manifest::diff(&source.path)?;
        } else if cli.extract {
            commands::manifest::extract(&source.path)?;
        } else {
            commands::manifest::embed(&source.path, &cli.embed_ignore_regex)?;
        }
    }

    if cli.no_run {
        if !cli.has_manifest_action() {
            eprintln!("--no-run specified, but nothing else specified to do. Exit.");
        }
        return Ok(());
    }

    let never = commands::run(&cli.program, &config).await?;
    match never {}
}
