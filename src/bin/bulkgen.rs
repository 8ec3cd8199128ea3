//! bulkgen: resumable batch generation from the command line.
//!
//! Exit status is 0 on success (a cancelled run included), 2 when the job or
//! configuration is unusable, and 1 for every other failure, an aborted run
//! among them.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bulkgen::cli::{map_error, Cli, RunContext};
use bulkgen::config::ConfigLoader;
use bulkgen::error::RunError;
use bulkgen::logging::{init_logging, resolve_log_file_path, LoggingConfig};
use clap::Parser;
use tracing::{debug, error, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = apply_log_flags(configured_logging(&cli), &cli);
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(1);
    }
    debug!(workspace = %cli.workspace.display(), "bulkgen starting");

    let outcome = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .and_then(|context| context.execute(&cli.command));
    match outcome {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let RunError::Aborted { report, .. } = &e {
                // Runs that finished before the abort are still worth showing.
                println!("{}", report);
                warn!(error = %e, "generation aborted");
            } else {
                error!(error = %e, "command failed");
            }
            eprintln!("{}", map_error(&e));
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(e: &RunError) -> u8 {
    match e {
        RunError::JobNotFound(_)
        | RunError::InvalidJob(_)
        | RunError::ConfigError(_)
        | RunError::HookNotFound(_) => 2,
        _ => 1,
    }
}

/// The `[logging]` section of whichever config this invocation reads. An
/// unreadable config falls back to defaults here; `RunContext` reports it.
fn configured_logging(cli: &Cli) -> LoggingConfig {
    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    loaded.map(|c| c.logging).unwrap_or_default()
}

/// Layer the command-line flags over the configured logging section.
///
/// `--quiet` wins outright. `--verbose` raises the level and mirrors file
/// logs to stderr. The explicit `--log-*` flags override both.
fn apply_log_flags(mut config: LoggingConfig, cli: &Cli) -> LoggingConfig {
    if cli.quiet {
        config.enabled = false;
        return config;
    }
    if cli.verbose {
        config.level = "debug".to_string();
        if config.output == "file" {
            config.output = "file+stderr".to_string();
        }
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.output = output.clone();
    }
    config.file = log_file(&config, cli.log_file.clone(), &cli.workspace);
    config
}

fn log_file(config: &LoggingConfig, flag: Option<PathBuf>, workspace: &Path) -> Option<PathBuf> {
    if !config.output.starts_with("file") {
        return flag.or_else(|| config.file.clone());
    }
    resolve_log_file_path(flag.clone(), config.file.clone(), Some(workspace))
        .ok()
        .or(flag)
}
