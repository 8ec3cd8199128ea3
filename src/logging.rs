//! Logging System
//!
//! Structured logging through `tracing`. Level, format and destination come from
//! the `[logging]` config section, `BULKGEN_LOG*` environment variables and CLI
//! flags, in increasing order of precedence.

use crate::error::RunError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Disable all log output when false
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path; resolved under the user data directory when unset
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format, terminal destinations only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "file".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: true,
            modules: HashMap::new(),
        }
    }
}

/// Output destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Initialize the logging system
///
/// Priority order (highest to lowest):
/// 1. CLI arguments (applied to the config before this call)
/// 2. Environment variables (BULKGEN_LOG, BULKGEN_LOG_FORMAT, ...)
/// 3. Configuration file
/// 4. Defaults
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), RunError> {
    if config.map(|c| !c.enabled).unwrap_or(false) {
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let json = determine_format(config)? == "json";
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if output.stdout {
        layers.push(terminal_layer(json, use_color, std::io::stdout));
    }
    if output.stderr {
        layers.push(terminal_layer(json, use_color, std::io::stderr));
    }
    if output.file {
        let log_file = config
            .and_then(|c| c.file.clone())
            .map(Ok)
            .unwrap_or_else(|| resolve_log_file_path(None, None, None))?;
        let writer = Arc::new(open_log_file(&log_file)?);
        let layer = fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false)
            .with_writer(writer);
        layers.push(if json { layer.json().boxed() } else { layer.boxed() });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| RunError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn terminal_layer<W>(json: bool, use_color: bool, writer: W) -> BoxedLayer
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);
    if json {
        layer.json().boxed()
    } else {
        layer.with_ansi(use_color).boxed()
    }
}

fn open_log_file(log_file: &Path) -> Result<std::fs::File, RunError> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            RunError::ConfigError(format!("Failed to create log directory: {}", e))
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(|e| {
            RunError::ConfigError(format!("Failed to open log file {:?}: {}", log_file, e))
        })
}

/// Pick the log file: explicit CLI path, then config path (relative to the
/// workspace), then `<data dir>/logs/<workspace name>.log`.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    workspace_root: Option<&Path>,
) -> Result<PathBuf, RunError> {
    if let Some(path) = cli_file {
        return Ok(path);
    }
    if let Some(path) = config_file {
        return Ok(match workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        });
    }

    let workspace_name = workspace_root
        .and_then(|root| root.canonicalize().ok())
        .and_then(|root| root.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "default".to_string());
    let dirs = ProjectDirs::from("", "", "bulkgen").ok_or_else(|| {
        RunError::ConfigError("Could not determine a data directory for logs".to_string())
    })?;
    Ok(dirs
        .data_dir()
        .join("logs")
        .join(format!("{}.log", workspace_name)))
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, RunError> {
    if let Ok(filter) = EnvFilter::try_from_env("BULKGEN_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{}={}", module, module_level);
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e| RunError::ConfigError(format!("Invalid log directive: {}", e)))?,
            );
        }
    }

    if let Ok(modules_str) = std::env::var("BULKGEN_LOG_MODULES") {
        for module_spec in modules_str.split(',') {
            if let Some((module, module_level)) = module_spec.split_once('=') {
                let directive = format!("{}={}", module.trim(), module_level.trim());
                filter = filter.add_directive(directive.parse().map_err(|e| {
                    RunError::ConfigError(format!("Invalid log directive from env: {}", e))
                })?);
            }
        }
    }

    Ok(filter)
}

fn determine_format(config: Option<&LoggingConfig>) -> Result<String, RunError> {
    if let Ok(format) = std::env::var("BULKGEN_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(RunError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format.to_string())
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<OutputDestinations, RunError> {
    if let Ok(output) = std::env::var("BULKGEN_LOG_OUTPUT") {
        return parse_output_destinations(&output);
    }
    parse_output_destinations(config.map(|c| c.output.as_str()).unwrap_or("file"))
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, RunError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        _ => {
            return Err(RunError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', or 'file+stderr')",
                output
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}
