//! CLI parse: clap types for bulkgen. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::maintenance::ItemLimit;

/// Bulkgen CLI - Resumable batch generation of content items and terms
#[derive(Parser)]
#[command(name = "bulkgen")]
#[command(about = "Resumable, interruption-tolerant batch generation of content items")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable all logging
    #[arg(long, default_value = "false", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate items for one or more jobs
    Generate {
        #[command(subcommand)]
        command: GenerateCommands,
    },
    /// Preview one item of a job without writing anything
    Test {
        #[command(subcommand)]
        command: TestCommands,
    },
    /// List configured jobs
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Delete the terms generated by a job
    #[command(alias = "delete_generated_terms")]
    DeleteGeneratedTerms {
        /// Job id
        id: String,
        /// Item ids to keep, comma separated
        #[arg(long = "exclude_term_ids", value_delimiter = ',')]
        exclude_term_ids: Vec<u64>,
        #[command(flatten)]
        args: MaintenanceArgs,
    },
    /// Move the content generated by a job to the trash
    #[command(alias = "trash_generated_content")]
    TrashGeneratedContent {
        /// Job id
        id: String,
        /// Item ids to keep, comma separated
        #[arg(long = "exclude_post_ids", value_delimiter = ',')]
        exclude_post_ids: Vec<u64>,
        #[command(flatten)]
        args: MaintenanceArgs,
    },
    /// Permanently delete the content generated by a job
    #[command(alias = "delete_generated_content")]
    DeleteGeneratedContent {
        /// Job id
        id: String,
        /// Item ids to keep, comma separated
        #[arg(long = "exclude_post_ids", value_delimiter = ',')]
        exclude_post_ids: Vec<u64>,
        #[command(flatten)]
        args: MaintenanceArgs,
    },
    /// Show the persisted progress of a job's latest run
    Status {
        /// Job id
        id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Request cancellation of a job's unfinished run
    Cancel {
        /// Job id
        id: String,
    },
    /// Show the result log of a run
    Log {
        /// Job id
        id: String,
        /// Run nonce (default: the latest run)
        #[arg(long)]
        run: Option<String>,
        /// Only show error entries
        #[arg(long)]
        errors_only: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Apply one step-protocol request to this workspace and print the response
    Invoke {
        /// JSON request body (read from stdin when omitted)
        #[arg(long)]
        request: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum GenerateCommands {
    /// Generate content items
    Content {
        /// Job ids, comma separated
        ids: String,
        /// Row offset a fresh run starts at
        #[arg(long = "resume_index")]
        resume_index: Option<u64>,
        /// Number of items to generate (default: all remaining rows)
        #[arg(long = "number_of_posts")]
        number_of_posts: Option<u64>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Generate taxonomy terms
    Terms {
        /// Job ids, comma separated
        ids: String,
        /// Row offset a fresh run starts at
        #[arg(long = "resume_index")]
        resume_index: Option<u64>,
        /// Number of items to generate (default: all remaining rows)
        #[arg(long = "number_of_terms")]
        number_of_terms: Option<u64>,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Subcommand)]
pub enum TestCommands {
    /// Preview a content job
    Content {
        /// Job id
        id: String,
    },
    /// Preview a terms job
    Terms {
        /// Job id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// List content jobs
    Content {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List terms jobs
    Terms {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Driver overrides shared by the generate subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Items requested per step
    #[arg(long)]
    pub step_size: Option<u32>,
    /// Abort the run at the first failed step
    #[arg(long, conflicts_with = "continue_on_error")]
    pub stop_on_error: bool,
    /// Retry failed steps instead of aborting
    #[arg(long)]
    pub continue_on_error: bool,
    /// Pause before retrying a failed step, in milliseconds
    #[arg(long)]
    pub retry_pause_ms: Option<u64>,
    /// Continue the job's unfinished run
    #[arg(long)]
    pub resume: bool,
    /// Step endpoint of a remote bulkgen server
    #[arg(long)]
    pub remote: Option<String>,
}

impl RunArgs {
    pub fn stop_on_error_override(&self) -> Option<bool> {
        match (self.stop_on_error, self.continue_on_error) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Options shared by the bulk maintenance commands
#[derive(Args, Debug, Clone)]
pub struct MaintenanceArgs {
    /// Maximum items to affect; -1 or "all" for no limit
    #[arg(long, default_value = "-1", allow_hyphen_values = true)]
    pub limit: ItemLimit,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
    /// Report what would be affected without changing anything
    #[arg(long)]
    pub dry_run: bool,
    /// Output format (text or json)
    #[arg(long, default_value = "text")]
    pub format: String,
}
