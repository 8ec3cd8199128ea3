//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::{Commands, GenerateCommands, ListCommands, TestCommands};

/// Command name string for logs (e.g. "generate.content", "delete-generated-terms").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Generate { command } => format!("generate.{}", generate_command_name(command)),
        Commands::Test { command } => format!("test.{}", test_command_name(command)),
        Commands::List { command } => format!("list.{}", list_command_name(command)),
        Commands::DeleteGeneratedTerms { .. } => "delete-generated-terms".to_string(),
        Commands::TrashGeneratedContent { .. } => "trash-generated-content".to_string(),
        Commands::DeleteGeneratedContent { .. } => "delete-generated-content".to_string(),
        Commands::Status { .. } => "status".to_string(),
        Commands::Cancel { .. } => "cancel".to_string(),
        Commands::Log { .. } => "log".to_string(),
        Commands::Invoke { .. } => "invoke".to_string(),
    }
}

pub fn generate_command_name(command: &GenerateCommands) -> &'static str {
    match command {
        GenerateCommands::Content { .. } => "content",
        GenerateCommands::Terms { .. } => "terms",
    }
}

pub fn test_command_name(command: &TestCommands) -> &'static str {
    match command {
        TestCommands::Content { .. } => "content",
        TestCommands::Terms { .. } => "terms",
    }
}

pub fn list_command_name(command: &ListCommands) -> &'static str {
    match command {
        ListCommands::Content { .. } => "content",
        ListCommands::Terms { .. } => "terms",
    }
}
