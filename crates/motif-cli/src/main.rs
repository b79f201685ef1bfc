//! rna-motifs - Main entry point

use clap::Parser;
use motif_cli::commands::query::QueryOptions;
use motif_cli::{Cli, Commands};
use motif_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // .env values are defaults; the real environment wins
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Verbose mode logs debug to the console, otherwise warnings only
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("rna-motifs")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().apply_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> motif_cli::Result<()> {
    let config = cli.config.as_deref();

    match &cli.command {
        Commands::Query {
            pdb_id,
            source,
            mode,
            refresh,
            tool,
            motif_type,
            format,
        } => {
            let options = QueryOptions {
                source: source.clone(),
                mode: *mode,
                refresh: *refresh,
                tool: tool.clone(),
                motif_type: motif_type.clone(),
                format: *format,
            };
            motif_cli::commands::query::run(config, pdb_id, options).await
        },

        Commands::Sources { pdb, format } => {
            motif_cli::commands::sources::run(config, pdb.as_deref(), *format).await
        },

        Commands::Cache { command } => motif_cli::commands::cache::run(config, command).await,
    }
}
