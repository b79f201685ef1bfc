//! RNA Motif CLI Library
//!
//! Command-line inspection of the motif database layer.
//!
//! # Overview
//!
//! - **Query**: motifs of one structure under the selection policy (`rna-motifs query`)
//! - **Sources**: registered sources and per-structure availability (`rna-motifs sources`)
//! - **Cache**: inspect and maintain the API response cache (`rna-motifs cache`)
//!
//! Configuration is read from an optional TOML file (`--config`), then the
//! `RNA_MOTIF_*` environment variables. A `.env` file in the working
//! directory is loaded first.

pub mod commands;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand, ValueEnum};
use motif_db::SourceMode;
use std::path::PathBuf;

/// rna-motifs - RNA structural motif lookup
#[derive(Parser, Debug)]
#[command(name = "rna-motifs")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, env = "RNA_MOTIF_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the motifs of one PDB structure
    Query {
        /// PDB identifier (case-insensitive)
        pdb_id: String,

        /// Ask exactly one source instead of following the policy
        #[arg(short, long)]
        source: Option<String>,

        /// Selection mode (auto, local, bgsu, rfam, all)
        #[arg(short, long)]
        mode: Option<SourceMode>,

        /// Bypass the cache and refetch remote results
        #[arg(short, long)]
        refresh: bool,

        /// Only annotations exported by this tool (fr3d, rnamotifscan)
        #[arg(short, long, conflicts_with_all = ["source", "mode"])]
        tool: Option<String>,

        /// Only this motif type
        #[arg(long = "type")]
        motif_type: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List the registered sources
    Sources {
        /// Also report which sources know this structure
        #[arg(long)]
        pdb: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Maintain the API response cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show entry counts and size
    Stats,

    /// Delete expired entries
    Cleanup,

    /// Delete every entry
    Clear,

    /// Delete the entries of one structure
    Invalidate {
        /// PDB identifier
        pdb_id: String,

        /// Only this source's entry
        #[arg(short, long)]
        source: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
