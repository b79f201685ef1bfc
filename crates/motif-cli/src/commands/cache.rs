//! `rna-motifs cache` command implementation
//!
//! Inspects and maintains the API response cache without bootstrapping any
//! source.

use crate::config::load;
use crate::error::{CliError, Result};
use crate::CacheCommand;
use colored::Colorize;
use motif_db::model::normalize_pdb_id;
use motif_db::CacheManager;
use std::path::Path;

/// Run a cache subcommand
pub async fn run(config: Option<&Path>, command: &CacheCommand) -> Result<()> {
    let config = load(config)?;
    let cache = CacheManager::new(&config.cache_dir, config.cache_days)
        .map_err(|e| CliError::cache(e.to_string()))?;

    match command {
        CacheCommand::Stats => stats(&cache),
        CacheCommand::Cleanup => {
            let removed = cache.cleanup_expired()?;
            println!("{} Removed {} expired entr{}", "✓".green(), removed, plural(removed));
            Ok(())
        },
        CacheCommand::Clear => {
            let removed = cache.clear()?;
            println!("{} Cleared {} entr{}", "✓".green(), removed, plural(removed));
            Ok(())
        },
        CacheCommand::Invalidate { pdb_id, source } => {
            let removed = cache.invalidate(pdb_id, source.as_deref());
            println!(
                "{} Invalidated {} entr{} for {}",
                "✓".green(),
                removed,
                plural(removed),
                normalize_pdb_id(pdb_id)
            );
            Ok(())
        },
    }
}

fn stats(cache: &CacheManager) -> Result<()> {
    let stats = cache.stats()?;

    println!("{}", "Cache:".cyan().bold());
    println!("  Directory: {}", stats.cache_dir.display());
    println!("  Entries:   {}", stats.total_entries);
    println!("  Expired:   {}", stats.expired_entries);
    println!("  Size:      {}", format_bytes(stats.total_bytes));
    println!("  Lifetime:  {} day(s)", stats.expiry_days);

    if !stats.sources.is_empty() {
        println!();
        println!("{}", "By source:".cyan().bold());
        for (source, count) in &stats.sources {
            println!("  {:<10} {}", source, count);
        }
    }
    Ok(())
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}

/// Human-readable byte count
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
