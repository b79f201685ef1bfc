//! `rna-motifs query` command implementation
//!
//! Resolves the motifs of one structure and prints them as a table or JSON.

use crate::config::open_session;
use crate::error::{CliError, Result};
use crate::OutputFormat;
use colored::Colorize;
use motif_db::converters::ToolExport;
use motif_db::model::{count_instances, normalize_pdb_id};
use motif_db::{MotifInstance, MotifMap, SourceMode};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Flags of one query invocation
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub source: Option<String>,
    pub mode: Option<SourceMode>,
    pub refresh: bool,
    pub tool: Option<String>,
    pub motif_type: Option<String>,
    pub format: OutputFormat,
}

/// JSON shape of a query result
#[derive(Debug, Serialize)]
struct QueryReport<'a> {
    pdb_id: &'a str,
    source_used: Option<&'a str>,
    instance_count: usize,
    motifs: &'a MotifMap,
}

/// Query motifs for a structure
pub async fn run(config: Option<&Path>, pdb_id: &str, options: QueryOptions) -> Result<()> {
    let pdb_id = normalize_pdb_id(pdb_id);
    let mut session = open_session(config).await?;

    if let Some(mode) = options.mode {
        session.selector_mut().set_mode(mode);
    }

    let (mut motifs, source_used) = match (&options.tool, &options.source) {
        (Some(tool), _) => {
            let tool = ToolExport::from_name(tool).ok_or_else(|| CliError::UnknownTool(tool.clone()))?;
            let motifs = session.motifs_for_tool(&pdb_id, tool).await;
            let source = (!motifs.is_empty()).then(|| format!("user ({})", tool.name()));
            (motifs, source)
        },
        (None, Some(source)) => {
            if !session.selector().registry().contains(source) {
                return Err(CliError::UnknownSource(source.clone()));
            }
            let selection = session.select(&pdb_id, Some(source), options.refresh).await;
            (selection.motifs, selection.source_used)
        },
        (None, None) => {
            let selection = session.select(&pdb_id, None, options.refresh).await;
            (selection.motifs, selection.source_used)
        },
    };

    if let Some(wanted) = &options.motif_type {
        motifs.retain(|key, _| matches_type(key, wanted));
    }
    debug!(pdb_id = %pdb_id, types = motifs.len(), source = ?source_used, "Query resolved");

    let formatted = match options.format {
        OutputFormat::Json => format_as_json(&pdb_id, source_used.as_deref(), &motifs)?,
        OutputFormat::Table => format_as_table(&pdb_id, source_used.as_deref(), &motifs),
    };
    print!("{}", formatted);
    Ok(())
}

/// Whether a motif map key names `wanted`, including `"<source>:<type>"` keys
fn matches_type(key: &str, wanted: &str) -> bool {
    let bare = key.rsplit_once(':').map_or(key, |(_, t)| t);
    key.eq_ignore_ascii_case(wanted) || bare.eq_ignore_ascii_case(wanted)
}

fn format_as_json(pdb_id: &str, source_used: Option<&str>, motifs: &MotifMap) -> Result<String> {
    let report = QueryReport {
        pdb_id,
        source_used,
        instance_count: count_instances(motifs),
        motifs,
    };
    Ok(format!("{}\n", serde_json::to_string_pretty(&report)?))
}

fn format_as_table(pdb_id: &str, source_used: Option<&str>, motifs: &MotifMap) -> String {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let Some(source) = source_used.filter(|_| !motifs.is_empty()) else {
        return format!("{} No motifs found for {}\n", "✗".red(), pdb_id);
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Type", "Instance", "Residues", "Annotation"]);

    for (motif_type, instances) in motifs {
        for instance in instances {
            table.add_row(vec![
                motif_type.clone(),
                instance.instance_id.clone(),
                residue_ranges(instance),
                instance.annotation.clone(),
            ]);
        }
    }

    format!(
        "{} {}: {} instance(s) in {} type(s) from {}\n{}\n",
        "✓".green(),
        pdb_id,
        count_instances(motifs),
        motifs.len(),
        source,
        table
    )
}

/// Residues grouped by chain with consecutive numbers collapsed, e.g. `A:12-14,20`
fn residue_ranges(instance: &MotifInstance) -> String {
    instance
        .by_chain()
        .into_iter()
        .map(|(chain, numbers)| {
            let mut runs: Vec<(i32, i32)> = Vec::new();
            for number in numbers {
                match runs.last_mut() {
                    Some((_, end)) if end.checked_add(1) == Some(number) => *end = number,
                    _ => runs.push((number, number)),
                }
            }
            let runs: Vec<String> = runs
                .into_iter()
                .map(|(start, end)| {
                    if start == end {
                        start.to_string()
                    } else {
                        format!("{}-{}", start, end)
                    }
                })
                .collect();
            format!("{}:{}", chain, runs.join(","))
        })
        .collect::<Vec<_>>()
        .join(" ")
}
