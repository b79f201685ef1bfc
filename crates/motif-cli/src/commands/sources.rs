//! `rna-motifs sources` command implementation

use crate::config::open_session;
use crate::error::Result;
use crate::OutputFormat;
use colored::Colorize;
use motif_db::model::normalize_pdb_id;
use serde_json::json;
use std::path::Path;

/// List registered sources, optionally with availability for one structure
pub async fn run(config: Option<&Path>, pdb: Option<&str>, format: OutputFormat) -> Result<()> {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let session = open_session(config).await?;
    let selector = session.selector();
    let summaries = selector.source_info();
    let availability = pdb.map(|pdb| selector.check_pdb_availability(pdb));

    if format == OutputFormat::Json {
        let report = json!({
            "mode": selector.mode(),
            "priority": session.config().priority,
            "sources": selector
                .available_sources()
                .iter()
                .filter_map(|id| {
                    let summary = summaries.get(id)?;
                    let mut entry = json!({
                        "id": id,
                        "name": summary.name,
                        "kind": summary.kind,
                        "motif_types": summary.motif_types,
                        "pdb_count": summary.pdb_count,
                    });
                    if let Some(known) = availability.as_ref().and_then(|a| a.get(id)) {
                        entry["has_pdb"] = json!(known);
                    }
                    Some(entry)
                })
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No sources available.");
        println!("Check that the database directory exists or enable the remote catalogs.");
        return Ok(());
    }

    let mut header = vec!["Source", "Name", "Kind", "Motif types", "Structures"];
    if availability.is_some() {
        header.push("Has PDB");
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);

    for id in selector.available_sources() {
        let Some(summary) = summaries.get(&id) else {
            continue;
        };
        let mut row = vec![
            id.clone(),
            summary.name.clone(),
            summary.kind.to_string(),
            summary.motif_types.to_string(),
            summary
                .pdb_count
                .map_or_else(|| "-".to_string(), |count| count.to_string()),
        ];
        if let Some(availability) = &availability {
            let known = availability.get(&id).copied().unwrap_or(false);
            row.push(if known { "yes" } else { "no" }.to_string());
        }
        table.add_row(row);
    }

    println!("{}", "Sources:".cyan().bold());
    println!("{}", table);
    println!("  Mode: {}", selector.mode());
    if let Some(pdb) = pdb {
        println!("  Availability of {} reflects loaded data only; nothing is fetched.", normalize_pdb_id(pdb));
    }
    Ok(())
}
