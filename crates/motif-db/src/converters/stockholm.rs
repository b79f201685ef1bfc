//! Rfam Stockholm `SEED` alignments
//!
//! Only the parts needed to place motifs on structures are read: `#=GF`
//! family metadata, sequence lines whose ids encode a structure range
//! (`3OWI_A/41-61`, `1S72/77-81`) and optional `#=GR <id> SS` lines.

use super::{MotifConverter, RecordError, SourceInfo};
use crate::model::{normalize_pdb_id, MotifInstance, MotifType, ResidueSpec};
use motif_common::Result;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

const SOURCE_LABEL: &str = "Rfam";

/// Ribosome structures whose SEED ids omit the chain; their rRNA is chain `0`
const RIBOSOMAL_PDB_IDS: &[&str] = &[
    "1S72", "1FFK", "1NKW", "1S1I", "1J5E", "1GIY", "1C2W", "1YHQ", "2GYA", "3CPW", "2AW4",
    "1J5A", "1C2X", "1VQ6", "1VQ8", "1VQO", "1VQP", "1VQ4", "1VQ5", "1VQ7", "1VQ9", "1YIT",
    "1YIJ", "2OTJ", "2OTL", "3CC2", "3CC4", "3CC7", "3CCE", "3CCJ", "3CCL", "3CCM", "3CCQ",
    "3CCR", "3CCS", "3CCU", "3CD6", "3CMA", "3CME",
];

const GAP_CHARS: &[char] = &['.', '~', '-'];

/// Reference fields copied onto the family, in this order
const REFERENCE_KEYS: &[&str] = &["RM", "RT", "RA", "RL"];

/// Converter for Stockholm alignment text
#[derive(Debug, Clone, Copy, Default)]
pub struct StockholmConverter;

/// Structure location decoded from a sequence id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLocation {
    pub pdb_id: String,
    pub chain: String,
    pub start: i32,
    pub end: i32,
}

#[derive(Debug, Default)]
struct AlignedRecord {
    sequence: String,
    structure: String,
}

struct Patterns {
    with_chain: Regex,
    without_chain: Regex,
    structure_line: Regex,
    non_alnum: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                with_chain: Regex::new(r"^(\w{4})_(\w+)/(\d+)-(\d+)").ok()?,
                without_chain: Regex::new(r"^(\w{4})/(\d+)-(\d+)").ok()?,
                structure_line: Regex::new(r"^#=GR\s+(\S+)\s+SS\s+(\S+)").ok()?,
                non_alnum: Regex::new(r"[^A-Za-z0-9]+").ok()?,
            })
        })
        .as_ref()
}

impl StockholmConverter {
    /// Family directory name to type id: `T-loop` -> `T_LOOP`
    pub fn normalize_type_id(name: &str) -> String {
        match patterns() {
            Some(p) => p.non_alnum.replace_all(name, "_").to_uppercase(),
            None => name.to_uppercase(),
        }
    }

    /// Decode `PDBID_CHAIN/START-END` or `PDBID/START-END`
    pub fn parse_sequence_id(seq_id: &str) -> std::result::Result<SequenceLocation, RecordError> {
        let bad_id = || RecordError::NoStructureId(seq_id.to_string());
        let p = patterns().ok_or_else(bad_id)?;

        let number = |field: &'static str, raw: &str| {
            raw.parse::<i32>().map_err(|_| RecordError::InvalidNumber {
                field,
                value: raw.to_string(),
            })
        };

        if let Some(caps) = p.with_chain.captures(seq_id) {
            return Ok(SequenceLocation {
                pdb_id: normalize_pdb_id(&caps[1]),
                chain: caps[2].to_string(),
                start: number("start", &caps[3])?,
                end: number("end", &caps[4])?,
            });
        }

        if let Some(caps) = p.without_chain.captures(seq_id) {
            let pdb_id = normalize_pdb_id(&caps[1]);
            let chain = default_chain(&pdb_id).to_string();
            return Ok(SequenceLocation {
                pdb_id,
                chain,
                start: number("start", &caps[2])?,
                end: number("end", &caps[3])?,
            });
        }

        Err(bad_id())
    }

    fn parse_metadata(lines: &[&str]) -> HashMap<String, String> {
        let mut metadata: HashMap<String, String> = HashMap::new();
        for line in lines {
            let Some(rest) = line.strip_prefix("#=GF") else {
                continue;
            };
            let Some((key, value)) = rest.trim().split_once(char::is_whitespace) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            metadata
                .entry(key.to_string())
                .and_modify(|existing| {
                    existing.push(' ');
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        metadata
    }

    /// Sequence and structure rows in first-seen order; interleaved blocks concatenate
    fn parse_alignment(lines: &[&str]) -> Vec<(String, AlignedRecord)> {
        let mut records: Vec<(String, AlignedRecord)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut slot = |id: &str, records: &mut Vec<(String, AlignedRecord)>| -> usize {
            *index.entry(id.to_string()).or_insert_with(|| {
                records.push((id.to_string(), AlignedRecord::default()));
                records.len() - 1
            })
        };

        for raw in lines {
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            if line.starts_with("#=GR") {
                if let Some(caps) = patterns().and_then(|p| p.structure_line.captures(line)) {
                    let i = slot(&caps[1], &mut records);
                    records[i].1.structure.push_str(&caps[2]);
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            if let (Some(id), Some(sequence)) = (parts.next(), parts.next()) {
                let i = slot(id, &mut records);
                records[i].1.sequence.push_str(sequence);
            }
        }
        records
    }
}

fn default_chain(pdb_id: &str) -> &'static str {
    if RIBOSOMAL_PDB_IDS.contains(&pdb_id) {
        "0"
    } else {
        "A"
    }
}

/// Residues for one aligned sequence
///
/// With a sequence, every non-gap character takes the next residue number
/// from `start`. Without one, the full inclusive range is produced.
fn generate_residues(location: &SequenceLocation, sequence: &str) -> Vec<ResidueSpec> {
    if sequence.is_empty() {
        return (location.start..=location.end)
            .map(|n| ResidueSpec::new(&location.chain, n))
            .collect();
    }

    sequence
        .chars()
        .filter(|c| !GAP_CHARS.contains(c))
        .zip(location.start..)
        .map(|(c, n)| {
            let nucleotide = if c.is_alphabetic() {
                c.to_uppercase().to_string()
            } else {
                String::new()
            };
            ResidueSpec::new(&location.chain, n).with_nucleotide(nucleotide)
        })
        .collect()
}

impl MotifConverter for StockholmConverter {
    fn format_name(&self) -> &'static str {
        "stockholm"
    }

    fn convert_file(&self, path: &Path) -> Result<Vec<MotifType>> {
        let raw = std::fs::read_to_string(path)?;
        let family = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        let info = SourceInfo::new(Self::normalize_type_id(&family))
            .with_name(family)
            .with_file(path);
        self.convert_data(&raw, &info)
    }

    fn convert_data(&self, raw: &str, info: &SourceInfo) -> Result<Vec<MotifType>> {
        let lines: Vec<&str> = raw.trim().lines().collect();
        let metadata = Self::parse_metadata(&lines);
        let meta = |key: &str| metadata.get(key).cloned().unwrap_or_default();

        let mut instances = Vec::new();
        for (seq_id, record) in Self::parse_alignment(&lines) {
            let location = match Self::parse_sequence_id(&seq_id) {
                Ok(location) => location,
                Err(e) => {
                    debug!(family = %info.name, seq_id = %seq_id, error = %e, "Skipping sequence");
                    continue;
                },
            };

            let residues = generate_residues(&location, &record.sequence);
            let rfam_name = metadata
                .get("ID")
                .cloned()
                .unwrap_or_else(|| info.name.clone());

            instances.push(
                MotifInstance::new(seq_id, &info.type_id, &location.pdb_id, residues)
                    .with_annotation(meta("DE"))
                    .with_metadata("sequence", record.sequence)
                    .with_metadata("structure", record.structure)
                    .with_metadata("rfam_id", meta("AC"))
                    .with_metadata("rfam_name", rfam_name),
            );
        }

        if instances.is_empty() {
            warn!(family = %info.name, "No structure-mapped sequences in alignment");
            return Ok(Vec::new());
        }

        let references: Vec<Value> = REFERENCE_KEYS
            .iter()
            .filter_map(|key| {
                let value = metadata.get(*key)?;
                let mut entry = serde_json::Map::new();
                entry.insert(key.to_string(), Value::String(value.clone()));
                Some(Value::Object(entry))
            })
            .collect();

        let mut type_metadata = BTreeMap::new();
        type_metadata.insert("rfam_accession".to_string(), Value::String(meta("AC")));
        type_metadata.insert("source_file".to_string(), Value::String(info.file_label()));
        type_metadata.insert("references".to_string(), Value::Array(references));

        debug!(family = %info.name, instances = instances.len(), "Converted Stockholm alignment");

        Ok(vec![MotifType {
            type_id: info.type_id.clone(),
            name: info.name.clone(),
            description: metadata
                .get("DE")
                .cloned()
                .unwrap_or_else(|| format!("{} motif from {}", info.name, SOURCE_LABEL)),
            instances,
            source: SOURCE_LABEL.to_string(),
            metadata: type_metadata,
        }])
    }
}
