//! Motif tables exported by annotation tools
//!
//! Header names differ between tool versions, so every logical column is
//! located by probing a short list of aliases. Rows are independent: a row
//! that fails to parse is logged and dropped without affecting its siblings.

use super::{normalize_tool_type, RecordError};
use crate::model::{normalize_pdb_id, MotifInstance, MotifMap, ResidueSpec};
use motif_common::Result;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Nucleotide recorded for tool residues; exports carry no base identity
const UNKNOWN_NUCLEOTIDE: &str = "N";

/// Supported annotation tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolExport {
    Fr3d,
    RnaMotifScan,
}

impl ToolExport {
    pub const ALL: [ToolExport; 2] = [ToolExport::Fr3d, ToolExport::RnaMotifScan];

    /// Subdirectory name and metadata tag of the tool
    pub fn name(self) -> &'static str {
        match self {
            ToolExport::Fr3d => "fr3d",
            ToolExport::RnaMotifScan => "rnamotifscan",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == name.trim().to_lowercase())
    }

    /// Parse one export file for `pdb_id`
    pub fn parse_file(self, path: &Path, pdb_id: &str) -> Result<MotifMap> {
        let file = std::fs::File::open(path)?;
        match self {
            ToolExport::Fr3d => Fr3dConverter::convert_reader(file),
            ToolExport::RnaMotifScan => {
                let is_tsv = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
                let delimiter = if is_tsv { b'\t' } else { b',' };
                RnaMotifScanConverter::convert_reader(file, pdb_id, delimiter)
            },
        }
    }
}

/// Header lookup by alias
struct Columns {
    headers: csv::StringRecord,
}

impl Columns {
    fn index(&self, aliases: &[&str]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.headers.iter().position(|h| h.trim() == *alias))
    }

    /// Trimmed, non-empty value of the first alias column present in the row
    fn value<'r>(&self, row: &'r csv::StringRecord, aliases: &[&str]) -> Option<&'r str> {
        self.index(aliases)
            .and_then(|i| row.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

fn reader<R: Read>(input: R, delimiter: u8) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(input)
}

fn parse_number(field: &'static str, raw: &str) -> std::result::Result<i32, RecordError> {
    raw.trim().parse().map_err(|_| RecordError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

fn push(motifs: &mut MotifMap, instance: MotifInstance) {
    motifs
        .entry(instance.motif_id.clone())
        .or_default()
        .push(instance);
}

/// FR3D search output
///
/// Positions look like `1S72|1|0|13-530`, or several such ranges joined by
/// `;`. Descending ranges (`522-517`) are walked downwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fr3dConverter;

/// Decoded FR3D position column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fr3dPositions {
    pub pdb_id: String,
    pub chain: String,
    pub ranges: Vec<(i32, i32)>,
}

impl Fr3dConverter {
    const TYPE_COLUMNS: &'static [&'static str] = &["Motif type", "Motif_Type", "Type"];
    const POSITION_COLUMNS: &'static [&'static str] = &["Positions", "Position"];
    const DESCRIPTION_COLUMNS: &'static [&'static str] = &["Description", "Annotation"];

    pub fn parse_positions(raw: &str) -> std::result::Result<Fr3dPositions, RecordError> {
        let mut head: Option<(String, String)> = None;
        let mut ranges = Vec::new();

        for part in raw.split(';') {
            let fields: Vec<&str> = part.trim().split('|').collect();
            if fields.len() < 4 {
                debug!(part, "Skipping FR3D range with too few fields");
                continue;
            }
            if head.is_none() {
                head = Some((fields[0].trim().to_string(), fields[1].trim().to_string()));
            }
            match parse_range(fields[3]) {
                Ok(range) => ranges.push(range),
                Err(e) => debug!(part, error = %e, "Skipping FR3D range"),
            }
        }

        match head {
            Some((pdb_id, chain)) if !ranges.is_empty() => Ok(Fr3dPositions {
                pdb_id: normalize_pdb_id(&pdb_id),
                chain,
                ranges,
            }),
            _ => Err(RecordError::InvalidRange(raw.to_string())),
        }
    }

    pub fn convert_reader<R: Read>(input: R) -> Result<MotifMap> {
        let mut rdr = reader(input, b',');
        let columns = Columns {
            headers: rdr.headers().map_err(csv_error)?.clone(),
        };

        let mut motifs = MotifMap::new();
        for (row_idx, row) in rdr.records().enumerate() {
            let row_number = row_idx + 1;
            let parsed = row
                .map_err(|e| RecordError::Malformed(e.to_string()))
                .and_then(|row| Self::convert_row(&columns, &row, row_number));
            match parsed {
                Ok(Some(instance)) => push(&mut motifs, instance),
                Ok(None) => {},
                Err(e) => warn!(row = row_number, error = %e, "Skipping FR3D row"),
            }
        }
        Ok(motifs)
    }

    fn convert_row(
        columns: &Columns,
        row: &csv::StringRecord,
        row_number: usize,
    ) -> std::result::Result<Option<MotifInstance>, RecordError> {
        let Some(motif_type) = columns.value(row, Self::TYPE_COLUMNS) else {
            return Ok(None);
        };
        let motif_type = normalize_tool_type(motif_type);

        let positions = columns
            .value(row, Self::POSITION_COLUMNS)
            .ok_or(RecordError::MissingField("Positions"))?;
        let positions = Self::parse_positions(positions)?;

        let residues = positions
            .ranges
            .iter()
            .flat_map(|&(start, end)| walk(start, end))
            .map(|n| ResidueSpec::new(&positions.chain, n).with_nucleotide(UNKNOWN_NUCLEOTIDE))
            .collect();

        let annotation = columns
            .value(row, Self::DESCRIPTION_COLUMNS)
            .unwrap_or_default();

        Ok(Some(
            MotifInstance::new(
                format!("{}_{}", positions.pdb_id, row_number),
                motif_type,
                &positions.pdb_id,
                residues,
            )
            .with_annotation(annotation)
            .with_metadata("tool", ToolExport::Fr3d.name())
            .with_metadata("row", row_number),
        ))
    }
}

/// Inclusive walk from `start` to `end` in either direction
fn walk(start: i32, end: i32) -> Box<dyn Iterator<Item = i32>> {
    if start <= end {
        Box::new(start..=end)
    } else {
        Box::new((end..=start).rev())
    }
}

fn parse_range(raw: &str) -> std::result::Result<(i32, i32), RecordError> {
    let (start, end) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| RecordError::InvalidRange(raw.to_string()))?;
    Ok((parse_number("start", start)?, parse_number("end", end)?))
}

/// RNAMotifScan hit tables (CSV or TSV)
#[derive(Debug, Clone, Copy, Default)]
pub struct RnaMotifScanConverter;

impl RnaMotifScanConverter {
    const TYPE_COLUMNS: &'static [&'static str] = &["Motif_Name", "Motif", "Type"];
    const START_COLUMNS: &'static [&'static str] = &["Start", "Start_Position"];
    const END_COLUMNS: &'static [&'static str] = &["End", "End_Position"];
    const CHAIN_COLUMNS: &'static [&'static str] = &["Chain"];
    const SCORE_COLUMNS: &'static [&'static str] = &["Score"];

    pub fn convert_reader<R: Read>(input: R, pdb_id: &str, delimiter: u8) -> Result<MotifMap> {
        let pdb_id = normalize_pdb_id(pdb_id);
        let mut rdr = reader(input, delimiter);
        let columns = Columns {
            headers: rdr.headers().map_err(csv_error)?.clone(),
        };

        let mut motifs = MotifMap::new();
        for (row_idx, row) in rdr.records().enumerate() {
            let row_number = row_idx + 1;
            let parsed = row
                .map_err(|e| RecordError::Malformed(e.to_string()))
                .and_then(|row| Self::convert_row(&columns, &row, &pdb_id, row_number));
            match parsed {
                Ok(Some(instance)) => push(&mut motifs, instance),
                Ok(None) => {},
                Err(e) => warn!(row = row_number, error = %e, "Skipping RNAMotifScan row"),
            }
        }
        Ok(motifs)
    }

    fn convert_row(
        columns: &Columns,
        row: &csv::StringRecord,
        pdb_id: &str,
        row_number: usize,
    ) -> std::result::Result<Option<MotifInstance>, RecordError> {
        let Some(motif_type) = columns.value(row, Self::TYPE_COLUMNS) else {
            return Ok(None);
        };
        let motif_type = normalize_tool_type(motif_type);

        let start = columns
            .value(row, Self::START_COLUMNS)
            .map(|v| parse_number("Start", v))
            .transpose()?
            .unwrap_or(0);
        let end = columns
            .value(row, Self::END_COLUMNS)
            .map(|v| parse_number("End", v))
            .transpose()?
            .unwrap_or(0);
        if start <= 0 || end <= 0 || start > end {
            return Err(RecordError::InvalidRange(format!("{}-{}", start, end)));
        }

        let chain = columns.value(row, Self::CHAIN_COLUMNS).unwrap_or("A");
        let residues = (start..=end)
            .map(|n| ResidueSpec::new(chain, n).with_nucleotide(UNKNOWN_NUCLEOTIDE))
            .collect();

        Ok(Some(
            MotifInstance::new(
                format!("{}_{}", pdb_id, row_number),
                motif_type,
                pdb_id,
                residues,
            )
            .with_annotation(columns.value(row, Self::SCORE_COLUMNS).unwrap_or_default())
            .with_metadata("tool", ToolExport::RnaMotifScan.name())
            .with_metadata("row", row_number),
        ))
    }
}

fn csv_error(e: csv::Error) -> motif_common::MotifError {
    motif_common::MotifError::parse(format!("Unreadable table header: {}", e))
}
