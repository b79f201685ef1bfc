//! RNA 3D Motif Atlas release files
//!
//! A release file (`hl_4.5.json`, `il_3.84.json`, ...) is a JSON list of
//! families:
//!
//! ```json
//! [
//!   {
//!     "motif_id": "HL_00317.1",
//!     "common_name": "GNRA",
//!     "bp_signature": "cWW-tSH",
//!     "num_nucleotides": 6,
//!     "annotations": { "HL_6SVS_002": "..." },
//!     "alignment": {
//!       "HL_6SVS_002": { "1": "6SVS|1|A|G|303", "2": "6SVS|1|A|A|304" }
//!     }
//!   }
//! ]
//! ```

use super::{MotifConverter, RecordError, SourceInfo};
use crate::model::{MotifInstance, MotifType, ResidueSpec};
use motif_common::Result;
use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

const SOURCE_LABEL: &str = "RNA 3D Motif Atlas";

/// Converter for Atlas nested-alignment JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct AtlasJsonConverter;

impl AtlasJsonConverter {
    /// Type id from a release file name: `hl_4.5.json` -> `HL`, `j3_1.0.json` -> `J3`
    pub fn type_id_from_filename(filename: &str) -> String {
        static PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
        let prefix = PREFIX.get_or_init(|| Regex::new(r"^([A-Za-z]+\d*)_").ok());

        if let Some(caps) = prefix.as_ref().and_then(|re| re.captures(filename)) {
            return caps[1].to_uppercase();
        }
        filename
            .split('.')
            .next()
            .unwrap_or(filename)
            .to_uppercase()
    }

    /// Human-readable name for the Atlas loop classes
    pub fn type_name(type_id: &str) -> String {
        match type_id {
            "HL" => "Hairpin Loops".to_string(),
            "IL" => "Internal Loops".to_string(),
            "J3" => "3-Way Junctions".to_string(),
            "J4" => "4-Way Junctions".to_string(),
            "J5" => "5-Way Junctions".to_string(),
            "J6" => "6-Way Junctions".to_string(),
            "J7" => "7-Way Junctions".to_string(),
            other => other.to_string(),
        }
    }

    fn convert_family(
        family: &Map<String, Value>,
        skipped: &mut usize,
    ) -> Vec<MotifInstance> {
        let Some(alignment) = family.get("alignment").and_then(Value::as_object) else {
            return Vec::new();
        };

        let motif_id = family
            .get("motif_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let annotations = family.get("annotations").and_then(Value::as_object);
        let text = |key: &str| {
            family
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let mut instances = Vec::with_capacity(alignment.len());
        for (instance_id, positions) in alignment {
            let Some(positions) = positions.as_object() else {
                *skipped += 1;
                continue;
            };

            let pdb_id = match extract_pdb_id(instance_id) {
                Ok(id) => id,
                Err(e) => {
                    warn!(motif_id, instance_id = %instance_id, error = %e, "Skipping Atlas instance");
                    *skipped += 1;
                    continue;
                },
            };

            let annotation = annotations
                .and_then(|a| a.get(instance_id))
                .and_then(Value::as_str)
                .unwrap_or_default();

            let instance = MotifInstance::new(
                instance_id.as_str(),
                motif_id,
                &pdb_id,
                parse_positions(instance_id, positions),
            )
            .with_annotation(annotation)
            .with_metadata("bp_signature", text("bp_signature"))
            .with_metadata(
                "num_nucleotides",
                family.get("num_nucleotides").cloned().unwrap_or(Value::Null),
            )
            .with_metadata("common_name", text("common_name"));

            instances.push(instance);
        }
        instances
    }
}

/// Structure id of an Atlas instance id
///
/// `6SVS|1|A|G|303` yields the 4-char head before the first pipe; otherwise the
/// first 4-character alphanumeric underscore token is used (`HL_6SVS_002`).
pub fn extract_pdb_id(instance_id: &str) -> std::result::Result<String, RecordError> {
    let no_id = || RecordError::NoStructureId(instance_id.to_string());

    if let Some((head, _)) = instance_id.split_once('|') {
        return if head.chars().count() == 4 {
            Ok(head.to_uppercase())
        } else {
            Err(no_id())
        };
    }

    instance_id
        .split('_')
        .find(|token| token.len() == 4 && token.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_uppercase)
        .ok_or_else(no_id)
}

/// Residues of one alignment in position order
///
/// Keys are ordered as integers; non-numeric keys go last, in their existing
/// order. Residue strings with fewer than five fields are dropped one by one.
fn parse_positions(instance_id: &str, positions: &Map<String, Value>) -> Vec<ResidueSpec> {
    let mut ordered: Vec<(Option<u64>, &Value)> = positions
        .iter()
        .map(|(key, value)| (key.trim().parse::<u64>().ok(), value))
        .collect();
    ordered.sort_by_key(|(position, _)| (position.is_none(), position.unwrap_or(u64::MAX)));

    ordered
        .into_iter()
        .filter_map(|(position, value)| {
            let spec = value.as_str().unwrap_or_default();
            let residue = ResidueSpec::from_unit_id(spec);
            if residue.is_none() {
                debug!(instance_id, ?position, spec, "Skipping unparseable residue");
            }
            residue
        })
        .collect()
}

impl MotifConverter for AtlasJsonConverter {
    fn format_name(&self) -> &'static str {
        "atlas_json"
    }

    fn convert_file(&self, path: &Path) -> Result<Vec<MotifType>> {
        let raw = std::fs::read_to_string(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let info = SourceInfo::new(Self::type_id_from_filename(&filename)).with_file(path);
        self.convert_data(&raw, &info)
    }

    fn convert_data(&self, raw: &str, info: &SourceInfo) -> Result<Vec<MotifType>> {
        let data: Value = serde_json::from_str(raw)?;
        let Some(families) = data.as_array() else {
            warn!(file = %info.file_label(), "Atlas data is not a list of families");
            return Ok(Vec::new());
        };

        let mut skipped = 0usize;
        let instances: Vec<MotifInstance> = families
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|family| Self::convert_family(family, &mut skipped))
            .collect();

        if skipped > 0 {
            warn!(type_id = %info.type_id, skipped, "Some Atlas instances were skipped");
        }
        if instances.is_empty() {
            return Ok(Vec::new());
        }

        debug!(type_id = %info.type_id, instances = instances.len(), "Converted Atlas family file");

        let mut motif_type = MotifType::new(&info.type_id, Self::type_name(&info.type_id));
        motif_type.description = format!("{} motifs from {}", info.type_id, SOURCE_LABEL);
        motif_type.source = SOURCE_LABEL.to_string();
        motif_type.instances = instances;
        motif_type
            .metadata
            .insert("source_file".to_string(), Value::String(info.file_label()));

        Ok(vec![motif_type])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {
            "motif_id": "HL_00317.1",
            "common_name": "GNRA",
            "bp_signature": "cWW-tSH-tHS",
            "num_nucleotides": 3,
            "annotations": {"HL_6SVS_002": "GNRA tetraloop"},
            "alignment": {
                "HL_6SVS_002": {"2": "6SVS|1|A|A|304", "1": "6SVS|1|A|G|303", "10": "6SVS|1|A|C|312"},
                "HL_bad_id": {"1": "XXXX|1|A|G|1"},
                "1ffk|1|0|G|12": {"1": "1FFK|1|0|G|12", "2": "1FFK|1|0|A"}
            }
        },
        "not an object"
    ]"#;

    #[test]
    fn test_extract_pdb_id() {
        assert_eq!(extract_pdb_id("HL_6SVS_002").unwrap(), "6SVS");
        assert_eq!(extract_pdb_id("4v9f|1|A|G|303").unwrap(), "4V9F");
        assert!(extract_pdb_id("HL_00317.1").is_err());
        assert!(extract_pdb_id("ABCDE|1|A").is_err());
    }

    #[test]
    fn test_type_id_from_filename() {
        assert_eq!(AtlasJsonConverter::type_id_from_filename("hl_4.5.json"), "HL");
        assert_eq!(AtlasJsonConverter::type_id_from_filename("j3_1.2.json"), "J3");
        assert_eq!(AtlasJsonConverter::type_id_from_filename("custom.json"), "CUSTOM");
    }

    #[test]
    fn test_position_order_is_numeric() {
        let positions: Map<String, Value> = serde_json::from_str(
            r#"{"2": "1S72|1|A|C|20", "x": "1S72|1|A|U|99", "1": "1S72|1|A|G|10"}"#,
        )
        .unwrap();

        let residues = parse_positions("test", &positions);
        let numbers: Vec<i32> = residues.iter().map(|r| r.residue_number).collect();
        assert_eq!(numbers, vec![10, 20, 99]);
    }

    #[test]
    fn test_non_numeric_positions_keep_file_order() {
        let positions: Map<String, Value> = serde_json::from_str(
            r#"{"b": "1S72|1|A|U|99", "1": "1S72|1|A|G|10", "a": "1S72|1|A|C|50"}"#,
        )
        .unwrap();

        let residues = parse_positions("test", &positions);
        let numbers: Vec<i32> = residues.iter().map(|r| r.residue_number).collect();
        assert_eq!(numbers, vec![10, 99, 50]);
    }

    #[test]
    fn test_instances_keep_file_order() {
        let raw = r#"[{"motif_id": "HL_1", "alignment": {
            "HL_4V9F_009": {"1": "4V9F|1|A|G|9"},
            "HL_1S72_001": {"1": "1S72|1|0|G|1"}
        }}]"#;
        let types = AtlasJsonConverter.convert_data(raw, &SourceInfo::new("HL")).unwrap();
        let ids: Vec<&str> = types[0].instances.iter().map(|i| i.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["HL_4V9F_009", "HL_1S72_001"]);
    }

    #[test]
    fn test_convert_data() {
        let info = SourceInfo::new("HL");
        let types = AtlasJsonConverter.convert_data(SAMPLE, &info).unwrap();

        assert_eq!(types.len(), 1);
        let hl = &types[0];
        assert_eq!(hl.type_id, "HL");
        assert_eq!(hl.name, "Hairpin Loops");
        assert_eq!(hl.instances.len(), 2);

        let gnra = hl
            .instances
            .iter()
            .find(|i| i.instance_id == "HL_6SVS_002")
            .unwrap();
        assert_eq!(gnra.pdb_id, "6SVS");
        assert_eq!(gnra.annotation, "GNRA tetraloop");
        assert_eq!(gnra.metadata["common_name"], "GNRA");
        assert_eq!(
            gnra.residues.iter().map(|r| r.residue_number).collect::<Vec<_>>(),
            vec![303, 304, 312]
        );

        // The short residue string is dropped, the instance survives
        let ffk = hl.instances.iter().find(|i| i.pdb_id == "1FFK").unwrap();
        assert_eq!(ffk.residues.len(), 1);
    }

    #[test]
    fn test_non_list_yields_nothing() {
        let info = SourceInfo::new("HL");
        assert!(AtlasJsonConverter
            .convert_data(r#"{"alignment": {}}"#, &info)
            .unwrap()
            .is_empty());
        assert!(AtlasJsonConverter.convert_data("not json", &info).is_err());
    }

    #[test]
    fn test_convert_file_uses_filename_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("il_3.84.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let types = AtlasJsonConverter.convert_file(&path).unwrap();
        assert_eq!(types[0].type_id, "IL");
        assert_eq!(types[0].name, "Internal Loops");
    }
}
