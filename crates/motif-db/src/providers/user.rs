//! User-supplied annotation tool exports
//!
//! Layout:
//!
//! ```text
//! user_annotations/
//!   fr3d/1s72_loops.csv
//!   rnamotifscan/1s72.tsv
//! ```
//!
//! Exports are parsed on every query so edits show up without a refresh. All
//! files named after the structure id (`1s72.tsv`, `1s72_loops.csv`) are
//! merged.

use super::{Lookup, MotifProvider, USER_SOURCE};
use crate::converters::ToolExport;
use crate::model::{normalize_pdb_id, MotifMap, MotifType, ProviderInfo, SourceKind};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const EXPORT_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];
const SOURCE_LABEL: &str = "User Annotations";

/// Keep only instances produced by `tool`, dropping types left empty
pub fn filter_by_tool(motifs: MotifMap, tool: ToolExport) -> MotifMap {
    motifs
        .into_iter()
        .filter_map(|(type_id, instances)| {
            let kept: Vec<_> = instances
                .into_iter()
                .filter(|inst| {
                    inst.metadata.get("tool").and_then(|v| v.as_str()) == Some(tool.name())
                })
                .collect();
            (!kept.is_empty()).then_some((type_id, kept))
        })
        .collect()
}

/// Structure id encoded in an export file name (`1s72_loops.csv` -> `1S72`)
///
/// The id must be followed by a non-alphanumeric character, so
/// `1s72x_other.csv` belongs to no structure.
fn pdb_id_from_filename(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    let mut chars = name.chars();
    let head: String = chars.by_ref().take(4).collect();
    let separated = chars.next().is_some_and(|c| !c.is_ascii_alphanumeric());
    (head.chars().count() == 4 && head.chars().all(|c| c.is_ascii_alphanumeric()) && separated)
        .then(|| normalize_pdb_id(&head))
}

fn is_export(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| EXPORT_EXTENSIONS.contains(&ext.as_str()))
}

#[derive(Debug)]
pub struct UserAnnotationProvider {
    dir: PathBuf,
    initialized: bool,
    pdb_ids: BTreeSet<String>,
    /// Last parse of each queried structure
    loaded: BTreeMap<String, MotifMap>,
}

impl UserAnnotationProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            initialized: false,
            pdb_ids: BTreeSet::new(),
            loaded: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn exports(&self, tool: ToolExport) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.dir.join(tool.name())) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_export(path))
            .collect();
        files.sort();
        files
    }

    /// Parse every export of `pdb_id`
    ///
    /// Instance ids are `<tool>:<file name>:<row>`, unique across all exports
    /// of the structure, and every instance is attributed to `pdb_id`.
    fn load_pdb(&self, pdb_id: &str) -> MotifMap {
        let mut merged = MotifMap::new();

        for tool in ToolExport::ALL {
            for path in self.exports(tool) {
                if pdb_id_from_filename(&path).as_deref() != Some(pdb_id) {
                    continue;
                }
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                match tool.parse_file(&path, pdb_id) {
                    Ok(motifs) => {
                        debug!(
                            tool = tool.name(),
                            path = %path.display(),
                            types = motifs.len(),
                            "Loaded annotation export"
                        );
                        for (type_id, instances) in motifs {
                            let bucket = merged.entry(type_id).or_default();
                            for (index, mut instance) in instances.into_iter().enumerate() {
                                let row = instance
                                    .metadata
                                    .get("row")
                                    .and_then(|v| v.as_u64())
                                    .map_or_else(|| format!("i{}", index + 1), |row| row.to_string());
                                instance.instance_id = format!("{}:{}:{}", tool.name(), file_name, row);
                                instance.pdb_id = pdb_id.to_string();
                                bucket.push(instance.with_metadata("file", file_name.as_str()));
                            }
                        }
                    },
                    Err(e) => {
                        warn!(tool = tool.name(), path = %path.display(), error = %e, "Skipping annotation export");
                    },
                }
            }
        }
        merged
    }
}

#[async_trait]
impl MotifProvider for UserAnnotationProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: USER_SOURCE.to_string(),
            name: SOURCE_LABEL.to_string(),
            description: "Motif annotations exported by FR3D and RNAMotifScan".to_string(),
            version: "1.0.0".to_string(),
            kind: SourceKind::Local,
            motif_types: self.get_available_motif_types(),
            pdb_count: self.pdb_ids.len(),
            last_updated: String::new(),
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    async fn initialize(&mut self) -> bool {
        if self.initialized {
            return true;
        }
        if !self.dir.is_dir() {
            warn!(dir = %self.dir.display(), "User annotation directory not found");
            return false;
        }

        self.pdb_ids = ToolExport::ALL
            .into_iter()
            .flat_map(|tool| self.exports(tool))
            .filter_map(|path| pdb_id_from_filename(&path))
            .collect();
        self.initialized = true;
        info!(
            dir = %self.dir.display(),
            structures = self.pdb_ids.len(),
            "User annotation provider initialized"
        );
        true
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn get_available_motif_types(&self) -> Vec<String> {
        self.loaded
            .values()
            .flat_map(|motifs| motifs.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn get_motif_type(&self, type_id: &str) -> Option<MotifType> {
        let instances: Vec<_> = self
            .loaded
            .values()
            .filter_map(|motifs| motifs.get(type_id))
            .flatten()
            .cloned()
            .collect();
        if instances.is_empty() {
            return None;
        }

        let mut motif_type = MotifType::new(type_id, type_id);
        motif_type.source = SOURCE_LABEL.to_string();
        motif_type.instances = instances;
        Some(motif_type)
    }

    async fn lookup(&mut self, pdb_id: &str) -> Lookup {
        if !self.initialized {
            return Lookup::Unavailable("User annotation provider is not initialized".to_string());
        }
        let pdb_id = normalize_pdb_id(pdb_id);
        let motifs = self.load_pdb(&pdb_id);
        if motifs.is_empty() {
            self.loaded.remove(&pdb_id);
        } else {
            self.pdb_ids.insert(pdb_id.clone());
            self.loaded.insert(pdb_id, motifs.clone());
        }
        Lookup::from_motifs(motifs)
    }

    fn get_available_pdb_ids(&self) -> Vec<String> {
        self.pdb_ids.iter().cloned().collect()
    }

    fn reset(&mut self) {
        self.initialized = false;
        self.pdb_ids.clear();
        self.loaded.clear();
    }

    fn forget(&mut self, pdb_id: &str) {
        self.loaded.remove(&normalize_pdb_id(pdb_id));
    }
}
