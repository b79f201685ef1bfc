//! Rfam motif directory
//!
//! One subdirectory per motif family, each holding a Stockholm `SEED`
//! alignment. The directory name is the family's display name; its type id
//! is the normalized form (`T-loop` becomes `T_LOOP`).

use super::{Lookup, MotifProvider, RFAM_SOURCE};
use crate::converters::{MotifConverter, StockholmConverter};
use crate::model::{normalize_pdb_id, MotifMap, MotifType, ProviderInfo, SourceKind};
use async_trait::async_trait;
use motif_common::{MotifError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SEED_FILE: &str = "SEED";

#[derive(Debug)]
pub struct RfamProvider {
    dir: PathBuf,
    initialized: bool,
    types: BTreeMap<String, MotifType>,
    index: BTreeMap<String, MotifMap>,
}

impl RfamProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            initialized: false,
            types: BTreeMap::new(),
            index: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Family directories holding a SEED file, sorted by name
    fn family_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                !name.starts_with('.') && !name.starts_with("__")
            })
            .filter(|path| path.join(SEED_FILE).is_file())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn load(&self) -> Result<BTreeMap<String, MotifType>> {
        if !self.dir.is_dir() {
            return Err(MotifError::config(format!(
                "Rfam directory not found: {}",
                self.dir.display()
            )));
        }

        let families = self.family_dirs()?;
        if families.is_empty() {
            return Err(MotifError::config(format!(
                "No Rfam SEED files in {}",
                self.dir.display()
            )));
        }

        let mut types = BTreeMap::new();
        for family in families {
            let seed = family.join(SEED_FILE);
            for motif_type in StockholmConverter.convert_file(&seed)? {
                debug!(
                    type_id = %motif_type.type_id,
                    instances = motif_type.instances.len(),
                    "Loaded Rfam family"
                );
                types.insert(motif_type.type_id.clone(), motif_type);
            }
        }
        Ok(types)
    }
}

fn build_index(types: &BTreeMap<String, MotifType>) -> BTreeMap<String, MotifMap> {
    let mut index: BTreeMap<String, MotifMap> = BTreeMap::new();
    for (type_id, motif_type) in types {
        for instance in &motif_type.instances {
            index
                .entry(instance.pdb_id.clone())
                .or_default()
                .entry(type_id.clone())
                .or_default()
                .push(instance.clone());
        }
    }
    index
}

#[async_trait]
impl MotifProvider for RfamProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: RFAM_SOURCE.to_string(),
            name: "Rfam Motif Database".to_string(),
            description: "RNA structural motifs from Rfam SEED alignments".to_string(),
            version: "1.0.0".to_string(),
            kind: SourceKind::Local,
            motif_types: self.types.keys().cloned().collect(),
            pdb_count: self.index.len(),
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

        match self.load() {
            Ok(types) => {
                self.index = build_index(&types);
                self.types = types;
                self.initialized = true;
                info!(
                    dir = %self.dir.display(),
                    families = self.types.len(),
                    structures = self.index.len(),
                    "Rfam provider initialized"
                );
                true
            },
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Rfam provider failed to initialize");
                false
            },
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn get_available_motif_types(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    fn get_motif_type(&self, type_id: &str) -> Option<MotifType> {
        self.types
            .get(&type_id.trim().to_uppercase())
            .or_else(|| self.types.get(&StockholmConverter::normalize_type_id(type_id)))
            .cloned()
    }

    async fn lookup(&mut self, pdb_id: &str) -> Lookup {
        if !self.initialized {
            return Lookup::Unavailable("Rfam provider is not initialized".to_string());
        }
        match self.index.get(&normalize_pdb_id(pdb_id)) {
            Some(motifs) => Lookup::from_motifs(motifs.clone()),
            None => Lookup::Empty,
        }
    }

    fn get_available_pdb_ids(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }

    fn reset(&mut self) {
        self.initialized = false;
        self.types.clear();
        self.index.clear();
    }
}
