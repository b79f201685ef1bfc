//! Scripted provider for registry and selector tests

use super::{Lookup, MotifProvider};
use crate::model::{MotifInstance, MotifMap, MotifType, ProviderInfo, ResidueSpec, SourceKind};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Answers every lookup from a fixed table
#[derive(Debug, Clone)]
pub(crate) struct StaticProvider {
    pub id: String,
    pub kind: SourceKind,
    pub init_ok: bool,
    pub initialized: bool,
    pub answers: BTreeMap<String, Lookup>,
    pub lookups: usize,
    pub forgotten: Vec<String>,
}

impl StaticProvider {
    pub fn new(id: &str, kind: SourceKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            init_ok: true,
            initialized: false,
            answers: BTreeMap::new(),
            lookups: 0,
            forgotten: Vec::new(),
        }
    }

    pub fn failing(id: &str) -> Self {
        Self {
            init_ok: false,
            ..Self::new(id, SourceKind::Local)
        }
    }

    pub fn answer(mut self, pdb_id: &str, lookup: Lookup) -> Self {
        self.answers.insert(pdb_id.to_string(), lookup);
        self
    }

    /// `Found` with one instance per residue list, all of `type_id`
    pub fn with_motif(self, pdb_id: &str, type_id: &str, residues: &[i32]) -> Self {
        let instance_id = format!("{}_{}_{}", self.id, type_id, residues.first().copied().unwrap_or(0));
        let instance = MotifInstance::new(
            instance_id,
            type_id,
            pdb_id,
            residues.iter().map(|&n| ResidueSpec::new("A", n)).collect(),
        );
        let mut motifs = match self.answers.get(pdb_id) {
            Some(Lookup::Found(existing)) => existing.clone(),
            _ => MotifMap::new(),
        };
        motifs.entry(type_id.to_string()).or_default().push(instance);
        self.answer(pdb_id, Lookup::Found(motifs))
    }
}

#[async_trait]
impl MotifProvider for StaticProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id.clone(),
            name: format!("{} source", self.id),
            description: String::new(),
            version: "test".to_string(),
            kind: self.kind,
            motif_types: self.get_available_motif_types(),
            pdb_count: self.get_available_pdb_ids().len(),
            last_updated: String::new(),
        }
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn initialize(&mut self) -> bool {
        self.initialized = self.init_ok;
        self.init_ok
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn get_available_motif_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .answers
            .values()
            .filter_map(|lookup| match lookup {
                Lookup::Found(motifs) => Some(motifs.keys().cloned()),
                _ => None,
            })
            .flatten()
            .collect();
        types.sort();
        types.dedup();
        types
    }

    fn get_motif_type(&self, type_id: &str) -> Option<MotifType> {
        self.get_available_motif_types()
            .contains(&type_id.to_string())
            .then(|| MotifType::new(type_id, type_id))
    }

    async fn lookup(&mut self, pdb_id: &str) -> Lookup {
        self.lookups += 1;
        self.answers.get(pdb_id).cloned().unwrap_or(Lookup::Empty)
    }

    fn get_available_pdb_ids(&self) -> Vec<String> {
        self.answers
            .iter()
            .filter(|(_, lookup)| lookup.is_found())
            .map(|(pdb_id, _)| pdb_id.clone())
            .collect()
    }

    fn reset(&mut self) {
        self.initialized = false;
    }

    fn forget(&mut self, pdb_id: &str) {
        self.forgotten.push(pdb_id.to_string());
    }
}
