//! Canonical motif records
//!
//! Every source, whatever its native format, is normalized into these types.
//! They carry no behavior beyond small read-only views.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Open key/value metadata attached to instances and types
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Motifs of one structure grouped by motif type id
pub type MotifMap = BTreeMap<String, Vec<MotifInstance>>;

/// Normalize a structure id before any indexing or lookup
pub fn normalize_pdb_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

fn default_model() -> i32 {
    1
}

/// One nucleotide residue of a structure
///
/// Identity is `(chain, residue_number, insertion_code, model)`. The
/// nucleotide letter is descriptive only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidueSpec {
    pub chain: String,
    pub residue_number: i32,
    #[serde(default)]
    pub nucleotide: String,
    #[serde(default)]
    pub insertion_code: String,
    #[serde(default = "default_model")]
    pub model: i32,
}

impl ResidueSpec {
    pub fn new(chain: impl Into<String>, residue_number: i32) -> Self {
        Self {
            chain: chain.into(),
            residue_number,
            nucleotide: String::new(),
            insertion_code: String::new(),
            model: 1,
        }
    }

    pub fn with_nucleotide(mut self, nucleotide: impl Into<String>) -> Self {
        self.nucleotide = nucleotide.into();
        self
    }

    pub fn with_insertion_code(mut self, code: impl Into<String>) -> Self {
        self.insertion_code = code.into();
        self
    }

    pub fn with_model(mut self, model: i32) -> Self {
        self.model = model;
        self
    }

    /// Parse a pipe-delimited unit id: `STRUCT|MODEL|CHAIN|NUC|RESNUM[|INS]`
    ///
    /// Returns `None` when fewer than five fields are present or the residue
    /// number is not an integer. A non-numeric model falls back to model 1.
    ///
    /// # Example
    ///
    /// ```
    /// use motif_db::model::ResidueSpec;
    ///
    /// let r = ResidueSpec::from_unit_id("4V9F|1|A|G|303").unwrap();
    /// assert_eq!(r.chain, "A");
    /// assert_eq!(r.residue_number, 303);
    /// assert!(ResidueSpec::from_unit_id("4V9F|1|A").is_none());
    /// ```
    pub fn from_unit_id(spec: &str) -> Option<Self> {
        let fields: Vec<&str> = spec.split('|').collect();
        if fields.len() < 5 {
            return None;
        }

        let model = fields[1].trim().parse::<i32>().unwrap_or(1);
        let residue_number = fields[4].trim().parse::<i32>().ok()?;
        let insertion_code = fields.get(5).map(|s| s.trim()).unwrap_or_default();

        Some(
            Self::new(fields[2].trim(), residue_number)
                .with_nucleotide(fields[3].trim())
                .with_insertion_code(insertion_code)
                .with_model(model),
        )
    }

    fn identity(&self) -> (&str, i32, &str, i32) {
        (
            &self.chain,
            self.residue_number,
            &self.insertion_code,
            self.model,
        )
    }
}

impl PartialEq for ResidueSpec {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ResidueSpec {}

impl Hash for ResidueSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for ResidueSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.chain, self.residue_number, self.insertion_code)
    }
}

/// One occurrence of a motif in one structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifInstance {
    pub instance_id: String,
    pub motif_id: String,
    pub pdb_id: String,
    /// Source-defined position order, not necessarily residue-number order
    #[serde(default)]
    pub residues: Vec<ResidueSpec>,
    #[serde(default)]
    pub annotation: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MotifInstance {
    pub fn new(
        instance_id: impl Into<String>,
        motif_id: impl Into<String>,
        pdb_id: &str,
        residues: Vec<ResidueSpec>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            motif_id: motif_id.into(),
            pdb_id: normalize_pdb_id(pdb_id),
            residues,
            annotation: String::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Distinct chains touched by this instance
    pub fn chains(&self) -> BTreeSet<&str> {
        self.residues.iter().map(|r| r.chain.as_str()).collect()
    }

    /// Sorted residue numbers, optionally restricted to one chain
    pub fn residue_numbers(&self, chain: Option<&str>) -> Vec<i32> {
        let mut numbers: Vec<i32> = self
            .residues
            .iter()
            .filter(|r| chain.map_or(true, |c| r.chain == c))
            .map(|r| r.residue_number)
            .collect();
        numbers.sort_unstable();
        numbers
    }

    /// Deduplicated, sorted residue numbers per chain
    pub fn by_chain(&self) -> BTreeMap<String, Vec<i32>> {
        let mut grouped: BTreeMap<String, BTreeSet<i32>> = BTreeMap::new();
        for residue in &self.residues {
            grouped
                .entry(residue.chain.clone())
                .or_default()
                .insert(residue.residue_number);
        }
        grouped
            .into_iter()
            .map(|(chain, numbers)| (chain, numbers.into_iter().collect()))
            .collect()
    }
}

/// A family of motifs as reported by one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotifType {
    pub type_id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub instances: Vec<MotifInstance>,
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MotifType {
    pub fn new(type_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn instances_for_pdb(&self, pdb_id: &str) -> Vec<&MotifInstance> {
        let pdb_id = normalize_pdb_id(pdb_id);
        self.instances
            .iter()
            .filter(|inst| inst.pdb_id == pdb_id)
            .collect()
    }

    pub fn pdb_ids(&self) -> BTreeSet<String> {
        self.instances.iter().map(|inst| inst.pdb_id.clone()).collect()
    }
}

/// Whether a provider reads local files or calls a remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Local,
    Remote,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Local => f.write_str("local"),
            SourceKind::Remote => f.write_str("api"),
        }
    }
}

/// Static description of a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub kind: SourceKind,
    pub motif_types: Vec<String>,
    pub pdb_count: usize,
    pub last_updated: String,
}

/// Total instance count across all types of a motif map
pub fn count_instances(motifs: &MotifMap) -> usize {
    motifs.values().map(Vec::len).sum()
}
