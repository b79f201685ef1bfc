//! Rfam motif API
//!
//! Rfam has no per-structure endpoint, so a lookup walks a fixed list of
//! motif families and keeps the structures each family maps to. Family
//! mappings are memoized for the life of the provider.

use super::{http_client, FetchMemo, Lookup, MotifProvider, DEFAULT_TIMEOUT_SECS, RFAM_API_SOURCE};
use crate::cache::CacheManager;
use crate::model::{normalize_pdb_id, MotifInstance, MotifMap, MotifType, ProviderInfo, ResidueSpec, SourceKind};
use async_trait::async_trait;
use motif_common::{MotifError, Result};
use reqwest::{header, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_RFAM_URL: &str = "https://rfam.org";

/// A named Rfam motif family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RfamFamily {
    pub accession: &'static str,
    /// Type id used for instances
    pub short: &'static str,
    pub name: &'static str,
}

pub const FAMILIES: &[RfamFamily] = &[
    RfamFamily { accession: "RM00008", short: "GNRA", name: "GNRA tetraloop" },
    RfamFamily { accession: "RM00029", short: "UNCG", name: "UNCG tetraloop" },
    RfamFamily { accession: "RM00010", short: "K-turn", name: "Kink-turn" },
    RfamFamily { accession: "RM00024", short: "T-loop", name: "T-loop" },
    RfamFamily { accession: "RM00003", short: "C-loop", name: "C-loop" },
    RfamFamily { accession: "RM00030", short: "U-turn", name: "U-turn" },
    RfamFamily { accession: "RM00021", short: "tandem-GA", name: "Tandem GA/AG" },
    RfamFamily { accession: "RM00028", short: "UMAC", name: "UMAC tetraloop" },
    RfamFamily { accession: "RM00007", short: "Domain-V", name: "Splicing Domain V" },
    RfamFamily { accession: "RM00022", short: "Terminator1", name: "Rho terminator 1" },
    RfamFamily { accession: "RM00023", short: "Terminator2", name: "Rho terminator 2" },
    RfamFamily { accession: "RM00005", short: "CsrA_binding", name: "CsrA/RsmA binding" },
];

/// Structure id -> raw mapping objects of one family
type FamilyMappings = BTreeMap<String, Vec<Value>>;

/// Group a family response's mapping objects by structure id
///
/// Mappings are read from `structures`, or `pdb` when that is absent. Entries
/// without a 4-character structure id are dropped.
pub fn parse_family_mappings(data: &Value) -> FamilyMappings {
    let structures = data.get("structures").or_else(|| data.get("pdb"));
    let mut mappings = FamilyMappings::new();

    for entry in structures.and_then(Value::as_array).into_iter().flatten() {
        if !entry.is_object() {
            continue;
        }
        let pdb_id = first_of(entry, &["pdb_id", "pdb"])
            .and_then(Value::as_str)
            .map(str::to_uppercase)
            .unwrap_or_default();
        if pdb_id.chars().count() != 4 {
            continue;
        }
        mappings.entry(pdb_id).or_default().push(entry.clone());
    }
    mappings
}

fn first_of<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| entry.get(*key))
}

/// Integer from a JSON number or a numeric string
fn as_number(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Inclusive residue range of one mapping, empty if a bound is not a number
pub fn mapping_residues(mapping: &Value) -> Vec<ResidueSpec> {
    let chain = match first_of(mapping, &["chain", "auth_asym_id"]) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "A".to_string(),
        Some(other) => other.to_string(),
    };

    let start = match first_of(mapping, &["seq_start", "pdb_start"]) {
        Some(value) => as_number(value),
        None => Some(1),
    };
    let end = match first_of(mapping, &["seq_end", "pdb_end"]) {
        Some(value) => as_number(value),
        None => start,
    };

    match (start, end) {
        (Some(start), Some(end)) => (start..=end).map(|n| ResidueSpec::new(&chain, n)).collect(),
        _ => {
            debug!(?mapping, "Unusable Rfam residue range");
            Vec::new()
        },
    }
}

/// Live named-motif annotations from the Rfam API
#[derive(Debug)]
pub struct RfamApiProvider {
    base_url: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
    memo: FetchMemo,
    families: BTreeMap<&'static str, FamilyMappings>,
}

impl RfamApiProvider {
    pub fn new(cache: Option<Arc<CacheManager>>) -> Self {
        Self {
            base_url: DEFAULT_RFAM_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client: None,
            memo: FetchMemo::new(RFAM_API_SOURCE, cache),
            families: BTreeMap::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request_family(&self, client: &reqwest::Client, family: &RfamFamily) -> Result<FamilyMappings> {
        let url = format!(
            "{}/motif/{}?content-type=application/json",
            self.base_url, family.accession
        );
        debug!(url = %url, "Requesting Rfam motif family");

        let response = client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(FamilyMappings::new());
        }
        if !status.is_success() {
            return Err(MotifError::network(format!(
                "Rfam returned {} for {}",
                status, family.accession
            )));
        }

        let data: Value = serde_json::from_str(&response.text().await?)?;
        Ok(parse_family_mappings(&data))
    }

    /// Memoized structure mappings of one family
    async fn family_mappings(&mut self, client: &reqwest::Client, family: &RfamFamily) -> Result<&FamilyMappings> {
        if !self.families.contains_key(family.accession) {
            let mappings = self.request_family(client, family).await?;
            debug!(family = family.accession, structures = mappings.len(), "Fetched Rfam family mappings");
            self.families.insert(family.accession, mappings);
        }
        self.families
            .get(family.accession)
            .ok_or_else(|| MotifError::cache(format!("missing mappings for {}", family.accession)))
    }
}

fn family_instances(family: &RfamFamily, pdb_id: &str, mappings: &[Value]) -> Vec<MotifInstance> {
    mappings
        .iter()
        .enumerate()
        .map(|(idx, mapping)| {
            MotifInstance::new(
                format!("{}_{}_{:03}", family.short, pdb_id, idx + 1),
                family.short,
                pdb_id,
                mapping_residues(mapping),
            )
            .with_annotation(family.name)
            .with_metadata("source", RFAM_API_SOURCE)
            .with_metadata("rfam_id", family.accession)
            .with_metadata("raw_mapping", mapping.clone())
        })
        .collect()
}

#[async_trait]
impl MotifProvider for RfamApiProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: RFAM_API_SOURCE.to_string(),
            name: "Rfam (Online)".to_string(),
            description: "Live data from Rfam database - named RNA motifs".to_string(),
            version: "API".to_string(),
            kind: SourceKind::Remote,
            motif_types: self.get_available_motif_types(),
            pdb_count: self.memo.pdb_ids().len(),
            last_updated: String::new(),
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn initialize(&mut self) -> bool {
        if self.client.is_some() {
            return true;
        }
        match http_client(self.timeout) {
            Ok(client) => {
                self.client = Some(client);
                info!(base_url = %self.base_url, "Rfam API provider ready");
                true
            },
            Err(e) => {
                warn!(error = %e, "Failed to build HTTP client for Rfam API");
                false
            },
        }
    }

    fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    fn get_available_motif_types(&self) -> Vec<String> {
        FAMILIES.iter().map(|f| f.short.to_string()).collect()
    }

    fn get_motif_type(&self, type_id: &str) -> Option<MotifType> {
        let family = FAMILIES.iter().find(|f| f.short == type_id.trim())?;
        let mut motif_type = MotifType::new(family.short, family.name);
        motif_type.description = format!("Rfam motif: {}", family.name);
        motif_type.source = "Rfam".to_string();
        motif_type
            .metadata
            .insert("rfam_id".to_string(), Value::String(family.accession.to_string()));
        Some(motif_type)
    }

    async fn lookup(&mut self, pdb_id: &str) -> Lookup {
        let pdb_id = normalize_pdb_id(pdb_id);
        let Some(client) = self.client.clone() else {
            return Lookup::Unavailable("Rfam API provider is not initialized".to_string());
        };

        if let Some(motifs) = self.memo.recall(&pdb_id) {
            return Lookup::Found(motifs);
        }

        let mut motifs = MotifMap::new();
        let mut failures = Vec::new();
        for family in FAMILIES {
            match self.family_mappings(&client, family).await {
                Ok(mappings) => {
                    if let Some(entries) = mappings.get(&pdb_id) {
                        motifs.insert(
                            family.short.to_string(),
                            family_instances(family, &pdb_id, entries),
                        );
                    }
                },
                Err(e) => {
                    warn!(family = family.accession, error = %e, "Rfam family request failed");
                    failures.push(family.accession);
                },
            }
        }

        if failures.len() == FAMILIES.len() {
            return Lookup::Unavailable(format!("all {} Rfam family requests failed", failures.len()));
        }
        if !motifs.is_empty() {
            info!(pdb_id = %pdb_id, families = motifs.len(), "Fetched motifs from Rfam API");
            self.memo.remember(&pdb_id, &motifs);
        }
        Lookup::from_motifs(motifs)
    }

    fn get_available_pdb_ids(&self) -> Vec<String> {
        self.memo.pdb_ids()
    }

    fn reset(&mut self) {
        self.client = None;
        self.memo.clear();
        self.families.clear();
    }

    fn forget(&mut self, pdb_id: &str) {
        self.memo.forget(pdb_id);
        self.families.clear();
    }
}
