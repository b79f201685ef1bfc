//! BGSU RNA 3D Hub loop download
//!
//! `GET {base}/{PDB}` returns one quoted pair per loop:
//!
//! ```text
//! "HL_4V9F_001","4V9F|1|0|U|55,4V9F|1|0|G|56,4V9F|1|0|A|57"
//! ```
//!
//! A 404 means the hub has no loops for the structure.

use super::{http_client, FetchMemo, Lookup, MotifProvider, BGSU_API_SOURCE, DEFAULT_TIMEOUT_SECS};
use crate::cache::CacheManager;
use crate::model::{normalize_pdb_id, MotifInstance, MotifMap, MotifType, ProviderInfo, ResidueSpec, SourceKind};
use async_trait::async_trait;
use motif_common::{MotifError, Result};
use regex::Regex;
use reqwest::{header, StatusCode};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BGSU_URL: &str = "https://rna.bgsu.edu/rna3dhub/loops/download";

/// Loop classes served by the hub, with display names
pub const LOOP_TYPES: &[(&str, &str)] = &[
    ("HL", "Hairpin Loop"),
    ("IL", "Internal Loop"),
    ("J3", "3-way Junction"),
    ("J4", "4-way Junction"),
    ("J5", "5-way Junction"),
    ("J6", "6-way Junction"),
    ("J7", "7-way Junction"),
    ("J8", "8-way Junction"),
];

fn loop_type_name(type_id: &str) -> Option<&'static str> {
    LOOP_TYPES
        .iter()
        .find(|(id, _)| *id == type_id)
        .map(|(_, name)| *name)
}

/// Parse a loop download body into motifs grouped by loop class
///
/// Pairs with an unknown class or no parseable residue are dropped.
pub fn parse_loop_csv(body: &str, pdb_id: &str) -> MotifMap {
    static PAIR: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pair) = PAIR
        .get_or_init(|| Regex::new(r#""([^"]+)","([^"]+)""#).ok())
        .as_ref()
    else {
        return MotifMap::new();
    };

    let mut motifs = MotifMap::new();
    for caps in pair.captures_iter(body) {
        let loop_id = caps[1].trim();
        let mut parts = loop_id.split('_');
        let (Some(type_id), Some(_)) = (parts.next(), parts.next()) else {
            debug!(loop_id, "Skipping loop without a class prefix");
            continue;
        };
        let Some(type_name) = loop_type_name(type_id) else {
            debug!(loop_id, "Skipping loop of unknown class");
            continue;
        };

        let residues: Vec<ResidueSpec> = caps[2]
            .split(',')
            .map(str::trim)
            .filter(|spec| !spec.is_empty())
            .filter_map(ResidueSpec::from_unit_id)
            .collect();
        if residues.is_empty() {
            debug!(loop_id, "Skipping loop without residues");
            continue;
        }

        motifs.entry(type_id.to_string()).or_default().push(
            MotifInstance::new(loop_id, type_id, pdb_id, residues)
                .with_annotation(type_name)
                .with_metadata("source", BGSU_API_SOURCE)
                .with_metadata("loop_id", loop_id),
        );
    }
    motifs
}

/// Live loop annotations from the BGSU RNA 3D Hub
#[derive(Debug)]
pub struct BgsuApiProvider {
    base_url: String,
    timeout: Duration,
    client: Option<reqwest::Client>,
    memo: FetchMemo,
}

impl BgsuApiProvider {
    pub fn new(cache: Option<Arc<CacheManager>>) -> Self {
        Self {
            base_url: DEFAULT_BGSU_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            client: None,
            memo: FetchMemo::new(BGSU_API_SOURCE, cache),
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

    /// Raw body for a structure; `None` when the hub does not know it
    async fn fetch(&self, client: &reqwest::Client, pdb_id: &str) -> Result<Option<String>> {
        let url = format!("{}/{}", self.base_url, pdb_id);
        debug!(url = %url, "Requesting BGSU loops");

        let response = client
            .get(&url)
            .header(header::ACCEPT, "text/csv, text/plain, */*")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MotifError::network(format!(
                "BGSU RNA 3D Hub returned {} for {}",
                status, pdb_id
            )));
        }
        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl MotifProvider for BgsuApiProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: BGSU_API_SOURCE.to_string(),
            name: "BGSU RNA 3D Hub (Online)".to_string(),
            description: "Live data from BGSU RNA 3D Hub".to_string(),
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
                info!(base_url = %self.base_url, "BGSU API provider ready");
                true
            },
            Err(e) => {
                warn!(error = %e, "Failed to build HTTP client for BGSU API");
                false
            },
        }
    }

    fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    fn get_available_motif_types(&self) -> Vec<String> {
        LOOP_TYPES.iter().map(|(id, _)| id.to_string()).collect()
    }

    fn get_motif_type(&self, type_id: &str) -> Option<MotifType> {
        let type_id = type_id.trim().to_uppercase();
        let name = loop_type_name(&type_id)?;
        let mut motif_type = MotifType::new(&type_id, name);
        motif_type.description = format!("{} from RNA 3D Motif Atlas", name);
        motif_type.source = "BGSU RNA 3D Hub".to_string();
        Some(motif_type)
    }

    async fn lookup(&mut self, pdb_id: &str) -> Lookup {
        let pdb_id = normalize_pdb_id(pdb_id);
        let Some(client) = self.client.clone() else {
            return Lookup::Unavailable("BGSU API provider is not initialized".to_string());
        };

        if let Some(motifs) = self.memo.recall(&pdb_id) {
            return Lookup::Found(motifs);
        }

        match self.fetch(&client, &pdb_id).await {
            Ok(Some(body)) => {
                let motifs = parse_loop_csv(&body, &pdb_id);
                if motifs.is_empty() {
                    debug!(pdb_id = %pdb_id, "BGSU response held no usable loops");
                } else {
                    info!(pdb_id = %pdb_id, types = motifs.len(), "Fetched loops from BGSU API");
                    self.memo.remember(&pdb_id, &motifs);
                }
                Lookup::from_motifs(motifs)
            },
            Ok(None) => {
                debug!(pdb_id = %pdb_id, "Structure not in BGSU RNA 3D Hub");
                Lookup::Empty
            },
            Err(e) => {
                warn!(pdb_id = %pdb_id, error = %e, "BGSU API request failed");
                Lookup::Unavailable(e.to_string())
            },
        }
    }

    fn get_available_pdb_ids(&self) -> Vec<String> {
        self.memo.pdb_ids()
    }

    fn reset(&mut self) {
        self.client = None;
        self.memo.clear();
    }

    fn forget(&mut self, pdb_id: &str) {
        self.memo.forget(pdb_id);
    }
}
