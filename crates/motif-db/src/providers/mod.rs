//! Motif providers
//!
//! A provider answers motif queries for one data source. Local providers
//! index a directory once in [`MotifProvider::initialize`]; remote providers
//! fetch per structure and shield the network with the shared
//! [`CacheManager`](crate::cache::CacheManager).
//!
//! Nothing is raised past the provider boundary: [`MotifProvider::lookup`]
//! reports a [`Lookup`], which keeps "confirmed empty" apart from "could not
//! determine".

pub mod atlas;
pub mod bgsu_api;
pub mod rfam;
pub mod rfam_api;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use atlas::AtlasProvider;
pub use bgsu_api::BgsuApiProvider;
pub use rfam::RfamProvider;
pub use rfam_api::RfamApiProvider;
pub use user::UserAnnotationProvider;

use crate::cache::CacheManager;
use crate::model::{
    count_instances, normalize_pdb_id, MotifMap, MotifType, ProviderInfo, ResidueSpec, SourceKind,
};
use async_trait::async_trait;
use motif_common::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Source id of the RNA 3D Motif Atlas directory provider
pub const ATLAS_SOURCE: &str = "atlas";
/// Source id of the Rfam SEED directory provider
pub const RFAM_SOURCE: &str = "rfam";
/// Source id of the BGSU RNA 3D Hub provider
pub const BGSU_API_SOURCE: &str = "bgsu_api";
/// Source id of the Rfam motif API provider
pub const RFAM_API_SOURCE: &str = "rfam_api";
/// Source id of the user annotation provider
pub const USER_SOURCE: &str = "user";

/// User-Agent sent with every remote request
pub const USER_AGENT: &str = concat!("rna-motifs/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout for remote catalogs
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Outcome of asking one provider about one structure
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Motifs were found
    Found(MotifMap),
    /// The source answered and has nothing for this structure
    Empty,
    /// The source could not be consulted
    Unavailable(String),
}

impl Lookup {
    /// `Found` for a non-empty map, `Empty` otherwise
    pub fn from_motifs(motifs: MotifMap) -> Self {
        if motifs.is_empty() {
            Lookup::Empty
        } else {
            Lookup::Found(motifs)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// Flatten to a motif map; empty for anything but `Found`
    pub fn into_motifs(self) -> MotifMap {
        match self {
            Lookup::Found(motifs) => motifs,
            Lookup::Empty | Lookup::Unavailable(_) => MotifMap::new(),
        }
    }
}

/// Capability interface shared by every motif source
#[async_trait]
pub trait MotifProvider: Send {
    /// Static metadata plus current counts
    fn info(&self) -> ProviderInfo;

    /// Local files or remote service
    fn kind(&self) -> SourceKind;

    /// Load and index the source; idempotent
    ///
    /// Returns `false` on failure and leaves the provider empty and
    /// uninitialized.
    async fn initialize(&mut self) -> bool;

    fn is_initialized(&self) -> bool;

    fn get_available_motif_types(&self) -> Vec<String>;

    fn get_motif_type(&self, type_id: &str) -> Option<MotifType>;

    /// Motifs of one structure, grouped by type
    async fn lookup(&mut self, pdb_id: &str) -> Lookup;

    async fn get_motifs_for_pdb(&mut self, pdb_id: &str) -> MotifMap {
        self.lookup(pdb_id).await.into_motifs()
    }

    /// Structures known to this provider
    ///
    /// Remote providers only know the structures fetched so far.
    fn get_available_pdb_ids(&self) -> Vec<String>;

    /// Residues of one instance
    ///
    /// Looks in `motif_type` first, then in every other type of the structure.
    async fn get_motif_residues(
        &mut self,
        pdb_id: &str,
        motif_type: &str,
        instance_id: &str,
    ) -> Vec<ResidueSpec> {
        let motifs = self.get_motifs_for_pdb(pdb_id).await;
        find_residues(&motifs, motif_type, instance_id)
    }

    /// Drop every index and memo; the provider becomes uninitialized
    fn reset(&mut self);

    /// Drop whatever is memoized in-process for one structure
    fn forget(&mut self, _pdb_id: &str) {}
}

/// Whether the provider has motifs for a structure
///
/// Remote providers answer with a (memoized) lookup; local providers check
/// their index.
pub async fn has_pdb(provider: &mut dyn MotifProvider, pdb_id: &str) -> bool {
    let pdb_id = normalize_pdb_id(pdb_id);
    match provider.kind() {
        SourceKind::Remote => provider.lookup(&pdb_id).await.is_found(),
        SourceKind::Local => provider.get_available_pdb_ids().contains(&pdb_id),
    }
}

/// Total number of motif instances for a structure
pub async fn count_motifs_for_pdb(provider: &mut dyn MotifProvider, pdb_id: &str) -> usize {
    count_instances(&provider.get_motifs_for_pdb(pdb_id).await)
}

/// Human-readable per-type counts for a structure
pub async fn summary(provider: &mut dyn MotifProvider, pdb_id: &str) -> String {
    let pdb_id = normalize_pdb_id(pdb_id);
    let name = provider.info().name;
    let motifs = provider.get_motifs_for_pdb(&pdb_id).await;
    format_summary(&pdb_id, &name, &motifs)
}

pub(crate) fn format_summary(pdb_id: &str, source_name: &str, motifs: &MotifMap) -> String {
    if motifs.is_empty() {
        return format!("No motifs found in {} (database: {})", pdb_id, source_name);
    }
    let mut lines = vec![format!("Motifs in {} ({}):", pdb_id, source_name)];
    lines.extend(
        motifs
            .iter()
            .map(|(type_id, instances)| format!("  {}: {} instances", type_id, instances.len())),
    );
    lines.join("\n")
}

/// Clear the provider's index and load it again
pub async fn refresh(provider: &mut dyn MotifProvider) -> bool {
    provider.reset();
    provider.initialize().await
}

/// Residues of `instance_id`, looking in `motif_type` first
pub fn find_residues(motifs: &MotifMap, motif_type: &str, instance_id: &str) -> Vec<ResidueSpec> {
    let preferred = motifs
        .get(motif_type)
        .or_else(|| motifs.get(&motif_type.to_uppercase()));

    preferred
        .into_iter()
        .chain(motifs.values())
        .flatten()
        .find(|inst| inst.instance_id == instance_id)
        .map(|inst| inst.residues.clone())
        .unwrap_or_default()
}

/// HTTP client used by the remote catalogs
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

/// In-process memo of fetched structures in front of the disk cache
#[derive(Debug)]
pub(crate) struct FetchMemo {
    source: &'static str,
    cache: Option<Arc<CacheManager>>,
    fetched: BTreeMap<String, MotifMap>,
}

impl FetchMemo {
    pub(crate) fn new(source: &'static str, cache: Option<Arc<CacheManager>>) -> Self {
        Self {
            source,
            cache,
            fetched: BTreeMap::new(),
        }
    }

    /// Memoized or disk-cached motifs for a structure
    pub(crate) fn recall(&mut self, pdb_id: &str) -> Option<MotifMap> {
        if let Some(motifs) = self.fetched.get(pdb_id) {
            return Some(motifs.clone());
        }

        let cached = self.cache.as_ref()?.get(pdb_id, self.source, false)?;
        if cached.is_empty() {
            return None;
        }
        debug!(pdb_id, source = self.source, "Serving motifs from disk cache");
        self.fetched.insert(pdb_id.to_string(), cached.clone());
        Some(cached)
    }

    /// Record a successful fetch in memory and on disk
    pub(crate) fn remember(&mut self, pdb_id: &str, motifs: &MotifMap) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(pdb_id, self.source, motifs) {
                warn!(pdb_id, source = self.source, error = %e, "Failed to cache motifs");
            }
        }
        self.fetched.insert(pdb_id.to_string(), motifs.clone());
    }

    pub(crate) fn forget(&mut self, pdb_id: &str) {
        self.fetched.remove(&normalize_pdb_id(pdb_id));
    }

    pub(crate) fn clear(&mut self) {
        self.fetched.clear();
    }

    pub(crate) fn pdb_ids(&self) -> Vec<String> {
        self.fetched.keys().cloned().collect()
    }
}
