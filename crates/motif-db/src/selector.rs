//! Source selection policy
//!
//! Decides, per query, which registered providers are consulted and how their
//! answers are combined:
//!
//! ```text
//! override given  -> that source only
//! auto-like mode  -> try sources in order, first Found wins
//! all             -> query every source, merge under "<source>:<type>"
//! ```

use crate::cache::CacheManager;
use crate::converters::ToolExport;
use crate::model::{normalize_pdb_id, MotifMap, SourceKind};
use crate::providers::{
    user, Lookup, ATLAS_SOURCE, BGSU_API_SOURCE, RFAM_API_SOURCE, RFAM_SOURCE, USER_SOURCE,
};
use crate::registry::Registry;
use motif_common::MotifError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Remote catalogs refreshed by [`SourceSelector::refresh_from_api`]
const API_SOURCES: [&str; 2] = [BGSU_API_SOURCE, RFAM_API_SOURCE];

/// Default order for `auto` and `all`
pub fn default_priority() -> Vec<String> {
    [ATLAS_SOURCE, RFAM_SOURCE, BGSU_API_SOURCE, RFAM_API_SOURCE]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// How sources are chosen for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Configured priority, first non-empty wins
    #[default]
    Auto,
    /// Bundled directories only
    Local,
    /// BGSU hub first, then the Atlas directory
    Bgsu,
    /// Rfam API first, then the Rfam directory
    Rfam,
    /// Every source in priority order, merged
    All,
}

impl SourceMode {
    /// Ordered source ids consulted in this mode
    pub fn source_list(self, priority: &[String]) -> Vec<String> {
        let fixed = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect();
        match self {
            SourceMode::Local => fixed(&[ATLAS_SOURCE, RFAM_SOURCE]),
            SourceMode::Bgsu => fixed(&[BGSU_API_SOURCE, ATLAS_SOURCE]),
            SourceMode::Rfam => fixed(&[RFAM_API_SOURCE, RFAM_SOURCE]),
            SourceMode::Auto | SourceMode::All => priority.to_vec(),
        }
    }

    pub fn combines(self) -> bool {
        self == SourceMode::All
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceMode::Auto => "auto",
            SourceMode::Local => "local",
            SourceMode::Bgsu => "bgsu",
            SourceMode::Rfam => "rfam",
            SourceMode::All => "all",
        };
        f.write_str(name)
    }
}

impl FromStr for SourceMode {
    type Err = MotifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(SourceMode::Auto),
            "local" => Ok(SourceMode::Local),
            "bgsu" => Ok(SourceMode::Bgsu),
            "rfam" => Ok(SourceMode::Rfam),
            "all" => Ok(SourceMode::All),
            other => Err(MotifError::config(format!(
                "Invalid source mode '{}'. Must be one of: auto, local, bgsu, rfam, all",
                other
            ))),
        }
    }
}

/// Result of one selection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
    pub motifs: MotifMap,
    /// Source id that answered, or the comma-joined contributors when merging
    pub source_used: Option<String>,
}

impl Selection {
    fn empty() -> Self {
        Self::default()
    }

    fn answered(source: &str, motifs: MotifMap) -> Self {
        Self {
            motifs,
            source_used: Some(source.to_string()),
        }
    }
}

/// Per-source overview for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub kind: SourceKind,
    pub motif_types: usize,
    /// Only meaningful for local sources
    pub pdb_count: Option<usize>,
}

/// Residue-set identity used to drop duplicates when merging
type ResidueKey = BTreeSet<(String, i32, String, i32)>;

#[derive(Debug)]
pub struct SourceSelector {
    registry: Registry,
    cache: Option<Arc<CacheManager>>,
    mode: SourceMode,
    priority: Vec<String>,
    dedupe_combined: bool,
    last_source: Option<String>,
}

impl SourceSelector {
    pub fn new(registry: Registry, cache: Option<Arc<CacheManager>>) -> Self {
        Self {
            registry,
            cache,
            mode: SourceMode::default(),
            priority: default_priority(),
            dedupe_combined: false,
            last_source: None,
        }
    }

    pub fn with_mode(mut self, mode: SourceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_priority(mut self, priority: Vec<String>) -> Self {
        self.priority = priority;
        self
    }

    /// Drop merged instances whose type and residue set were already contributed
    pub fn with_dedupe_combined(mut self, dedupe: bool) -> Self {
        self.dedupe_combined = dedupe;
        self
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SourceMode) {
        self.mode = mode;
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn available_sources(&self) -> Vec<String> {
        self.registry.ids()
    }

    /// Source(s) that answered the last query
    pub fn last_source_used(&self) -> Option<&str> {
        self.last_source.as_deref()
    }

    /// Motifs for a structure under the current policy
    pub async fn get_motifs_for_pdb(
        &mut self,
        pdb_id: &str,
        source_override: Option<&str>,
        force_refresh: bool,
    ) -> Selection {
        let pdb_id = normalize_pdb_id(pdb_id);

        let selection = match source_override {
            Some(source) => self.from_single(&pdb_id, source, force_refresh).await,
            None if self.mode.combines() => self.from_all(&pdb_id, force_refresh).await,
            None => self.first_found(&pdb_id, force_refresh).await,
        };

        self.last_source = selection.source_used.clone();
        selection
    }

    async fn from_single(&mut self, pdb_id: &str, source: &str, force_refresh: bool) -> Selection {
        if !self.registry.contains(source) {
            warn!(source, available = ?self.registry.ids(), "Requested source is not registered");
            return Selection::empty();
        }
        if force_refresh {
            self.invalidate(pdb_id, source);
        }

        let Some(provider) = self.registry.provider_mut(source) else {
            return Selection::empty();
        };
        let motifs = match provider.lookup(pdb_id).await {
            Lookup::Found(motifs) => motifs,
            Lookup::Empty => MotifMap::new(),
            Lookup::Unavailable(reason) => {
                warn!(source, pdb_id, reason = %reason, "Requested source unavailable");
                MotifMap::new()
            },
        };
        Selection::answered(source, motifs)
    }

    async fn first_found(&mut self, pdb_id: &str, force_refresh: bool) -> Selection {
        for source in self.mode.source_list(&self.priority) {
            match self.consult(pdb_id, &source, force_refresh).await {
                Some(motifs) => {
                    info!(pdb_id, source = %source, types = motifs.len(), "Motifs resolved");
                    return Selection::answered(&source, motifs);
                },
                None => continue,
            }
        }
        debug!(pdb_id, mode = %self.mode, "No source had motifs");
        Selection::empty()
    }

    async fn from_all(&mut self, pdb_id: &str, force_refresh: bool) -> Selection {
        let mut combined = MotifMap::new();
        let mut contributors = Vec::new();
        let mut seen: HashSet<(String, ResidueKey)> = HashSet::new();

        for source in self.mode.source_list(&self.priority) {
            let Some(motifs) = self.consult(pdb_id, &source, force_refresh).await else {
                continue;
            };

            let mut contributed = false;
            for (type_id, instances) in motifs {
                let kept: Vec<_> = if self.dedupe_combined {
                    instances
                        .into_iter()
                        .filter(|inst| {
                            let key: ResidueKey = inst
                                .residues
                                .iter()
                                .map(|r| (r.chain.clone(), r.residue_number, r.insertion_code.clone(), r.model))
                                .collect();
                            seen.insert((type_id.clone(), key))
                        })
                        .collect()
                } else {
                    instances
                };
                if kept.is_empty() {
                    continue;
                }
                contributed = true;
                combined.insert(format!("{}:{}", source, type_id), kept);
            }
            if contributed {
                contributors.push(source);
            }
        }

        Selection {
            motifs: combined,
            source_used: (!contributors.is_empty()).then(|| contributors.join(",")),
        }
    }

    /// Ask one source; `Some` only for a non-empty answer
    async fn consult(&mut self, pdb_id: &str, source: &str, force_refresh: bool) -> Option<MotifMap> {
        let is_remote = self.registry.provider(source)?.kind() == SourceKind::Remote;
        if force_refresh && is_remote {
            self.invalidate(pdb_id, source);
        }

        match self.registry.provider_mut(source)?.lookup(pdb_id).await {
            Lookup::Found(motifs) => Some(motifs),
            Lookup::Empty => {
                debug!(pdb_id, source, "Source has no motifs");
                None
            },
            Lookup::Unavailable(reason) => {
                warn!(pdb_id, source, reason = %reason, "Source unavailable, trying next");
                None
            },
        }
    }

    /// Drop cached and memoized data of one structure for one source
    fn invalidate(&mut self, pdb_id: &str, source: &str) {
        if let Some(cache) = &self.cache {
            let removed = cache.invalidate(pdb_id, Some(source));
            debug!(pdb_id, source, removed, "Invalidated cache entry");
        }
        if let Some(provider) = self.registry.provider_mut(source) {
            provider.forget(pdb_id);
        }
    }

    /// Bypass caches and ask the remote catalogs directly
    pub async fn refresh_from_api(&mut self, pdb_id: &str) -> Selection {
        let pdb_id = normalize_pdb_id(pdb_id);
        for source in API_SOURCES {
            self.invalidate(&pdb_id, source);
        }

        for source in API_SOURCES {
            if let Some(motifs) = self.consult(&pdb_id, source, false).await {
                self.last_source = Some(source.to_string());
                return Selection::answered(source, motifs);
            }
        }
        Selection::empty()
    }

    /// Which sources already know the structure, without fetching
    pub fn check_pdb_availability(&self, pdb_id: &str) -> BTreeMap<String, bool> {
        let pdb_id = normalize_pdb_id(pdb_id);
        self.registry
            .ids()
            .into_iter()
            .filter_map(|id| {
                let known = self
                    .registry
                    .provider(&id)?
                    .get_available_pdb_ids()
                    .iter()
                    .any(|known| normalize_pdb_id(known) == pdb_id);
                Some((id, known))
            })
            .collect()
    }

    pub fn source_info(&self) -> BTreeMap<String, SourceSummary> {
        self.registry
            .ids()
            .into_iter()
            .filter_map(|id| {
                let provider = self.registry.provider(&id)?;
                let info = provider.info();
                let summary = SourceSummary {
                    name: info.name,
                    kind: info.kind,
                    motif_types: provider.get_available_motif_types().len(),
                    pdb_count: (info.kind == SourceKind::Local)
                        .then(|| provider.get_available_pdb_ids().len()),
                };
                Some((id, summary))
            })
            .collect()
    }

    /// User annotations of one structure produced by one tool
    pub async fn motifs_for_tool(&mut self, pdb_id: &str, tool: ToolExport) -> MotifMap {
        let pdb_id = normalize_pdb_id(pdb_id);
        match self.registry.provider_mut(USER_SOURCE) {
            Some(provider) => user::filter_by_tool(provider.get_motifs_for_pdb(&pdb_id).await, tool),
            None => MotifMap::new(),
        }
    }
}
