//! Session context
//!
//! [`MotifSession`] is built once from a [`MotifConfig`] and owns everything
//! a caller needs: the shared cache, the registry of providers and the
//! selection policy.

use crate::cache::CacheManager;
use crate::config::MotifConfig;
use crate::converters::ToolExport;
use crate::model::{normalize_pdb_id, MotifMap, ResidueSpec};
use crate::providers::{
    find_residues, AtlasProvider, BgsuApiProvider, MotifProvider, RfamApiProvider, RfamProvider,
    UserAnnotationProvider, ATLAS_SOURCE, BGSU_API_SOURCE, RFAM_API_SOURCE, RFAM_SOURCE, USER_SOURCE,
};
use crate::registry::Registry;
use crate::selector::{Selection, SourceSelector};
use motif_common::Result;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub struct MotifSession {
    config: MotifConfig,
    cache: Arc<CacheManager>,
    selector: SourceSelector,
}

impl MotifSession {
    /// Validate the config, open the cache and register every available source
    ///
    /// Local sources are registered when their directory exists; remote
    /// catalogs when `enable_api` is set. A source that fails to initialize is
    /// left out.
    pub async fn bootstrap(config: MotifConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(CacheManager::new(&config.cache_dir, config.cache_days)?);
        let mut registry = Registry::new();

        let mut candidates: Vec<(&str, Box<dyn MotifProvider>)> = Vec::new();
        if config.atlas_path().is_dir() {
            candidates.push((
                ATLAS_SOURCE,
                Box::new(
                    AtlasProvider::new(config.atlas_path())
                        .with_version_override(config.atlas_version.clone()),
                ),
            ));
        }
        if config.rfam_path().is_dir() {
            candidates.push((RFAM_SOURCE, Box::new(RfamProvider::new(config.rfam_path()))));
        }
        if config.user_path().is_dir() {
            candidates.push((USER_SOURCE, Box::new(UserAnnotationProvider::new(config.user_path()))));
        }
        if config.enable_api {
            candidates.push((
                BGSU_API_SOURCE,
                Box::new(
                    BgsuApiProvider::new(Some(cache.clone()))
                        .with_base_url(&config.bgsu_base_url)
                        .with_timeout(config.timeout()),
                ),
            ));
            candidates.push((
                RFAM_API_SOURCE,
                Box::new(
                    RfamApiProvider::new(Some(cache.clone()))
                        .with_base_url(&config.rfam_base_url)
                        .with_timeout(config.timeout()),
                ),
            ));
        }

        for (id, provider) in candidates {
            if !registry.register(provider, Some(id)).await {
                warn!(source = id, "Source left out of session");
            }
        }
        info!(
            sources = ?registry.ids(),
            mode = %config.mode,
            cache_dir = %cache.cache_dir().display(),
            "Motif session ready"
        );

        let selector = SourceSelector::new(registry, Some(cache.clone()))
            .with_mode(config.mode)
            .with_priority(config.priority.clone())
            .with_dedupe_combined(config.dedupe_combined);

        Ok(Self {
            config,
            cache,
            selector,
        })
    }

    /// Session over an already populated registry
    pub fn with_registry(config: MotifConfig, registry: Registry) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(CacheManager::new(&config.cache_dir, config.cache_days)?);
        let selector = SourceSelector::new(registry, Some(cache.clone()))
            .with_mode(config.mode)
            .with_priority(config.priority.clone())
            .with_dedupe_combined(config.dedupe_combined);
        Ok(Self {
            config,
            cache,
            selector,
        })
    }

    pub fn config(&self) -> &MotifConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut SourceSelector {
        &mut self.selector
    }

    /// Full selection with an optional source override and cache bypass
    pub async fn select(&mut self, pdb_id: &str, source: Option<&str>, force_refresh: bool) -> Selection {
        self.selector.get_motifs_for_pdb(pdb_id, source, force_refresh).await
    }

    pub async fn get_motifs_for_pdb(&mut self, pdb_id: &str) -> MotifMap {
        self.select(pdb_id, None, false).await.motifs
    }

    /// Residues of one instance under the current policy
    ///
    /// Combined results are keyed `"<source>:<type>"`, so a bare type also
    /// matches any prefixed key ending in it.
    pub async fn get_motif_residues(
        &mut self,
        pdb_id: &str,
        motif_type: &str,
        instance_id: &str,
    ) -> Vec<ResidueSpec> {
        let motifs = self.get_motifs_for_pdb(pdb_id).await;
        let preferred = motifs
            .keys()
            .find(|key| key.rsplit_once(':').is_some_and(|(_, t)| t == motif_type))
            .cloned()
            .unwrap_or_else(|| motif_type.to_string());
        find_residues(&motifs, &preferred, instance_id)
    }

    pub async fn has_pdb(&mut self, pdb_id: &str) -> bool {
        !self.get_motifs_for_pdb(&normalize_pdb_id(pdb_id)).await.is_empty()
    }

    pub async fn motifs_for_tool(&mut self, pdb_id: &str, tool: ToolExport) -> MotifMap {
        self.selector.motifs_for_tool(pdb_id, tool).await
    }
}
