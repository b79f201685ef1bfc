//! Provider registry
//!
//! Holds the initialized providers in registration order and tracks which one
//! is active. Query methods without a source argument go to the active
//! provider.

use crate::model::{normalize_pdb_id, MotifMap, ProviderInfo};
use crate::providers::{self, MotifProvider};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Default)]
pub struct Registry {
    providers: Vec<(String, Box<dyn MotifProvider>)>,
    active: Option<String>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.ids())
            .field("active", &self.active)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize (if needed) and register a provider
    ///
    /// The id defaults to the provider's own. A provider that fails to
    /// initialize is not registered. The first successful registration becomes
    /// active. Registering an existing id replaces that provider in place.
    pub async fn register(&mut self, mut provider: Box<dyn MotifProvider>, id: Option<&str>) -> bool {
        let id = id.map(str::to_string).unwrap_or_else(|| provider.info().id);

        if !provider.is_initialized() && !provider.initialize().await {
            warn!(source = %id, "Provider failed to initialize, not registered");
            return false;
        }

        match self.providers.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = provider,
            None => self.providers.push((id.clone(), provider)),
        }
        if self.active.is_none() {
            self.active = Some(id.clone());
        }
        info!(source = %id, "Registered motif provider");
        true
    }

    /// Remove a provider; the active id falls back to the first remaining one
    pub fn unregister(&mut self, id: &str) -> Option<Box<dyn MotifProvider>> {
        let position = self.providers.iter().position(|(existing, _)| existing == id)?;
        let (_, provider) = self.providers.remove(position);
        if self.active.as_deref() == Some(id) {
            self.active = self.providers.first().map(|(first, _)| first.clone());
        }
        debug!(source = id, active = ?self.active, "Unregistered motif provider");
        Some(provider)
    }

    pub fn set_active(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            warn!(source = id, available = ?self.ids(), "Cannot activate unknown provider");
            return false;
        }
        self.active = Some(id.to_string());
        true
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.iter().any(|(existing, _)| existing == id)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> Vec<String> {
        self.providers.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn provider(&self, id: &str) -> Option<&dyn MotifProvider> {
        self.providers
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, provider)| provider.as_ref())
    }

    pub fn provider_mut(&mut self, id: &str) -> Option<&mut (dyn MotifProvider + 'static)> {
        self.providers
            .iter_mut()
            .find(|(existing, _)| existing == id)
            .map(|(_, provider)| provider.as_mut())
    }

    pub fn active_provider_mut(&mut self) -> Option<&mut (dyn MotifProvider + 'static)> {
        let id = self.active.clone()?;
        self.provider_mut(&id)
    }

    pub fn infos(&self) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .map(|(id, provider)| ProviderInfo {
                id: id.clone(),
                ..provider.info()
            })
            .collect()
    }

    pub fn get_available_motif_types(&self) -> Vec<String> {
        self.active
            .as_deref()
            .and_then(|id| self.provider(id))
            .map(|provider| provider.get_available_motif_types())
            .unwrap_or_default()
    }

    pub fn get_available_pdb_ids(&self) -> Vec<String> {
        self.active
            .as_deref()
            .and_then(|id| self.provider(id))
            .map(|provider| provider.get_available_pdb_ids())
            .unwrap_or_default()
    }

    pub async fn get_motifs_for_pdb(&mut self, pdb_id: &str) -> MotifMap {
        match self.active_provider_mut() {
            Some(provider) => provider.get_motifs_for_pdb(&normalize_pdb_id(pdb_id)).await,
            None => MotifMap::new(),
        }
    }

    pub async fn has_pdb(&mut self, pdb_id: &str) -> bool {
        match self.active_provider_mut() {
            Some(provider) => providers::has_pdb(provider, pdb_id).await,
            None => false,
        }
    }

    /// Non-empty results of every provider, keyed by provider id
    pub async fn get_all_motifs_for_pdb(&mut self, pdb_id: &str) -> BTreeMap<String, MotifMap> {
        let pdb_id = normalize_pdb_id(pdb_id);
        let mut results = BTreeMap::new();
        for (id, provider) in self.providers.iter_mut() {
            let motifs = provider.get_motifs_for_pdb(&pdb_id).await;
            if !motifs.is_empty() {
                results.insert(id.clone(), motifs);
            }
        }
        results
    }

    /// Every provider's motifs merged under `"<provider>:<type>"` keys
    pub async fn get_combined_motifs_for_pdb(&mut self, pdb_id: &str) -> MotifMap {
        let pdb_id = normalize_pdb_id(pdb_id);
        let mut combined = MotifMap::new();
        for (id, provider) in self.providers.iter_mut() {
            for (type_id, instances) in provider.get_motifs_for_pdb(&pdb_id).await {
                combined.insert(format!("{}:{}", id, type_id), instances);
            }
        }
        combined
    }

    /// Which providers have motifs for a structure
    pub async fn search_all_providers(&mut self, pdb_id: &str) -> BTreeMap<String, bool> {
        let mut found = BTreeMap::new();
        for (id, provider) in self.providers.iter_mut() {
            found.insert(id.clone(), providers::has_pdb(provider.as_mut(), pdb_id).await);
        }
        found
    }

    pub fn summary(&self) -> String {
        let mut lines = vec!["Registered Databases:".to_string()];
        for (id, provider) in &self.providers {
            let info = provider.info();
            let marker = if self.active.as_deref() == Some(id.as_str()) {
                " (ACTIVE)"
            } else {
                ""
            };
            lines.push(format!("  [{}]{}", id, marker));
            lines.push(format!("    Name: {}", info.name));
            lines.push(format!("    Motif types: {}", info.motif_types.len()));
            lines.push(format!("    PDB structures: {}", info.pdb_count));
        }
        lines.join("\n")
    }
}
