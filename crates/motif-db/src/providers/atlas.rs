//! RNA 3D Motif Atlas release directory
//!
//! The directory holds one release file per loop class, named
//! `<type>_<version>.json` (`hl_4.5.json`, `il_4.10.json`). For every type
//! the file is resolved as follows:
//!
//! 1. A `motif_registry.json` entry `{"motif_files": {"HL": {"file": ...}}}`
//!    wins when the named file exists.
//! 2. A configured override version, matched literally, wins next.
//! 3. Otherwise the highest dotted-integer version is taken (`4.10` > `4.9`).
//! 4. If no candidate has a parseable version, the lexicographically last
//!    file name is used.

use super::{Lookup, MotifProvider, ATLAS_SOURCE};
use crate::converters::{AtlasJsonConverter, MotifConverter};
use crate::model::{normalize_pdb_id, MotifMap, MotifType, ProviderInfo, SourceKind};
use async_trait::async_trait;
use motif_common::{MotifError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Optional registry file pinning one file per type
pub const REGISTRY_FILE: &str = "motif_registry.json";

/// Types looked for when no registry lists any
pub const DEFAULT_MOTIF_TYPES: &[&str] = &["HL", "IL", "J3", "J4", "J5", "J6", "J7"];

/// A release file picked for one motif type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    /// Version token from the file name, when the name follows the convention
    pub version: Option<String>,
}

/// Parse `4.10` into `[4, 10]`; `None` if any part is not an integer
pub fn parse_version(version: &str) -> Option<Vec<u64>> {
    let parts: Vec<&str> = version.split('.').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return None;
    }
    parts.iter().map(|p| p.parse::<u64>().ok()).collect()
}

/// Pick the newest `<type>_<version>.json` in `dir`
pub fn discover_latest_version(
    dir: &Path,
    type_id: &str,
    override_version: Option<&str>,
) -> Option<ResolvedFile> {
    let prefix = format!("{}_", type_id.to_lowercase());

    let mut candidates: Vec<(String, String)> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let version = name.strip_prefix(&prefix)?.strip_suffix(".json")?.to_string();
            Some((name, version))
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort();

    let pick = |name: &str, version: &str| ResolvedFile {
        path: dir.join(name),
        version: Some(version.to_string()),
    };

    if let Some(wanted) = override_version {
        if let Some((name, version)) = candidates.iter().find(|(_, v)| v == wanted) {
            debug!(type_id, version = %version, "Using pinned Atlas version");
            return Some(pick(name, version));
        }
    }

    let newest = candidates
        .iter()
        .filter_map(|(name, version)| parse_version(version).map(|parsed| (parsed, name, version)))
        .max_by(|a, b| a.0.cmp(&b.0));

    match newest {
        Some((_, name, version)) => Some(pick(name, version)),
        None => candidates.last().map(|(name, _)| ResolvedFile {
            path: dir.join(name),
            version: None,
        }),
    }
}

/// Provider over an Atlas release directory
#[derive(Debug)]
pub struct AtlasProvider {
    dir: PathBuf,
    version_override: Option<String>,
    initialized: bool,
    version: String,
    last_updated: String,
    types: BTreeMap<String, MotifType>,
    index: BTreeMap<String, MotifMap>,
}

impl AtlasProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            version_override: None,
            initialized: false,
            version: String::new(),
            last_updated: String::new(),
            types: BTreeMap::new(),
            index: BTreeMap::new(),
        }
    }

    /// Pin the release version used for every type that has a matching file
    pub fn with_version_override(mut self, version: Option<String>) -> Self {
        self.version_override = version.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_registry(&self) -> Value {
        let path = self.dir.join(REGISTRY_FILE);
        if !path.exists() {
            return Value::Null;
        }
        match std::fs::read_to_string(&path)
            .map_err(MotifError::from)
            .and_then(|raw| Ok(serde_json::from_str::<Value>(&raw)?))
        {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable Atlas registry");
                Value::Null
            },
        }
    }

    fn resolve_files(&self, registry: &Value) -> BTreeMap<String, ResolvedFile> {
        let registered = registry.get("motif_files").and_then(Value::as_object);
        let types: Vec<String> = match registered {
            Some(files) if !files.is_empty() => files.keys().cloned().collect(),
            _ => DEFAULT_MOTIF_TYPES.iter().map(|t| t.to_string()).collect(),
        };

        let mut resolved = BTreeMap::new();
        for type_id in types {
            let explicit = registered
                .and_then(|files| files.get(&type_id))
                .and_then(|entry| entry.get("file"))
                .and_then(Value::as_str)
                .map(|file| self.dir.join(file))
                .filter(|path| path.exists());

            let file = match explicit {
                Some(path) => Some(ResolvedFile { path, version: None }),
                None => discover_latest_version(
                    &self.dir,
                    &type_id,
                    self.version_override.as_deref(),
                ),
            };

            if let Some(file) = file {
                debug!(type_id = %type_id, path = %file.path.display(), "Resolved Atlas file");
                resolved.insert(type_id.to_uppercase(), file);
            }
        }
        resolved
    }

    fn load(&self) -> Result<(BTreeMap<String, MotifType>, BTreeSet<String>, String)> {
        if !self.dir.is_dir() {
            return Err(MotifError::config(format!(
                "Atlas directory not found: {}",
                self.dir.display()
            )));
        }

        let registry = self.load_registry();
        let resolved = self.resolve_files(&registry);
        if resolved.is_empty() {
            return Err(MotifError::config(format!(
                "No Atlas motif files in {}",
                self.dir.display()
            )));
        }

        let mut types = BTreeMap::new();
        let mut versions = BTreeSet::new();
        for (type_id, file) in resolved {
            for mut motif_type in AtlasJsonConverter.convert_file(&file.path)? {
                motif_type.type_id = type_id.clone();
                types.insert(type_id.clone(), motif_type);
            }
            versions.extend(file.version);
        }

        let last_updated = registry
            .get("last_updated")
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        Ok((types, versions, last_updated))
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
impl MotifProvider for AtlasProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: ATLAS_SOURCE.to_string(),
            name: "RNA 3D Motif Atlas".to_string(),
            description: "Structural motifs from the RNA 3D Motif Atlas (BGSU)".to_string(),
            version: self.version.clone(),
            kind: SourceKind::Local,
            motif_types: self.types.keys().cloned().collect(),
            pdb_count: self.index.len(),
            last_updated: self.last_updated.clone(),
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
            Ok((types, versions, last_updated)) => {
                self.index = build_index(&types);
                self.types = types;
                self.version = if versions.is_empty() {
                    "unknown".to_string()
                } else {
                    versions.into_iter().collect::<Vec<_>>().join(",")
                };
                self.last_updated = last_updated;
                self.initialized = true;
                info!(
                    dir = %self.dir.display(),
                    types = self.types.len(),
                    structures = self.index.len(),
                    version = %self.version,
                    "Atlas provider initialized"
                );
                true
            },
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Atlas provider failed to initialize");
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
        self.types.get(&type_id.trim().to_uppercase()).cloned()
    }

    async fn lookup(&mut self, pdb_id: &str) -> Lookup {
        if !self.initialized {
            return Lookup::Unavailable("Atlas provider is not initialized".to_string());
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
        self.version.clear();
        self.last_updated.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::providers::{has_pdb, refresh};

    fn family(instance_id: &str, unit: &str) -> String {
        format!(
            r#"[{{"motif_id": "HL_1.1", "alignment": {{"{}": {{"1": "{}"}}}}}}]"#,
            instance_id, unit
        )
    }

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_version_order_is_numeric() {
        assert!(parse_version("4.10").unwrap() > parse_version("4.9").unwrap());
        assert!(parse_version("4.5.1").unwrap() > parse_version("4.5").unwrap());
        assert_eq!(parse_version("4..5"), Some(vec![4, 5]));
        assert_eq!(parse_version("latest"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_discovery_prefers_highest_version() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hl_4.9.json", "[]");
        write(dir.path(), "hl_4.10.json", "[]");
        write(dir.path(), "il_9.9.json", "[]");

        let found = discover_latest_version(dir.path(), "HL", None).unwrap();
        assert_eq!(found.path, dir.path().join("hl_4.10.json"));
        assert_eq!(found.version.as_deref(), Some("4.10"));
    }

    #[test]
    fn test_discovery_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hl_4.9.json", "[]");
        write(dir.path(), "hl_4.10.json", "[]");

        let found = discover_latest_version(dir.path(), "HL", Some("4.9")).unwrap();
        assert_eq!(found.path, dir.path().join("hl_4.9.json"));

        // An override with no matching file falls back to numeric order
        let found = discover_latest_version(dir.path(), "HL", Some("3.0")).unwrap();
        assert_eq!(found.path, dir.path().join("hl_4.10.json"));
    }

    #[test]
    fn test_discovery_falls_back_to_last_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hl_alpha.json", "[]");
        write(dir.path(), "hl_beta.json", "[]");

        let found = discover_latest_version(dir.path(), "hl", None).unwrap();
        assert_eq!(found.path, dir.path().join("hl_beta.json"));
        assert_eq!(found.version, None);
        assert!(discover_latest_version(dir.path(), "IL", None).is_none());
    }

    #[tokio::test]
    async fn test_initialize_builds_index() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hl_4.5.json", &family("HL_6SVS_002", "6SVS|1|A|G|303"));
        write(dir.path(), "hl_4.6.json", &family("HL_1S72_001", "1S72|1|0|G|12"));
        write(dir.path(), "il_1.0.json", &family("IL_1S72_004", "1S72|1|0|C|90"));

        let mut provider = AtlasProvider::new(dir.path());
        assert!(provider.initialize().await);
        assert!(provider.initialize().await);

        assert_eq!(provider.get_available_motif_types(), vec!["HL", "IL"]);
        assert_eq!(provider.get_available_pdb_ids(), vec!["1S72"]);
        assert_eq!(provider.info().version, "1.0,4.6");

        let motifs = provider.get_motifs_for_pdb("1s72").await;
        assert_eq!(motifs.keys().collect::<Vec<_>>(), vec!["HL", "IL"]);
        assert!(has_pdb(&mut provider, "1S72").await);
        assert!(!has_pdb(&mut provider, "6SVS").await);
        assert_eq!(provider.lookup("9XYZ").await, Lookup::Empty);

        let residues = provider.get_motif_residues("1S72", "IL", "IL_1S72_004").await;
        assert_eq!(residues[0].residue_number, 90);
    }

    #[tokio::test]
    async fn test_registry_pins_file_and_types() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hl_4.5.json", &family("HL_6SVS_002", "6SVS|1|A|G|303"));
        write(dir.path(), "hl_4.6.json", &family("HL_1S72_001", "1S72|1|0|G|12"));
        write(dir.path(), "il_1.0.json", &family("IL_1S72_004", "1S72|1|0|C|90"));
        write(
            dir.path(),
            REGISTRY_FILE,
            r#"{"motif_files": {"HL": {"file": "hl_4.5.json"}}, "last_updated": "2024-05-01"}"#,
        );

        let mut provider = AtlasProvider::new(dir.path());
        assert!(provider.initialize().await);
        assert_eq!(provider.get_available_motif_types(), vec!["HL"]);
        assert_eq!(provider.get_available_pdb_ids(), vec!["6SVS"]);
        assert_eq!(provider.info().last_updated, "2024-05-01");
    }

    #[tokio::test]
    async fn test_version_override() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hl_4.5.json", &family("HL_6SVS_002", "6SVS|1|A|G|303"));
        write(dir.path(), "hl_4.6.json", &family("HL_1S72_001", "1S72|1|0|G|12"));

        let mut provider =
            AtlasProvider::new(dir.path()).with_version_override(Some("4.5".to_string()));
        assert!(provider.initialize().await);
        assert_eq!(provider.get_available_pdb_ids(), vec!["6SVS"]);
    }

    #[tokio::test]
    async fn test_failed_initialize_leaves_provider_empty() {
        let missing = tempfile::tempdir().unwrap().path().join("nope");
        let mut provider = AtlasProvider::new(&missing);
        assert!(!provider.initialize().await);
        assert!(!provider.is_initialized());

        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hl_4.5.json", &family("HL_6SVS_002", "6SVS|1|A|G|303"));
        write(dir.path(), "il_1.0.json", "{ truncated");

        let mut provider = AtlasProvider::new(dir.path());
        assert!(!provider.initialize().await);
        assert!(provider.get_available_pdb_ids().is_empty());
        assert!(matches!(provider.lookup("6SVS").await, Lookup::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hl_4.5.json", &family("HL_6SVS_002", "6SVS|1|A|G|303"));

        let mut provider = AtlasProvider::new(dir.path());
        assert!(provider.initialize().await);
        write(dir.path(), "hl_4.7.json", &family("HL_1S72_001", "1S72|1|0|G|12"));

        assert!(refresh(&mut provider).await);
        assert_eq!(provider.get_available_pdb_ids(), vec!["1S72"]);
    }
}
