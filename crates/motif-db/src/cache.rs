//! Persistent motif cache
//!
//! Remote lookups are cached on disk per `(structure, source)` pair as two
//! files in the cache directory:
//!
//! - `<PDB>_<source>.json` with the serialized motif map
//! - `<PDB>_<source>.meta.json` with fetch time, expiry and schema version
//!
//! Both files are written to a temporary file in the same directory and then
//! renamed into place. A pair whose metadata cannot be read, or whose schema
//! version differs, is treated as a miss and removed.

use crate::model::{normalize_pdb_id, MotifMap};
use chrono::{DateTime, Duration, Utc};
use motif_common::{MotifError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Default number of days before a cached entry expires
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Longest accepted entry lifetime, in days
pub const MAX_EXPIRY_DAYS: i64 = 36_500;

/// Version tag written into every metadata sidecar
pub const SCHEMA_VERSION: &str = "2.0";

const DATA_SUFFIX: &str = ".json";
const META_SUFFIX: &str = ".meta.json";

/// Sidecar describing one cached entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub pdb_id: String,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub schema_version: String,
}

impl CacheMetadata {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Snapshot of cache usage
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub cache_dir: PathBuf,
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: u64,
    pub sources: BTreeMap<String, usize>,
    pub expiry_days: i64,
}

/// Disk cache keyed by structure id and source id
#[derive(Debug)]
pub struct CacheManager {
    cache_dir: PathBuf,
    expiry_days: i64,
}

impl CacheManager {
    /// Open (and create if needed) a cache directory
    pub fn new(cache_dir: impl Into<PathBuf>, expiry_days: i64) -> Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        debug!(dir = %cache_dir.display(), expiry_days, "Opened motif cache");
        Ok(Self {
            cache_dir,
            expiry_days,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn expiry_days(&self) -> i64 {
        self.expiry_days
    }

    /// Structure and source ids become file names, so only plain tokens pass
    fn is_valid_key(pdb_id: &str, source: &str) -> bool {
        !pdb_id.is_empty()
            && pdb_id.chars().all(|c| c.is_ascii_alphanumeric())
            && !source.is_empty()
            && source.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    fn data_path(&self, pdb_id: &str, source: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{}{}", normalize_pdb_id(pdb_id), source, DATA_SUFFIX))
    }

    fn meta_path(&self, pdb_id: &str, source: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}_{}{}", normalize_pdb_id(pdb_id), source, META_SUFFIX))
    }

    /// Cached motifs for a structure, or `None` on any kind of miss
    ///
    /// Expired entries (unless `ignore_expiry`) and unreadable entries are
    /// deleted as a side effect.
    pub fn get(&self, pdb_id: &str, source: &str, ignore_expiry: bool) -> Option<MotifMap> {
        let pdb_id = normalize_pdb_id(pdb_id);
        if !Self::is_valid_key(&pdb_id, source) {
            warn!(pdb_id = %pdb_id, source, "Rejecting cache lookup with unsafe key");
            return None;
        }
        let data_path = self.data_path(&pdb_id, source);
        let meta_path = self.meta_path(&pdb_id, source);

        if !data_path.exists() || !meta_path.exists() {
            debug!(pdb_id = %pdb_id, source, "Cache miss");
            return None;
        }

        let meta = match read_json::<CacheMetadata>(&meta_path) {
            Ok(meta) if meta.schema_version == SCHEMA_VERSION => meta,
            Ok(meta) => {
                warn!(pdb_id = %pdb_id, source, schema = %meta.schema_version, "Discarding cache entry with foreign schema");
                self.remove_pair(&pdb_id, source);
                return None;
            },
            Err(e) => {
                warn!(pdb_id = %pdb_id, source, error = %e, "Discarding unreadable cache metadata");
                self.remove_pair(&pdb_id, source);
                return None;
            },
        };

        if !ignore_expiry && meta.is_expired() {
            debug!(pdb_id = %pdb_id, source, expires_at = %meta.expires_at, "Cache entry expired");
            self.remove_pair(&pdb_id, source);
            return None;
        }

        match read_json::<MotifMap>(&data_path) {
            Ok(motifs) => {
                debug!(pdb_id = %pdb_id, source, types = motifs.len(), "Cache hit");
                Some(motifs)
            },
            Err(e) => {
                warn!(pdb_id = %pdb_id, source, error = %e, "Discarding unreadable cache data");
                self.remove_pair(&pdb_id, source);
                None
            },
        }
    }

    /// Store motifs for a structure, replacing any previous entry
    ///
    /// Callers treat a failure as non-fatal: log it and keep the fetched data.
    pub fn put(&self, pdb_id: &str, source: &str, motifs: &MotifMap) -> Result<()> {
        let pdb_id = normalize_pdb_id(pdb_id);
        if !Self::is_valid_key(&pdb_id, source) {
            return Err(MotifError::cache(format!(
                "Invalid cache key '{}' / '{}'",
                pdb_id, source
            )));
        }

        let fetched_at = Utc::now();
        let expires_at = Duration::try_days(self.expiry_days)
            .and_then(|lifetime| fetched_at.checked_add_signed(lifetime))
            .ok_or_else(|| {
                MotifError::cache(format!("Cache lifetime of {} days is out of range", self.expiry_days))
            })?;
        let meta = CacheMetadata {
            pdb_id: pdb_id.clone(),
            source: source.to_string(),
            fetched_at,
            expires_at,
            schema_version: SCHEMA_VERSION.to_string(),
        };

        self.write_atomic(&self.data_path(&pdb_id, source), motifs)?;
        self.write_atomic(&self.meta_path(&pdb_id, source), &meta)?;

        debug!(pdb_id = %pdb_id, source, expires_at = %meta.expires_at, "Cached motifs");
        Ok(())
    }

    /// Drop one entry, or every entry of the structure when `source` is `None`
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pdb_id: &str, source: Option<&str>) -> usize {
        let pdb_id = normalize_pdb_id(pdb_id);
        if !Self::is_valid_key(&pdb_id, source.unwrap_or("any")) {
            warn!(pdb_id = %pdb_id, ?source, "Rejecting cache invalidation with unsafe key");
            return 0;
        }
        let removed = match source {
            Some(source) => usize::from(self.remove_pair(&pdb_id, source)),
            None => {
                let prefix = format!("{}_", pdb_id);
                self.remove_matching(|name| name.starts_with(&prefix))
            },
        };
        debug!(pdb_id = %pdb_id, ?source, removed, "Invalidated cache");
        removed
    }

    /// Remove every cached entry, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let removed = self.remove_matching(|_| true);
        info!(removed, dir = %self.cache_dir.display(), "Cleared motif cache");
        Ok(removed)
    }

    /// Remove expired and unreadable entries, returning how many were removed
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for meta_path in self.meta_files()? {
            match read_json::<CacheMetadata>(&meta_path) {
                Ok(meta) if meta.schema_version == SCHEMA_VERSION && !meta.is_expired() => {},
                _ => {
                    remove_file_quietly(&meta_path);
                    remove_file_quietly(&data_path_for_meta(&meta_path));
                    removed += 1;
                },
            }
        }

        if removed > 0 {
            info!(removed, "Cleaned up expired cache entries");
        }
        Ok(removed)
    }

    /// Entry counts, sizes and per-source totals
    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats {
            cache_dir: self.cache_dir.clone(),
            total_entries: 0,
            expired_entries: 0,
            total_bytes: 0,
            sources: BTreeMap::new(),
            expiry_days: self.expiry_days,
        };

        for meta_path in self.meta_files()? {
            let Ok(meta) = read_json::<CacheMetadata>(&meta_path) else {
                continue;
            };
            stats.total_entries += 1;
            *stats.sources.entry(meta.source.clone()).or_default() += 1;
            if meta.is_expired() {
                stats.expired_entries += 1;
            }
            for path in [meta_path.clone(), data_path_for_meta(&meta_path)] {
                if let Ok(file_meta) = std::fs::metadata(&path) {
                    stats.total_bytes += file_meta.len();
                }
            }
        }
        Ok(stats)
    }

    fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.cache_dir)?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| {
            MotifError::cache(format!("Failed to move cache file into {}: {}", path.display(), e.error))
        })?;
        Ok(())
    }

    /// Remove both files of a pair; true if anything was removed
    fn remove_pair(&self, pdb_id: &str, source: &str) -> bool {
        let data = remove_file_quietly(&self.data_path(pdb_id, source));
        let meta = remove_file_quietly(&self.meta_path(pdb_id, source));
        data || meta
    }

    /// Remove cache files whose names satisfy `matches`; counts entries by sidecar
    fn remove_matching(&self, matches: impl Fn(&str) -> bool) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.cache_dir) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(DATA_SUFFIX) || !matches(&name) {
                continue;
            }
            if remove_file_quietly(&entry.path()) && name.ends_with(META_SUFFIX) {
                removed += 1;
            }
        }
        removed
    }

    fn meta_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            let is_meta = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with(META_SUFFIX));
            if is_meta {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn data_path_for_meta(meta_path: &Path) -> PathBuf {
    let name = meta_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(META_SUFFIX).unwrap_or(&name);
    meta_path.with_file_name(format!("{}{}", stem, DATA_SUFFIX))
}

fn remove_file_quietly(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove cache file");
            false
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::model::{MotifInstance, ResidueSpec};
    use std::collections::BTreeSet;

    fn sample() -> MotifMap {
        let mut motifs = MotifMap::new();
        motifs.insert(
            "HL".to_string(),
            vec![
                MotifInstance::new(
                    "HL_1S72_001",
                    "HL",
                    "1S72",
                    vec![
                        ResidueSpec::new("0", 55).with_nucleotide("U"),
                        ResidueSpec::new("0", 56).with_nucleotide("G").with_model(2),
                    ],
                )
                .with_metadata("loop_id", "HL_1S72_001"),
                MotifInstance::new("HL_1S72_002", "HL", "1S72", vec![ResidueSpec::new("9", 3)]),
            ],
        );
        motifs
    }

    fn tuples(motifs: &MotifMap) -> BTreeSet<(String, String, Vec<(String, i32, String, i32)>)> {
        motifs
            .values()
            .flatten()
            .map(|i| {
                (
                    i.instance_id.clone(),
                    i.motif_id.clone(),
                    i.residues
                        .iter()
                        .map(|r| (r.chain.clone(), r.residue_number, r.insertion_code.clone(), r.model))
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), DEFAULT_EXPIRY_DAYS).unwrap();

        cache.put("1s72", "X", &sample()).unwrap();
        assert!(dir.path().join("1S72_X.json").exists());
        assert!(dir.path().join("1S72_X.meta.json").exists());

        let cached = cache.get("1S72", "X", false).unwrap();
        assert_eq!(tuples(&cached), tuples(&sample()));
        assert_eq!(cached, sample());
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), DEFAULT_EXPIRY_DAYS).unwrap();
        cache.put("1S72", "bgsu_api", &sample()).unwrap();
        cache.put("1S72", "bgsu_api", &sample()).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {:?}", names);
    }

    #[test]
    fn test_expired_entry_is_miss_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), -1).unwrap();
        cache.put("1S72", "X", &sample()).unwrap();

        assert!(cache.get("1S72", "X", true).is_some());
        assert!(cache.get("1S72", "X", false).is_none());
        assert!(!dir.path().join("1S72_X.json").exists());
        assert!(!dir.path().join("1S72_X.meta.json").exists());
    }

    #[test]
    fn test_corrupt_metadata_is_miss_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), DEFAULT_EXPIRY_DAYS).unwrap();
        cache.put("1S72", "X", &sample()).unwrap();
        std::fs::write(dir.path().join("1S72_X.meta.json"), "{ not json").unwrap();

        assert!(cache.get("1S72", "X", false).is_none());
        assert!(!dir.path().join("1S72_X.json").exists());
    }

    #[test]
    fn test_schema_mismatch_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), DEFAULT_EXPIRY_DAYS).unwrap();
        cache.put("1S72", "X", &sample()).unwrap();

        let meta_path = dir.path().join("1S72_X.meta.json");
        let mut meta: CacheMetadata =
            serde_json::from_str(&std::fs::read_to_string(&meta_path).unwrap()).unwrap();
        meta.schema_version = "1.0".to_string();
        std::fs::write(&meta_path, serde_json::to_string(&meta).unwrap()).unwrap();

        assert!(cache.get("1S72", "X", false).is_none());
        assert!(!meta_path.exists());
    }

    #[test]
    fn test_invalidate_single_and_all_sources() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), DEFAULT_EXPIRY_DAYS).unwrap();
        cache.put("1S72", "bgsu_api", &sample()).unwrap();
        cache.put("1S72", "rfam_api", &sample()).unwrap();
        cache.put("4V9F", "bgsu_api", &sample()).unwrap();

        assert_eq!(cache.invalidate("1s72", Some("bgsu_api")), 1);
        assert!(cache.get("1S72", "bgsu_api", false).is_none());
        assert!(cache.get("1S72", "rfam_api", false).is_some());

        assert_eq!(cache.invalidate("1S72", None), 1);
        assert!(cache.get("1S72", "rfam_api", false).is_none());
        assert!(cache.get("4V9F", "bgsu_api", false).is_some());
    }

    #[test]
    fn test_cleanup_expired_counts_expired_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = CacheManager::new(dir.path(), DEFAULT_EXPIRY_DAYS).unwrap();
        let stale = CacheManager::new(dir.path(), -1).unwrap();

        fresh.put("1S72", "bgsu_api", &sample()).unwrap();
        stale.put("4V9F", "bgsu_api", &sample()).unwrap();
        std::fs::write(dir.path().join("2ABC_rfam_api.meta.json"), "garbage").unwrap();
        std::fs::write(dir.path().join("2ABC_rfam_api.json"), "{}").unwrap();

        assert_eq!(fresh.cleanup_expired().unwrap(), 2);
        assert!(!dir.path().join("2ABC_rfam_api.json").exists());
        assert!(fresh.get("1S72", "bgsu_api", false).is_some());
    }

    #[test]
    fn test_stats_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), 7).unwrap();
        cache.put("1S72", "bgsu_api", &sample()).unwrap();
        cache.put("4V9F", "bgsu_api", &sample()).unwrap();
        cache.put("4V9F", "rfam_api", &sample()).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.expired_entries, 0);
        assert_eq!(stats.sources["bgsu_api"], 2);
        assert_eq!(stats.expiry_days, 7);
        assert!(stats.total_bytes > 0);

        assert_eq!(cache.clear().unwrap(), 3);
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), 1_000_000_000).unwrap();

        let err = cache.put("1S72", "bgsu_api", &MotifMap::new()).unwrap_err();
        assert!(matches!(err, MotifError::Cache(_)));
        assert!(cache.get("1S72", "bgsu_api", false).is_none());
    }

    #[test]
    fn test_unsafe_keys_never_touch_the_filesystem() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("cache");
        let cache = CacheManager::new(&dir, DEFAULT_EXPIRY_DAYS).unwrap();

        assert!(cache.put("../x", "bgsu_api", &sample()).is_err());
        assert!(cache.put("1S72", "../../bgsu", &sample()).is_err());
        assert!(!root.path().join("X_bgsu_api.json").exists());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        assert!(cache.get("../x", "bgsu_api", false).is_none());
        assert_eq!(cache.invalidate("../x", None), 0);
    }
}
