//! Configuration for the motif database layer
//!
//! Layered as defaults, then an optional TOML file, then environment:
//!
//! - `RNA_MOTIF_DB_DIR`: root holding the bundled databases
//! - `RNA_MOTIF_CACHE_DIR`: API response cache directory
//! - `RNA_MOTIF_CACHE_DAYS`: cache entry lifetime in days
//! - `RNA_MOTIF_TIMEOUT_SECS`: per-request timeout for remote catalogs
//! - `RNA_MOTIF_SOURCE_MODE`: auto, local, bgsu, rfam, all
//! - `RNA_MOTIF_ENABLE_API`: true/false
//! - `RNA_MOTIF_ATLAS_VERSION`: pin an Atlas release version

use crate::cache::{DEFAULT_EXPIRY_DAYS, MAX_EXPIRY_DAYS};
use crate::providers::bgsu_api::DEFAULT_BGSU_URL;
use crate::providers::rfam_api::DEFAULT_RFAM_URL;
use crate::providers::DEFAULT_TIMEOUT_SECS;
use crate::selector::{default_priority, SourceMode};
use motif_common::{MotifError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_ATLAS_DIR: &str = "RNA 3D motif atlas";
pub const DEFAULT_RFAM_DIR: &str = "Rfam motif database";
pub const DEFAULT_USER_DIR: &str = "user_annotations";

fn default_db_root() -> PathBuf {
    PathBuf::from("motif_database")
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("rna-motifs"))
        .unwrap_or_else(|| PathBuf::from(".rna-motifs-cache"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotifConfig {
    /// Directory holding the bundled databases
    pub db_root: PathBuf,
    pub atlas_dir: String,
    pub rfam_dir: String,
    pub user_dir: String,

    pub cache_dir: PathBuf,
    pub cache_days: i64,

    /// Per-request timeout for remote catalogs, in seconds
    pub timeout_secs: u64,

    pub mode: SourceMode,
    /// Source order for `auto` and `all`
    pub priority: Vec<String>,
    pub enable_api: bool,
    /// Atlas release to prefer over the newest one found
    pub atlas_version: Option<String>,
    /// Drop residue-identical duplicates when combining sources
    pub dedupe_combined: bool,

    pub bgsu_base_url: String,
    pub rfam_base_url: String,
}

impl Default for MotifConfig {
    fn default() -> Self {
        Self {
            db_root: default_db_root(),
            atlas_dir: DEFAULT_ATLAS_DIR.to_string(),
            rfam_dir: DEFAULT_RFAM_DIR.to_string(),
            user_dir: DEFAULT_USER_DIR.to_string(),
            cache_dir: default_cache_dir(),
            cache_days: DEFAULT_EXPIRY_DAYS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            mode: SourceMode::default(),
            priority: default_priority(),
            enable_api: true,
            atlas_version: None,
            dedupe_combined: false,
            bgsu_base_url: DEFAULT_BGSU_URL.to_string(),
            rfam_base_url: DEFAULT_RFAM_URL.to_string(),
        }
    }
}

impl MotifConfig {
    /// Load a TOML file; absent keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            MotifError::config(format!("Invalid config file {}: {}", path.display(), e))
        })
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from the environment
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("RNA_MOTIF_DB_DIR") {
            self.db_root = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("RNA_MOTIF_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(days) = std::env::var("RNA_MOTIF_CACHE_DAYS") {
            self.cache_days = parse_env("RNA_MOTIF_CACHE_DAYS", &days)?;
        }
        if let Ok(secs) = std::env::var("RNA_MOTIF_TIMEOUT_SECS") {
            self.timeout_secs = parse_env("RNA_MOTIF_TIMEOUT_SECS", &secs)?;
        }
        if let Ok(mode) = std::env::var("RNA_MOTIF_SOURCE_MODE") {
            self.mode = mode.parse()?;
        }
        if let Ok(enabled) = std::env::var("RNA_MOTIF_ENABLE_API") {
            self.enable_api = parse_bool("RNA_MOTIF_ENABLE_API", &enabled)?;
        }
        if let Ok(version) = std::env::var("RNA_MOTIF_ATLAS_VERSION") {
            let version = version.trim();
            self.atlas_version = (!version.is_empty()).then(|| version.to_string());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(MotifError::config("timeout_secs must be greater than zero"));
        }
        if self.cache_days <= 0 || self.cache_days > MAX_EXPIRY_DAYS {
            return Err(MotifError::config(format!(
                "cache_days must be between 1 and {}",
                MAX_EXPIRY_DAYS
            )));
        }
        if self.priority.is_empty() {
            return Err(MotifError::config("priority must name at least one source"));
        }
        Ok(())
    }

    pub fn atlas_path(&self) -> PathBuf {
        self.db_root.join(&self.atlas_dir)
    }

    pub fn rfam_path(&self) -> PathBuf {
        self.db_root.join(&self.rfam_dir)
    }

    pub fn user_path(&self) -> PathBuf {
        self.db_root.join(&self.user_dir)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| MotifError::config(format!("Invalid value for {}: '{}'", name, raw)))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(MotifError::config(format!("Invalid value for {}: '{}'", name, raw))),
    }
}
