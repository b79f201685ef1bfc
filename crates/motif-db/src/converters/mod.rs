//! Format converters
//!
//! Converters turn raw source text into canonical [`MotifType`] records.
//! A malformed record (one instance, one residue, one table row) is logged and
//! skipped; only a file that cannot be read or decoded at all is an error.

pub mod atlas;
pub mod stockholm;
pub mod tools;

pub use atlas::AtlasJsonConverter;
pub use stockholm::StockholmConverter;
pub use tools::{Fr3dConverter, RnaMotifScanConverter, ToolExport};

use crate::model::MotifType;
use motif_common::{MotifError, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Describes where raw data came from and how to label the result
#[derive(Debug, Clone, Default)]
pub struct SourceInfo {
    /// Motif type id assigned to the converted family
    pub type_id: String,
    /// Display name (grouping label) of the family
    pub name: String,
    /// File the data was read from, if any
    pub file: Option<PathBuf>,
}

impl SourceInfo {
    pub fn new(type_id: impl Into<String>) -> Self {
        let type_id = type_id.into();
        Self {
            name: type_id.clone(),
            type_id,
            file: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub(crate) fn file_label(&self) -> String {
        self.file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

/// Why a single record was rejected
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid number '{value}' in field '{field}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid range '{0}'")]
    InvalidRange(String),

    #[error("no structure id in '{0}'")]
    NoStructureId(String),

    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Converts one native format into canonical motif types
pub trait MotifConverter: Send + Sync {
    /// Format name used in log output
    fn format_name(&self) -> &'static str;

    /// Read and convert one file
    fn convert_file(&self, path: &Path) -> Result<Vec<MotifType>>;

    /// Convert raw text already in memory
    fn convert_data(&self, raw: &str, info: &SourceInfo) -> Result<Vec<MotifType>>;
}

/// Look up a converter by format name
///
/// Accepts `atlas_json`/`atlas` and `stockholm`/`rfam`/`seed`, case-insensitively.
pub fn converter_for(format: &str) -> Result<Box<dyn MotifConverter>> {
    match format.trim().to_lowercase().as_str() {
        "atlas_json" | "atlas" => Ok(Box::new(AtlasJsonConverter)),
        "stockholm" | "rfam" | "seed" => Ok(Box::new(StockholmConverter)),
        other => Err(MotifError::UnknownFormat(other.to_string())),
    }
}

/// Upper-case a tool-supplied type name, turning spaces and dashes into `_`
pub(crate) fn normalize_tool_type(raw: &str) -> String {
    raw.trim().to_uppercase().replace([' ', '-'], "_")
}
