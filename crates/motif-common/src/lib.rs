//! RNA Motif Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging used across the motif workspace members.
//!
//! # Overview
//!
//! - **Error Handling**: [`MotifError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```no_run
//! use motif_common::logging::{init_logging, LogConfig};
//! use motif_common::Result;
//!
//! fn start() -> Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{MotifError, Result};
