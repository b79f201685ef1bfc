//! RNA structural motif database layer
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Normalizes motif annotations from local releases (RNA 3D Motif Atlas JSON,
//! Rfam Stockholm alignments, FR3D/RNAMotifScan exports) and live catalogs
//! (BGSU RNA 3D Hub, Rfam) into one record model, and picks which sources
//! answer a query.
//!
//! # Layout
//!
//! - [`model`]: residues, motif instances and motif types
//! - [`converters`]: raw formats to the record model
//! - [`cache`]: expiring on-disk cache of remote results
//! - [`providers`]: one provider per source behind [`providers::MotifProvider`]
//! - [`registry`]: the set of initialized providers
//! - [`selector`]: fallback and merge policy
//! - [`config`]: layered configuration
//! - [`session`]: wires all of the above
//!
//! # Example
//!
//! ```no_run
//! use motif_db::{MotifConfig, MotifSession};
//!
//! # async fn run() -> motif_common::Result<()> {
//! let mut session = MotifSession::bootstrap(MotifConfig::from_env()?).await?;
//! for (motif_type, instances) in session.get_motifs_for_pdb("1S72").await {
//!     println!("{}: {}", motif_type, instances.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod converters;
pub mod model;
pub mod providers;
pub mod registry;
pub mod selector;
pub mod session;

pub use cache::CacheManager;
pub use config::MotifConfig;
pub use model::{MotifInstance, MotifMap, MotifType, ProviderInfo, ResidueSpec, SourceKind};
pub use providers::{Lookup, MotifProvider};
pub use registry::Registry;
pub use selector::{Selection, SourceMode, SourceSelector};
pub use session::MotifSession;
