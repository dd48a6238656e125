//! docslice-core: shared types, configuration, errors, and size formatting
//!
//! # Overview
//! - `types`: file kinds, validated chunk sizes, open-file info, and slices
//! - `error`: the acquisition / slice / release error taxonomy
//! - `config`: TOML configuration schema (loaded by the CLI)
//! - `units`: two-decimal truncating size formatting for reports

pub mod config;
pub mod error;
pub mod types;
pub mod units;

pub use error::{DocsliceError, DocsliceResult};
pub use types::{ChunkSize, FileInfo, FileKind, Slice};
