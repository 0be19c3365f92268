// src/lib.rs

//! Bale Bundle Assembler
//!
//! Assembles self-contained installer bundles: resolves payload sources,
//! orders the package chain, packs payload containers, generates the engine
//! manifest, and attaches everything to a platform stub executable.
//!
//! # Architecture
//!
//! - Record store: relational tables loaded from one JSON document
//! - Package facades: per-type views driving chain ordering and the manifest
//! - Diagnostics context: validation errors accumulate, checkpoints halt
//! - Deterministic output: identical input tables yield identical bundles

pub mod binder;
pub mod chain;
pub mod container;
pub mod dependency;
pub mod diagnostics;
mod error;
pub mod extension;
pub mod hash;
pub mod manifest;
pub mod payload;
pub mod resolve;
pub mod search;
pub mod store;
pub mod stub;
pub mod transfer;
pub mod version;

pub use binder::{BindConfig, BindResult, Binder};
pub use diagnostics::{Diagnostics, PolicyWarning, ValidationError};
pub use error::{Error, Result};
pub use extension::BinderExtension;
pub use hash::{digest_file, sha256_bytes, FileDigest};
pub use resolve::{BasePathResolver, SourceResolver};
pub use store::RecordStore;
pub use transfer::{apply_transfers, FileTransfer};
pub use version::VersionQuad;
