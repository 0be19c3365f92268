// src/error.rs
//! Error types for the bundle assembly pipeline
//!
//! Structural problems (missing tables, duplicate keys, corrupt grouping
//! data, malformed stubs) are hard errors and abort the bind immediately.
//! Recoverable authoring problems are recorded in the [`Diagnostics`]
//! context instead and surface here only as [`Error::ValidationFailed`]
//! when a checkpoint finds the context non-empty.
//!
//! [`Diagnostics`]: crate::diagnostics::Diagnostics

use std::path::PathBuf;
use thiserror::Error;

/// Result type for bind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling a bundle
#[derive(Error, Debug)]
pub enum Error {
    /// A required table or singleton row is absent from the IR document
    #[error("missing bundle information: {0}")]
    MissingBundleInfo(&'static str),

    /// A singleton table holds more than one row
    #[error("table '{table}' must hold exactly one row, found {count}")]
    SingletonViolation { table: &'static str, count: usize },

    /// Two rows in the same table share a key
    #[error("duplicate key '{key}' in table '{table}'")]
    DuplicateRowKey { table: &'static str, key: String },

    /// A row references a key that no row in the target table carries
    #[error("table '{table}' has no row with key '{key}'")]
    UnknownRowKey { table: &'static str, key: String },

    /// A search row has no detail row in any typed search table
    #[error("search '{0}' has no file, registry, component, or product detail row")]
    UnknownSearchDetail(String),

    /// A group edge assigned a payload a second parent of the same kind
    #[error("payload '{payload}' is assigned more than one {kind} parent")]
    PayloadParentConflict { payload: String, kind: &'static str },

    /// The package grouping relation contains a cycle
    #[error("package group '{0}' participates in a cycle")]
    GroupCycle(String),

    /// No registered source resolver could locate a payload's file
    #[error("payload '{payload}' source not found: {source_path}")]
    UnresolvedSource { payload: String, source_path: String },

    /// The authored bundle version does not normalize to four u16 components
    #[error("invalid bundle version '{authored}': {detail}")]
    InvalidVersion { authored: String, detail: String },

    /// The bundle row's identifier is not a UUID
    #[error("invalid bundle id '{0}'")]
    InvalidBundleId(String),

    /// A stub marker (bundle section or resource block) was not found
    #[error("stub {path} has no {marker} marker")]
    MissingMarker { marker: &'static str, path: PathBuf },

    /// A stub region exists but its contents do not parse
    #[error("malformed stub data: {0}")]
    StubFormat(String),

    /// More containers were attached than the stub section has slots for
    #[error("bundle section holds {capacity} container slots, cannot attach more")]
    SlotCapacity { capacity: u32 },

    /// An assembly stage ran out of order
    #[error("assembly stage '{requested}' requires state '{expected}', current state is '{actual}'")]
    AssemblyOrder {
        requested: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    /// A checkpoint found recorded validation errors
    #[error("bind halted: {0} validation error(s) recorded")]
    ValidationFailed(usize),

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IR document deserialization error
    #[error("IR document error: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest serialization error
    #[error("manifest error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Container archive error
    #[error("container error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
