// src/diagnostics.rs
//! Shared diagnostics context threaded through the bind stages
//!
//! Stages record recoverable authoring problems here instead of failing, so
//! one bind reports every problem it can find. The orchestrator calls
//! [`Diagnostics::checkpoint`] before any stage with irreversible side
//! effects (container packing, binary assembly) and aborts if errors were
//! recorded. Policy warnings are logged and kept but never halt a bind.

use crate::error::{Error, Result};
use thiserror::Error;
use tracing::warn;

/// Recoverable authoring problem recorded during a bind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A provider row has no version and the owning package has none either
    #[error("package '{package}' provides dependency '{key}' with no version")]
    MissingDependencyVersion { package: String, key: String },

    /// An Exe/Msu provider row has a blank key and no canonical identifier to default from
    #[error("package '{package}' provider row needs an explicit key")]
    MissingProviderKey { package: String },

    /// Two provider rows on one package resolved to the same key
    #[error("package '{package}' provides dependency '{key}' more than once")]
    DuplicateProviderKey { package: String, key: String },

    /// The authored bundle version does not normalize to four u16 components
    #[error("bundle version '{authored}' is invalid: {detail}")]
    InvalidVersion { authored: String, detail: String },
}

/// Observation that never halts a bind
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyWarning {
    /// A UX-container payload authored with non-embedded packaging was repacked
    #[error("payload '{payload}' in the UX container was repackaged as embedded")]
    UxPayloadForcedEmbedded { payload: String },

    /// A rollback boundary with no packages under it was dropped
    #[error("rollback boundary '{boundary}' groups no packages and was discarded")]
    BoundaryDiscarded { boundary: String },

    /// An authored non-default container ended up with zero payloads
    #[error("container '{container}' holds no payloads and was not created")]
    EmptyContainer { container: String },

    /// A per-machine package publishes providers inside a per-user bundle
    #[error("per-user bundle cannot register per-machine dependency providers of package '{package}'")]
    NoPerMachineDependencies { package: String },
}

/// Accumulates validation errors and policy warnings across bind stages
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<ValidationError>,
    warnings: Vec<PolicyWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a validation error; the bind continues until the next checkpoint
    pub fn error(&mut self, error: ValidationError) {
        tracing::error!("{error}");
        self.errors.push(error);
    }

    /// Record and log a policy warning
    pub fn warning(&mut self, warning: PolicyWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[PolicyWarning] {
        &self.warnings
    }

    /// Hand the recorded warnings to the bind result
    pub fn into_warnings(self) -> Vec<PolicyWarning> {
        self.warnings
    }

    /// Fail if any validation error has been recorded so far
    pub fn checkpoint(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ValidationFailed(self.errors.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_passes_when_clean() {
        let diag = Diagnostics::new();
        assert!(diag.checkpoint().is_ok());
    }

    #[test]
    fn checkpoint_fails_after_recorded_error() {
        let mut diag = Diagnostics::new();
        diag.error(ValidationError::MissingProviderKey {
            package: "PkgA".into(),
        });
        diag.error(ValidationError::DuplicateProviderKey {
            package: "PkgA".into(),
            key: "k".into(),
        });

        match diag.checkpoint() {
            Err(Error::ValidationFailed(count)) => assert_eq!(count, 2),
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
    }

    #[test]
    fn warnings_never_fail_checkpoint() {
        let mut diag = Diagnostics::new();
        diag.warning(PolicyWarning::EmptyContainer {
            container: "Extras".into(),
        });
        assert!(diag.checkpoint().is_ok());
        assert_eq!(diag.warnings().len(), 1);
    }
}
