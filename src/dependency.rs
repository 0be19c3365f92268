// src/dependency.rs
//! Dependency provider resolution
//!
//! Every package publishes zero or more provider keys other bundles use to
//! detect it. Authored rows are imported first, with keys and versions
//! defaulted from the owning package; Msi and Msp packages that end up with
//! no providers get one synthesized from their canonical identifier. Key
//! collisions within one package are authoring errors, recorded rather than
//! silently merged.

use crate::chain::PackageFacade;
use crate::diagnostics::{Diagnostics, ValidationError};
use crate::error::Result;
use crate::store::{RecordStore, Table};
use tracing::debug;

/// One published (key, version) identity of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidesDependency {
    pub key: String,
    pub version: Option<String>,
    pub display_name: Option<String>,
    pub attributes: u32,
}

/// Import authored provider rows and infer the missing ones
pub fn resolve_providers(
    store: &RecordStore,
    facades: &mut Table<PackageFacade>,
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    for row in store.providers.iter() {
        let Some(facade) = facades.get_mut(&row.package) else {
            // Bundle-scope rows and extension-owned rows name no chain package.
            debug!("provider row '{}' names no chain package, skipped", row.id);
            continue;
        };

        let key = match row.key.clone().filter(|k| !k.is_empty()) {
            Some(key) => key,
            None => match facade.detail.canonical_id() {
                Some(canonical) => canonical.to_string(),
                None => {
                    diagnostics.error(ValidationError::MissingProviderKey {
                        package: facade.package.id.clone(),
                    });
                    continue;
                }
            },
        };

        let version = row
            .version
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| facade.package.version.clone());
        if version.is_none() {
            diagnostics.error(ValidationError::MissingDependencyVersion {
                package: facade.package.id.clone(),
                key,
            });
            continue;
        }

        let display_name = row
            .display_name
            .clone()
            .or_else(|| facade.package.display_name.clone());

        merge(facade, diagnostics, ProvidesDependency {
            key,
            version,
            display_name,
            attributes: row.attributes,
        });
    }

    for facade in facades.iter_mut() {
        if !facade.provides.is_empty() {
            continue;
        }
        let Some(canonical) = facade.detail.canonical_id() else {
            continue;
        };
        let inferred = ProvidesDependency {
            key: canonical.to_string(),
            version: facade.package.version.clone(),
            display_name: facade.package.display_name.clone(),
            attributes: 0,
        };
        debug!(
            "package '{}' publishes inferred provider '{}'",
            facade.package.id, inferred.key
        );
        merge(facade, diagnostics, inferred);
    }

    Ok(())
}

fn merge(facade: &mut PackageFacade, diagnostics: &mut Diagnostics, entry: ProvidesDependency) {
    if facade.provides.iter().any(|p| p.key == entry.key) {
        diagnostics.error(ValidationError::DuplicateProviderKey {
            package: facade.package.id.clone(),
            key: entry.key,
        });
    } else {
        facade.provides.push(entry);
    }
}

/// Settle the key other bundles use to detect this bundle
///
/// The first authored row flagged bundle-scope wins; without one the bundle
/// falls back to its own id.
pub fn resolve_bundle_provider_key(store: &mut RecordStore) {
    let key = store
        .providers
        .iter()
        .find(|row| row.is_bundle_scope() && row.key.as_deref().is_some_and(|k| !k.is_empty()))
        .and_then(|row| row.key.clone())
        .unwrap_or_else(|| store.bundle.id.clone());
    store.bundle.provider_key = Some(key);
}
