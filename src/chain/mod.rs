// src/chain/mod.rs
//! Chain package facades and their processing passes
//!
//! A facade pairs one chain-package row with its type-specific detail row
//! and carries the bind-time state the store rows never see: resolved
//! provider entries and the rollback boundary the ordering engine assigns.
//! Per-type processors normalize metadata and materialize harvested MSI/MSP
//! data into the store; a final pass aggregates sizes once every package
//! (and every payload it generated) is known.

pub mod exe;
pub mod msi;
pub mod msp;
pub mod msu;
pub mod ordering;
pub mod slipstream;

use crate::dependency::ProvidesDependency;
use crate::diagnostics::{Diagnostics, PolicyWarning};
use crate::error::{Error, Result};
use crate::store::rows::{
    ExePackageRow, MsiPackageRow, MspPackageRow, MsuPackageRow, PackageRow, PackageType,
    PerMachine,
};
use crate::store::{Keyed, RecordStore, Table};
use tracing::debug;

/// Type-specific half of a chain package
#[derive(Debug, Clone)]
pub enum PackageDetail {
    Exe(ExePackageRow),
    Msi(MsiPackageRow),
    Msp(MspPackageRow),
    Msu(MsuPackageRow),
}

impl PackageDetail {
    /// Product code for an Msi, patch code for an Msp
    pub fn canonical_id(&self) -> Option<&str> {
        match self {
            Self::Msi(row) => Some(&row.product_code),
            Self::Msp(row) => Some(&row.patch_code),
            _ => None,
        }
    }
}

/// One chain package with its detail row and bind-time state
#[derive(Debug, Clone)]
pub struct PackageFacade {
    pub package: PackageRow,
    pub detail: PackageDetail,
    /// Dependency keys this package publishes, resolved by the dependency stage
    pub provides: Vec<ProvidesDependency>,
}

impl Keyed for PackageFacade {
    fn key(&self) -> &str {
        &self.package.id
    }
}

/// Pair every chain-package row with its detail row
///
/// A package whose detail table has no matching row cannot be planned by
/// the engine, so the absence is fatal and names the detail table.
pub fn build_facades(store: &RecordStore) -> Result<Table<PackageFacade>> {
    let mut facades = Table::new("packages");
    for package in store.packages.iter() {
        store.payloads.require(&package.payload)?;

        let detail = match package.package_type {
            PackageType::Exe => store
                .exe_packages
                .get(&package.id)
                .map(|row| PackageDetail::Exe(row.clone()))
                .ok_or(Error::MissingBundleInfo("exe_packages"))?,
            PackageType::Msi => store
                .msi_packages
                .get(&package.id)
                .map(|row| PackageDetail::Msi(row.clone()))
                .ok_or(Error::MissingBundleInfo("msi_packages"))?,
            PackageType::Msp => store
                .msp_packages
                .get(&package.id)
                .map(|row| PackageDetail::Msp(row.clone()))
                .ok_or(Error::MissingBundleInfo("msp_packages"))?,
            PackageType::Msu => store
                .msu_packages
                .get(&package.id)
                .map(|row| PackageDetail::Msu(row.clone()))
                .ok_or(Error::MissingBundleInfo("msu_packages"))?,
        };

        facades.push(PackageFacade {
            package: package.clone(),
            detail,
            provides: Vec::new(),
        })?;
    }
    Ok(facades)
}

/// Run the per-type processor over every facade
pub fn process_packages(
    store: &mut RecordStore,
    facades: &mut Table<PackageFacade>,
) -> Result<()> {
    for facade in facades.iter_mut() {
        debug!("processing package '{}'", facade.package.id);
        match facade.detail {
            PackageDetail::Exe(_) => exe::process(store, facade)?,
            PackageDetail::Msi(_) => msi::process(store, facade)?,
            PackageDetail::Msp(_) => msp::process(store, facade)?,
            PackageDetail::Msu(_) => msu::process(store, facade)?,
        }
    }
    Ok(())
}

/// Aggregate per-package metadata once all payloads exist
///
/// Package processing can append payloads owned by other packages, so this
/// must not run until every package has been processed.
pub fn resolve_package_metadata(
    store: &RecordStore,
    facades: &mut Table<PackageFacade>,
) -> Result<()> {
    for facade in facades.iter_mut() {
        let package_id = facade.package.id.clone();
        let size: u64 = store
            .payloads
            .iter()
            .filter(|p| p.package.as_deref() == Some(package_id.as_str()))
            .map(|p| p.size.unwrap_or(0))
            .sum();
        facade.package.size = Some(size);
        if facade.package.install_size.is_none() {
            facade.package.install_size = Some(size);
        }

        let payload = store.payloads.require(&facade.package.payload)?;
        if facade.package.display_name.is_none() {
            facade.package.display_name = payload.display_name.clone();
        }
        if facade.package.description.is_none() {
            facade.package.description = payload.description.clone();
        }
    }
    Ok(())
}

/// Settle the bundle scope and each package's effective scope
///
/// The bundle starts per-machine; the first ordered package authored
/// per-user flips it. Packages with default scope then inherit the bundle
/// scope.
pub fn resolve_install_scope(
    store: &mut RecordStore,
    facades: &mut Table<PackageFacade>,
    order: &[String],
    diagnostics: &mut Diagnostics,
) -> Result<()> {
    for id in order {
        let facade = facades.require(id)?;
        if facade.package.per_machine == PerMachine::No && store.bundle.per_machine {
            debug!("package '{}' scopes the bundle per-user", id);
            store.bundle.per_machine = false;
            break;
        }
    }

    for id in order {
        let facade = facades.require_mut(id)?;
        if facade.package.per_machine == PerMachine::Default {
            facade.package.per_machine = if store.bundle.per_machine {
                PerMachine::Yes
            } else {
                PerMachine::No
            };
        }

        if !store.bundle.per_machine
            && facade.package.per_machine == PerMachine::Yes
            && !facade.package.permanent
            && !facade.provides.is_empty()
        {
            diagnostics.warning(PolicyWarning::NoPerMachineDependencies {
                package: facade.package.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_package_store() -> RecordStore {
        RecordStore::from_json(
            r#"{
                "bundle": [{"id": "0c18a057-1f6c-43f6-8c4a-3a2f7e8f2f10",
                             "name": "Demo", "version": "1.0"}],
                "chain": [{"id": "BundleChain"}],
                "bootstrap_application": [{"id": "Ba", "payload": "BaPayload"}],
                "payloads": [
                    {"id": "BaPayload", "name": "ba.dll", "source": "ba.dll"},
                    {"id": "APayload", "name": "a.exe", "source": "a.exe",
                     "package": "A", "size": 100, "hash": "aa",
                     "display_name": "Tool A"},
                    {"id": "AExtra", "name": "a.dat", "source": "a.dat",
                     "package": "A", "size": 20, "hash": "bb"},
                    {"id": "BPayload", "name": "b.msi", "source": "b.msi",
                     "package": "B", "size": 50, "hash": "cc"}
                ],
                "packages": [
                    {"id": "A", "type": "exe", "payload": "APayload"},
                    {"id": "B", "type": "msi", "payload": "BPayload", "per_machine": "no"}
                ],
                "exe_packages": [{"id": "A", "install_command": "/install"}],
                "msi_packages": [
                    {"id": "B", "product_code": "{B-PC}", "product_version": "2.0"}
                ],
                "groups": [
                    {"parent_type": "package_group", "parent_id": "BundleChain",
                     "child_type": "package", "child_id": "A"},
                    {"parent_type": "package_group", "parent_id": "BundleChain",
                     "child_type": "package", "child_id": "B"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn facades_pair_packages_with_details() {
        let store = two_package_store();
        let facades = build_facades(&store).unwrap();
        assert_eq!(facades.len(), 2);
        assert!(matches!(
            facades.require("A").unwrap().detail,
            PackageDetail::Exe(_)
        ));
        assert_eq!(
            facades.require("B").unwrap().detail.canonical_id(),
            Some("{B-PC}")
        );
    }

    #[test]
    fn missing_detail_row_names_the_detail_table() {
        let mut store = two_package_store();
        store.exe_packages = Table::new("exe_packages");
        match build_facades(&store) {
            Err(Error::MissingBundleInfo(table)) => assert_eq!(table, "exe_packages"),
            other => panic!("expected MissingBundleInfo, got {:?}", other),
        }
    }

    #[test]
    fn metadata_pass_sums_owned_payload_sizes() {
        let store = two_package_store();
        let mut facades = build_facades(&store).unwrap();
        resolve_package_metadata(&store, &mut facades).unwrap();

        let a = facades.require("A").unwrap();
        assert_eq!(a.package.size, Some(120));
        assert_eq!(a.package.install_size, Some(120));
        assert_eq!(a.package.display_name.as_deref(), Some("Tool A"));

        let b = facades.require("B").unwrap();
        assert_eq!(b.package.size, Some(50));
    }

    #[test]
    fn first_per_user_package_flips_the_bundle_scope() {
        let mut store = two_package_store();
        let mut facades = build_facades(&store).unwrap();
        let mut diag = Diagnostics::new();
        let order = vec!["A".to_string(), "B".to_string()];

        resolve_install_scope(&mut store, &mut facades, &order, &mut diag).unwrap();

        assert!(!store.bundle.per_machine);
        // Default-scope package inherits the flipped bundle scope.
        assert_eq!(
            facades.require("A").unwrap().package.per_machine,
            PerMachine::No
        );
    }

    #[test]
    fn per_machine_provider_in_per_user_bundle_draws_a_warning() {
        let mut store = two_package_store();
        let mut facades = build_facades(&store).unwrap();
        {
            let a = facades.require_mut("A").unwrap();
            a.package.per_machine = PerMachine::Yes;
            a.provides.push(ProvidesDependency {
                key: "a_key".to_string(),
                version: Some("1.0".to_string()),
                display_name: None,
                attributes: 0,
            });
        }
        let mut diag = Diagnostics::new();
        let order = vec!["A".to_string(), "B".to_string()];

        resolve_install_scope(&mut store, &mut facades, &order, &mut diag).unwrap();

        assert!(matches!(
            diag.warnings()[0],
            PolicyWarning::NoPerMachineDependencies { .. }
        ));
    }
}
