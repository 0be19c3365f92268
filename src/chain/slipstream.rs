// src/chain/slipstream.rs
//! Slipstream resolution
//!
//! An Msp whose applicability targets hit an Msi in the same chain is
//! slipstreamed into that Msi's install. Authored slipstream rows stay
//! first and suppress the matching computed row.

use super::{PackageDetail, PackageFacade};
use crate::error::Result;
use crate::store::rows::SlipstreamRow;
use crate::store::{RecordStore, Table};
use tracing::debug;

pub fn resolve_slipstreams(
    store: &mut RecordStore,
    facades: &Table<PackageFacade>,
) -> Result<()> {
    let mut computed = Vec::new();

    for facade in facades.iter() {
        let msi = match &facade.detail {
            PackageDetail::Msi(row) => row,
            _ => continue,
        };
        for target in &store.patch_targets {
            let hit = if target.targets_upgrade {
                msi.upgrade_code.as_deref() == Some(target.target_code.as_str())
            } else {
                msi.product_code == target.target_code
            };
            if !hit {
                continue;
            }
            let already_authored = store.slipstreams.iter().any(|row| {
                row.msi_package == facade.package.id && row.msp_package == target.package
            });
            let already_computed = computed.iter().any(|row: &SlipstreamRow| {
                row.msi_package == facade.package.id && row.msp_package == target.package
            });
            if !already_authored && !already_computed {
                debug!(
                    "slipstreaming '{}' into '{}'",
                    target.package, facade.package.id
                );
                computed.push(SlipstreamRow {
                    msi_package: facade.package.id.clone(),
                    msp_package: target.package.clone(),
                });
            }
        }
    }

    store.slipstreams.extend(computed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{build_facades, msp};

    fn patch_store(slipstreams: &str) -> RecordStore {
        RecordStore::from_json(&format!(
            r#"{{
                "bundle": [{{"id": "e3a2b54f-8f1e-4f3d-a1cf-02dc5ab7ce04",
                             "name": "Demo", "version": "1.0"}}],
                "chain": [{{"id": "BundleChain"}}],
                "bootstrap_application": [{{"id": "Ba", "payload": "BaPayload"}}],
                "payloads": [
                    {{"id": "BaPayload", "name": "ba.dll", "source": "ba.dll"}},
                    {{"id": "MPayload", "name": "m.msi", "source": "m.msi"}},
                    {{"id": "PPayload", "name": "p.msp", "source": "p.msp"}}
                ],
                "packages": [
                    {{"id": "M", "type": "msi", "payload": "MPayload"}},
                    {{"id": "P", "type": "msp", "payload": "PPayload"}}
                ],
                "msi_packages": [{{
                    "id": "M", "product_code": "{{M-PC}}",
                    "product_version": "1.0", "upgrade_code": "{{M-UC}}"
                }}],
                "msp_packages": [{{
                    "id": "P", "patch_code": "{{P-CODE}}",
                    "target_codes": [
                        {{"target_code": "{{M-PC}}"}},
                        {{"target_code": "{{M-UC}}", "targets_upgrade": true}}
                    ]
                }}],
                "slipstreams": [{slipstreams}],
                "groups": [
                    {{"parent_type": "package_group", "parent_id": "BundleChain",
                      "child_type": "package", "child_id": "M"}},
                    {{"parent_type": "package_group", "parent_id": "BundleChain",
                      "child_type": "package", "child_id": "P"}}
                ]
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn matching_target_is_slipstreamed_once() {
        let mut store = patch_store("");
        let mut facades = build_facades(&store).unwrap();
        msp::process(&mut store, facades.require_mut("P").unwrap()).unwrap();

        resolve_slipstreams(&mut store, &facades).unwrap();

        // Product-code and upgrade-code targets both hit the same pair.
        assert_eq!(store.slipstreams.len(), 1);
        assert_eq!(store.slipstreams[0].msi_package, "M");
        assert_eq!(store.slipstreams[0].msp_package, "P");
    }

    #[test]
    fn authored_rows_suppress_the_computed_match() {
        let mut store = patch_store(r#"{"msi_package": "M", "msp_package": "P"}"#);
        let mut facades = build_facades(&store).unwrap();
        msp::process(&mut store, facades.require_mut("P").unwrap()).unwrap();

        resolve_slipstreams(&mut store, &facades).unwrap();
        assert_eq!(store.slipstreams.len(), 1);
    }
}
