// src/chain/msu.rs
//! Msu package processing

use super::PackageFacade;
use crate::error::Result;
use crate::store::RecordStore;
use crate::store::rows::PerMachine;

/// Normalize an Msu facade
///
/// Windows Update packages install machine-wide; any authored scope is
/// overridden. The cache identifier defaults to the payload hash since an
/// MSU exposes no product or patch code.
pub fn process(store: &mut RecordStore, facade: &mut PackageFacade) -> Result<()> {
    facade.package.per_machine = PerMachine::Yes;

    if facade.package.cache_id.is_none() {
        let payload = store.payloads.require(&facade.package.payload)?;
        facade.package.cache_id = payload.hash.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::build_facades;

    #[test]
    fn scope_is_forced_per_machine() {
        let mut store = RecordStore::from_json(
            r#"{
                "bundle": [{"id": "9d3c51f3-02b4-4c8e-9b3f-7f61b1d2cf02",
                             "name": "Demo", "version": "1.0"}],
                "chain": [{"id": "BundleChain"}],
                "bootstrap_application": [{"id": "Ba", "payload": "BaPayload"}],
                "payloads": [
                    {"id": "BaPayload", "name": "ba.dll", "source": "ba.dll"},
                    {"id": "UPayload", "name": "u.msu", "source": "u.msu", "hash": "dd"}
                ],
                "packages": [{"id": "U", "type": "msu", "payload": "UPayload",
                               "per_machine": "no"}],
                "msu_packages": [{"id": "U", "kb": "KB123456"}],
                "groups": [{"parent_type": "package_group", "parent_id": "BundleChain",
                            "child_type": "package", "child_id": "U"}]
            }"#,
        )
        .unwrap();
        let mut facades = build_facades(&store).unwrap();

        process(&mut store, facades.require_mut("U").unwrap()).unwrap();

        let u = facades.require("U").unwrap();
        assert_eq!(u.package.per_machine, PerMachine::Yes);
        assert_eq!(u.package.cache_id.as_deref(), Some("dd"));
    }
}
