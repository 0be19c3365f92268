// src/chain/msp.rs
//! Msp package processing

use super::{PackageDetail, PackageFacade};
use crate::error::Result;
use crate::store::RecordStore;
use crate::store::rows::PatchTargetRow;

/// Normalize an Msp facade and record its applicability targets
pub fn process(store: &mut RecordStore, facade: &mut PackageFacade) -> Result<()> {
    let msp = match &facade.detail {
        PackageDetail::Msp(row) => row.clone(),
        _ => return Ok(()),
    };

    if facade.package.cache_id.is_none() {
        facade.package.cache_id = Some(msp.patch_code.clone());
    }

    for target in &msp.target_codes {
        store.patch_targets.push(PatchTargetRow {
            package: facade.package.id.clone(),
            target_code: target.target_code.clone(),
            targets_upgrade: target.targets_upgrade,
        });
    }

    Ok(())
}
