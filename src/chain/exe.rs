// src/chain/exe.rs
//! Exe package processing

use super::PackageFacade;
use crate::error::Result;
use crate::store::RecordStore;

/// Normalize an Exe facade
///
/// Exe packages carry no installable metadata of their own; the cache
/// identifier defaults to the package payload's content hash so two builds
/// of identical bits share a cache entry.
pub fn process(store: &mut RecordStore, facade: &mut PackageFacade) -> Result<()> {
    if facade.package.cache_id.is_none() {
        let payload = store.payloads.require(&facade.package.payload)?;
        facade.package.cache_id = payload.hash.clone();
    }
    Ok(())
}
