// src/extension.rs
//! Binder extension hooks
//!
//! Embedders register ordered extensions on the binder to inject rows or
//! veto a bind. `initialize` runs once the store is loaded and verified,
//! before payload resolution; `finish` runs after the chain and provider
//! stages, before any container is packed. A returned error aborts the
//! bind immediately.

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::store::RecordStore;

pub trait BinderExtension {
    /// Extension name, used in logs
    fn name(&self) -> &str;

    fn initialize(
        &mut self,
        store: &mut RecordStore,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let _ = (store, diagnostics);
        Ok(())
    }

    fn finish(&mut self, store: &mut RecordStore, diagnostics: &mut Diagnostics) -> Result<()> {
        let _ = (store, diagnostics);
        Ok(())
    }
}
