// src/search.rs
//! Search ordering
//!
//! Four typed search tables share ids with the common `searches` table.
//! The merged sequence follows the `searches` table order, never discovery
//! order: downstream variable expressions index into this sequence, so
//! reordering would silently rebind results.

use crate::error::{Error, Result};
use crate::store::RecordStore;
use crate::store::rows::{
    ComponentSearchRow, FileSearchRow, ProductSearchRow, RegistrySearchRow, SearchRow,
};

/// Typed half of a search definition
#[derive(Debug, Clone)]
pub enum SearchDetail {
    File(FileSearchRow),
    Registry(RegistrySearchRow),
    Component(ComponentSearchRow),
    Product(ProductSearchRow),
}

/// A search definition merged with its typed detail, in authored order
#[derive(Debug, Clone)]
pub struct OrderedSearch {
    pub common: SearchRow,
    pub detail: SearchDetail,
}

/// Merge the typed search tables into the authored search order
pub fn order_searches(store: &RecordStore) -> Result<Vec<OrderedSearch>> {
    let mut ordered = Vec::with_capacity(store.searches.len());
    for search in store.searches.iter() {
        let detail = if let Some(row) = store.file_searches.get(&search.id) {
            SearchDetail::File(row.clone())
        } else if let Some(row) = store.registry_searches.get(&search.id) {
            SearchDetail::Registry(row.clone())
        } else if let Some(row) = store.component_searches.get(&search.id) {
            SearchDetail::Component(row.clone())
        } else if let Some(row) = store.product_searches.get(&search.id) {
            SearchDetail::Product(row.clone())
        } else {
            return Err(Error::UnknownSearchDetail(search.id.clone()));
        };
        ordered.push(OrderedSearch {
            common: search.clone(),
            detail,
        });
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_store(searches: &str, typed: &str) -> RecordStore {
        RecordStore::from_json(&format!(
            r#"{{
                "bundle": [{{"id": "a1c9e7d2-4f6b-4e0a-8f3d-5b7c9d1e2f06",
                             "name": "Demo", "version": "1.0"}}],
                "chain": [{{"id": "BundleChain"}}],
                "bootstrap_application": [{{"id": "Ba", "payload": "BaPayload"}}],
                "payloads": [{{"id": "BaPayload", "name": "ba.dll", "source": "ba.dll"}}],
                "packages": [{{"id": "A", "type": "exe", "payload": "BaPayload"}}],
                "exe_packages": [{{"id": "A", "install_command": "/q"}}],
                "searches": [{searches}],
                {typed}
                "groups": [{{"parent_type": "package_group", "parent_id": "BundleChain",
                             "child_type": "package", "child_id": "A"}}]
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn merged_sequence_follows_the_searches_table() {
        let store = search_store(
            r#"{"id": "S2", "variable": "HasOld"},
               {"id": "S1", "variable": "NetFx"}"#,
            r#""file_searches": [{"id": "S1", "path": "C:\\net.dll", "type": "version"}],
               "product_searches": [{"id": "S2", "guid": "{OLD-PC}", "type": "state"}],"#,
        );

        let ordered = order_searches(&store).unwrap();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].common.id, "S2");
        assert!(matches!(ordered[0].detail, SearchDetail::Product(_)));
        assert_eq!(ordered[1].common.variable, "NetFx");
        assert!(matches!(ordered[1].detail, SearchDetail::File(_)));
    }

    #[test]
    fn search_without_a_detail_row_is_fatal() {
        let store = search_store(r#"{"id": "Ghost", "variable": "X"}"#, "");
        match order_searches(&store) {
            Err(Error::UnknownSearchDetail(id)) => assert_eq!(id, "Ghost"),
            other => panic!("expected UnknownSearchDetail, got {:?}", other),
        }
    }
}
