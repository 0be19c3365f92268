// src/chain/ordering.rs
//! Chain ordering
//!
//! Flattens the authored grouping tree into the canonical install sequence.
//! The walk is purely positional: authoring order determines everything, so
//! two runs over the same tables produce the same sequence. Rollback
//! boundaries are sticky: once one appears in the flattened walk, every
//! following package falls under it until the next boundary. A boundary no
//! package ends up under is discarded with a warning.

use super::PackageFacade;
use crate::diagnostics::{Diagnostics, PolicyWarning};
use crate::error::{Error, Result};
use crate::store::rows::NodeType;
use crate::store::{RecordStore, Table};
use std::collections::HashSet;

/// The canonical install sequence and the boundaries actually in use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedChain {
    /// Package ids in install order
    pub packages: Vec<String>,
    /// Boundary ids referenced by at least one package, in first-use order
    pub used_boundaries: Vec<String>,
}

#[derive(Debug)]
enum ChainNode {
    Package(String),
    Boundary(String),
}

/// Flatten the grouping tree and assign each facade its rollback boundary
pub fn order_chain(
    store: &RecordStore,
    facades: &mut Table<PackageFacade>,
    diagnostics: &mut Diagnostics,
) -> Result<OrderedChain> {
    let mut flat = Vec::new();
    let mut visiting = HashSet::new();
    flatten_group(store, &store.chain.id, &mut visiting, &mut flat)?;

    let mut packages = Vec::new();
    let mut used_boundaries = Vec::new();
    let mut current: Option<String> = None;
    let mut current_used = false;

    for node in flat {
        match node {
            ChainNode::Boundary(id) => {
                store.boundaries.require(&id)?;
                if let Some(previous) = current.take() {
                    if !current_used {
                        diagnostics.warning(PolicyWarning::BoundaryDiscarded {
                            boundary: previous,
                        });
                    }
                }
                current = Some(id);
                current_used = false;
            }
            ChainNode::Package(id) => {
                let facade = facades.require_mut(&id)?;
                facade.package.boundary = current.clone();
                if let Some(boundary) = &current {
                    if !current_used {
                        used_boundaries.push(boundary.clone());
                        current_used = true;
                    }
                }
                packages.push(id);
            }
        }
    }

    if let Some(last) = current {
        if !current_used {
            diagnostics.warning(PolicyWarning::BoundaryDiscarded { boundary: last });
        }
    }

    Ok(OrderedChain {
        packages,
        used_boundaries,
    })
}

fn flatten_group(
    store: &RecordStore,
    group_id: &str,
    visiting: &mut HashSet<String>,
    flat: &mut Vec<ChainNode>,
) -> Result<()> {
    if !visiting.insert(group_id.to_string()) {
        return Err(Error::GroupCycle(group_id.to_string()));
    }

    for edge in &store.groups {
        if edge.parent_type != NodeType::PackageGroup || edge.parent_id != group_id {
            continue;
        }
        match edge.child_type {
            NodeType::Package => flat.push(ChainNode::Package(edge.child_id.clone())),
            NodeType::Boundary => flat.push(ChainNode::Boundary(edge.child_id.clone())),
            NodeType::PackageGroup => flatten_group(store, &edge.child_id, visiting, flat)?,
            _ => {}
        }
    }

    visiting.remove(group_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::build_facades;

    fn chain_store(groups: &str, boundaries: &str) -> RecordStore {
        RecordStore::from_json(&format!(
            r#"{{
                "bundle": [{{"id": "7a7330bd-64b7-4f3e-bd92-91c5a6d47e03",
                             "name": "Demo", "version": "1.0"}}],
                "chain": [{{"id": "BundleChain"}}],
                "bootstrap_application": [{{"id": "Ba", "payload": "BaPayload"}}],
                "payloads": [
                    {{"id": "BaPayload", "name": "ba.dll", "source": "ba.dll"}},
                    {{"id": "P1", "name": "1.exe", "source": "1.exe"}},
                    {{"id": "P2", "name": "2.exe", "source": "2.exe"}},
                    {{"id": "P3", "name": "3.exe", "source": "3.exe"}}
                ],
                "packages": [
                    {{"id": "One", "type": "exe", "payload": "P1"}},
                    {{"id": "Two", "type": "exe", "payload": "P2"}},
                    {{"id": "Three", "type": "exe", "payload": "P3"}}
                ],
                "exe_packages": [
                    {{"id": "One", "install_command": null}},
                    {{"id": "Two", "install_command": null}},
                    {{"id": "Three", "install_command": null}}
                ],
                "boundaries": [{boundaries}],
                "groups": [{groups}]
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn nested_groups_flatten_in_authored_order() {
        let store = chain_store(
            r#"{"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "One"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package_group", "child_id": "Inner"},
               {"parent_type": "package_group", "parent_id": "Inner",
                "child_type": "package", "child_id": "Two"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "Three"}"#,
            "",
        );
        let mut facades = build_facades(&store).unwrap();
        let mut diag = Diagnostics::new();

        let ordered = order_chain(&store, &mut facades, &mut diag).unwrap();
        assert_eq!(ordered.packages, ["One", "Two", "Three"]);
        assert!(ordered.used_boundaries.is_empty());
        assert_eq!(facades.require("Two").unwrap().package.boundary, None);
    }

    #[test]
    fn boundary_sticks_to_every_following_package() {
        let store = chain_store(
            r#"{"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "One"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "boundary", "child_id": "RB"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "Two"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "Three"}"#,
            r#"{"id": "RB"}"#,
        );
        let mut facades = build_facades(&store).unwrap();
        let mut diag = Diagnostics::new();

        let ordered = order_chain(&store, &mut facades, &mut diag).unwrap();
        assert_eq!(ordered.used_boundaries, ["RB"]);
        assert_eq!(facades.require("One").unwrap().package.boundary, None);
        assert_eq!(
            facades.require("Two").unwrap().package.boundary.as_deref(),
            Some("RB")
        );
        assert_eq!(
            facades.require("Three").unwrap().package.boundary.as_deref(),
            Some("RB")
        );
    }

    #[test]
    fn boundary_without_packages_is_discarded() {
        let store = chain_store(
            r#"{"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "boundary", "child_id": "Early"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "boundary", "child_id": "RB"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "One"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "Two"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "Three"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "boundary", "child_id": "Trailing"}"#,
            r#"{"id": "Early"}, {"id": "RB"}, {"id": "Trailing"}"#,
        );
        let mut facades = build_facades(&store).unwrap();
        let mut diag = Diagnostics::new();

        let ordered = order_chain(&store, &mut facades, &mut diag).unwrap();
        assert_eq!(ordered.used_boundaries, ["RB"]);
        let discarded: Vec<_> = diag
            .warnings()
            .iter()
            .filter(|w| matches!(w, PolicyWarning::BoundaryDiscarded { .. }))
            .collect();
        assert_eq!(discarded.len(), 2, "Early and Trailing are both unused");
    }

    #[test]
    fn group_cycles_are_fatal() {
        let store = chain_store(
            r#"{"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package_group", "child_id": "A"},
               {"parent_type": "package_group", "parent_id": "A",
                "child_type": "package_group", "child_id": "B"},
               {"parent_type": "package_group", "parent_id": "B",
                "child_type": "package_group", "child_id": "A"}"#,
            "",
        );
        let mut facades = build_facades(&store).unwrap();
        let mut diag = Diagnostics::new();

        let err = order_chain(&store, &mut facades, &mut diag).unwrap_err();
        assert!(matches!(err, Error::GroupCycle(id) if id == "A"));
    }

    #[test]
    fn ordering_is_deterministic() {
        let groups = r#"{"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "Three"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "One"},
               {"parent_type": "package_group", "parent_id": "BundleChain",
                "child_type": "package", "child_id": "Two"}"#;
        let store = chain_store(groups, "");
        let store2 = chain_store(groups, "");

        let mut facades = build_facades(&store).unwrap();
        let mut facades2 = build_facades(&store2).unwrap();
        let mut diag = Diagnostics::new();

        let first = order_chain(&store, &mut facades, &mut diag).unwrap();
        let second = order_chain(&store2, &mut facades2, &mut diag).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.packages, ["Three", "One", "Two"]);
    }
}
