// src/payload.rs
//! Payload resolution
//!
//! Three passes over the payload table. Parent assignment walks the grouping
//! relation and pins each payload to its package, container, or the layout.
//! Source resolution locates files on disk, stats and hashes them, and
//! resolves authored packaging to a concrete mode; it runs once over the
//! authored payloads and again over payloads generated by package
//! processing. Slot assignment hands every embedded payload its archive
//! entry name: `u0, u1, ..` inside the UX container (bootstrap application
//! first), `a0, a1, ..` everywhere else.

use crate::diagnostics::{Diagnostics, PolicyWarning};
use crate::error::{Error, Result};
use crate::hash::digest_file;
use crate::resolve::{SourceResolver, resolve_source};
use crate::store::rows::{ContainerRow, ContainerType, NodeType, PackagingType};
use crate::store::{DEFAULT_ATTACHED_CONTAINER_ID, RecordStore, Table, UX_CONTAINER_ID};
use crate::transfer::FileTransfer;
use std::path::Path;
use tracing::debug;

/// Pin payloads to their parents from the grouping relation
pub fn assign_parents(store: &mut RecordStore) -> Result<()> {
    for edge in &store.groups {
        if edge.child_type != NodeType::Payload {
            continue;
        }
        let payload = store.payloads.require_mut(&edge.child_id)?;
        match edge.parent_type {
            NodeType::Package => {
                if payload.package.is_some() {
                    return Err(Error::PayloadParentConflict {
                        payload: payload.id.clone(),
                        kind: "package",
                    });
                }
                payload.package = Some(edge.parent_id.clone());
            }
            NodeType::Container => {
                if payload.container.is_some() {
                    return Err(Error::PayloadParentConflict {
                        payload: payload.id.clone(),
                        kind: "container",
                    });
                }
                payload.container = Some(edge.parent_id.clone());
            }
            NodeType::Layout => {
                payload.layout_only = true;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Pin the bootstrap application's payload to the UX container
///
/// Runs before packaging resolution so the payload cannot fall into the
/// default attached container first.
pub fn claim_bootstrap_payload(store: &mut RecordStore) -> Result<()> {
    let ba_payload = store.bootstrap_application.payload.clone();
    let payload = store.payloads.require_mut(&ba_payload)?;
    match payload.container.as_deref() {
        None => payload.container = Some(UX_CONTAINER_ID.to_string()),
        Some(UX_CONTAINER_ID) => {}
        Some(_) => {
            return Err(Error::PayloadParentConflict {
                payload: payload.id.clone(),
                kind: "container",
            });
        }
    }
    Ok(())
}

/// Resolve sources, hashes, sizes, and packaging for the named payloads
///
/// Layout-only and external payloads schedule copy transfers into the
/// layout directory. Embedded payloads without an authored container fall
/// into the default attached container, creating it on first use.
pub fn resolve_payloads(
    store: &mut RecordStore,
    ids: &[String],
    resolvers: &[Box<dyn SourceResolver>],
    layout_dir: &Path,
    transfers: &mut Vec<FileTransfer>,
) -> Result<()> {
    let default_packaging = store.bundle.default_packaging();
    let containers = &mut store.containers;

    for id in ids {
        let payload = store.payloads.require_mut(id)?;

        if payload.resolved_source.is_none() {
            let resolved = resolve_source(resolvers, &payload.source).ok_or_else(|| {
                Error::UnresolvedSource {
                    payload: payload.id.clone(),
                    source_path: payload.source.clone(),
                }
            })?;
            payload.resolved_source = Some(resolved);
        }
        let resolved = payload
            .resolved_source
            .clone()
            .unwrap_or_else(|| Path::new(&payload.source).to_path_buf());

        if payload.hash.is_none() || payload.size.is_none() {
            let digest = digest_file(&resolved)?;
            if payload.hash.is_none() {
                payload.hash = Some(digest.hash);
            }
            if payload.size.is_none() {
                payload.size = Some(digest.size);
            }
        }

        if payload.packaging == PackagingType::Unknown {
            payload.packaging = default_packaging;
        }

        if payload.packaging == PackagingType::Embedded && payload.container.is_none() {
            ensure_default_attached(containers)?;
            payload.container = Some(DEFAULT_ATTACHED_CONTAINER_ID.to_string());
        }

        if payload.layout_only || payload.packaging == PackagingType::External {
            let destination = layout_dir.join(&payload.name);
            if let Some(transfer) = FileTransfer::create(resolved, destination, false) {
                transfers.push(transfer);
            }
        }
    }
    Ok(())
}

fn ensure_default_attached(containers: &mut Table<ContainerRow>) -> Result<()> {
    if !containers.contains(DEFAULT_ATTACHED_CONTAINER_ID) {
        debug!("creating default attached container");
        containers.push(ContainerRow {
            id: DEFAULT_ATTACHED_CONTAINER_ID.to_string(),
            name: "bundle-attached".to_string(),
            container_type: ContainerType::Attached,
            work_path: None,
            hash: None,
            size: None,
            attached_index: None,
        })?;
    }
    Ok(())
}

/// Assign embedded-slot ids; returns UX payload ids in slot order
///
/// UX payloads are forced to embedded packaging (with a policy warning when
/// that changes an authored mode). Zero UX payloads means no bootstrap
/// application can run, which is fatal.
pub fn assign_embedded_ids(
    store: &mut RecordStore,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<String>> {
    let ba_payload = store.bootstrap_application.payload.clone();

    let mut ux_order: Vec<String> = Vec::new();
    if store
        .payloads
        .get(&ba_payload)
        .is_some_and(|p| p.container.as_deref() == Some(UX_CONTAINER_ID))
    {
        ux_order.push(ba_payload.clone());
    }
    for payload in store.payloads.iter() {
        if payload.container.as_deref() == Some(UX_CONTAINER_ID) && payload.id != ba_payload {
            ux_order.push(payload.id.clone());
        }
    }

    if ux_order.is_empty() {
        return Err(Error::MissingBundleInfo("bootstrap_application"));
    }

    for (slot, id) in ux_order.iter().enumerate() {
        let payload = store.payloads.require_mut(id)?;
        if payload.packaging != PackagingType::Embedded {
            if payload.packaging != PackagingType::Unknown {
                diagnostics.warning(PolicyWarning::UxPayloadForcedEmbedded {
                    payload: payload.id.clone(),
                });
            }
            payload.packaging = PackagingType::Embedded;
        }
        payload.embedded_id = Some(format!("u{}", slot));
    }

    // One counter across every non-UX container.
    let mut slot = 0usize;
    for payload in store.payloads.iter_mut() {
        if payload.packaging == PackagingType::Embedded && payload.embedded_id.is_none() {
            payload.embedded_id = Some(format!("a{}", slot));
            slot += 1;
        }
    }

    Ok(ux_order)
}
