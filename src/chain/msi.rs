// src/chain/msi.rs
//! Msi package processing
//!
//! The IR carries the MSI harvest (features, related-product ranges,
//! external cabinets and uncompressed files) pre-extracted inside the
//! detail row. This pass materializes the harvest into store tables and
//! fills package metadata from the product metadata. Generated payloads
//! resolve relative to the MSI's own resolved source directory and go
//! through the second payload-resolution pass like any authored payload.

use super::{PackageDetail, PackageFacade};
use crate::error::Result;
use crate::store::RecordStore;
use crate::store::rows::{MsiFeatureRow, PayloadRow, PerMachine, RelatedPackageRow};
use std::path::PathBuf;
use tracing::debug;

pub fn process(store: &mut RecordStore, facade: &mut PackageFacade) -> Result<()> {
    let msi = match &facade.detail {
        PackageDetail::Msi(row) => row.clone(),
        _ => return Ok(()),
    };
    let package_id = facade.package.id.clone();

    // The harvest knows whether the product demands per-machine; an authored
    // scope on the chain package wins.
    if facade.package.per_machine == PerMachine::Default && !msi.per_machine {
        facade.package.per_machine = PerMachine::No;
    }

    if facade.package.version.is_none() {
        facade.package.version = Some(msi.product_version.clone());
    }
    if facade.package.display_name.is_none() {
        facade.package.display_name = msi.product_name.clone();
    }
    if facade.package.description.is_none() {
        facade.package.description = msi.product_description.clone();
    }
    if facade.package.cache_id.is_none() {
        facade.package.cache_id = Some(format!("{}v{}", msi.product_code, msi.product_version));
    }

    for feature in &msi.features {
        store.msi_features.push(MsiFeatureRow {
            package: package_id.clone(),
            feature: feature.feature.clone(),
            size: feature.size,
            parent: feature.parent.clone(),
            title: feature.title.clone(),
        });
    }

    for related in &msi.related {
        store.related_packages.push(RelatedPackageRow {
            package: package_id.clone(),
            related_id: related.related_id.clone(),
            min_version: related.min_version.clone(),
            max_version: related.max_version.clone(),
            min_inclusive: related.min_inclusive,
            max_inclusive: related.max_inclusive,
            languages: related.languages.clone(),
            only_detect: related.only_detect,
        });
    }

    if !msi.external_files.is_empty() {
        let msi_payload = store.payloads.require(&facade.package.payload)?;
        let msi_dir: Option<PathBuf> = msi_payload
            .resolved_source
            .as_ref()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf());
        let packaging = msi_payload.packaging;
        let container = msi_payload.container.clone();
        let layout_only = msi_payload.layout_only;

        let mut generated = Vec::new();
        for (index, external) in msi.external_files.iter().enumerate() {
            let source = match &msi_dir {
                Some(dir) => dir.join(&external.source).to_string_lossy().into_owned(),
                None => external.source.clone(),
            };
            debug!(
                "package '{}' ships external file '{}'",
                package_id, external.name
            );
            generated.push(PayloadRow {
                id: format!("{}_ext{}", package_id, index),
                name: external.name.clone(),
                source,
                download_url: None,
                packaging,
                uncompressed: false,
                display_name: None,
                description: None,
                catalog: None,
                content_file: false,
                hash: None,
                size: None,
                package: Some(package_id.clone()),
                container: container.clone(),
                layout_only,
                resolved_source: None,
                embedded_id: None,
            });
        }
        for payload in generated {
            store.payloads.push(payload)?;
        }
    }

    Ok(())
}
