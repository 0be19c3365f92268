// src/manifest.rs
//! Bundle manifest generation
//!
//! The manifest is the engine-readable description of everything the bind
//! resolved: registration metadata, the ordered chain with boundary
//! associations, searches, catalogs, and container/payload descriptors.
//! It is serialized with `quick-xml` in a fixed structural order so that
//! identical input tables always produce byte-identical documents, then
//! tracked as a payload of the UX container. Its own descriptor is the one
//! entry not serialized inside itself.

use crate::chain::ordering::OrderedChain;
use crate::chain::{PackageDetail, PackageFacade};
use crate::error::Result;
use crate::hash::sha256_bytes;
use crate::search::{OrderedSearch, SearchDetail};
use crate::store::rows::{BundleRow, PackageType, PackagingType, PayloadRow, PerMachine};
use crate::store::{RecordStore, Table, UX_CONTAINER_ID};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Payload id under which the manifest tracks itself
pub const MANIFEST_PAYLOAD_ID: &str = "BundleManifest";
/// Fixed archive entry name of the manifest inside the UX container
pub const MANIFEST_ENTRY_NAME: &str = "manifest";
/// File name of the manifest in the working directory
pub const MANIFEST_FILE_NAME: &str = "bundle-manifest.xml";

const MANIFEST_NAMESPACE: &str = "urn:bale:manifest";

/// Serialize the manifest to `path` and track it as a UX payload
pub fn write_manifest(
    store: &mut RecordStore,
    facades: &Table<PackageFacade>,
    chain: &OrderedChain,
    searches: &[OrderedSearch],
    path: &Path,
) -> Result<()> {
    let bytes = serialize(store, facades, chain, searches)?;
    fs::write(path, &bytes)?;
    info!("manifest written ({} bytes)", bytes.len());

    store.payloads.push(PayloadRow {
        id: MANIFEST_PAYLOAD_ID.to_string(),
        name: MANIFEST_FILE_NAME.to_string(),
        source: MANIFEST_FILE_NAME.to_string(),
        download_url: None,
        packaging: PackagingType::Embedded,
        uncompressed: false,
        display_name: None,
        description: None,
        catalog: None,
        content_file: false,
        hash: Some(sha256_bytes(&bytes)),
        size: Some(bytes.len() as u64),
        package: None,
        container: Some(UX_CONTAINER_ID.to_string()),
        layout_only: false,
        resolved_source: Some(path.to_path_buf()),
        embedded_id: Some(MANIFEST_ENTRY_NAME.to_string()),
    })?;
    Ok(())
}

/// Produce the manifest document bytes
pub fn serialize(
    store: &RecordStore,
    facades: &Table<PackageFacade>,
    chain: &OrderedChain,
    searches: &[OrderedSearch],
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    let mut root = BytesStart::new("BundleManifest");
    root.push_attribute(("xmlns", MANIFEST_NAMESPACE));
    writer.write_event(Event::Start(root))?;

    write_registration(&mut writer, &store.bundle)?;
    write_chain(&mut writer, store, facades, chain)?;
    write_searches(&mut writer, searches)?;
    write_catalogs(&mut writer, store)?;
    write_ux(&mut writer, store)?;
    write_containers(&mut writer, store)?;
    write_payloads(&mut writer, store)?;

    writer.write_event(Event::End(BytesEnd::new("BundleManifest")))?;
    Ok(buf)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn opt_attr(element: &mut BytesStart, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        element.push_attribute((name, value));
    }
}

fn write_registration<W: Write>(writer: &mut Writer<W>, bundle: &BundleRow) -> Result<()> {
    let mut registration = BytesStart::new("Registration");
    registration.push_attribute(("Id", bundle.id.as_str()));
    registration.push_attribute(("Version", bundle.version.as_str()));
    let provider_key = bundle.provider_key.as_deref().unwrap_or(&bundle.id);
    registration.push_attribute(("ProviderKey", provider_key));
    registration.push_attribute(("PerMachine", yes_no(bundle.per_machine)));
    opt_attr(&mut registration, "UpgradeCode", bundle.upgrade_code.as_deref());
    opt_attr(&mut registration, "Condition", bundle.condition.as_deref());
    writer.write_event(Event::Start(registration))?;

    let mut arp = BytesStart::new("Arp");
    arp.push_attribute(("DisplayName", bundle.name.as_str()));
    arp.push_attribute(("DisplayVersion", bundle.version.as_str()));
    opt_attr(&mut arp, "Publisher", bundle.manufacturer.as_deref());
    opt_attr(&mut arp, "HelpLink", bundle.help_url.as_deref());
    opt_attr(&mut arp, "HelpTelephone", bundle.help_telephone.as_deref());
    opt_attr(&mut arp, "AboutUrl", bundle.about_url.as_deref());
    opt_attr(&mut arp, "UpdateUrl", bundle.update_url.as_deref());
    if bundle.disable_modify {
        arp.push_attribute(("DisableModify", "yes"));
    }
    if bundle.disable_remove {
        arp.push_attribute(("DisableRemove", "yes"));
    }
    writer.write_event(Event::Empty(arp))?;

    writer.write_event(Event::End(BytesEnd::new("Registration")))?;
    Ok(())
}

fn write_chain<W: Write>(
    writer: &mut Writer<W>,
    store: &RecordStore,
    facades: &Table<PackageFacade>,
    chain: &OrderedChain,
) -> Result<()> {
    let mut chain_el = BytesStart::new("Chain");
    if store.chain.disable_rollback {
        chain_el.push_attribute(("DisableRollback", "yes"));
    }
    if store.chain.disable_system_restore {
        chain_el.push_attribute(("DisableSystemRestore", "yes"));
    }
    if store.chain.parallel_cache {
        chain_el.push_attribute(("ParallelCache", "yes"));
    }
    writer.write_event(Event::Start(chain_el))?;

    let mut emitted_boundaries: HashSet<&str> = HashSet::new();
    for package_id in &chain.packages {
        let facade = facades.require(package_id)?;
        if let Some(boundary_id) = &facade.package.boundary {
            if emitted_boundaries.insert(boundary_id) {
                let boundary = store.boundaries.require(boundary_id)?;
                let mut el = BytesStart::new("RollbackBoundary");
                el.push_attribute(("Id", boundary.id.as_str()));
                el.push_attribute(("Vital", yes_no(boundary.vital)));
                writer.write_event(Event::Empty(el))?;
            }
        }
        write_package(writer, store, facade)?;
    }

    writer.write_event(Event::End(BytesEnd::new("Chain")))?;
    Ok(())
}

fn write_package<W: Write>(
    writer: &mut Writer<W>,
    store: &RecordStore,
    facade: &PackageFacade,
) -> Result<()> {
    let package = &facade.package;
    let element_name = match package.package_type {
        PackageType::Exe => "ExePackage",
        PackageType::Msi => "MsiPackage",
        PackageType::Msp => "MspPackage",
        PackageType::Msu => "MsuPackage",
    };

    let mut el = BytesStart::new(element_name);
    el.push_attribute(("Id", package.id.as_str()));
    el.push_attribute(("Cache", yes_no(package.cache)));
    opt_attr(&mut el, "CacheId", package.cache_id.as_deref());
    el.push_attribute(("Vital", yes_no(package.vital)));
    el.push_attribute(("Permanent", yes_no(package.permanent)));
    let per_machine = match package.per_machine {
        PerMachine::Yes => "yes",
        PerMachine::No => "no",
        PerMachine::Default => "default",
    };
    el.push_attribute(("PerMachine", per_machine));
    opt_attr(&mut el, "Version", package.version.as_deref());
    opt_attr(&mut el, "DisplayName", package.display_name.as_deref());
    opt_attr(&mut el, "Description", package.description.as_deref());
    opt_attr(&mut el, "InstallCondition", package.install_condition.as_deref());
    if let Some(install_size) = package.install_size {
        el.push_attribute(("InstallSize", install_size.to_string().as_str()));
    }
    if let Some(size) = package.size {
        el.push_attribute(("Size", size.to_string().as_str()));
    }
    opt_attr(&mut el, "LogPathVariable", package.log_path_variable.as_deref());
    opt_attr(
        &mut el,
        "RollbackLogPathVariable",
        package.rollback_log_path_variable.as_deref(),
    );
    opt_attr(&mut el, "RollbackBoundary", package.boundary.as_deref());

    match &facade.detail {
        PackageDetail::Exe(exe) => {
            opt_attr(&mut el, "InstallArguments", exe.install_command.as_deref());
            opt_attr(&mut el, "RepairArguments", exe.repair_command.as_deref());
            opt_attr(&mut el, "UninstallArguments", exe.uninstall_command.as_deref());
            opt_attr(&mut el, "DetectCondition", exe.detect_condition.as_deref());
            opt_attr(&mut el, "Protocol", exe.protocol.as_deref());
        }
        PackageDetail::Msi(msi) => {
            el.push_attribute(("ProductCode", msi.product_code.as_str()));
            opt_attr(&mut el, "Language", msi.product_language.as_deref());
            opt_attr(&mut el, "UpgradeCode", msi.upgrade_code.as_deref());
            el.push_attribute(("DisplayInternalUI", yes_no(msi.display_internal_ui)));
        }
        PackageDetail::Msp(msp) => {
            el.push_attribute(("PatchCode", msp.patch_code.as_str()));
        }
        PackageDetail::Msu(msu) => {
            opt_attr(&mut el, "DetectCondition", msu.detect_condition.as_deref());
            opt_attr(&mut el, "KB", msu.kb.as_deref());
        }
    }
    writer.write_event(Event::Start(el))?;

    for provides in &facade.provides {
        let mut el = BytesStart::new("Provides");
        el.push_attribute(("Key", provides.key.as_str()));
        opt_attr(&mut el, "Version", provides.version.as_deref());
        opt_attr(&mut el, "DisplayName", provides.display_name.as_deref());
        if provides.attributes != 0 {
            el.push_attribute(("Attributes", provides.attributes.to_string().as_str()));
        }
        writer.write_event(Event::Empty(el))?;
    }

    for feature in store.msi_features.iter().filter(|f| f.package == package.id) {
        let mut el = BytesStart::new("MsiFeature");
        el.push_attribute(("Id", feature.feature.as_str()));
        el.push_attribute(("Size", feature.size.to_string().as_str()));
        opt_attr(&mut el, "Parent", feature.parent.as_deref());
        opt_attr(&mut el, "Title", feature.title.as_deref());
        writer.write_event(Event::Empty(el))?;
    }

    for property in store.msi_properties.iter().filter(|p| p.package == package.id) {
        let mut el = BytesStart::new("MsiProperty");
        el.push_attribute(("Name", property.name.as_str()));
        el.push_attribute(("Value", property.value.as_str()));
        writer.write_event(Event::Empty(el))?;
    }

    for target in store.patch_targets.iter().filter(|t| t.package == package.id) {
        let mut el = BytesStart::new("PatchTargetCode");
        el.push_attribute(("TargetCode", target.target_code.as_str()));
        el.push_attribute(("TargetsUpgrade", yes_no(target.targets_upgrade)));
        writer.write_event(Event::Empty(el))?;
    }

    for slipstream in store.slipstreams.iter().filter(|s| s.msi_package == package.id) {
        let mut el = BytesStart::new("SlipstreamMsp");
        el.push_attribute(("Id", slipstream.msp_package.as_str()));
        writer.write_event(Event::Empty(el))?;
    }

    for related in store.related_packages.iter().filter(|r| r.package == package.id) {
        let mut el = BytesStart::new("RelatedPackage");
        el.push_attribute(("Id", related.related_id.as_str()));
        if let Some(min) = &related.min_version {
            el.push_attribute(("MinVersion", min.as_str()));
            el.push_attribute(("MinInclusive", yes_no(related.min_inclusive)));
        }
        if let Some(max) = &related.max_version {
            el.push_attribute(("MaxVersion", max.as_str()));
            el.push_attribute(("MaxInclusive", yes_no(related.max_inclusive)));
        }
        el.push_attribute(("OnlyDetect", yes_no(related.only_detect)));
        if related.languages.is_empty() {
            writer.write_event(Event::Empty(el))?;
        } else {
            writer.write_event(Event::Start(el))?;
            for language in &related.languages {
                let mut lang = BytesStart::new("Language");
                lang.push_attribute(("Id", language.as_str()));
                writer.write_event(Event::Empty(lang))?;
            }
            writer.write_event(Event::End(BytesEnd::new("RelatedPackage")))?;
        }
    }

    // The package binary first, then the rest of its payloads in table order.
    let mut el = BytesStart::new("PayloadRef");
    el.push_attribute(("Id", package.payload.as_str()));
    writer.write_event(Event::Empty(el))?;
    for payload in store.payloads.iter() {
        if payload.package.as_deref() == Some(&package.id) && payload.id != package.payload {
            let mut el = BytesStart::new("PayloadRef");
            el.push_attribute(("Id", payload.id.as_str()));
            writer.write_event(Event::Empty(el))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new(element_name)))?;
    Ok(())
}

fn write_searches<W: Write>(writer: &mut Writer<W>, searches: &[OrderedSearch]) -> Result<()> {
    for search in searches {
        let element_name = match &search.detail {
            SearchDetail::File(_) => "FileSearch",
            SearchDetail::Registry(_) => "RegistrySearch",
            SearchDetail::Component(_) => "ComponentSearch",
            SearchDetail::Product(_) => "ProductSearch",
        };
        let mut el = BytesStart::new(element_name);
        el.push_attribute(("Id", search.common.id.as_str()));
        el.push_attribute(("Variable", search.common.variable.as_str()));
        opt_attr(&mut el, "Condition", search.common.condition.as_deref());
        match &search.detail {
            SearchDetail::File(file) => {
                el.push_attribute(("Path", file.path.as_str()));
                el.push_attribute(("Type", file.kind.as_str()));
            }
            SearchDetail::Registry(registry) => {
                el.push_attribute(("Root", registry.root.as_str()));
                el.push_attribute(("Key", registry.key.as_str()));
                opt_attr(&mut el, "Value", registry.value.as_deref());
                el.push_attribute(("Type", registry.kind.as_str()));
                el.push_attribute(("ExpandEnvironment", yes_no(registry.expand_environment)));
                el.push_attribute(("Win64", yes_no(registry.win64)));
            }
            SearchDetail::Component(component) => {
                el.push_attribute(("Guid", component.guid.as_str()));
                opt_attr(&mut el, "ProductCode", component.product_code.as_deref());
                el.push_attribute(("Type", component.kind.as_str()));
            }
            SearchDetail::Product(product) => {
                el.push_attribute(("Guid", product.guid.as_str()));
                el.push_attribute(("Type", product.kind.as_str()));
            }
        }
        writer.write_event(Event::Empty(el))?;
    }
    Ok(())
}

fn write_catalogs<W: Write>(writer: &mut Writer<W>, store: &RecordStore) -> Result<()> {
    for catalog in store.catalogs.iter() {
        store.payloads.require(&catalog.payload)?;
        let mut el = BytesStart::new("Catalog");
        el.push_attribute(("Id", catalog.id.as_str()));
        el.push_attribute(("Payload", catalog.payload.as_str()));
        writer.write_event(Event::Empty(el))?;
    }
    Ok(())
}

fn write_payload_descriptor<W: Write>(writer: &mut Writer<W>, payload: &PayloadRow) -> Result<()> {
    let mut el = BytesStart::new("Payload");
    el.push_attribute(("Id", payload.id.as_str()));
    el.push_attribute(("FilePath", payload.name.as_str()));
    opt_attr(&mut el, "Hash", payload.hash.as_deref());
    if let Some(size) = payload.size {
        el.push_attribute(("Size", size.to_string().as_str()));
    }
    el.push_attribute(("Packaging", payload.packaging.as_str()));
    opt_attr(&mut el, "Container", payload.container.as_deref());
    opt_attr(&mut el, "EmbeddedId", payload.embedded_id.as_deref());
    opt_attr(&mut el, "DownloadUrl", payload.download_url.as_deref());
    opt_attr(&mut el, "Package", payload.package.as_deref());
    opt_attr(&mut el, "Catalog", payload.catalog.as_deref());
    writer.write_event(Event::Empty(el))?;
    Ok(())
}

/// UX payload descriptors: the bootstrap application first, then the rest
/// of the UX container in table order.
fn write_ux<W: Write>(writer: &mut Writer<W>, store: &RecordStore) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("UX")))?;
    let ba_payload = store.payloads.require(&store.bootstrap_application.payload)?;
    write_payload_descriptor(writer, ba_payload)?;
    for payload in store.payloads.iter() {
        if payload.container.as_deref() == Some(UX_CONTAINER_ID)
            && payload.id != ba_payload.id
        {
            write_payload_descriptor(writer, payload)?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("UX")))?;
    Ok(())
}

fn write_containers<W: Write>(writer: &mut Writer<W>, store: &RecordStore) -> Result<()> {
    for container in store.containers.iter() {
        if container.id == UX_CONTAINER_ID || container.work_path.is_none() {
            continue;
        }
        let mut el = BytesStart::new("Container");
        el.push_attribute(("Id", container.id.as_str()));
        el.push_attribute(("FilePath", container.name.as_str()));
        opt_attr(&mut el, "Hash", container.hash.as_deref());
        if let Some(size) = container.size {
            el.push_attribute(("Size", size.to_string().as_str()));
        }
        match container.attached_index {
            Some(index) => {
                el.push_attribute(("Type", "attached"));
                el.push_attribute(("AttachedIndex", index.to_string().as_str()));
            }
            None => el.push_attribute(("Type", "detached")),
        }
        writer.write_event(Event::Empty(el))?;
    }
    Ok(())
}

fn write_payloads<W: Write>(writer: &mut Writer<W>, store: &RecordStore) -> Result<()> {
    for payload in store.payloads.iter() {
        if payload.container.as_deref() == Some(UX_CONTAINER_ID) || payload.layout_only {
            continue;
        }
        write_payload_descriptor(writer, payload)?;
    }
    Ok(())
}
