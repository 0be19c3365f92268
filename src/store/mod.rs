// src/store/mod.rs
//! The relational intermediate representation consumed by a bind
//!
//! An upstream compiler/linker serializes its output as one JSON document of
//! named tables. [`RecordStore::load`] deserializes the document into typed
//! tables, enforces singleton and duplicate-key rules once, and hands the
//! bind stages an in-memory model they read and append to. Tables preserve
//! authoring order; that order is load-bearing for packaging, ordering, and
//! manifest generation.

pub mod rows;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rows::{
    BootstrapApplicationRow, BoundaryRow, BundleRow, CatalogRow, ChainRow, ComponentSearchRow,
    ContainerRow, ContainerType, ExePackageRow, FileSearchRow, GroupRow, MsiFeatureRow,
    MsiPackageRow, MsiPropertyRow, MspPackageRow, MsuPackageRow, PackageRow, PatchTargetRow,
    PayloadRow, ProductSearchRow, ProviderRow, RegistrySearchRow, RelatedPackageRow, SearchRow,
    SlipstreamRow,
};

/// Container holding the bootstrap application and the generated manifest
pub const UX_CONTAINER_ID: &str = "BundleUxContainer";

/// Container embedded payloads fall into when no container is authored
pub const DEFAULT_ATTACHED_CONTAINER_ID: &str = "BundleAttachedContainer";

/// Row addressable by a unique string key within its table
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Ordered, key-indexed table of typed rows
///
/// Rows keep insertion order; the index only accelerates key lookups.
/// A row's key must not change after insertion.
#[derive(Debug, Clone)]
pub struct Table<R: Keyed> {
    name: &'static str,
    rows: Vec<R>,
    index: HashMap<String, usize>,
}

impl<R: Keyed> Table<R> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a table from deserialized rows, rejecting duplicate keys
    pub fn from_rows(name: &'static str, rows: Vec<R>) -> Result<Self> {
        let mut table = Self::new(name);
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn push(&mut self, row: R) -> Result<()> {
        let key = row.key().to_string();
        if self.index.contains_key(&key) {
            return Err(Error::DuplicateRowKey {
                table: self.name,
                key,
            });
        }
        self.index.insert(key, self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut R> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.rows[i]),
            None => None,
        }
    }

    /// Look up a row that must exist
    pub fn require(&self, key: &str) -> Result<&R> {
        self.get(key).ok_or_else(|| Error::UnknownRowKey {
            table: self.name,
            key: key.to_string(),
        })
    }

    pub fn require_mut(&mut self, key: &str) -> Result<&mut R> {
        let name = self.name;
        self.get_mut(key).ok_or_else(|| Error::UnknownRowKey {
            table: name,
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, R> {
        self.rows.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a, R: Keyed> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Raw table layout of the IR document
#[derive(Debug, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    bundle: Vec<BundleRow>,
    #[serde(default)]
    chain: Vec<ChainRow>,
    #[serde(default)]
    bootstrap_application: Vec<BootstrapApplicationRow>,
    #[serde(default)]
    payloads: Vec<PayloadRow>,
    #[serde(default)]
    packages: Vec<PackageRow>,
    #[serde(default)]
    exe_packages: Vec<ExePackageRow>,
    #[serde(default)]
    msi_packages: Vec<MsiPackageRow>,
    #[serde(default)]
    msp_packages: Vec<MspPackageRow>,
    #[serde(default)]
    msu_packages: Vec<MsuPackageRow>,
    #[serde(default)]
    groups: Vec<GroupRow>,
    #[serde(default)]
    boundaries: Vec<BoundaryRow>,
    #[serde(default)]
    containers: Vec<ContainerRow>,
    #[serde(default)]
    searches: Vec<SearchRow>,
    #[serde(default)]
    file_searches: Vec<FileSearchRow>,
    #[serde(default)]
    registry_searches: Vec<RegistrySearchRow>,
    #[serde(default)]
    component_searches: Vec<ComponentSearchRow>,
    #[serde(default)]
    product_searches: Vec<ProductSearchRow>,
    #[serde(default)]
    providers: Vec<ProviderRow>,
    #[serde(default)]
    catalogs: Vec<CatalogRow>,
    #[serde(default)]
    msi_properties: Vec<MsiPropertyRow>,
    #[serde(default)]
    slipstreams: Vec<SlipstreamRow>,
}

/// The in-memory record store a bind runs against
#[derive(Debug)]
pub struct RecordStore {
    pub bundle: BundleRow,
    pub chain: ChainRow,
    pub bootstrap_application: BootstrapApplicationRow,
    pub payloads: Table<PayloadRow>,
    pub packages: Table<PackageRow>,
    pub exe_packages: Table<ExePackageRow>,
    pub msi_packages: Table<MsiPackageRow>,
    pub msp_packages: Table<MspPackageRow>,
    pub msu_packages: Table<MsuPackageRow>,
    pub groups: Vec<GroupRow>,
    pub boundaries: Table<BoundaryRow>,
    pub containers: Table<ContainerRow>,
    pub searches: Table<SearchRow>,
    pub file_searches: Table<FileSearchRow>,
    pub registry_searches: Table<RegistrySearchRow>,
    pub component_searches: Table<ComponentSearchRow>,
    pub product_searches: Table<ProductSearchRow>,
    pub providers: Table<ProviderRow>,
    pub catalogs: Table<CatalogRow>,
    pub msi_properties: Vec<MsiPropertyRow>,
    /// Filled by the Msi processor from harvested detail rows
    pub msi_features: Vec<MsiFeatureRow>,
    /// Filled by the Msi processor from harvested detail rows
    pub related_packages: Vec<RelatedPackageRow>,
    /// Filled by the Msp processor from harvested detail rows
    pub patch_targets: Vec<PatchTargetRow>,
    /// Authored rows plus matches appended by slipstream resolution
    pub slipstreams: Vec<SlipstreamRow>,
}

fn singleton<T>(table: &'static str, rows: Vec<T>) -> Result<T> {
    let count = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), rows.next()) {
        (Some(row), None) => Ok(row),
        (None, _) => Err(Error::MissingBundleInfo(table)),
        (Some(_), Some(_)) => Err(Error::SingletonViolation { table, count }),
    }
}

impl RecordStore {
    /// Read and validate an IR document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let doc: StoreDocument = serde_json::from_reader(BufReader::new(file))?;
        Self::from_document(doc)
    }

    /// Parse and validate an IR document from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: StoreDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    fn from_document(doc: StoreDocument) -> Result<Self> {
        let bundle = singleton("bundle", doc.bundle)?;
        let chain = singleton("chain", doc.chain)?;
        let bootstrap_application =
            singleton("bootstrap_application", doc.bootstrap_application)?;

        if doc.packages.is_empty() {
            return Err(Error::MissingBundleInfo("packages"));
        }
        if doc.groups.is_empty() {
            return Err(Error::MissingBundleInfo("groups"));
        }

        let mut containers = Table::from_rows("containers", doc.containers)?;
        // Upstream compilers emit the UX container row; tolerate documents that omit it.
        if !containers.contains(UX_CONTAINER_ID) {
            containers.push(ContainerRow {
                id: UX_CONTAINER_ID.to_string(),
                name: "bundle-ux".to_string(),
                container_type: ContainerType::Attached,
                work_path: None,
                hash: None,
                size: None,
                attached_index: None,
            })?;
        }

        Ok(Self {
            bundle,
            chain,
            bootstrap_application,
            payloads: Table::from_rows("payloads", doc.payloads)?,
            packages: Table::from_rows("packages", doc.packages)?,
            exe_packages: Table::from_rows("exe_packages", doc.exe_packages)?,
            msi_packages: Table::from_rows("msi_packages", doc.msi_packages)?,
            msp_packages: Table::from_rows("msp_packages", doc.msp_packages)?,
            msu_packages: Table::from_rows("msu_packages", doc.msu_packages)?,
            groups: doc.groups,
            boundaries: Table::from_rows("boundaries", doc.boundaries)?,
            containers,
            searches: Table::from_rows("searches", doc.searches)?,
            file_searches: Table::from_rows("file_searches", doc.file_searches)?,
            registry_searches: Table::from_rows("registry_searches", doc.registry_searches)?,
            component_searches: Table::from_rows("component_searches", doc.component_searches)?,
            product_searches: Table::from_rows("product_searches", doc.product_searches)?,
            providers: Table::from_rows("providers", doc.providers)?,
            catalogs: Table::from_rows("catalogs", doc.catalogs)?,
            msi_properties: doc.msi_properties,
            msi_features: Vec::new(),
            related_packages: Vec::new(),
            patch_targets: Vec::new(),
            slipstreams: doc.slipstreams,
        })
    }

    /// Insert a container row if no row carries the id yet
    pub fn ensure_container(&mut self, id: &str, name: &str) -> Result<()> {
        if !self.containers.contains(id) {
            self.containers.push(ContainerRow {
                id: id.to_string(),
                name: name.to_string(),
                container_type: ContainerType::Attached,
                work_path: None,
                hash: None,
                size: None,
                attached_index: None,
            })?;
        }
        Ok(())
    }
}
