// src/store/rows.rs
//! Typed rows of the intermediate-representation tables
//!
//! One struct per table row kind, deserialized straight from the IR
//! document. Fields marked `serde(skip)` are never authored; the bind
//! stages fill them in.

use serde::Deserialize;
use std::path::PathBuf;

use super::Keyed;

fn default_true() -> bool {
    true
}

/// How a payload reaches the target machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagingType {
    /// Packed into a container
    Embedded,
    /// Shipped as a loose file next to the bundle
    External,
    /// Fetched from its download URL at install time
    Downloaded,
    /// Not authored; resolves to the bundle default
    #[default]
    Unknown,
}

impl PackagingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "embedded",
            Self::External => "external",
            Self::Downloaded => "downloaded",
            Self::Unknown => "unknown",
        }
    }
}

/// Chain package kind, one detail table per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Exe,
    Msi,
    Msp,
    Msu,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exe => "Exe",
            Self::Msi => "Msi",
            Self::Msp => "Msp",
            Self::Msu => "Msu",
        }
    }
}

/// Tri-state install scope on a chain package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerMachine {
    Yes,
    No,
    /// Inherits the bundle scope during scope resolution
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    /// Appended to the bundle executable
    #[default]
    Attached,
    /// Shipped as a separate archive in the layout
    Detached,
}

/// Node kind in the grouping relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Package,
    PackageGroup,
    Payload,
    Container,
    Layout,
    Boundary,
}

/// Bundle singleton: identity, registration metadata, stub resource strings
#[derive(Debug, Clone, Deserialize)]
pub struct BundleRow {
    /// Upstream-assigned bundle UUID
    pub id: String,
    /// Product name; also the stub's ProductName resource string
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default)]
    pub about_url: Option<String>,
    #[serde(default)]
    pub help_url: Option<String>,
    #[serde(default)]
    pub help_telephone: Option<String>,
    #[serde(default)]
    pub update_url: Option<String>,
    #[serde(default)]
    pub upgrade_code: Option<String>,
    /// Starting scope; flipped by scope resolution if the chain demands per-user
    #[serde(default = "default_true")]
    pub per_machine: bool,
    #[serde(default)]
    pub disable_modify: bool,
    #[serde(default)]
    pub disable_remove: bool,
    /// When false, unauthored payload packaging defaults to external
    #[serde(default = "default_true")]
    pub compressed: bool,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub icon: Option<PathBuf>,
    #[serde(default)]
    pub splash_screen: Option<PathBuf>,
    /// Resolved by the dependency stage; falls back to the bundle id
    #[serde(skip)]
    pub provider_key: Option<String>,
}

impl BundleRow {
    pub fn default_packaging(&self) -> PackagingType {
        if self.compressed {
            PackagingType::Embedded
        } else {
            PackagingType::External
        }
    }
}

/// Chain singleton: the grouping root plus engine chain attributes
#[derive(Debug, Clone, Deserialize)]
pub struct ChainRow {
    /// Root node id of the package grouping relation
    pub id: String,
    #[serde(default)]
    pub disable_rollback: bool,
    #[serde(default)]
    pub disable_system_restore: bool,
    #[serde(default)]
    pub parallel_cache: bool,
}

/// Bootstrap-application singleton: names the primary UX payload
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapApplicationRow {
    pub id: String,
    /// Payload id of the bootstrap application binary; always embedded slot u0
    pub payload: String,
}

/// One file delivered by the bundle
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadRow {
    pub id: String,
    /// Relative layout path (also the external/detached file name)
    pub name: String,
    /// Authored source path, resolved against the bind paths
    pub source: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub packaging: PackagingType,
    /// Forces a stored (uncompressed) archive entry for this payload
    #[serde(default)]
    pub uncompressed: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub catalog: Option<String>,
    #[serde(default)]
    pub content_file: bool,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Owning package, assigned from the grouping relation
    #[serde(default)]
    pub package: Option<String>,
    /// Owning container, assigned from the grouping relation
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub layout_only: bool,
    /// Resolved on-disk source, set by payload resolution
    #[serde(skip)]
    pub resolved_source: Option<PathBuf>,
    /// Slot id inside the owning container archive
    #[serde(skip)]
    pub embedded_id: Option<String>,
}

/// One chain package; the type-specific detail row lives in its own table
#[derive(Debug, Clone, Deserialize)]
pub struct PackageRow {
    pub id: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    /// Payload id of the package's own binary
    pub payload: String,
    #[serde(default)]
    pub install_condition: Option<String>,
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(default)]
    pub cache_id: Option<String>,
    #[serde(default = "default_true")]
    pub vital: bool,
    #[serde(default)]
    pub permanent: bool,
    #[serde(default)]
    pub per_machine: PerMachine,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub install_size: Option<u64>,
    /// Sum of owned payload sizes, computed after all packages are processed
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub log_path_variable: Option<String>,
    #[serde(default)]
    pub rollback_log_path_variable: Option<String>,
    /// Rollback boundary this package falls under, assigned by ordering
    #[serde(skip)]
    pub boundary: Option<String>,
}

/// Detail row for an Exe chain package
#[derive(Debug, Clone, Deserialize)]
pub struct ExePackageRow {
    pub id: String,
    #[serde(default)]
    pub install_command: Option<String>,
    #[serde(default)]
    pub repair_command: Option<String>,
    #[serde(default)]
    pub uninstall_command: Option<String>,
    #[serde(default)]
    pub detect_condition: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
}

/// Harvested feature of an MSI package
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestedFeature {
    pub feature: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Harvested related-product range of an MSI package
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestedRelated {
    /// Related product or upgrade code
    pub related_id: String,
    #[serde(default)]
    pub min_version: Option<String>,
    #[serde(default)]
    pub max_version: Option<String>,
    #[serde(default)]
    pub min_inclusive: bool,
    #[serde(default)]
    pub max_inclusive: bool,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub only_detect: bool,
}

/// Harvested loose file shipped beside an MSI (external cabinets, uncompressed files)
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestedExternalFile {
    pub name: String,
    pub source: String,
}

/// Detail row for an Msi chain package, harvest included
#[derive(Debug, Clone, Deserialize)]
pub struct MsiPackageRow {
    pub id: String,
    pub product_code: String,
    pub product_version: String,
    #[serde(default)]
    pub upgrade_code: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_description: Option<String>,
    #[serde(default)]
    pub product_language: Option<String>,
    /// Harvested ALLUSERS verdict
    #[serde(default = "default_true")]
    pub per_machine: bool,
    #[serde(default)]
    pub display_internal_ui: bool,
    #[serde(default)]
    pub features: Vec<HarvestedFeature>,
    #[serde(default)]
    pub related: Vec<HarvestedRelated>,
    #[serde(default)]
    pub external_files: Vec<HarvestedExternalFile>,
}

/// Harvested patch applicability target of an MSP package
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestedTarget {
    pub target_code: String,
    /// Target code is an upgrade code rather than a product code
    #[serde(default)]
    pub targets_upgrade: bool,
}

/// Detail row for an Msp chain package
#[derive(Debug, Clone, Deserialize)]
pub struct MspPackageRow {
    pub id: String,
    pub patch_code: String,
    #[serde(default)]
    pub target_codes: Vec<HarvestedTarget>,
}

/// Detail row for an Msu chain package
#[derive(Debug, Clone, Deserialize)]
pub struct MsuPackageRow {
    pub id: String,
    #[serde(default)]
    pub detect_condition: Option<String>,
    #[serde(default)]
    pub kb: Option<String>,
}

/// One edge of the grouping relation
#[derive(Debug, Clone, Deserialize)]
pub struct GroupRow {
    pub parent_type: NodeType,
    pub parent_id: String,
    pub child_type: NodeType,
    pub child_id: String,
}

/// Rollback boundary marker
#[derive(Debug, Clone, Deserialize)]
pub struct BoundaryRow {
    pub id: String,
    #[serde(default = "default_true")]
    pub vital: bool,
}

/// Payload container
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerRow {
    pub id: String,
    /// Archive file name (layout name for detached containers)
    pub name: String,
    #[serde(default, rename = "type")]
    pub container_type: ContainerType,
    /// Archive path in the working directory, set when the container is packed
    #[serde(skip)]
    pub work_path: Option<PathBuf>,
    #[serde(skip)]
    pub hash: Option<String>,
    #[serde(skip)]
    pub size: Option<u64>,
    /// 1-based position among attached containers; the UX container is 0
    #[serde(skip)]
    pub attached_index: Option<u32>,
}

/// Common half of a search definition; ordering is this table's order
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRow {
    pub id: String,
    /// Variable receiving the search result
    pub variable: String,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSearchKind {
    #[default]
    Exists,
    Version,
}

impl FileSearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Version => "version",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileSearchRow {
    pub id: String,
    pub path: String,
    #[serde(default, rename = "type")]
    pub kind: FileSearchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySearchKind {
    #[default]
    Exists,
    Value,
}

impl RegistrySearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Value => "value",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySearchRow {
    pub id: String,
    /// Hive name (HKLM, HKCU, HKCR, HKU)
    pub root: String,
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: RegistrySearchKind,
    #[serde(default)]
    pub expand_environment: bool,
    #[serde(default)]
    pub win64: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSearchKind {
    #[default]
    KeyPath,
    State,
    Directory,
}

impl ComponentSearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyPath => "keyPath",
            Self::State => "state",
            Self::Directory => "directory",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentSearchRow {
    pub id: String,
    pub guid: String,
    #[serde(default)]
    pub product_code: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: ComponentSearchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSearchKind {
    #[default]
    Version,
    Language,
    State,
    Assignment,
}

impl ProductSearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Language => "language",
            Self::State => "state",
            Self::Assignment => "assignment",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductSearchRow {
    pub id: String,
    pub guid: String,
    #[serde(default, rename = "type")]
    pub kind: ProductSearchKind,
}

/// Attribute bit marking a provider row as the bundle's own provider key
pub const PROVIDES_BUNDLE_SCOPE: u32 = 0x10000;

/// Authored dependency-provider row
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderRow {
    pub id: String,
    /// Owning chain package
    pub package: String,
    /// Published dependency key; blank defaults to the package's canonical identifier
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub attributes: u32,
}

impl ProviderRow {
    pub fn is_bundle_scope(&self) -> bool {
        self.attributes & PROVIDES_BUNDLE_SCOPE != 0
    }
}

/// Signed catalog reference
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRow {
    pub id: String,
    pub payload: String,
}

/// Authored MSI property override
#[derive(Debug, Clone, Deserialize)]
pub struct MsiPropertyRow {
    pub package: String,
    pub name: String,
    pub value: String,
}

/// Feature of an MSI package, materialized into the store by the Msi processor
#[derive(Debug, Clone)]
pub struct MsiFeatureRow {
    pub package: String,
    pub feature: String,
    pub size: u64,
    pub parent: Option<String>,
    pub title: Option<String>,
}

/// Related-product range of an MSI package, materialized by the Msi processor
#[derive(Debug, Clone)]
pub struct RelatedPackageRow {
    pub package: String,
    pub related_id: String,
    pub min_version: Option<String>,
    pub max_version: Option<String>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
    pub languages: Vec<String>,
    pub only_detect: bool,
}

/// Patch applicability target, materialized by the Msp processor
#[derive(Debug, Clone)]
pub struct PatchTargetRow {
    pub package: String,
    pub target_code: String,
    pub targets_upgrade: bool,
}

/// Slipstreamed patch applied during an MSI package's install
#[derive(Debug, Clone, Deserialize)]
pub struct SlipstreamRow {
    pub msi_package: String,
    pub msp_package: String,
}

impl Keyed for PayloadRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for PackageRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for ExePackageRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for MsiPackageRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for MspPackageRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for MsuPackageRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for BoundaryRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for ContainerRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for SearchRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for FileSearchRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for RegistrySearchRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for ComponentSearchRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for ProductSearchRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for ProviderRow {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for CatalogRow {
    fn key(&self) -> &str {
        &self.id
    }
}
