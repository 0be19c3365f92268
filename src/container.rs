// src/container.rs
//! Container packing
//!
//! Embedded payloads are grouped by container and written into zip archives
//! in the working directory. Entries are named by embedded-slot id and
//! carry fixed metadata (epoch timestamp, 0644 permissions) so identical
//! payload bytes always produce identical archive bytes. Non-UX containers
//! have no data dependency on each other and pack on the rayon pool; the UX
//! container packs last, after the manifest exists, with the manifest as
//! its first entry.

use crate::diagnostics::{Diagnostics, PolicyWarning};
use crate::error::Result;
use crate::hash::{FileDigest, digest_file};
use crate::manifest::MANIFEST_ENTRY_NAME;
use crate::store::rows::{ContainerType, PackagingType};
use crate::store::{DEFAULT_ATTACHED_CONTAINER_ID, RecordStore, UX_CONTAINER_ID};
use crate::transfer::FileTransfer;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bundle-wide compression setting for container archives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Store entries without compression
    None,
    Low,
    #[default]
    Medium,
    High,
}

impl CompressionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    fn deflate_level(&self) -> Option<i64> {
        match self {
            Self::None => None,
            Self::Low => Some(1),
            Self::Medium => Some(6),
            Self::High => Some(9),
        }
    }
}

impl std::str::FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown compression level '{}'", other)),
        }
    }
}

/// One archive entry of a pack plan
#[derive(Debug, Clone)]
pub struct PackEntry {
    /// Embedded-slot id, used as the entry name
    pub entry_name: String,
    pub source: PathBuf,
    /// Store this entry uncompressed regardless of the bundle level
    pub stored: bool,
}

/// Immutable description of one container archive to write
#[derive(Debug, Clone)]
pub struct PackPlan {
    pub container_id: String,
    pub archive_path: PathBuf,
    pub entries: Vec<PackEntry>,
}

/// Group embedded payloads into pack plans for every non-UX container
///
/// Containers that end up empty are skipped; an authored (non-default)
/// empty container draws a policy warning.
pub fn build_plans(
    store: &RecordStore,
    work_dir: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<PackPlan>> {
    let mut by_container: HashMap<&str, Vec<PackEntry>> = HashMap::new();
    for payload in store.payloads.iter() {
        if payload.packaging != PackagingType::Embedded {
            continue;
        }
        let Some(container_id) = payload.container.as_deref() else {
            continue;
        };
        store.containers.require(container_id)?;
        let (Some(slot), Some(source)) = (&payload.embedded_id, &payload.resolved_source) else {
            continue;
        };
        by_container.entry(container_id).or_default().push(PackEntry {
            entry_name: slot.clone(),
            source: source.clone(),
            stored: payload.uncompressed,
        });
    }

    let mut plans = Vec::new();
    for container in store.containers.iter() {
        if container.id == UX_CONTAINER_ID {
            continue;
        }
        match by_container.remove(container.id.as_str()) {
            Some(entries) => plans.push(PackPlan {
                container_id: container.id.clone(),
                archive_path: work_dir.join(&container.name),
                entries,
            }),
            None => {
                if container.id != DEFAULT_ATTACHED_CONTAINER_ID {
                    diagnostics.warning(PolicyWarning::EmptyContainer {
                        container: container.id.clone(),
                    });
                }
            }
        }
    }
    Ok(plans)
}

/// Write one container archive and report its content digest
pub fn pack_archive(plan: &PackPlan, level: CompressionLevel) -> Result<FileDigest> {
    debug!(
        "packing container '{}' ({} entries)",
        plan.container_id,
        plan.entries.len()
    );
    let file = File::create(&plan.archive_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    for entry in &plan.entries {
        let mut options = SimpleFileOptions::default()
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);
        options = if entry.stored || level == CompressionLevel::None {
            options.compression_method(CompressionMethod::Stored)
        } else {
            options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(level.deflate_level())
        };
        zip.start_file(entry.entry_name.as_str(), options)?;
        let mut source = File::open(&entry.source)?;
        io::copy(&mut source, &mut zip)?;
    }

    let mut inner = zip.finish()?;
    inner.flush()?;
    Ok(digest_file(&plan.archive_path)?)
}

/// Pack every non-UX container on the rayon pool and record the results
///
/// Attached containers receive their 1-based index in table order; detached
/// containers schedule a move into the layout directory.
pub fn pack_containers(
    store: &mut RecordStore,
    plans: Vec<PackPlan>,
    level: CompressionLevel,
    layout_dir: &Path,
    transfers: &mut Vec<FileTransfer>,
) -> Result<()> {
    let results: Vec<(String, PathBuf, FileDigest)> = plans
        .par_iter()
        .map(|plan| {
            let digest = pack_archive(plan, level)?;
            Ok((plan.container_id.clone(), plan.archive_path.clone(), digest))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut next_attached = 1u32;
    for (id, path, digest) in results {
        let size = digest.size;
        let container = store.containers.require_mut(&id)?;
        container.work_path = Some(path.clone());
        container.hash = Some(digest.hash);
        container.size = Some(size);
        match container.container_type {
            ContainerType::Attached => {
                container.attached_index = Some(next_attached);
                next_attached += 1;
            }
            ContainerType::Detached => {
                let destination = layout_dir.join(&container.name);
                if let Some(transfer) = FileTransfer::create(path, destination, true) {
                    transfers.push(transfer);
                }
            }
        }
        info!("container '{}' packed ({} bytes)", id, size);
    }
    Ok(())
}

/// Pack the UX container with the manifest as its first entry
///
/// Returns the archive's working path for the assembler.
pub fn pack_ux_container(
    store: &mut RecordStore,
    ux_order: &[String],
    manifest_path: &Path,
    work_dir: &Path,
    level: CompressionLevel,
) -> Result<PathBuf> {
    let ux = store.containers.require(UX_CONTAINER_ID)?;
    let mut entries = vec![PackEntry {
        entry_name: MANIFEST_ENTRY_NAME.to_string(),
        source: manifest_path.to_path_buf(),
        stored: false,
    }];
    for id in ux_order {
        let payload = store.payloads.require(id)?;
        let (Some(slot), Some(source)) = (&payload.embedded_id, &payload.resolved_source) else {
            continue;
        };
        entries.push(PackEntry {
            entry_name: slot.clone(),
            source: source.clone(),
            stored: payload.uncompressed,
        });
    }

    let plan = PackPlan {
        container_id: UX_CONTAINER_ID.to_string(),
        archive_path: work_dir.join(&ux.name),
        entries,
    };
    let digest = pack_archive(&plan, level)?;

    let ux = store.containers.require_mut(UX_CONTAINER_ID)?;
    ux.work_path = Some(plan.archive_path.clone());
    ux.hash = Some(digest.hash);
    ux.size = Some(digest.size);
    ux.attached_index = Some(0);
    info!("UX container packed ({} bytes)", digest.size);
    Ok(plan.archive_path)
}
