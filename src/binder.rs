// src/binder.rs
//! Bind orchestration
//!
//! Runs the full pipeline against a loaded record store: payload
//! resolution, facade building and per-type package processing, chain
//! ordering, dependency providers, install scope, searches, container
//! packing, manifest generation, and binary assembly. Stages are strictly
//! sequential; validation errors accumulate in the diagnostics context and
//! are checked at two checkpoints, once before any container is packed and
//! once more before the binary is assembled. The binder writes only inside
//! the working directory; everything that must land elsewhere is returned
//! as a file transfer for the caller to apply.

use crate::chain::{self, ordering};
use crate::container::{self, CompressionLevel};
use crate::dependency;
use crate::diagnostics::{Diagnostics, PolicyWarning, ValidationError};
use crate::error::{Error, Result};
use crate::extension::BinderExtension;
use crate::manifest::{self, MANIFEST_FILE_NAME};
use crate::payload;
use crate::resolve::{BasePathResolver, SourceResolver};
use crate::search;
use crate::store::rows::ContainerType;
use crate::store::{RecordStore, UX_CONTAINER_ID};
use crate::stub::BundleAssembler;
use crate::transfer::FileTransfer;
use crate::version::VersionQuad;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

/// Everything a bind needs besides the record store
#[derive(Debug, Clone)]
pub struct BindConfig {
    /// Final bundle executable path
    pub output_path: PathBuf,
    /// Scratch directory for containers, the manifest, and the assembled bundle
    pub work_dir: PathBuf,
    /// Directory receiving detached containers and loose payloads
    pub layout_dir: PathBuf,
    /// Stub engine executable the bundle is assembled around
    pub stub_path: PathBuf,
    /// Base directories payload sources resolve against, probed in order
    pub bind_paths: Vec<PathBuf>,
    pub compression: CompressionLevel,
}

/// Outputs of a successful bind
#[derive(Debug)]
pub struct BindResult {
    /// Pending copies and moves, in apply order; the bundle itself is last
    pub transfers: Vec<FileTransfer>,
    /// Resolved sources of payloads flagged as content files, in table order
    pub content_paths: Vec<PathBuf>,
    pub warnings: Vec<PolicyWarning>,
}

pub struct Binder {
    config: BindConfig,
    extensions: Vec<Box<dyn BinderExtension>>,
    resolvers: Vec<Box<dyn SourceResolver>>,
}

impl Binder {
    pub fn new(config: BindConfig) -> Self {
        let resolvers: Vec<Box<dyn SourceResolver>> =
            vec![Box::new(BasePathResolver::new(config.bind_paths.clone()))];
        Self {
            config,
            extensions: Vec::new(),
            resolvers,
        }
    }

    /// Register an extension; extensions run in registration order
    pub fn add_extension(&mut self, extension: Box<dyn BinderExtension>) {
        self.extensions.push(extension);
    }

    /// Register an additional source resolver after the bind-path resolver
    pub fn add_resolver(&mut self, resolver: Box<dyn SourceResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn bind(mut self, mut store: RecordStore) -> Result<BindResult> {
        let mut diagnostics = Diagnostics::new();
        fs::create_dir_all(&self.config.work_dir)?;
        fs::create_dir_all(&self.config.layout_dir)?;

        // The bundle section stores the id as raw bytes, so it must be a UUID.
        let bundle_id = Uuid::parse_str(&store.bundle.id)
            .map_err(|_| Error::InvalidBundleId(store.bundle.id.clone()))?;
        info!("binding bundle {} v{}", store.bundle.id, store.bundle.version);

        for extension in &mut self.extensions {
            debug!("initializing extension '{}'", extension.name());
            extension.initialize(&mut store, &mut diagnostics)?;
        }

        payload::assign_parents(&mut store)?;
        payload::claim_bootstrap_payload(&mut store)?;

        let mut transfers = Vec::new();
        let authored: Vec<String> = store.payloads.iter().map(|p| p.id.clone()).collect();
        payload::resolve_payloads(
            &mut store,
            &authored,
            &self.resolvers,
            &self.config.layout_dir,
            &mut transfers,
        )?;

        let mut facades = chain::build_facades(&store)?;
        chain::process_packages(&mut store, &mut facades)?;

        // Package processing may have generated payload rows (harvested
        // external files); resolve those in a second pass.
        let generated: Vec<String> = store
            .payloads
            .iter()
            .skip(authored.len())
            .map(|p| p.id.clone())
            .collect();
        if !generated.is_empty() {
            payload::resolve_payloads(
                &mut store,
                &generated,
                &self.resolvers,
                &self.config.layout_dir,
                &mut transfers,
            )?;
        }
        chain::resolve_package_metadata(&store, &mut facades)?;

        let ux_order = payload::assign_embedded_ids(&mut store, &mut diagnostics)?;
        chain::slipstream::resolve_slipstreams(&mut store, &facades)?;

        let ordered = ordering::order_chain(&store, &mut facades, &mut diagnostics)?;
        dependency::resolve_providers(&store, &mut facades, &mut diagnostics)?;
        dependency::resolve_bundle_provider_key(&mut store);
        chain::resolve_install_scope(&mut store, &mut facades, &ordered.packages, &mut diagnostics)?;
        let searches = search::order_searches(&store)?;

        for extension in &mut self.extensions {
            debug!("finishing extension '{}'", extension.name());
            extension.finish(&mut store, &mut diagnostics)?;
        }

        if let Err(Error::InvalidVersion { authored, detail }) =
            VersionQuad::parse(&store.bundle.version)
        {
            diagnostics.error(ValidationError::InvalidVersion { authored, detail });
        }

        // Nothing irreversible has happened yet; stop here on any recorded error.
        diagnostics.checkpoint()?;
        let version = VersionQuad::parse(&store.bundle.version)?;

        let plans = container::build_plans(&store, &self.config.work_dir, &mut diagnostics)?;
        container::pack_containers(
            &mut store,
            plans,
            self.config.compression,
            &self.config.layout_dir,
            &mut transfers,
        )?;

        let manifest_path = self.config.work_dir.join(MANIFEST_FILE_NAME);
        manifest::write_manifest(&mut store, &facades, &ordered, &searches, &manifest_path)?;
        let ux_path = container::pack_ux_container(
            &mut store,
            &ux_order,
            &manifest_path,
            &self.config.work_dir,
            self.config.compression,
        )?;

        diagnostics.checkpoint()?;

        let bundle_name = self
            .config
            .output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle.exe".to_string());
        let attached: Vec<(u32, PathBuf)> = store
            .containers
            .iter()
            .filter(|c| c.id != UX_CONTAINER_ID && c.container_type == ContainerType::Attached)
            .filter_map(|c| match (c.attached_index, &c.work_path) {
                (Some(index), Some(path)) => Some((index, path.clone())),
                _ => None,
            })
            .collect();

        let work_bundle = self.config.work_dir.join(&bundle_name);
        let mut assembler = BundleAssembler::new(&self.config.stub_path, &work_bundle)?;
        assembler.patch_resources(&store.bundle, version, &bundle_name)?;
        assembler.initialize_section(bundle_id, 1 + attached.len() as u32)?;
        assembler.attach_ux(&ux_path)?;
        assembler.attach_others(&attached)?;
        let assembled = assembler.finish()?;
        info!("bundle assembled at {}", assembled.display());

        if let Some(transfer) =
            FileTransfer::create(assembled, self.config.output_path.clone(), true)
        {
            transfers.push(transfer);
        }

        let content_paths: Vec<PathBuf> = store
            .payloads
            .iter()
            .filter(|p| p.content_file)
            .filter_map(|p| p.resolved_source.clone())
            .collect();

        Ok(BindResult {
            transfers,
            content_paths,
            warnings: diagnostics.into_warnings(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_uuid_bundle_id_fails_before_any_stage() {
        let store = RecordStore::from_json(
            r#"{
                "bundle": [{"id": "not-a-uuid", "name": "Demo", "version": "1.0"}],
                "chain": [{"id": "BundleChain"}],
                "bootstrap_application": [{"id": "Ba", "payload": "BaPayload"}],
                "payloads": [{"id": "BaPayload", "name": "ba.dll", "source": "ba.dll"}],
                "packages": [{"id": "A", "type": "exe", "payload": "BaPayload"}],
                "groups": [{"parent_type": "package_group", "parent_id": "BundleChain",
                            "child_type": "package", "child_id": "A"}]
            }"#,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let binder = Binder::new(BindConfig {
            output_path: dir.path().join("out/demo.exe"),
            work_dir: dir.path().join("work"),
            layout_dir: dir.path().join("out"),
            stub_path: dir.path().join("stub.exe"),
            bind_paths: vec![dir.path().to_path_buf()],
            compression: CompressionLevel::Medium,
        });

        assert!(matches!(
            binder.bind(store),
            Err(Error::InvalidBundleId(id)) if id == "not-a-uuid"
        ));
    }
}
