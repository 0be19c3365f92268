// src/commands.rs
//! Command handlers for the bale CLI

use anyhow::{Context, Result};
use bale::binder::{BindConfig, Binder};
use bale::container::CompressionLevel;
use bale::manifest::MANIFEST_ENTRY_NAME;
use bale::store::RecordStore;
use bale::stub::read_section;
use bale::transfer::apply_transfers;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::info;

/// Bind an intermediate-representation document into a bundle executable
pub fn build(
    ir: &Path,
    stub: &Path,
    output: &Path,
    work_dir: Option<PathBuf>,
    layout: Option<PathBuf>,
    compression: CompressionLevel,
    mut bind_paths: Vec<PathBuf>,
) -> Result<()> {
    let store =
        RecordStore::load(ir).with_context(|| format!("loading {}", ir.display()))?;

    // The guard must outlive the bind so the scratch directory survives until
    // the transfers out of it have been applied.
    let mut scratch: Option<tempfile::TempDir> = None;
    let work_dir = match work_dir {
        Some(dir) => dir,
        None => {
            let dir = tempfile::tempdir().context("creating working directory")?;
            let path = dir.path().to_path_buf();
            scratch = Some(dir);
            path
        }
    };

    let layout_dir = match layout {
        Some(dir) => dir,
        None => match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };

    // Sources resolve against the explicit bind paths first, then the
    // document's directory, then the current directory.
    if let Some(parent) = ir.parent() {
        if !parent.as_os_str().is_empty() {
            bind_paths.push(parent.to_path_buf());
        }
    }
    bind_paths.push(PathBuf::from("."));

    let config = BindConfig {
        output_path: output.to_path_buf(),
        work_dir,
        layout_dir,
        stub_path: stub.to_path_buf(),
        bind_paths,
        compression,
    };

    let result = Binder::new(config).bind(store).context("bind failed")?;
    apply_transfers(&result.transfers).context("applying file transfers")?;
    drop(scratch);

    info!("bundle written to {}", output.display());
    println!("Bundle written to: {}", output.display());
    if !result.warnings.is_empty() {
        println!("  Warnings: {}", result.warnings.len());
    }
    for path in &result.content_paths {
        println!("  Content file: {}", path.display());
    }

    Ok(())
}

/// Read back the bundle section of an assembled bundle and print it
pub fn inspect(bundle: &Path, manifest: bool) -> Result<()> {
    let section = read_section(bundle)
        .with_context(|| format!("reading bundle section of {}", bundle.display()))?;

    println!("Bundle: {}", bundle.display());
    println!("  Id: {}", section.bundle_id);
    println!("  Format version: {}", section.format_version);
    println!("  Stub length: {} bytes", section.stub_len);
    println!(
        "  Containers: {} attached, {} slots",
        section.container_count, section.slot_capacity
    );
    for (index, slot) in section.slots.iter().enumerate() {
        let role = if index == 0 { " (UX)" } else { "" };
        println!(
            "    [{}] offset {} length {}{}",
            index, slot.offset, slot.length, role
        );
    }

    if manifest {
        let ux = section
            .slots
            .first()
            .ok_or_else(|| anyhow::anyhow!("bundle has no attached UX container"))?;

        let mut file = File::open(bundle)?;
        file.seek(SeekFrom::Start(ux.offset))?;
        let mut bytes = vec![0u8; ux.length as usize];
        file.read_exact(&mut bytes)?;

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .context("opening UX container archive")?;
        let mut entry = archive
            .by_name(MANIFEST_ENTRY_NAME)
            .context("UX container has no manifest entry")?;
        let mut document = String::new();
        entry.read_to_string(&mut document)?;
        print!("{document}");
    }

    Ok(())
}

/// Generate shell completions on stdout
pub fn completions(shell: Shell) {
    let mut cmd = crate::cli::Cli::command();
    generate(shell, &mut cmd, "bale", &mut std::io::stdout());
}
