// src/transfer.rs
//! File transfers scheduled by a bind
//!
//! Stages never write into the final layout directly; they schedule
//! transfers and the caller applies them after the bind succeeds. Built
//! artifacts (containers, the bundle itself) are moved out of the working
//! directory; authored sources are copied and left in place.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Built artifacts are moved; authored files are copied
    pub built: bool,
}

impl FileTransfer {
    /// Schedule a transfer, eliding it when source and destination are the same file
    pub fn create(source: PathBuf, destination: PathBuf, built: bool) -> Option<Self> {
        let src = absolute_or_raw(&source);
        let dst = absolute_or_raw(&destination);
        if src == dst {
            return None;
        }
        Some(Self {
            source,
            destination,
            built,
        })
    }

    /// Copy or move this transfer into place
    pub fn apply(&self) -> Result<()> {
        if let Some(parent) = self.destination.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.destination.exists() {
            fs::remove_file(&self.destination)?;
        }
        if self.built {
            // Renames fail across filesystems; fall back to copy + remove.
            if fs::rename(&self.source, &self.destination).is_err() {
                fs::copy(&self.source, &self.destination)?;
                fs::remove_file(&self.source)?;
            }
            debug!(
                "moved {} -> {}",
                self.source.display(),
                self.destination.display()
            );
        } else {
            fs::copy(&self.source, &self.destination)?;
            debug!(
                "copied {} -> {}",
                self.source.display(),
                self.destination.display()
            );
        }
        Ok(())
    }
}

fn absolute_or_raw(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Apply every transfer in order
pub fn apply_transfers(transfers: &[FileTransfer]) -> Result<()> {
    for transfer in transfers {
        transfer.apply()?;
    }
    info!("applied {} file transfer(s)", transfers.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_endpoints_are_elided() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("same.bin");
        assert!(FileTransfer::create(path.clone(), path, true).is_none());
    }

    #[test]
    fn built_transfer_moves_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("work/container.zip");
        let dst = dir.path().join("layout/container.zip");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, b"archive").unwrap();

        let transfer = FileTransfer::create(src.clone(), dst.clone(), true).unwrap();
        transfer.apply().unwrap();

        assert!(!src.exists(), "built transfer should move the file");
        assert_eq!(fs::read(&dst).unwrap(), b"archive");
    }

    #[test]
    fn unbuilt_transfer_copies_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("payload.bin");
        let dst = dir.path().join("layout/payload.bin");
        fs::write(&src, b"payload").unwrap();

        let transfer = FileTransfer::create(src.clone(), dst.clone(), false).unwrap();
        transfer.apply().unwrap();

        assert!(src.exists(), "unbuilt transfer should leave the source");
        assert_eq!(fs::read(&dst).unwrap(), b"payload");
    }
}
