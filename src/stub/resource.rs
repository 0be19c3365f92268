// src/stub/resource.rs
//! Stub resource block
//!
//! The stub executable reserves a marker-anchored block holding the version
//! numbers, branding strings, and optional icon/splash images that shell
//! surfaces read off the installed bundle. Strings serialize in first-set
//! key order and re-setting a key overwrites in place, so the block bytes
//! are a pure function of the calls made against it. The block grows when
//! values are set, so saving splices the stub file around it instead of
//! patching in place.

use crate::error::{Error, Result};
use crate::store::rows::BundleRow;
use crate::version::VersionQuad;
use std::fs;
use std::path::{Path, PathBuf};

use super::find_marker;

/// Magic anchoring the resource block inside the stub
pub(crate) const RESOURCE_MAGIC: &[u8] = b".balersc";

/// Mutable view of a stub's resource block
pub trait ResourceWriter {
    fn set_versions(&mut self, file: VersionQuad, product: VersionQuad);
    fn set_string(&mut self, key: &str, value: &str);
    fn set_icon(&mut self, bytes: Vec<u8>);
    fn set_splash(&mut self, bytes: Vec<u8>);
    fn save(&mut self) -> Result<()>;
}

/// Write the bundle's registration strings and images into a resource block
pub fn apply_bundle_resources(
    writer: &mut dyn ResourceWriter,
    bundle: &BundleRow,
    version: VersionQuad,
    original_filename: &str,
) -> Result<()> {
    writer.set_versions(version, version);
    if let Some(copyright) = &bundle.copyright {
        writer.set_string("LegalCopyright", copyright);
    }
    writer.set_string("OriginalFilename", original_filename);
    let normalized = version.to_string();
    writer.set_string("FileVersion", &normalized);
    writer.set_string("ProductVersion", &normalized);
    writer.set_string("ProductName", &bundle.name);
    writer.set_string("FileDescription", &bundle.name);
    if let Some(manufacturer) = &bundle.manufacturer {
        writer.set_string("CompanyName", manufacturer);
    }
    if let Some(icon) = &bundle.icon {
        writer.set_icon(fs::read(icon)?);
    }
    if let Some(splash) = &bundle.splash_screen {
        writer.set_splash(fs::read(splash)?);
    }
    writer.save()
}

/// Parsed resource block contents
#[derive(Debug, Default, PartialEq, Eq)]
struct ResourceBlock {
    file_version: [u16; 4],
    product_version: [u16; 4],
    strings: Vec<(String, String)>,
    icon: Vec<u8>,
    splash: Vec<u8>,
}

impl ResourceBlock {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BlockReader { data, pos: 0 };
        let mut file_version = [0u16; 4];
        for component in &mut file_version {
            *component = reader.u16()?;
        }
        let mut product_version = [0u16; 4];
        for component in &mut product_version {
            *component = reader.u16()?;
        }

        let string_count = reader.u32()?;
        let mut strings = Vec::with_capacity(string_count as usize);
        for _ in 0..string_count {
            let key_len = reader.u16()? as usize;
            let key = reader.string(key_len)?;
            let value_len = reader.u32()? as usize;
            let value = reader.string(value_len)?;
            strings.push((key, value));
        }

        let icon_len = reader.u32()? as usize;
        let icon = reader.take(icon_len)?.to_vec();
        let splash_len = reader.u32()? as usize;
        let splash = reader.take(splash_len)?.to_vec();

        Ok(Self {
            file_version,
            product_version,
            strings,
            icon,
            splash,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for component in self.file_version {
            out.extend_from_slice(&component.to_le_bytes());
        }
        for component in self.product_version {
            out.extend_from_slice(&component.to_le_bytes());
        }
        out.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        for (key, value) in &self.strings {
            out.extend_from_slice(&(key.len() as u16).to_le_bytes());
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(&(value.len() as u32).to_le_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        out.extend_from_slice(&(self.icon.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.icon);
        out.extend_from_slice(&(self.splash.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.splash);
        out
    }

    fn set_string(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.strings.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.strings.push((key.to_string(), value.to_string()));
        }
    }
}

struct BlockReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BlockReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::StubFormat("resource block truncated".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::StubFormat("resource string is not utf-8".to_string()))
    }
}

/// Resource block editor backed by the stub file on disk
#[derive(Debug)]
pub struct StubResourceWriter {
    path: PathBuf,
    /// Stub bytes up to and including the resource magic
    prefix: Vec<u8>,
    /// Stub bytes after the block
    suffix: Vec<u8>,
    block: ResourceBlock,
}

impl StubResourceWriter {
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let magic_at = find_marker(&data, RESOURCE_MAGIC).ok_or_else(|| Error::MissingMarker {
            marker: ".balersc",
            path: path.to_path_buf(),
        })?;
        let length_at = magic_at + RESOURCE_MAGIC.len();
        let block_at = length_at + 8;
        if data.len() < block_at {
            return Err(Error::StubFormat(
                "resource block length prefix truncated".to_string(),
            ));
        }
        let mut length_bytes = [0u8; 8];
        length_bytes.copy_from_slice(&data[length_at..block_at]);
        let block_len = u64::from_le_bytes(length_bytes) as usize;
        let block_end = block_at
            .checked_add(block_len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                Error::StubFormat("resource block extends past end of stub".to_string())
            })?;
        let block = ResourceBlock::parse(&data[block_at..block_end])?;

        Ok(Self {
            path: path.to_path_buf(),
            prefix: data[..length_at].to_vec(),
            suffix: data[block_end..].to_vec(),
            block,
        })
    }
}

impl ResourceWriter for StubResourceWriter {
    fn set_versions(&mut self, file: VersionQuad, product: VersionQuad) {
        self.block.file_version = file.components();
        self.block.product_version = product.components();
    }

    fn set_string(&mut self, key: &str, value: &str) {
        self.block.set_string(key, value);
    }

    fn set_icon(&mut self, bytes: Vec<u8>) {
        self.block.icon = bytes;
    }

    fn set_splash(&mut self, bytes: Vec<u8>) {
        self.block.splash = bytes;
    }

    fn save(&mut self) -> Result<()> {
        let block = self.block.serialize();
        let mut out =
            Vec::with_capacity(self.prefix.len() + 8 + block.len() + self.suffix.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(&(block.len() as u64).to_le_bytes());
        out.extend_from_slice(&block);
        out.extend_from_slice(&self.suffix);
        fs::write(&self.path, out)?;
        Ok(())
    }
}
