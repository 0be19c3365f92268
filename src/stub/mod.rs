// src/stub/mod.rs
//! Bundle binary assembly
//!
//! The shipped bundle is the stub engine executable with the container
//! archives appended after it. The stub reserves a marker-anchored "bundle
//! section" whose slot table records where each attached container lives;
//! the runtime engine scans for the same marker to find its containers.
//! Assembly is a strict state machine: copy the stub, patch its resources,
//! initialize the section, attach the UX container, attach the rest. Any
//! call out of order is a programmer error and fails without touching the
//! file further.

pub mod resource;

use crate::error::{Error, Result};
use crate::store::rows::BundleRow;
use crate::version::VersionQuad;
use resource::{StubResourceWriter, apply_bundle_resources};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Magic anchoring the bundle section inside the stub
const SECTION_MAGIC: &[u8] = b".balesec";
/// Section layout revision the runtime engine and this writer agree on
const SECTION_FORMAT_VERSION: u32 = 2;
/// Fixed header bytes before the slot table
const SECTION_HEADER_LEN: usize = 48;
/// Bytes per slot table entry (offset + length)
const SLOT_ENTRY_LEN: usize = 16;

/// Locate a marker inside stub bytes
pub(crate) fn find_marker(data: &[u8], marker: &[u8]) -> Option<usize> {
    data.windows(marker.len()).position(|window| window == marker)
}

fn u32_at(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn u64_at(data: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes([
        data[pos],
        data[pos + 1],
        data[pos + 2],
        data[pos + 3],
        data[pos + 4],
        data[pos + 5],
        data[pos + 6],
        data[pos + 7],
    ])
}

/// Assembly progress; transitions are linear and enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    StubCopied,
    ResourcesPatched,
    SectionInitialized,
    UxAttached,
    OthersAttached,
    Done,
}

impl AssemblyState {
    fn name(self) -> &'static str {
        match self {
            Self::StubCopied => "StubCopied",
            Self::ResourcesPatched => "ResourcesPatched",
            Self::SectionInitialized => "SectionInitialized",
            Self::UxAttached => "UxAttached",
            Self::OthersAttached => "OthersAttached",
            Self::Done => "Done",
        }
    }
}

struct SectionHeader {
    offset: usize,
    slot_capacity: u32,
}

fn parse_section(data: &[u8], path: &Path) -> Result<SectionHeader> {
    let offset = find_marker(data, SECTION_MAGIC).ok_or_else(|| Error::MissingMarker {
        marker: ".balesec",
        path: path.to_path_buf(),
    })?;
    if data.len() < offset + SECTION_HEADER_LEN {
        return Err(Error::StubFormat("bundle section truncated".to_string()));
    }
    let format_version = u32_at(data, offset + 8);
    if format_version != SECTION_FORMAT_VERSION {
        return Err(Error::StubFormat(format!(
            "unsupported bundle section version {}",
            format_version
        )));
    }
    let slot_capacity = u32_at(data, offset + 12);
    let table_end = offset + SECTION_HEADER_LEN + slot_capacity as usize * SLOT_ENTRY_LEN;
    if data.len() < table_end {
        return Err(Error::StubFormat(
            "slot table extends past end of stub".to_string(),
        ));
    }
    Ok(SectionHeader {
        offset,
        slot_capacity,
    })
}

/// Builds the final bundle executable out of the stub and the packed containers
pub struct BundleAssembler {
    work_path: PathBuf,
    state: AssemblyState,
    file: Option<File>,
    section_offset: u64,
    slot_capacity: u32,
}

impl BundleAssembler {
    /// Copy the stub to a writable work path
    pub fn new(stub_path: &Path, work_path: &Path) -> Result<Self> {
        fs::copy(stub_path, work_path)?;
        let mut permissions = fs::metadata(work_path)?.permissions();
        if permissions.readonly() {
            permissions.set_readonly(false);
            fs::set_permissions(work_path, permissions)?;
        }
        debug!("stub copied to {}", work_path.display());
        Ok(Self {
            work_path: work_path.to_path_buf(),
            state: AssemblyState::StubCopied,
            file: None,
            section_offset: 0,
            slot_capacity: 0,
        })
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    fn expect(&self, expected: AssemblyState, requested: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::AssemblyOrder {
                requested,
                expected: expected.name(),
                actual: self.state.name(),
            })
        }
    }

    /// Write version numbers, branding strings, and images into the stub
    pub fn patch_resources(
        &mut self,
        bundle: &BundleRow,
        version: VersionQuad,
        original_filename: &str,
    ) -> Result<()> {
        self.expect(AssemblyState::StubCopied, "patch_resources")?;
        let mut writer = StubResourceWriter::open(&self.work_path)?;
        apply_bundle_resources(&mut writer, bundle, version, original_filename)?;
        self.state = AssemblyState::ResourcesPatched;
        Ok(())
    }

    /// Record the stub length and bundle identity in the bundle section
    ///
    /// The stub length is measured here, after the resource patch, since
    /// that patch may have grown the file.
    pub fn initialize_section(&mut self, bundle_id: Uuid, container_count: u32) -> Result<()> {
        self.expect(AssemblyState::ResourcesPatched, "initialize_section")?;
        let data = fs::read(&self.work_path)?;
        let header = parse_section(&data, &self.work_path)?;
        if container_count > header.slot_capacity {
            return Err(Error::SlotCapacity {
                capacity: header.slot_capacity,
            });
        }

        let stub_len = data.len() as u64;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.work_path)?;
        file.seek(SeekFrom::Start(header.offset as u64 + 16))?;
        file.write_all(&stub_len.to_le_bytes())?;
        file.write_all(bundle_id.as_bytes())?;
        file.write_all(&container_count.to_le_bytes())?;
        file.write_all(&0u32.to_le_bytes())?;
        // Zero the whole table so unused slots read back empty.
        file.write_all(&vec![0u8; header.slot_capacity as usize * SLOT_ENTRY_LEN])?;

        self.file = Some(file);
        self.section_offset = header.offset as u64;
        self.slot_capacity = header.slot_capacity;
        self.state = AssemblyState::SectionInitialized;
        info!(
            "bundle section initialized (stub {} bytes, {} containers)",
            stub_len, container_count
        );
        Ok(())
    }

    /// Append the UX container; it always occupies slot 0
    pub fn attach_ux(&mut self, container: &Path) -> Result<()> {
        self.expect(AssemblyState::SectionInitialized, "attach_ux")?;
        self.append_slot(0, container)?;
        self.state = AssemblyState::UxAttached;
        Ok(())
    }

    /// Append the remaining attached containers at their assigned slots
    pub fn attach_others(&mut self, containers: &[(u32, PathBuf)]) -> Result<()> {
        self.expect(AssemblyState::UxAttached, "attach_others")?;
        for (slot, path) in containers {
            self.append_slot(*slot, path)?;
        }
        self.state = AssemblyState::OthersAttached;
        Ok(())
    }

    fn append_slot(&mut self, slot: u32, source: &Path) -> Result<()> {
        if slot >= self.slot_capacity {
            return Err(Error::SlotCapacity {
                capacity: self.slot_capacity,
            });
        }
        let Some(file) = self.file.as_mut() else {
            return Err(Error::AssemblyOrder {
                requested: "append_slot",
                expected: AssemblyState::SectionInitialized.name(),
                actual: self.state.name(),
            });
        };

        let offset = file.seek(SeekFrom::End(0))?;
        let mut reader = File::open(source)?;
        let length = io::copy(&mut reader, file)?;

        let entry_at =
            self.section_offset + SECTION_HEADER_LEN as u64 + slot as u64 * SLOT_ENTRY_LEN as u64;
        file.seek(SeekFrom::Start(entry_at))?;
        file.write_all(&offset.to_le_bytes())?;
        file.write_all(&length.to_le_bytes())?;
        debug!("container attached at slot {} ({} bytes)", slot, length);
        Ok(())
    }

    /// Flush and hand back the assembled bundle path
    pub fn finish(mut self) -> Result<PathBuf> {
        self.expect(AssemblyState::OthersAttached, "finish")?;
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        self.state = AssemblyState::Done;
        Ok(self.work_path)
    }
}

/// One attached container's location inside the bundle file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSlot {
    pub offset: u64,
    pub length: u64,
}

/// Bundle section read back from an assembled (or stub) file
#[derive(Debug)]
pub struct SectionSummary {
    pub format_version: u32,
    pub slot_capacity: u32,
    pub stub_len: u64,
    pub bundle_id: Uuid,
    pub container_count: u32,
    /// Filled slots in attach order; index 0 is the UX container
    pub slots: Vec<ContainerSlot>,
}

/// Read the bundle section out of a file
pub fn read_section(path: &Path) -> Result<SectionSummary> {
    let data = fs::read(path)?;
    let header = parse_section(&data, path)?;
    let offset = header.offset;

    let mut bundle_id = [0u8; 16];
    bundle_id.copy_from_slice(&data[offset + 24..offset + 40]);
    let container_count = u32_at(&data, offset + 40);

    let mut slots = Vec::new();
    for slot in 0..container_count.min(header.slot_capacity) {
        let entry_at = offset + SECTION_HEADER_LEN + slot as usize * SLOT_ENTRY_LEN;
        slots.push(ContainerSlot {
            offset: u64_at(&data, entry_at),
            length: u64_at(&data, entry_at + 8),
        });
    }

    Ok(SectionSummary {
        format_version: u32_at(&data, offset + 8),
        slot_capacity: header.slot_capacity,
        stub_len: u64_at(&data, offset + 16),
        bundle_id: Uuid::from_bytes(bundle_id),
        container_count,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE_ID: &str = "7d3fbe04-9f3b-4f52-bd0c-8c3a9b76f14e";

    /// Build a stub with both marker regions and a slot table of the given capacity
    fn synth_stub(dir: &Path, slot_capacity: u32) -> PathBuf {
        let mut data = Vec::new();
        data.extend_from_slice(b"MZ fake stub code ");
        data.extend_from_slice(resource::RESOURCE_MAGIC);
        // Empty resource block: two version quads, no strings, no images.
        data.extend_from_slice(&28u64.to_le_bytes());
        data.extend_from_slice(&[0u8; 28]);
        data.extend_from_slice(b" more code ");
        data.extend_from_slice(SECTION_MAGIC);
        data.extend_from_slice(&SECTION_FORMAT_VERSION.to_le_bytes());
        data.extend_from_slice(&slot_capacity.to_le_bytes());
        data.extend_from_slice(&[0u8; 8 + 16 + 4 + 4]);
        data.extend_from_slice(&vec![0u8; slot_capacity as usize * SLOT_ENTRY_LEN]);
        data.extend_from_slice(b" trailing code");
        let path = dir.join("stub.exe");
        fs::write(&path, data).unwrap();
        path
    }

    fn demo_bundle() -> BundleRow {
        serde_json::from_str(
            r#"{"id": "7d3fbe04-9f3b-4f52-bd0c-8c3a9b76f14e",
                 "name": "Demo Suite", "version": "1.2.3.4"}"#,
        )
        .unwrap()
    }

    #[test]
    fn full_assembly_walk_records_every_slot() {
        let dir = tempfile::tempdir().unwrap();
        let stub = synth_stub(dir.path(), 4);
        let ux = dir.path().join("ux.zip");
        fs::write(&ux, b"ux container bytes").unwrap();
        let extra = dir.path().join("extra.zip");
        fs::write(&extra, b"attached extra").unwrap();

        let work = dir.path().join("bundle.exe");
        let mut assembler = BundleAssembler::new(&stub, &work).unwrap();
        assembler
            .patch_resources(&demo_bundle(), VersionQuad::parse("1.2.3.4").unwrap(), "demo.exe")
            .unwrap();
        assembler
            .initialize_section(Uuid::parse_str(BUNDLE_ID).unwrap(), 2)
            .unwrap();
        let stub_len = fs::metadata(&work).unwrap().len();
        assembler.attach_ux(&ux).unwrap();
        assembler.attach_others(&[(1, extra.clone())]).unwrap();
        let bundle = assembler.finish().unwrap();

        let section = read_section(&bundle).unwrap();
        assert_eq!(section.bundle_id, Uuid::parse_str(BUNDLE_ID).unwrap());
        assert_eq!(section.container_count, 2);
        assert_eq!(section.stub_len, stub_len);
        assert_eq!(section.slots[0].offset, stub_len);
        assert_eq!(section.slots[0].length, b"ux container bytes".len() as u64);
        assert_eq!(
            section.slots[1].offset,
            section.slots[0].offset + section.slots[0].length
        );

        let data = fs::read(&bundle).unwrap();
        let ux_start = section.slots[0].offset as usize;
        let ux_end = ux_start + section.slots[0].length as usize;
        assert_eq!(&data[ux_start..ux_end], b"ux container bytes");
        assert!(data.ends_with(b"attached extra"));
    }

    #[test]
    fn out_of_order_stage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let stub = synth_stub(dir.path(), 2);
        let work = dir.path().join("bundle.exe");
        let mut assembler = BundleAssembler::new(&stub, &work).unwrap();

        match assembler.initialize_section(Uuid::parse_str(BUNDLE_ID).unwrap(), 1) {
            Err(Error::AssemblyOrder {
                requested, actual, ..
            }) => {
                assert_eq!(requested, "initialize_section");
                assert_eq!(actual, "StubCopied");
            }
            other => panic!("expected AssemblyOrder, got {:?}", other),
        }
    }

    #[test]
    fn container_count_over_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let stub = synth_stub(dir.path(), 2);
        let work = dir.path().join("bundle.exe");
        let mut assembler = BundleAssembler::new(&stub, &work).unwrap();
        assembler
            .patch_resources(&demo_bundle(), VersionQuad::parse("1.0").unwrap(), "demo.exe")
            .unwrap();

        assert!(matches!(
            assembler.initialize_section(Uuid::parse_str(BUNDLE_ID).unwrap(), 3),
            Err(Error::SlotCapacity { capacity: 2 })
        ));
    }

    #[test]
    fn stub_without_section_marker_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub.exe");
        let mut data = Vec::new();
        data.extend_from_slice(resource::RESOURCE_MAGIC);
        data.extend_from_slice(&28u64.to_le_bytes());
        data.extend_from_slice(&[0u8; 28]);
        fs::write(&path, data).unwrap();

        let work = dir.path().join("bundle.exe");
        let mut assembler = BundleAssembler::new(&path, &work).unwrap();
        assembler
            .patch_resources(&demo_bundle(), VersionQuad::parse("1.0").unwrap(), "demo.exe")
            .unwrap();

        match assembler.initialize_section(Uuid::parse_str(BUNDLE_ID).unwrap(), 1) {
            Err(Error::MissingMarker { marker, .. }) => assert_eq!(marker, ".balesec"),
            other => panic!("expected MissingMarker, got {:?}", other),
        }
    }

    #[test]
    fn resource_growth_moves_the_section_and_assembly_still_works() {
        let dir = tempfile::tempdir().unwrap();
        let stub = synth_stub(dir.path(), 2);
        let ux = dir.path().join("ux.zip");
        fs::write(&ux, b"ux").unwrap();

        let mut bundle_row = demo_bundle();
        bundle_row.copyright = Some("Copyright (c) Demo Corp, all rights reserved".to_string());

        let work = dir.path().join("bundle.exe");
        let original_len = fs::metadata(&stub).unwrap().len();
        let mut assembler = BundleAssembler::new(&stub, &work).unwrap();
        assembler
            .patch_resources(&bundle_row, VersionQuad::parse("2.0").unwrap(), "demo.exe")
            .unwrap();
        let patched_len = fs::metadata(&work).unwrap().len();
        assert!(patched_len > original_len, "resource block should grow");

        assembler
            .initialize_section(Uuid::parse_str(BUNDLE_ID).unwrap(), 1)
            .unwrap();
        assembler.attach_ux(&ux).unwrap();
        assembler.attach_others(&[]).unwrap();
        let bundle = assembler.finish().unwrap();

        let section = read_section(&bundle).unwrap();
        assert_eq!(section.stub_len, patched_len);
        assert_eq!(section.slots[0].offset, patched_len);
    }
}
