// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

pub const BUNDLE_ID: &str = "5c7a1b3e-2f64-4d9a-9e3b-1a8f0c2d4e5f";

/// Build a fake stub executable carrying both marker regions: an empty
/// version-resource block and a bundle section with the given slot capacity.
pub fn synth_stub(dir: &Path, slot_capacity: u32) -> PathBuf {
    let mut data = Vec::new();
    data.extend_from_slice(b"MZ fake stub code ");

    // Resource region: marker, block length, empty block (two version
    // quads, zero strings, no icon, no splash).
    data.extend_from_slice(b".balersc");
    data.extend_from_slice(&28u64.to_le_bytes());
    data.extend_from_slice(&[0u8; 28]);

    data.extend_from_slice(b" more code ");

    // Section region: marker, format version, capacity, zeroed header
    // tail (stub length, bundle id, count, reserved) and the slot table.
    data.extend_from_slice(b".balesec");
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&slot_capacity.to_le_bytes());
    data.extend_from_slice(&[0u8; 8 + 16 + 4 + 4]);
    data.extend_from_slice(&vec![0u8; slot_capacity as usize * 16]);

    data.extend_from_slice(b" trailing code");

    let path = dir.join("stub.exe");
    fs::write(&path, data).unwrap();
    path
}

/// Write a payload source file under `dir`
pub fn write_source(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// IR document for a bundle with one Exe package and an authored provider
pub fn single_exe_document() -> String {
    format!(
        r#"{{
            "bundle": [{{"id": "{BUNDLE_ID}", "name": "Demo Suite",
                         "version": "1.2.3", "manufacturer": "Demo Corp",
                         "upgrade_code": "{{11111111-2222-3333-4444-555555555555}}"}}],
            "chain": [{{"id": "BundleChain"}}],
            "bootstrap_application": [{{"id": "Ba", "payload": "BaPayload"}}],
            "payloads": [
                {{"id": "BaPayload", "name": "ba.dll", "source": "ba.dll"}},
                {{"id": "SetupPayload", "name": "setup.exe", "source": "setup.exe"}}
            ],
            "packages": [
                {{"id": "Setup", "type": "exe", "payload": "SetupPayload",
                  "version": "3.1"}}
            ],
            "exe_packages": [
                {{"id": "Setup", "install_command": "/install",
                  "uninstall_command": "/uninstall"}}
            ],
            "providers": [
                {{"id": "SetupProvider", "package": "Setup",
                  "key": "demo.setup", "version": "3.1"}}
            ],
            "groups": [
                {{"parent_type": "package_group", "parent_id": "BundleChain",
                  "child_type": "package", "child_id": "Setup"}},
                {{"parent_type": "package", "parent_id": "Setup",
                  "child_type": "payload", "child_id": "SetupPayload"}}
            ]
        }}"#
    )
}

/// IR document with two Msi packages split by a rollback boundary; neither
/// package authors a provider row, so both keys are synthesized.
pub fn two_msi_document() -> String {
    format!(
        r#"{{
            "bundle": [{{"id": "{BUNDLE_ID}", "name": "Patch Train",
                         "version": "2.0"}}],
            "chain": [{{"id": "BundleChain"}}],
            "bootstrap_application": [{{"id": "Ba", "payload": "BaPayload"}}],
            "payloads": [
                {{"id": "BaPayload", "name": "ba.dll", "source": "ba.dll"}},
                {{"id": "FirstPayload", "name": "first.msi", "source": "first.msi"}},
                {{"id": "SecondPayload", "name": "second.msi", "source": "second.msi"}}
            ],
            "packages": [
                {{"id": "First", "type": "msi", "payload": "FirstPayload"}},
                {{"id": "Second", "type": "msi", "payload": "SecondPayload"}}
            ],
            "msi_packages": [
                {{"id": "First", "product_code": "{{AAAA0000-0000-0000-0000-000000000001}}",
                  "product_version": "1.0.0"}},
                {{"id": "Second", "product_code": "{{AAAA0000-0000-0000-0000-000000000002}}",
                  "product_version": "2.0.0"}}
            ],
            "boundaries": [{{"id": "PatchBoundary"}}],
            "groups": [
                {{"parent_type": "package_group", "parent_id": "BundleChain",
                  "child_type": "package", "child_id": "First"}},
                {{"parent_type": "package_group", "parent_id": "BundleChain",
                  "child_type": "boundary", "child_id": "PatchBoundary"}},
                {{"parent_type": "package_group", "parent_id": "BundleChain",
                  "child_type": "package", "child_id": "Second"}},
                {{"parent_type": "package", "parent_id": "First",
                  "child_type": "payload", "child_id": "FirstPayload"}},
                {{"parent_type": "package", "parent_id": "Second",
                  "child_type": "payload", "child_id": "SecondPayload"}}
            ]
        }}"#
    )
}
