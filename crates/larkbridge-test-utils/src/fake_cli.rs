// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fake CLI binaries for subprocess tests.
//!
//! Writes a small shell script that drains stdin (mirroring the real
//! CLI's wait-for-EOF behavior) and then runs the given body, typically a
//! series of `printf` lines emitting scripted NDJSON.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::TempDir;

/// A fake CLI on disk; deleted when dropped.
pub struct FakeCli {
    _dir: TempDir,
    path: std::path::PathBuf,
}

impl FakeCli {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Writes an executable `fake-claude` script whose stdout is `body`.
///
/// Panics on IO errors; this is test scaffolding.
pub fn fake_cli(body: &str) -> FakeCli {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("fake-claude");
    let script = format!("#!/bin/sh\ncat >/dev/null\n{body}\n");
    fs::write(&path, script).expect("write fake cli script");

    let mut perms = fs::metadata(&path).expect("stat fake cli").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod fake cli");

    FakeCli { _dir: dir, path }
}

/// Builds a `printf` line emitting one NDJSON event.
pub fn emit_line(json: &str) -> String {
    assert!(
        !json.contains('\''),
        "scripted NDJSON must not contain single quotes"
    );
    format!("printf '%s\\n' '{json}'")
}
