// SPDX-FileCopyrightText: 2026 Larkbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent chat->project-directory bindings.
//!
//! The store is a small JSON file (`{"bindings": {"<chat_id>": "<path>"}}`)
//! written atomically (tmp file + rename) so a crash mid-save can never
//! leave a truncated file. Bound paths are validated to exist and be
//! directories at bind time, then stored canonicalized and absolute.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use larkbridge_core::BridgeError;

/// On-disk shape of the bindings file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BindingFile {
    #[serde(default)]
    bindings: HashMap<String, String>,
}

/// Persistent map from chat id to an absolute project directory, plus the
/// base directory scanned by the `ls` command.
#[derive(Debug)]
pub struct BindingStore {
    path: PathBuf,
    base_dir: PathBuf,
    bindings: RwLock<HashMap<String, String>>,
}

impl BindingStore {
    /// Opens (or creates) the bindings file at `config_file`, expanding `~`.
    ///
    /// A missing file starts an empty store and is created on first save;
    /// an unreadable or malformed file is a startup error.
    pub fn open(config_file: &str, base_dir: &str) -> Result<Self, BridgeError> {
        let path = expand_path(config_file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BridgeError::Config(format!(
                    "failed to create binding store directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let bindings = match fs::read(&path) {
            Ok(bytes) => {
                let file: BindingFile = serde_json::from_slice(&bytes).map_err(|e| {
                    BridgeError::Config(format!(
                        "malformed binding store {}: {e}",
                        path.display()
                    ))
                })?;
                file.bindings
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(BridgeError::Config(format!(
                    "failed to read binding store {}: {e}",
                    path.display()
                )));
            }
        };

        info!(
            path = %path.display(),
            count = bindings.len(),
            "binding store loaded"
        );

        Ok(Self {
            path,
            base_dir: expand_path(base_dir),
            bindings: RwLock::new(bindings),
        })
    }

    /// Returns the bound project directory for a chat, if any.
    pub fn get(&self, chat_id: &str) -> Option<String> {
        self.bindings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(chat_id)
            .cloned()
    }

    /// Binds a chat to a project path and persists the store.
    ///
    /// The path has `~` expanded, must exist and be a directory, and is
    /// stored canonicalized. Returns the stored absolute path.
    pub fn bind(&self, chat_id: &str, raw_path: &str) -> Result<String, BridgeError> {
        let expanded = expand_path(raw_path);

        let meta = fs::metadata(&expanded).map_err(|_| {
            BridgeError::Binding(format!(
                "path does not exist or is not a directory: {raw_path}"
            ))
        })?;
        if !meta.is_dir() {
            return Err(BridgeError::Binding(format!(
                "path does not exist or is not a directory: {raw_path}"
            )));
        }

        let absolute = fs::canonicalize(&expanded).map_err(|e| {
            BridgeError::Binding(format!("cannot resolve path {raw_path}: {e}"))
        })?;
        let stored = absolute.to_string_lossy().into_owned();

        {
            let mut map = self.bindings.write().unwrap_or_else(|e| e.into_inner());
            map.insert(chat_id.to_string(), stored.clone());
        }
        self.save()?;

        debug!(chat_id, path = stored.as_str(), "chat bound to project");
        Ok(stored)
    }

    /// Lists non-hidden immediate sub-directories of the base directory
    /// as full paths, sorted by name so `bind <N>` indexes are stable.
    ///
    /// A missing base directory yields an empty list rather than an error.
    pub fn list_projects(&self) -> Result<Vec<String>, BridgeError> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(BridgeError::Binding(format!(
                    "cannot read base directory {}: {e}",
                    self.base_dir.display()
                )));
            }
        };

        let mut projects = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                BridgeError::Binding(format!("cannot read directory entry: {e}"))
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            match entry.file_type() {
                Ok(ft) if ft.is_dir() => {
                    projects.push(self.base_dir.join(name.as_ref()).to_string_lossy().into_owned());
                }
                _ => {}
            }
        }
        projects.sort();
        Ok(projects)
    }

    /// The base directory scanned by [`list_projects`](Self::list_projects).
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Persists the current bindings atomically: serialize to a sibling
    /// tmp file, then rename over the real file.
    fn save(&self) -> Result<(), BridgeError> {
        let snapshot = {
            let map = self.bindings.read().unwrap_or_else(|e| e.into_inner());
            BindingFile {
                bindings: map.clone(),
            }
        };

        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| BridgeError::Internal(format!("failed to serialize bindings: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| {
            BridgeError::Binding(format!("failed to write {}: {e}", tmp.display()))
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            BridgeError::Binding(format!(
                "failed to replace {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(())
    }
}

/// Expands a leading `~` or `~/` to the user's home directory.
fn expand_path(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path, base: &Path) -> BindingStore {
        BindingStore::open(
            dir.join("projects.json").to_str().unwrap(),
            base.to_str().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn bind_stores_canonical_absolute_path() {
        let dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        let project = base.path().join("proj");
        fs::create_dir(&project).unwrap();

        let store = store_in(dir.path(), base.path());
        let stored = store.bind("oc_1", project.to_str().unwrap()).unwrap();

        assert!(Path::new(&stored).is_absolute());
        assert_eq!(store.get("oc_1").as_deref(), Some(stored.as_str()));
    }

    #[test]
    fn bind_rejects_missing_path() {
        let dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        let store = store_in(dir.path(), base.path());

        let err = store.bind("oc_1", "/nonexistent/surely").unwrap_err();
        assert!(matches!(err, BridgeError::Binding(_)));
        assert!(store.get("oc_1").is_none());
    }

    #[test]
    fn bind_rejects_file_path() {
        let dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        let file = base.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        let store = store_in(dir.path(), base.path());
        let err = store.bind("oc_1", file.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, BridgeError::Binding(_)));
    }

    #[test]
    fn bindings_survive_reload() {
        let dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        let project = base.path().join("proj");
        fs::create_dir(&project).unwrap();

        let stored = {
            let store = store_in(dir.path(), base.path());
            store.bind("oc_1", project.to_str().unwrap()).unwrap()
        };

        let reloaded = store_in(dir.path(), base.path());
        assert_eq!(reloaded.get("oc_1").as_deref(), Some(stored.as_str()));
    }

    #[test]
    fn save_leaves_no_tmp_file_behind() {
        let dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        let project = base.path().join("proj");
        fs::create_dir(&project).unwrap();

        let store = store_in(dir.path(), base.path());
        store.bind("oc_1", project.to_str().unwrap()).unwrap();

        assert!(dir.path().join("projects.json").exists());
        assert!(!dir.path().join("projects.json.tmp").exists());

        // The persisted file is complete, parseable JSON.
        let bytes = fs::read(dir.path().join("projects.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.get("bindings").is_some());
    }

    #[test]
    fn list_projects_sorted_and_skips_hidden() {
        let dir = tempdir().unwrap();
        let base = tempdir().unwrap();
        fs::create_dir(base.path().join("zebra")).unwrap();
        fs::create_dir(base.path().join("alpha")).unwrap();
        fs::create_dir(base.path().join(".hidden")).unwrap();
        fs::write(base.path().join("plain-file"), b"x").unwrap();

        let store = store_in(dir.path(), base.path());
        let projects = store.list_projects().unwrap();

        assert_eq!(projects.len(), 2);
        assert!(projects[0].ends_with("alpha"));
        assert!(projects[1].ends_with("zebra"));
    }

    #[test]
    fn list_projects_missing_base_is_empty() {
        let dir = tempdir().unwrap();
        let store = BindingStore::open(
            dir.path().join("projects.json").to_str().unwrap(),
            "/nonexistent/base/dir",
        )
        .unwrap();
        assert!(store.list_projects().unwrap().is_empty());
    }

    #[test]
    fn malformed_store_is_a_startup_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("projects.json");
        fs::write(&path, b"{\"bindings\": {\"oc_1\": ").unwrap();

        let err = BindingStore::open(path.to_str().unwrap(), "/tmp").unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn expand_path_handles_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path("~"), home);
        assert_eq!(expand_path("~/code"), home.join("code"));
        assert_eq!(expand_path("/abs/path"), PathBuf::from("/abs/path"));
    }
}
