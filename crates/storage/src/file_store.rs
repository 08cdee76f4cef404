// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed store: each name maps to a file under a root directory.
//!
//! Writes land in a `.tmp` sibling first and are renamed into place, so a
//! crash mid-write never leaves a half-written document behind.

use crate::store::{Store, StoreError};
use sift_core::Name;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &Name) -> PathBuf {
        let mut path = self.root.clone();
        for part in name.parts() {
            path.push(part);
        }
        path
    }

    fn io(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn collect(&self, dir: &Path, parts: &mut Vec<String>, out: &mut Vec<Name>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping unreadable store directory");
                return;
            }
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(part) = file_name.to_str() else {
                continue;
            };
            if part.ends_with(".tmp") {
                continue;
            }
            parts.push(part.to_string());
            let path = entry.path();
            if path.is_dir() {
                self.collect(&path, parts, out);
            } else if let Ok(name) = Name::parse(&parts.join("/")) {
                out.push(name);
            }
            parts.pop();
        }
    }
}

impl Store for FileStore {
    fn read(&self, name: &Name) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(name);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.clone()))
            }
            Err(err) => Err(Self::io(&path, err)),
        }
    }

    fn write(&self, name: &Name, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Self::io(parent, e))?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| Self::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Self::io(&path, e))
    }

    fn list(&self, prefix: &Name) -> Result<Vec<Name>, StoreError> {
        let dir = self.path_for(prefix);
        let mut out = Vec::new();
        if dir.is_dir() {
            let mut parts: Vec<String> = prefix.parts().to_vec();
            self.collect(&dir, &mut parts, &mut out);
        } else if dir.is_file() {
            out.push(prefix.clone());
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod tests;
