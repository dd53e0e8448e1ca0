// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! On-disk key/value store for the view location and image choice.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use skyview_core::KeyValueStore;

use crate::config::APP_NAME;

/// A JSON object of strings, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Default location in the user config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_NAME).join("view.json"))
    }

    /// Open the store. A missing or unreadable file starts empty.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        let values = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring corrupt store {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(e) => {
                debug!("No store at {}: {e}", path.display());
                BTreeMap::new()
            }
        };

        Self {
            path: path.to_path_buf(),
            values,
        }
    }

    fn save(&self) {
        let result = serde_json::to_string_pretty(&self.values)
            .map_err(std::io::Error::from)
            .and_then(|text| {
                if let Some(dir) = self.path.parent() {
                    fs::create_dir_all(dir)?;
                }
                fs::write(&self.path, text)
            });
        if let Err(e) = result {
            warn!("Unable to save {}: {e}", self.path.display());
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        if self.values.get(key).is_some_and(|v| v == value) {
            return;
        }
        self.values.insert(key.to_owned(), value.to_owned());
        self.save();
    }

    fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.save();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let path = std::env::temp_dir()
            .join(format!("cscview-store-{}", std::process::id()))
            .join("view.json");

        let mut store = FileStore::open(&path);
        assert!(store.get("wwt-location").is_none());
        store.set("wwt-location", r#"{"ra":1.0,"dec":2.0,"fov":3.0}"#);
        store.set("wwt-foreground", "rass");
        store.remove("wwt-foreground");

        let reopened = FileStore::open(&path);
        assert_eq!(
            reopened.get("wwt-location").as_deref(),
            Some(r#"{"ra":1.0,"dec":2.0,"fov":3.0}"#)
        );
        assert!(reopened.get("wwt-foreground").is_none());

        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let path = std::env::temp_dir().join(format!("cscview-corrupt-{}.json", std::process::id()));
        fs::write(&path, "not json").unwrap();
        let store = FileStore::open(&path);
        assert!(store.get("anything").is_none());
        fs::remove_file(&path).unwrap();
    }
}
