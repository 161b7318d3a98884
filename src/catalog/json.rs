//! Catalog stored as one JSON document.
//!
//! ```json
//! {
//!   "photos": [{"id": 1, "name": "kyoto", "processed_path": "1.png", ...}],
//!   "settings": {"DisplayDurationSeconds": "600", "EnableRandomOrder": "false"}
//! }
//! ```
//!
//! The file is re-read on every call and rewritten through a temporary file,
//! so edits made by other tools are picked up on the next cycle.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{Catalog, Photo, PhotoId};
use crate::error::{Error, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    photos: Vec<Photo>,
    /// Hand-edited files may hold `600` or `false` instead of strings
    #[serde(default)]
    settings: BTreeMap<String, Value>,
}

/// Text form of a setting value. `null` counts as unset.
fn setting_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonCatalog {
    /// Use the catalog at `path`. A missing file reads as an empty catalog.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Document> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map_err(|e| Error::Catalog(format!("{}: {}", self.path.display(), e)))
    }

    fn write(&self, document: &Document) -> Result<()> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| Error::Catalog(format!("encoding catalog: {}", e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn update<T>(&self, change: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::Catalog("catalog lock poisoned".to_string()))?;
        let mut document = self.read()?;
        let value = change(&mut document)?;
        self.write(&document)?;
        Ok(value)
    }

    fn find(document: &mut Document, id: PhotoId) -> Result<&mut Photo> {
        document
            .photos
            .iter_mut()
            .find(|photo| photo.id == id)
            .ok_or_else(|| Error::Catalog(format!("no photo with id {}", id)))
    }

    /// Register a prepared photo under the next free id.
    pub fn add_photo(&self, name: &str, processed_path: &Path) -> Result<Photo> {
        self.update(|document| {
            let id = document.photos.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            let photo = Photo::new(id, name, processed_path);
            document.photos.push(photo.clone());
            log::info!("Registered photo {} as {:?}", id, name);
            Ok(photo)
        })
    }
}

impl Catalog for JsonCatalog {
    fn list_active_photos(&self) -> Result<Vec<Photo>> {
        Ok(self
            .read()?
            .photos
            .into_iter()
            .filter(|photo| photo.active)
            .collect())
    }

    fn mark_inactive(&self, id: PhotoId) -> Result<()> {
        self.update(|document| {
            Self::find(document, id)?.active = false;
            Ok(())
        })
    }

    fn record_display(&self, id: PhotoId, at: DateTime<Utc>) -> Result<()> {
        self.update(|document| {
            let photo = Self::find(document, id)?;
            photo.last_displayed = Some(at);
            photo.display_count += 1;
            Ok(())
        })
    }

    fn get_setting(&self, name: &str) -> Result<Option<String>> {
        Ok(self.read()?.settings.remove(name).and_then(setting_text))
    }
}
