//! In-process catalog.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::catalog::{Catalog, Photo, PhotoId};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Records {
    photos: BTreeMap<PhotoId, Photo>,
    settings: BTreeMap<String, String>,
    writes: usize,
}

/// Catalog held in memory, safe to share between threads.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: Mutex<Records>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, Records>> {
        self.records
            .lock()
            .map_err(|_| Error::Catalog("memory catalog lock poisoned".to_string()))
    }

    /// Insert or replace a record. Not counted as a catalog write.
    pub fn insert(&self, photo: Photo) {
        if let Ok(mut records) = self.records() {
            records.photos.insert(photo.id, photo);
        }
    }

    pub fn set_setting(&self, name: &str, value: &str) {
        if let Ok(mut records) = self.records() {
            records.settings.insert(name.to_string(), value.to_string());
        }
    }

    pub fn photo(&self, id: PhotoId) -> Option<Photo> {
        self.records().ok()?.photos.get(&id).cloned()
    }

    /// Number of `mark_inactive` and `record_display` calls that changed a record.
    pub fn write_count(&self) -> usize {
        self.records().map_or(0, |records| records.writes)
    }
}

impl Catalog for MemoryCatalog {
    fn list_active_photos(&self) -> Result<Vec<Photo>> {
        Ok(self
            .records()?
            .photos
            .values()
            .filter(|photo| photo.active)
            .cloned()
            .collect())
    }

    fn mark_inactive(&self, id: PhotoId) -> Result<()> {
        let mut records = self.records()?;
        let photo = records
            .photos
            .get_mut(&id)
            .ok_or_else(|| Error::Catalog(format!("no photo with id {}", id)))?;
        photo.active = false;
        records.writes += 1;
        Ok(())
    }

    fn record_display(&self, id: PhotoId, at: DateTime<Utc>) -> Result<()> {
        let mut records = self.records()?;
        let photo = records
            .photos
            .get_mut(&id)
            .ok_or_else(|| Error::Catalog(format!("no photo with id {}", id)))?;
        photo.last_displayed = Some(at);
        photo.display_count += 1;
        records.writes += 1;
        Ok(())
    }

    fn get_setting(&self, name: &str) -> Result<Option<String>> {
        Ok(self.records()?.settings.get(name).cloned())
    }
}
