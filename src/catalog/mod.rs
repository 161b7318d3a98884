//! Photo catalog seam.
//!
//! The catalog owns photo records and the settings the slideshow re-reads
//! every cycle. Nothing here caches records across calls.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::slideshow::SlideshowTiming;

pub mod json;
pub mod memory;

pub use json::JsonCatalog;
pub use memory::MemoryCatalog;

pub type PhotoId = u64;

/// Setting holding the display duration in whole seconds
pub const DISPLAY_DURATION_SECONDS: &str = "DisplayDurationSeconds";
/// Setting selecting random (true) or oldest-first (false) ordering
pub const ENABLE_RANDOM_ORDER: &str = "EnableRandomOrder";

/// A catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub name: String,
    /// Prepared artifact, relative to the artifact store root or absolute
    pub processed_path: PathBuf,
    /// `None` until the photo is shown for the first time
    #[serde(default)]
    pub last_displayed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display_count: u64,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl Photo {
    /// A never-shown, active record.
    pub fn new(id: PhotoId, name: impl Into<String>, processed_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            name: name.into(),
            processed_path: processed_path.into(),
            last_displayed: None,
            display_count: 0,
            active: true,
        }
    }
}

/// What the slideshow needs from the photo library.
pub trait Catalog {
    fn list_active_photos(&self) -> Result<Vec<Photo>>;

    fn mark_inactive(&self, id: PhotoId) -> Result<()>;

    /// Set `last_displayed` to `at` and increment `display_count`.
    fn record_display(&self, id: PhotoId, at: DateTime<Utc>) -> Result<()>;

    /// Raw setting value, `None` when unset.
    fn get_setting(&self, name: &str) -> Result<Option<String>>;
}

impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    fn list_active_photos(&self) -> Result<Vec<Photo>> {
        (**self).list_active_photos()
    }

    fn mark_inactive(&self, id: PhotoId) -> Result<()> {
        (**self).mark_inactive(id)
    }

    fn record_display(&self, id: PhotoId, at: DateTime<Utc>) -> Result<()> {
        (**self).record_display(id, at)
    }

    fn get_setting(&self, name: &str) -> Result<Option<String>> {
        (**self).get_setting(name)
    }
}

/// How the next photo is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    /// Uniform choice over the active set
    Random,
    /// Oldest `last_displayed` first, then lowest `display_count`
    Sequential,
}

/// Display duration for this cycle, clamped to the timing floor.
///
/// Missing, malformed or unreadable values fall back to the default.
pub fn display_duration<C: Catalog + ?Sized>(catalog: &C, timing: &SlideshowTiming) -> Duration {
    let seconds = match catalog.get_setting(DISPLAY_DURATION_SECONDS) {
        Ok(Some(raw)) => match raw.trim().parse::<i64>() {
            Ok(seconds) => Some(seconds),
            Err(_) => {
                log::warn!("Ignoring malformed {} value {:?}", DISPLAY_DURATION_SECONDS, raw);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log::warn!("Could not read {}: {}", DISPLAY_DURATION_SECONDS, e);
            None
        }
    };

    let duration = seconds.map_or(timing.default_display, |s| {
        Duration::from_secs(s.max(0).unsigned_abs())
    });
    duration.max(timing.min_display)
}

/// Ordering policy for this cycle, random unless the setting says otherwise.
pub fn ordering<C: Catalog + ?Sized>(catalog: &C) -> Ordering {
    let raw = match catalog.get_setting(ENABLE_RANDOM_ORDER) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Ordering::Random,
        Err(e) => {
            log::warn!("Could not read {}: {}", ENABLE_RANDOM_ORDER, e);
            return Ordering::Random;
        }
    };

    match parse_bool(&raw) {
        Some(true) => Ordering::Random,
        Some(false) => Ordering::Sequential,
        None => {
            log::warn!("Ignoring malformed {} value {:?}", ENABLE_RANDOM_ORDER, raw);
            Ordering::Random
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
