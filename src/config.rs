//! Configuration file
//!
//! Every section and key is optional. A minimal file only needs the panel's
//! VCOM:
//!
//! ```toml
//! [panel]
//! vcom = -1.48
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::frame::PanelGeometry;
use crate::it8951::{BusyWait, CommandTable, Pins, Vcom, DEFAULT_CHUNK_SIZE};
use crate::slideshow::SlideshowTiming;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/mainichi-shashin/config.toml";

/// Largest VCOM magnitude the controller accepts, in volts.
const MAX_VCOM_VOLTS: f32 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub panel: PanelConfig,
    pub bus: BusConfig,
    pub pins: PinConfig,
    pub slideshow: SlideshowConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanelConfig {
    pub width: u16,
    pub height: u16,
    /// Volts, as printed on the panel cable
    pub vcom: f32,
    /// `it8951` or `it8951-large`
    pub controller: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            width: 1872,
            height: 1404,
            vcom: -1.48,
            controller: "it8951".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    pub device: PathBuf,
    pub gpio_chip: PathBuf,
    pub speed_hz: u32,
    pub chunk_size: usize,
    pub busy_timeout_ms: u64,
    pub busy_poll_us: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/spidev0.0"),
            gpio_chip: PathBuf::from("/dev/gpiochip0"),
            speed_hz: 12_000_000,
            chunk_size: DEFAULT_CHUNK_SIZE,
            busy_timeout_ms: 10_000,
            busy_poll_us: 1_000,
        }
    }
}

/// GPIO line offsets on `gpio_chip`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PinConfig {
    pub reset: u32,
    pub data_command: u32,
    pub chip_select: u32,
    pub busy: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            reset: Pins::RST,
            data_command: Pins::DC,
            chip_select: Pins::CS,
            busy: Pins::BSY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlideshowConfig {
    pub catalog: PathBuf,
    pub artifacts: PathBuf,
    pub backoff_seconds: u64,
    pub min_display_seconds: u64,
    pub default_display_seconds: u64,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("/var/lib/mainichi-shashin/catalog.json"),
            artifacts: PathBuf::from("/var/lib/mainichi-shashin/artifacts"),
            backoff_seconds: 30,
            min_display_seconds: 60,
            default_display_seconds: 300,
        }
    }
}

impl Config {
    /// Read and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {}", path.display(), e)))?;
        let config = Self::parse(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.panel.width == 0 || self.panel.height == 0 {
            return Err(Error::Config(format!(
                "panel geometry {}x{} has no pixels",
                self.panel.width, self.panel.height
            )));
        }
        if !self.panel.vcom.is_finite() || self.panel.vcom.abs() > MAX_VCOM_VOLTS {
            return Err(Error::Config(format!(
                "vcom {} V is outside ±{} V",
                self.panel.vcom, MAX_VCOM_VOLTS
            )));
        }
        self.command_table()?;
        if self.bus.chunk_size == 0 || self.bus.chunk_size % 2 != 0 {
            return Err(Error::Config(format!(
                "bus.chunk_size {} must be a positive whole number of 16-bit words",
                self.bus.chunk_size
            )));
        }
        if self.bus.busy_timeout_ms == 0 {
            return Err(Error::Config("bus.busy_timeout_ms must be positive".to_string()));
        }
        let slideshow = &self.slideshow;
        if slideshow.min_display_seconds > slideshow.default_display_seconds {
            return Err(Error::Config(format!(
                "min_display_seconds ({}) exceeds default_display_seconds ({})",
                slideshow.min_display_seconds, slideshow.default_display_seconds
            )));
        }
        if slideshow.backoff_seconds == 0 {
            return Err(Error::Config("slideshow.backoff_seconds must be positive".to_string()));
        }
        Ok(())
    }

    pub fn geometry(&self) -> PanelGeometry {
        PanelGeometry::new(self.panel.width, self.panel.height)
    }

    pub fn vcom(&self) -> Vcom {
        Vcom::from_volts(self.panel.vcom)
    }

    pub fn command_table(&self) -> Result<CommandTable> {
        CommandTable::by_name(&self.panel.controller).ok_or_else(|| {
            Error::Config(format!("unknown controller {:?}", self.panel.controller))
        })
    }

    pub fn busy_wait(&self) -> BusyWait {
        BusyWait {
            timeout: Duration::from_millis(self.bus.busy_timeout_ms),
            poll_interval: Duration::from_micros(self.bus.busy_poll_us),
        }
    }

    pub fn timing(&self) -> SlideshowTiming {
        SlideshowTiming {
            default_display: Duration::from_secs(self.slideshow.default_display_seconds),
            min_display: Duration::from_secs(self.slideshow.min_display_seconds),
            backoff: Duration::from_secs(self.slideshow.backoff_seconds),
        }
    }
}
