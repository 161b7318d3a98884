//! IT8951 Display Driver Implementation
//!
//! This module contains the lifecycle state machine and the frame/refresh
//! primitives on top of [`DisplayInterface`].
//!
//! ## Architecture
//!
//! ### Lifecycle
//! - `initialize()` - reset, system run, device info, packed writes, VCOM
//! - `enter_standby()` / `wake()` - low power without losing the image memory
//! - `enter_sleep()` - deepest power state, idempotent
//! - `shutdown()` - best-effort sleep, then unconditional release of bus and pins
//!
//! ### Display Update Functions
//! - `load_frame()` - stream an 8 bpp frame into controller memory
//! - `refresh_area()` - run a waveform over a rectangle
//! - `clear()` - white frame plus the INIT waveform
//!
//! ### Register Access
//! - `read_register()` / `write_register()`
//! - `vcom()` - read back the programmed VCOM
//!
//! ## Critical Implementation Details
//!
//! ### Two busy phases
//!
//! HRDY only covers the host interface. After DPY_AREA the waveform keeps
//! running in the LUT engine, so `refresh_area` also polls LUTAFSR until it
//! reads zero before returning.
//!
//! ### No retries
//!
//! A busy line that never clears is reported as [`Error::HardwareTimeout`].
//! Retrying is the caller's decision.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;

use crate::error::{Error, Result};
use crate::frame::{Area, FrameBuffer, PanelGeometry};
use crate::it8951::flag::{self, Flag};
use crate::it8951::interface::DisplayInterface;
use crate::it8951::{CommandTable, DeviceInfo, DeviceState, RefreshMode, Vcom, DEFAULT_CHUNK_SIZE};

/// IT8951 E-Paper Display Driver
///
/// ## Type Parameters
///
/// - `SPI` - SPI bus for communication
/// - `BSY` - HRDY input pin (LOW when display is busy)
/// - `DC` - Data/Command output pin
/// - `RST` - Reset output pin
/// - `CS` - Chip select output pin
/// - `DELAY` - Delay provider for timing
pub struct It8951<SPI, BSY, DC, RST, CS, DELAY> {
    /// `None` once `shutdown()` released the hardware
    interface: Option<DisplayInterface<SPI, BSY, DC, RST, CS, DELAY>>,
    table: CommandTable,
    chunk_size: usize,
    state: DeviceState,
    geometry: Option<PanelGeometry>,
    info: Option<DeviceInfo>,
}

impl<SPI, BSY, DC, RST, CS, DELAY> It8951<SPI, BSY, DC, RST, CS, DELAY>
where
    SPI: SpiBus,
    BSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    CS: OutputPin,
    DELAY: DelayNs,
{
    /// Take ownership of the interface. No traffic until [`Self::initialize`].
    pub fn new(interface: DisplayInterface<SPI, BSY, DC, RST, CS, DELAY>, table: CommandTable) -> Self {
        It8951 {
            interface: Some(interface),
            table,
            chunk_size: DEFAULT_CHUNK_SIZE,
            state: DeviceState::Uninitialized,
            geometry: None,
            info: None,
        }
    }

    /// Bytes per pixel-data transaction while loading a frame.
    ///
    /// Rounded down to whole 16-bit words, at least one.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = (chunk_size & !1).max(2);
        self
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn geometry(&self) -> Option<PanelGeometry> {
        self.geometry
    }

    /// Identification read during the last successful [`Self::initialize`].
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    // ==================== Helper Functions for Common Patterns ====================

    fn bus(&mut self, operation: &'static str) -> Result<&mut DisplayInterface<SPI, BSY, DC, RST, CS, DELAY>> {
        self.interface.as_mut().ok_or(Error::InvalidState {
            operation,
            state: "released",
        })
    }

    fn require_running(&self, operation: &'static str) -> Result<PanelGeometry> {
        match (self.state, self.geometry) {
            (DeviceState::Running, Some(geometry)) => Ok(geometry),
            (state, _) => Err(Error::InvalidState {
                operation,
                state: state.as_str(),
            }),
        }
    }

    /// Write one register without checking the lifecycle state
    fn set_register(&mut self, operation: &'static str, addr: u16, value: u16) -> Result<()> {
        let reg_write = self.table.reg_write;
        self.bus(operation)?.cmd_with_data(reg_write, &[addr, value])
    }

    /// Read one register without checking the lifecycle state
    fn get_register(&mut self, operation: &'static str, addr: u16) -> Result<u16> {
        let reg_read = self.table.reg_read;
        let bus = self.bus(operation)?;
        bus.cmd_with_data(reg_read, &[addr])?;
        Ok(bus.read_data(1)?[0])
    }

    /// Point the controller's image loader at its frame memory
    fn set_image_buffer_addr(&mut self, addr: u32) -> Result<()> {
        let base = self.table.reg_image_buffer_addr;
        self.set_register("load_frame", base + 2, (addr >> 16) as u16)?;
        self.set_register("load_frame", base, (addr & 0xFFFF) as u16)
    }

    /// Poll the LUT engine until the running waveform is done
    fn wait_display_ready(&mut self) -> Result<()> {
        let status_reg = self.table.reg_lut_status;
        let busy_wait = self.bus("refresh_area")?.busy_wait();
        let poll_us = busy_wait.poll_interval.as_micros().min(u128::from(u32::MAX)) as u32;

        for _ in 0..busy_wait.max_polls() {
            if self.get_register("refresh_area", status_reg)? == 0 {
                return Ok(());
            }
            self.bus("refresh_area")?.delay_us(poll_us);
        }
        if self.get_register("refresh_area", status_reg)? == 0 {
            return Ok(());
        }

        let waited_ms = busy_wait.timeout.as_millis() as u64;
        log::error!("Display engine still busy after {} ms", waited_ms);
        Err(Error::HardwareTimeout { waited_ms })
    }

    // ==================== End of Helper Functions ====================

    /// Bring the controller up: hardware reset, system run, device info,
    /// packed writes and the panel's VCOM.
    ///
    /// A geometry that disagrees with the device info is logged, not rejected.
    pub fn initialize(&mut self, geometry: PanelGeometry, vcom: Vcom) -> Result<()> {
        log::info!("Initializing {} panel with VCOM {}", geometry, vcom);

        let info = match self.bring_up(geometry, vcom) {
            Ok(info) => info,
            Err(e @ (Error::HardwareTimeout { .. } | Error::InitializationFailure(_))) => {
                return Err(e)
            }
            Err(e) => return Err(Error::InitializationFailure(e.to_string())),
        };

        log::info!(
            "Panel {}x{} firmware {:?} LUT {:?} image buffer at 0x{:08X}",
            info.width,
            info.height,
            info.firmware,
            info.lut,
            info.image_buffer_addr
        );

        self.geometry = Some(geometry);
        self.info = Some(info);
        self.state = DeviceState::Running;
        Ok(())
    }

    fn bring_up(&mut self, geometry: PanelGeometry, vcom: Vcom) -> Result<DeviceInfo> {
        let table = self.table;
        let bus = self.bus("initialize").map_err(|_| {
            Error::InitializationFailure("panel bus was already released".to_string())
        })?;

        // Hardware reset first - ESSENTIAL for proper operation
        bus.reset()?;

        bus.cmd(table.sys_run)?;
        bus.wait_ready()?;

        bus.cmd(table.get_device_info)?;
        let words = bus.read_data(Flag::DEVICE_INFO_WORDS)?;
        let info = DeviceInfo::from_words(&words).ok_or_else(|| {
            Error::InitializationFailure("short device info response".to_string())
        })?;
        if (info.width, info.height) != (geometry.width, geometry.height) {
            log::warn!(
                "Controller reports a {}x{} panel but {} is configured",
                info.width,
                info.height,
                geometry
            );
        }

        bus.cmd_with_data(
            table.reg_write,
            &[table.reg_packed_write, Flag::PACKED_WRITE_ENABLE],
        )?;

        bus.cmd_with_data(table.vcom, &[Flag::VCOM_SET, vcom.millivolts()])?;
        bus.wait_ready()?;

        bus.cmd_with_data(table.vcom, &[Flag::VCOM_GET])?;
        let programmed = bus.read_data(1)?[0];
        if programmed != vcom.millivolts() {
            log::warn!(
                "VCOM reads back as {} after writing {}",
                Vcom::from_millivolts(programmed),
                vcom
            );
        }

        Ok(info)
    }

    /// Stream a full frame into the controller's image memory.
    ///
    /// The buffer must hold exactly one byte per panel pixel. It is sent in
    /// `chunk_size` pieces, each in its own data transaction.
    pub fn load_frame(&mut self, buffer: &FrameBuffer) -> Result<()> {
        let geometry = self.require_running("load_frame")?;
        if buffer.len() != geometry.pixel_count() {
            return Err(Error::BufferSizeMismatch {
                expected: geometry.pixel_count(),
                actual: buffer.len(),
            });
        }

        let addr = self.info.as_ref().map_or(0, |info| info.image_buffer_addr);
        self.set_image_buffer_addr(addr)?;

        let table = self.table;
        let chunk_size = self.chunk_size;
        let bus = self.bus("load_frame")?;

        // Bytes go out in buffer order, so the first byte of each word is the left pixel
        let args = flag::load_image_args(
            Flag::LOAD_ENDIAN_BIG,
            Flag::PIXEL_FORMAT_8BPP,
            Flag::ROTATE_0,
        );
        bus.cmd_with_data(
            table.load_image_area,
            &[args, 0, 0, geometry.width, geometry.height],
        )?;

        let total_chunks = buffer.len().div_ceil(chunk_size);
        for (chunk_idx, chunk) in buffer.as_bytes().chunks(chunk_size).enumerate() {
            if chunk_idx % 64 == 0 {
                log::debug!(
                    "Writing chunk {}/{} ({:.1}%)",
                    chunk_idx + 1,
                    total_chunks,
                    100.0 * (chunk_idx + 1) as f32 / total_chunks as f32
                );
            }
            bus.data_bytes(chunk)?;
        }

        bus.cmd(table.load_image_end)?;
        bus.wait_ready()
    }

    /// Run the `mode` waveform over `area` and wait until the panel settles.
    pub fn refresh_area(&mut self, area: Area, mode: RefreshMode) -> Result<()> {
        let geometry = self.require_running("refresh_area")?;
        if !geometry.contains(&area) {
            return Err(Error::InvalidArea {
                x: area.x,
                y: area.y,
                w: area.w,
                h: area.h,
            });
        }

        log::info!("Refreshing {}x{}+{}+{} with {:?}", area.w, area.h, area.x, area.y, mode);
        let table = self.table;
        let bus = self.bus("refresh_area")?;
        bus.cmd_with_data(
            table.display_area,
            &[area.x, area.y, area.w, area.h, table.mode_code(mode)],
        )?;
        bus.wait_ready()?;
        self.wait_display_ready()
    }

    /// Load an all-white frame and refresh it with the INIT waveform.
    pub fn clear(&mut self) -> Result<()> {
        let geometry = self.require_running("clear")?;
        log::info!("Clearing panel");
        self.load_frame(&FrameBuffer::white(geometry))?;
        self.refresh_area(geometry.full_area(), RefreshMode::Init)
    }

    pub fn read_register(&mut self, addr: u16) -> Result<u16> {
        self.require_running("read_register")?;
        self.get_register("read_register", addr)
    }

    pub fn write_register(&mut self, addr: u16, value: u16) -> Result<()> {
        self.require_running("write_register")?;
        self.set_register("write_register", addr, value)
    }

    /// Read the VCOM currently programmed into the controller.
    pub fn vcom(&mut self) -> Result<Vcom> {
        self.require_running("vcom")?;
        let table = self.table;
        let bus = self.bus("vcom")?;
        bus.cmd_with_data(table.vcom, &[Flag::VCOM_GET])?;
        Ok(Vcom::from_millivolts(bus.read_data(1)?[0]))
    }

    /// Stop the panel clocks while keeping image memory.
    pub fn enter_standby(&mut self) -> Result<()> {
        self.require_running("enter_standby")?;
        let standby = self.table.standby;
        let bus = self.bus("enter_standby")?;
        bus.cmd(standby)?;
        bus.wait_ready()?;
        self.state = DeviceState::Standby;
        log::info!("Panel in standby");
        Ok(())
    }

    /// Return to `Running` from standby or sleep.
    pub fn wake(&mut self) -> Result<()> {
        match self.state {
            DeviceState::Running => return Ok(()),
            DeviceState::Uninitialized => {
                return Err(Error::InvalidState {
                    operation: "wake",
                    state: self.state.as_str(),
                })
            }
            DeviceState::Standby | DeviceState::Sleeping => {}
        }
        let sys_run = self.table.sys_run;
        let bus = self.bus("wake")?;
        bus.cmd(sys_run)?;
        bus.wait_ready()?;
        self.state = DeviceState::Running;
        log::info!("Panel running");
        Ok(())
    }

    /// Put the panel into deep sleep. A no-op unless the panel is running.
    pub fn enter_sleep(&mut self) -> Result<()> {
        if self.state != DeviceState::Running {
            log::debug!("Sleep requested while {}, nothing to do", self.state);
            return Ok(());
        }
        log::info!("Putting display into sleep mode");
        let sleep = self.table.sleep;
        let bus = self.bus("enter_sleep")?;
        bus.cmd(sleep)?;
        bus.wait_ready()?;
        self.state = DeviceState::Sleeping;
        log::info!("Display now in sleep mode");
        Ok(())
    }

    /// Best-effort sleep followed by releasing the bus and pins.
    ///
    /// Never fails. The release happens even when sleeping did not.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.enter_sleep() {
            log::warn!("Could not put panel to sleep during shutdown: {}", e);
        }
        if let Some(interface) = self.interface.take() {
            interface.release();
        }
    }
}
