//! Display interface using SPI with a host-driven chip select
use std::time::Duration;

use display_interface::DisplayError;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiBus,
};

use crate::error::{Error, Result};
use crate::it8951::flag::Flag;

const RESET_HOLD_MS: u32 = 10;
const RESET_RECOVERY_MS: u32 = 200;

/// Busy-wait bounds for the HRDY handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyWait {
    /// Give up after this long.
    pub timeout: Duration,
    /// Sleep between two reads of the busy line.
    pub poll_interval: Duration,
}

impl BusyWait {
    /// Number of reads of the busy line before timing out.
    pub fn max_polls(&self) -> u64 {
        let poll = self.poll_interval.as_micros().max(1);
        (self.timeout.as_micros() / poll).max(1) as u64
    }
}

impl Default for BusyWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// The connection to an IT8951 over SPI.
///
/// Each transaction is a 16-bit preamble followed by its payload while chip
/// select is held low. The controller has to report ready (HRDY high) before
/// the preamble and again before the payload.
pub struct DisplayInterface<SPI, BSY, DC, RST, CS, DELAY> {
    /// SPI bus, chip select is not handled by the bus itself
    spi: SPI,
    /// HRDY, Low while the controller is busy
    busy: BSY,
    /// Data/Command Control Pin (High for data, Low for command)
    dc: DC,
    /// Pin for Reseting, active low
    rst: RST,
    /// Chip select, active low
    cs: CS,
    delay: DELAY,
    busy_wait: BusyWait,
}

impl<SPI, BSY, DC, RST, CS, DELAY> DisplayInterface<SPI, BSY, DC, RST, CS, DELAY> {
    /// Bundle the bus and pins. No traffic is generated.
    pub fn new(spi: SPI, busy: BSY, dc: DC, rst: RST, cs: CS, delay: DELAY) -> Self {
        DisplayInterface {
            spi,
            busy,
            dc,
            rst,
            cs,
            delay,
            busy_wait: BusyWait::default(),
        }
    }

    /// Replace the default busy-wait bounds.
    pub fn with_busy_wait(mut self, busy_wait: BusyWait) -> Self {
        self.busy_wait = busy_wait;
        self
    }

    pub fn busy_wait(&self) -> BusyWait {
        self.busy_wait
    }
}

fn encode_words(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_be_bytes()).collect()
}

fn decode_words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

impl<SPI, BSY, DC, RST, CS, DELAY> DisplayInterface<SPI, BSY, DC, RST, CS, DELAY>
where
    SPI: SpiBus,
    BSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    CS: OutputPin,
    DELAY: DelayNs,
{
    /// Pulse the reset line and wait for the controller to report ready.
    pub(crate) fn reset(&mut self) -> Result<()> {
        log::info!("Resetting panel controller");
        self.cs.set_high().map_err(|_| DisplayError::CSError)?;
        self.rst.set_low().map_err(|_| DisplayError::RSError)?;
        self.delay.delay_ms(RESET_HOLD_MS);
        self.rst.set_high().map_err(|_| DisplayError::RSError)?;
        self.delay.delay_ms(RESET_RECOVERY_MS);
        self.wait_ready()
    }

    /// Poll HRDY until the controller is ready, bounded by the busy-wait timeout.
    pub(crate) fn wait_ready(&mut self) -> Result<()> {
        let poll_us = self.busy_wait.poll_interval.as_micros().min(u128::from(u32::MAX)) as u32;

        for _ in 0..self.busy_wait.max_polls() {
            if self.is_ready()? {
                return Ok(());
            }
            self.delay.delay_us(poll_us);
        }
        if self.is_ready()? {
            return Ok(());
        }

        let waited_ms = self.busy_wait.timeout.as_millis() as u64;
        log::error!("Busy signal still asserted after {} ms", waited_ms);
        Err(Error::HardwareTimeout { waited_ms })
    }

    fn is_ready(&mut self) -> Result<bool> {
        // DisplayError has no variant for input pins, reading HRDY is bus traffic
        self.busy.is_high().map_err(|_| {
            log::error!("Error reading HRDY pin state");
            Error::from(DisplayError::BusWriteError)
        })
    }

    /// Basic function for sending a command
    pub(crate) fn cmd(&mut self, command: u16) -> Result<()> {
        self.transaction(Flag::PREAMBLE_COMMAND, false, |bus| {
            bus.write(&command.to_be_bytes()).map_err(|e| {
                log::error!("SPI write error for command 0x{:04X}", command);
                e
            })
        })
    }

    /// Send 16-bit parameters, big-endian on the wire
    pub(crate) fn data(&mut self, words: &[u16]) -> Result<()> {
        let bytes = encode_words(words);
        self.transaction(Flag::PREAMBLE_WRITE_DATA, true, |bus| bus.write(&bytes))
    }

    /// Send raw payload bytes in a single data transaction
    pub(crate) fn data_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.transaction(Flag::PREAMBLE_WRITE_DATA, true, |bus| bus.write(bytes))
    }

    /// Basic function for sending a command and the parameters belonging to it.
    pub(crate) fn cmd_with_data(&mut self, command: u16, words: &[u16]) -> Result<()> {
        self.cmd(command)?;
        self.data(words)
    }

    /// Read `count` words, discarding the dummy word the controller sends first
    pub(crate) fn read_data(&mut self, count: usize) -> Result<Vec<u16>> {
        self.transaction(Flag::PREAMBLE_READ_DATA, true, |bus| {
            let mut dummy = [0u8; 2];
            bus.read(&mut dummy)?;
            bus.wait_ready()?;

            let mut buffer = vec![0u8; count * 2];
            bus.read(&mut buffer)?;
            Ok(decode_words(&buffer))
        })
    }

    /// Sleep on the interface's delay provider.
    pub(crate) fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    /// Deselect the controller and drop the bus and pins.
    pub(crate) fn release(mut self) {
        if self.cs.set_high().is_err() {
            log::warn!("Could not deselect panel while releasing the bus");
        }
        log::info!("Released panel bus and pins");
    }

    /// Run `body` between a preamble and chip select release.
    ///
    /// Chip select is released even when the body fails.
    fn transaction<T>(
        &mut self,
        preamble: u16,
        data_phase: bool,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.wait_ready()?;
        if data_phase {
            self.dc.set_high().map_err(|_| DisplayError::DCError)?;
        } else {
            self.dc.set_low().map_err(|_| DisplayError::DCError)?;
        }
        self.cs.set_low().map_err(|_| DisplayError::CSError)?;

        let result = self.framed(preamble, body);
        let released = self.cs.set_high().map_err(|_| Error::from(DisplayError::CSError));
        let value = result?;
        released?;
        Ok(value)
    }

    fn framed<T>(&mut self, preamble: u16, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.write(&preamble.to_be_bytes())?;
        self.wait_ready()?;
        let value = body(self)?;
        self.spi.flush().map_err(|_| DisplayError::BusWriteError)?;
        Ok(value)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.spi
            .write(bytes)
            .map_err(|_| Error::from(DisplayError::BusWriteError))
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.spi
            .read(buffer)
            .map_err(|_| Error::from(DisplayError::BusWriteError))
    }
}
