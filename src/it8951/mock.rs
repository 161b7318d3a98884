//! Recording SPI bus, pins and delay for driver tests.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal::spi::{self, SpiBus};

use crate::it8951::flag::Flag;
use crate::it8951::interface::DisplayInterface;

/// Observable bus traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Dc(bool),
    Rst(bool),
    Cs(bool),
    Write(Vec<u8>),
    Read(usize),
}

/// One chip-select framed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub preamble: u16,
    pub payload: Vec<u8>,
}

impl Transaction {
    pub fn words(&self) -> Vec<u16> {
        self.payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }
}

#[derive(Default)]
struct State {
    events: Vec<BusEvent>,
    responses: VecDeque<u8>,
    busy: bool,
    busy_reads: usize,
    writes: usize,
    fail_writes_after: Option<usize>,
}

/// Handle shared by every mock part, used by tests to script and inspect.
#[derive(Clone, Default)]
pub struct MockLog(Arc<Mutex<State>>);

impl MockLog {
    fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }

    fn record(&self, event: BusEvent) {
        self.state().events.push(event);
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.state().events.clone()
    }

    pub fn clear(&self) {
        self.state().events.clear();
    }

    /// Queue bytes returned by subsequent SPI reads. Unscripted reads return zeros.
    pub fn respond(&self, bytes: &[u8]) {
        self.state().responses.extend(bytes.iter().copied());
    }

    pub fn set_ready(&self, ready: bool) {
        self.state().busy = !ready;
    }

    pub fn busy_reads(&self) -> usize {
        self.state().busy_reads
    }

    /// Let `count` more writes succeed, then fail every write.
    pub fn fail_writes_after(&self, count: usize) {
        let mut state = self.state();
        state.fail_writes_after = Some(state.writes + count);
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        let mut transactions = Vec::new();
        let mut current: Option<(Option<u16>, Vec<u8>)> = None;

        for event in self.events() {
            match event {
                BusEvent::Cs(false) => current = Some((None, Vec::new())),
                BusEvent::Write(bytes) => {
                    if let Some((preamble, payload)) = current.as_mut() {
                        match preamble {
                            None => *preamble = Some(u16::from_be_bytes([bytes[0], bytes[1]])),
                            Some(_) => payload.extend(bytes),
                        }
                    }
                }
                BusEvent::Cs(true) => {
                    if let Some((Some(preamble), payload)) = current.take() {
                        transactions.push(Transaction { preamble, payload });
                    }
                }
                _ => {}
            }
        }
        transactions
    }

    /// Command codes in the order they were sent.
    pub fn commands(&self) -> Vec<u16> {
        self.transactions()
            .iter()
            .filter(|t| t.preamble == Flag::PREAMBLE_COMMAND)
            .map(|t| t.words()[0])
            .collect()
    }

    /// Parameter words of the data transaction following each `command`.
    pub fn params_of(&self, command: u16) -> Vec<Vec<u16>> {
        let transactions = self.transactions();
        transactions
            .windows(2)
            .filter(|pair| {
                pair[0].preamble == Flag::PREAMBLE_COMMAND
                    && pair[0].words()[0] == command
                    && pair[1].preamble == Flag::PREAMBLE_WRITE_DATA
            })
            .map(|pair| pair[1].words())
            .collect()
    }
}

#[derive(Debug)]
pub struct MockSpiError;

impl spi::Error for MockSpiError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

pub struct MockSpi(MockLog);

impl spi::ErrorType for MockSpi {
    type Error = MockSpiError;
}

impl SpiBus for MockSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut state = self.0.state();
        for word in words.iter_mut() {
            *word = state.responses.pop_front().unwrap_or(0);
        }
        state.events.push(BusEvent::Read(words.len()));
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut state = self.0.state();
        state.writes += 1;
        if state.fail_writes_after.is_some_and(|limit| state.writes > limit) {
            return Err(MockSpiError);
        }
        state.events.push(BusEvent::Write(words.to_vec()));
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write)?;
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let sent = words.to_vec();
        self.transfer(words, &sent)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Role {
    Dc,
    Rst,
    Cs,
}

pub struct MockPin {
    log: MockLog,
    role: Role,
}

impl MockPin {
    fn set(&mut self, high: bool) {
        self.log.record(match self.role {
            Role::Dc => BusEvent::Dc(high),
            Role::Rst => BusEvent::Rst(high),
            Role::Cs => BusEvent::Cs(high),
        });
    }
}

impl digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

pub struct MockBusy(MockLog);

impl digital::ErrorType for MockBusy {
    type Error = Infallible;
}

impl InputPin for MockBusy {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut state = self.0.state();
        state.busy_reads += 1;
        Ok(!state.busy)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

pub struct MockDelay;

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub type MockInterface = DisplayInterface<MockSpi, MockBusy, MockPin, MockPin, MockPin, MockDelay>;

/// An interface wired to mocks, plus the handle observing them.
pub fn interface() -> (MockInterface, MockLog) {
    let log = MockLog::default();
    let pin = |role| MockPin {
        log: log.clone(),
        role,
    };
    let interface = DisplayInterface::new(
        MockSpi(log.clone()),
        MockBusy(log.clone()),
        pin(Role::Dc),
        pin(Role::Rst),
        pin(Role::Cs),
        MockDelay,
    );
    (interface, log)
}
