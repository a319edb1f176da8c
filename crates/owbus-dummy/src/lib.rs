//! owbus-dummy - In-memory emulated 1-Wire bus for testing
//!
//! This crate provides a dummy bus master that emulates a single
//! thermometer-flavored slave device in memory. It's useful for
//! testing and development without real hardware: the slave answers
//! byte slots the way an open-drain line would (wired-AND), and every
//! primitive the engine invokes is recorded as a [`WireEvent`] so
//! tests can assert exact wire activity.

use std::collections::VecDeque;
use std::time::Duration;

use log::trace;

use owbus_core::adapter::{AdapterFeatures, BusMaster};
use owbus_core::checksum;
use owbus_core::device::DeviceId;
use owbus_core::error::{Error, Result};

/// Function commands understood by the emulated slave.
pub mod commands {
    /// Start a temperature conversion.
    pub const CONVERT_T: u8 = 0x44;
    /// Stream the 9-byte scratchpad (8 data bytes + CRC8).
    pub const READ_SCRATCHPAD: u8 = 0xBE;
    /// Write TH, TL and configuration into the scratchpad.
    pub const WRITE_SCRATCHPAD: u8 = 0x4E;
}

/// Hardware FIFO depth of the emulated adapter: the largest single
/// combined cycle it accepts.
const FIFO_DEPTH: usize = 64;

/// Configuration for the dummy bus.
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Advertised capability flags.
    pub features: AdapterFeatures,
    /// Bundle byte ceiling when `BUNDLING` is advertised.
    pub max_bundle_len: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            features: AdapterFeatures::BUNDLING | AdapterFeatures::STRONG_PULLUP,
            max_bundle_len: FIFO_DEPTH,
        }
    }
}

impl DummyConfig {
    /// Sequential-only adapter, no bundling support.
    pub fn sequential() -> Self {
        Self {
            features: AdapterFeatures::STRONG_PULLUP,
            max_bundle_len: 0,
        }
    }

    /// Bundling adapter with a custom bundle ceiling.
    pub fn bundling(max_bundle_len: usize) -> Self {
        Self {
            features: AdapterFeatures::BUNDLING | AdapterFeatures::STRONG_PULLUP,
            max_bundle_len,
        }
    }
}

/// Wire activity recorded by the dummy bus, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    /// Reset pulse.
    Reset,
    /// Device selection (or bare bus addressing for `None`).
    Select(Option<DeviceId>),
    /// Plain transmit, echo discarded.
    Send(Vec<u8>),
    /// Plain receive of this many bytes.
    Receive(usize),
    /// Combined cycle; payload is the outbound bytes.
    Exchange(Vec<u8>),
    /// Power delivery byte.
    PowerByte(u8),
    /// Programming voltage pulse.
    ProgramPulse,
    /// Identity confirmation.
    Verify(DeviceId),
    /// Timed wait.
    Wait(Duration),
}

/// Emulated slave protocol state.
#[derive(Debug)]
enum SlaveState {
    Idle,
    /// Streaming scratchpad bytes out, one per read slot.
    Streaming(VecDeque<u8>),
    /// Collecting scratchpad writes at `offset`.
    Collecting { offset: usize, remaining: usize },
}

/// In-memory emulated 1-Wire bus with one thermometer-like slave.
pub struct DummyBus {
    config: DummyConfig,
    device: DeviceId,
    selected: bool,
    state: SlaveState,
    scratchpad: [u8; 9],
    events: Vec<WireEvent>,
}

impl DummyBus {
    /// Power-on scratchpad of a DS18B20 (85 C, default alarms).
    const POWER_ON_SCRATCHPAD: [u8; 8] = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10];

    /// Create a dummy bus with the given configuration.
    pub fn new(config: DummyConfig) -> Self {
        let device = DeviceId::from_parts(0x28, [0xA2, 0xD4, 0x1C, 0x00, 0x00, 0x00]);
        let mut scratchpad = [0u8; 9];
        scratchpad[..8].copy_from_slice(&Self::POWER_ON_SCRATCHPAD);
        scratchpad[8] = checksum::crc8(&scratchpad[..8]);
        Self {
            config,
            device,
            selected: false,
            state: SlaveState::Idle,
            scratchpad,
            events: Vec::new(),
        }
    }

    /// Dummy bus with the default bundling configuration.
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// ROM id of the emulated slave.
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Scratchpad contents, including the trailing CRC8.
    pub fn scratchpad(&self) -> &[u8; 9] {
        &self.scratchpad
    }

    /// Recorded wire activity.
    pub fn events(&self) -> &[WireEvent] {
        &self.events
    }

    /// Drain the recorded wire activity.
    pub fn take_events(&mut self) -> Vec<WireEvent> {
        std::mem::take(&mut self.events)
    }

    fn refresh_crc(&mut self) {
        self.scratchpad[8] = checksum::crc8(&self.scratchpad[..8]);
    }

    /// One byte slot on the open-drain line: the master writes, the
    /// selected slave may drive bits low (wired-AND).
    fn exchange_byte(&mut self, written: u8) -> u8 {
        if !self.selected {
            return written;
        }
        match std::mem::replace(&mut self.state, SlaveState::Idle) {
            SlaveState::Idle => {
                match written {
                    // conversion finishes instantly; subsequent read
                    // slots see the line released (all ones)
                    commands::CONVERT_T => {}
                    commands::READ_SCRATCHPAD => {
                        self.state = SlaveState::Streaming(self.scratchpad.iter().copied().collect());
                    }
                    commands::WRITE_SCRATCHPAD => {
                        // TH, TL, config land at scratchpad bytes 2..5
                        self.state = SlaveState::Collecting {
                            offset: 2,
                            remaining: 3,
                        };
                    }
                    _ => {}
                }
                written
            }
            SlaveState::Streaming(mut queue) => {
                let driven = queue.pop_front().unwrap_or(0xFF);
                if !queue.is_empty() {
                    self.state = SlaveState::Streaming(queue);
                }
                written & driven
            }
            SlaveState::Collecting {
                mut offset,
                mut remaining,
            } => {
                self.scratchpad[offset] = written;
                offset += 1;
                remaining -= 1;
                if remaining == 0 {
                    self.refresh_crc();
                } else {
                    self.state = SlaveState::Collecting { offset, remaining };
                }
                written
            }
        }
    }

    fn exchange(&mut self, buf: &mut [u8]) {
        trace!("dummy exchange, {} slots", buf.len());
        for slot in buf.iter_mut() {
            *slot = self.exchange_byte(*slot);
        }
    }
}

impl BusMaster for DummyBus {
    fn features(&self) -> AdapterFeatures {
        self.config.features
    }

    fn max_bundle_len(&self) -> usize {
        self.config.max_bundle_len
    }

    fn reset(&mut self) -> Result<()> {
        self.events.push(WireEvent::Reset);
        self.state = SlaveState::Idle;
        Ok(())
    }

    fn select(&mut self, device: Option<&DeviceId>) -> Result<()> {
        self.events.push(WireEvent::Select(device.copied()));
        // reset + match ROM; a foreign id leaves every slave silent
        self.state = SlaveState::Idle;
        self.selected = device.is_some_and(|id| *id == self.device);
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.events.push(WireEvent::Send(data.to_vec()));
        let mut scratch = data.to_vec();
        self.exchange(&mut scratch);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        self.events.push(WireEvent::Receive(buf.len()));
        buf.fill(0xFF);
        self.exchange(buf);
        Ok(())
    }

    fn sendback(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > FIFO_DEPTH {
            return Err(Error::StepTooLarge);
        }
        self.events.push(WireEvent::Exchange(buf.to_vec()));
        self.exchange(buf);
        Ok(())
    }

    fn power_byte(&mut self, byte: u8, resp: &mut u8, hold: Duration) -> Result<()> {
        if !self.config.features.contains(AdapterFeatures::STRONG_PULLUP) {
            return Err(Error::PulseFailed);
        }
        self.events.push(WireEvent::PowerByte(byte));
        *resp = self.exchange_byte(byte);
        self.events.push(WireEvent::Wait(hold));
        Ok(())
    }

    fn program_pulse(&mut self) -> Result<()> {
        if !self.config.features.contains(AdapterFeatures::PROGRAM_PULSE) {
            return Err(Error::PulseFailed);
        }
        self.events.push(WireEvent::ProgramPulse);
        Ok(())
    }

    fn verify(&mut self, device: &DeviceId) -> Result<()> {
        self.events.push(WireEvent::Verify(*device));
        if *device == self.device {
            self.selected = true;
            Ok(())
        } else {
            Err(Error::VerifyFailed)
        }
    }

    fn wait(&mut self, d: Duration) {
        // in-memory bus: record the wait, don't sleep
        self.events.push(WireEvent::Wait(d));
    }
}
