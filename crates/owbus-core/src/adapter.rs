//! Bus master trait and per-adapter locking
//!
//! Adapter crates implement [`BusMaster`]; the transaction engine
//! drives these primitives and never touches the electrical layer
//! itself. [`Adapter`] pairs a bus master with its exclusive bus
//! lock - one lock per physical adapter, no global lock table.

use std::time::Duration;

use bitflags::bitflags;
use parking_lot::{Mutex, MutexGuard};

use crate::device::DeviceId;
use crate::error::{Error, Result};

bitflags! {
    /// Capability flags advertised by a bus master.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AdapterFeatures: u32 {
        /// Accepts many steps packed into one combined send/receive cycle
        const BUNDLING      = 1 << 0;
        /// Can hold strong pull-up power on the line after a byte
        const STRONG_PULLUP = 1 << 1;
        /// Can generate a 12V EPROM programming pulse
        const PROGRAM_PULSE = 1 << 2;
    }
}

impl Default for AdapterFeatures {
    fn default() -> Self {
        AdapterFeatures::empty()
    }
}

/// Low-level 1-Wire bus master primitives.
pub trait BusMaster {
    /// Capabilities of this adapter.
    fn features(&self) -> AdapterFeatures;

    /// Maximum payload bytes accepted in one bundled cycle. Only
    /// meaningful when `BUNDLING` is advertised.
    fn max_bundle_len(&self) -> usize {
        0
    }

    /// Issue a reset pulse on the line.
    fn reset(&mut self) -> Result<()>;

    /// Address a device on the bus. `None` addresses the bus path
    /// without picking a particular device, as a fresh-lookup
    /// re-selection does.
    fn select(&mut self, device: Option<&DeviceId>) -> Result<()>;

    /// Transmit bytes, discarding the line echo.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes into `buf`; the master drives idle read slots.
    fn receive(&mut self, buf: &mut [u8]) -> Result<()>;

    /// One combined cycle: `buf` is transmitted, then overwritten in
    /// place with the bytes seen on the line.
    fn sendback(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Device selection followed by a combined cycle, as one wire
    /// transaction. Adapters with native batching can fold the
    /// address bytes into the same cycle.
    fn select_sendback(&mut self, device: Option<&DeviceId>, buf: &mut [u8]) -> Result<()> {
        self.select(device)?;
        self.sendback(buf)
    }

    /// Send one byte, capture the line response into `resp`, then
    /// hold power on the line for `hold`.
    ///
    /// The default has no real strong pull-up: plain transfer on the
    /// normal pull-up resistor, then wait.
    fn power_byte(&mut self, byte: u8, resp: &mut u8, hold: Duration) -> Result<()> {
        let mut slot = [byte];
        self.sendback(&mut slot)?;
        *resp = slot[0];
        self.wait(hold);
        Ok(())
    }

    /// Issue a programming voltage pulse.
    fn program_pulse(&mut self) -> Result<()> {
        Err(Error::PulseFailed)
    }

    /// Confirm `device` is present and responding on the bus.
    fn verify(&mut self, device: &DeviceId) -> Result<()>;

    /// Block for `d` of real time.
    fn wait(&mut self, d: Duration);
}

/// A physical adapter paired with its exclusive bus lock.
///
/// Exactly one lock exists per adapter instance; transactions against
/// distinct adapters never contend.
pub struct Adapter<B> {
    line: Mutex<B>,
}

impl<B: BusMaster> Adapter<B> {
    /// Wrap a bus master in its bus lock.
    pub fn new(line: B) -> Self {
        Self {
            line: Mutex::new(line),
        }
    }

    /// Take the bus lock, blocking until this adapter is free.
    pub fn lock(&self) -> MutexGuard<'_, B> {
        self.line.lock()
    }

    /// Consume the adapter, returning the bus master.
    pub fn into_inner(self) -> B {
        self.line.into_inner()
    }
}
