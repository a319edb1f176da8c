//! Step bundling optimizer
//!
//! Every wire cycle has fixed round-trip overhead; adapters that
//! accept one large combined send/receive buffer amortize it across
//! many logical steps. This module packs consecutive compatible steps
//! into one cycle, ships it, and unpacks the results back into each
//! step's buffers. The observable outcome is identical to running
//! every step through the single-step executor; anything that cannot
//! ride in a bundle degrades to that path.

use std::time::Duration;

use log::{debug, trace};

use crate::adapter::BusMaster;
use crate::checksum;
use crate::engine::{self, Flow};
use crate::error::{Error, Result};
use crate::transaction::{Step, TxContext};
use crate::wirebuf::WireBuf;

/// 1-Wire idle/read-trigger fill pattern for reserved read slots.
const READ_SLOT: u8 = 0xFF;

/// Packing verdict for one step against the in-progress bundle.
enum Pack {
    /// Folded into the current bundle.
    Packed,
    /// Does not fit alongside the current contents; flush the bundle,
    /// then retry into an empty one.
    FlushRetry,
    /// Can never ride in a bundle, or exceeds the ceiling even alone;
    /// flush, then take the single-step path.
    NeverFits,
}

/// Transient per-invocation bundle state.
///
/// Either empty (`packets == 0`, buffer empty) or holding a run of
/// packed steps. Cleared after every ship or packing failure; never
/// persists across driver calls.
struct Bundle {
    /// Log index of the first packed step.
    start: usize,
    /// Number of packed steps.
    packets: usize,
    /// Staging buffer: outbound payload, then inbound after the cycle.
    buf: WireBuf,
    /// Adapter's bundle byte ceiling.
    max_len: usize,
    /// Step 0 of the bundle is a device select.
    select_first: bool,
}

impl Bundle {
    fn new(max_len: usize) -> Self {
        Self {
            start: 0,
            packets: 0,
            buf: WireBuf::new(),
            max_len,
            select_first: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.packets == 0
    }

    /// Size-fit check for a step wanting `extra` payload bytes.
    /// `None` means it fits as-is.
    fn fits(&self, extra: usize) -> Option<Pack> {
        if extra > self.max_len {
            Some(Pack::NeverFits)
        } else if self.buf.len() + extra > self.max_len {
            Some(Pack::FlushRetry)
        } else {
            None
        }
    }

    /// Try to fold the step at log index `index` into the bundle.
    fn try_pack(&mut self, index: usize, step: &Step<'_>) -> Result<Pack> {
        let verdict = match step {
            // only packable as the first item of an empty bundle
            Step::Select => {
                if !self.is_empty() {
                    return Ok(Pack::FlushRetry);
                }
                self.select_first = true;
                Pack::Packed
            }
            // resolved at unpack time from data already at hand;
            // contribute no wire bytes
            Step::Compare { .. }
            | Step::Crc8 { .. }
            | Step::Crc8Seeded { .. }
            | Step::Crc16 { .. }
            | Step::Crc16Seeded { .. }
            | Step::Nop => Pack::Packed,
            Step::Read { input } => {
                if let Some(verdict) = self.fits(input.len()) {
                    return Ok(verdict);
                }
                self.buf.fill(READ_SLOT, input.len())?;
                Pack::Packed
            }
            Step::Match { out } | Step::Blind { out } => {
                if let Some(verdict) = self.fits(out.len()) {
                    return Ok(verdict);
                }
                self.buf.append(out)?;
                Pack::Packed
            }
            Step::Modify { out, input } => {
                if out.len() != input.len() {
                    return Err(Error::StepShape);
                }
                if let Some(verdict) = self.fits(out.len()) {
                    return Ok(verdict);
                }
                self.buf.append(out)?;
                Pack::Packed
            }
            Step::Power { out, .. } => {
                if let Some(verdict) = self.fits(1) {
                    return Ok(verdict);
                }
                self.buf.append(&[*out])?;
                Pack::Packed
            }
            // post-ship waits; contribute no wire bytes
            Step::Delay { .. } | Step::MicroDelay { .. } => Pack::Packed,
            // line-level operations never ride in a bundle
            Step::Reset | Step::End | Step::Verify | Step::Program { .. } => Pack::NeverFits,
        };
        if matches!(verdict, Pack::Packed) {
            if self.packets == 0 {
                self.start = index;
            }
            self.packets += 1;
        }
        Ok(verdict)
    }

    /// Ship the bundle and write results back into the packed steps.
    /// The staging buffer and packet count are cleared on every exit,
    /// success or failure.
    fn flush<B: BusMaster>(
        &mut self,
        line: &mut B,
        ctx: &TxContext<'_, B>,
        log: &mut [Step<'_>],
    ) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let result = self.ship(line, ctx, log);
        self.buf.clear();
        self.packets = 0;
        self.select_first = false;
        result
    }

    fn ship<B: BusMaster>(
        &mut self,
        line: &mut B,
        ctx: &TxContext<'_, B>,
        log: &mut [Step<'_>],
    ) -> Result<()> {
        debug!(
            "shipping bundle: {} packets, {} bytes, select_first={}",
            self.packets,
            self.buf.len(),
            self.select_first
        );
        if self.select_first {
            if self.buf.is_empty() {
                line.select(ctx.device.as_ref())?;
            } else {
                line.select_sendback(ctx.device.as_ref(), self.buf.as_mut_slice())?;
            }
        } else if !self.buf.is_empty() {
            line.sendback(self.buf.as_mut_slice())?;
        }
        self.unpack(line, log)
    }

    /// Walk the packed steps in original order against the returned
    /// buffer, consuming bytes exactly as the single-step path would.
    fn unpack<B: BusMaster>(&mut self, line: &mut B, log: &mut [Step<'_>]) -> Result<()> {
        let mut cursor = 0usize;
        for step in log[self.start..self.start + self.packets].iter_mut() {
            trace!("bundle unpack step {}", step.name());
            match step {
                Step::Select => {}
                Step::Compare { expected, actual } => engine::compare_bytes(expected, actual)?,
                Step::Match { out } => {
                    let echoed = &self.buf.as_slice()[cursor..cursor + out.len()];
                    cursor += out.len();
                    if echoed != *out {
                        return Err(Error::CompareMismatch);
                    }
                }
                Step::Read { input } => {
                    let len = input.len();
                    input.copy_from_slice(&self.buf.as_slice()[cursor..cursor + len]);
                    cursor += len;
                }
                Step::Modify { input, .. } => {
                    let len = input.len();
                    input.copy_from_slice(&self.buf.as_slice()[cursor..cursor + len]);
                    cursor += len;
                }
                Step::Blind { out } => cursor += out.len(),
                Step::Power { input, hold, .. } => {
                    **input = self.buf.as_slice()[cursor];
                    cursor += 1;
                    if !hold.is_zero() {
                        line.wait(*hold);
                    }
                }
                Step::Delay { millis } => {
                    if *millis > 0 {
                        line.wait(Duration::from_millis(u64::from(*millis)));
                    }
                }
                Step::MicroDelay { micros } => {
                    if *micros > 0 {
                        line.wait(Duration::from_micros(u64::from(*micros)));
                    }
                }
                // checksums validate the caller's buffers, never the
                // wire buffer; they were never transmitted
                Step::Crc8 { data } => engine::check_residue(checksum::crc8(data) == 0)?,
                Step::Crc8Seeded { data, seed } => {
                    engine::check_residue(checksum::crc8_seeded(data, *seed) == 0)?
                }
                Step::Crc16 { data } => engine::check_residue(checksum::crc16(data) == 0)?,
                Step::Crc16Seeded { data, seed } => {
                    engine::check_residue(checksum::crc16_seeded(data, *seed) == 0)?
                }
                Step::Nop => {}
                // never packed
                Step::Reset | Step::End | Step::Verify | Step::Program { .. } => {
                    return Err(Error::StepShape);
                }
            }
        }
        Ok(())
    }
}

/// Bundled execution: same observable outcome as the sequential path,
/// fewer wire cycles.
pub(crate) fn run_bundled<B: BusMaster>(
    line: &mut B,
    ctx: &TxContext<'_, B>,
    log: &mut [Step<'_>],
) -> Result<()> {
    let mut bundle = Bundle::new(line.max_bundle_len());
    let mut index = 0;
    while index < log.len() {
        if matches!(log[index], Step::End) {
            return bundle.flush(line, ctx, log);
        }
        let verdict = bundle.try_pack(index, &log[index])?;
        match verdict {
            Pack::Packed => index += 1,
            Pack::FlushRetry => {
                bundle.flush(line, ctx, log)?;
                // retry into the now-empty bundle; degrade to the
                // single-step path if it still cannot ride
                let retry = bundle.try_pack(index, &log[index])?;
                match retry {
                    Pack::Packed => {}
                    Pack::FlushRetry | Pack::NeverFits => run_one(line, ctx, &mut log[index])?,
                }
                index += 1;
            }
            Pack::NeverFits => {
                bundle.flush(line, ctx, log)?;
                run_one(line, ctx, &mut log[index])?;
                index += 1;
            }
        }
    }
    bundle.flush(line, ctx, log)
}

fn run_one<B: BusMaster>(
    line: &mut B,
    ctx: &TxContext<'_, B>,
    step: &mut Step<'_>,
) -> Result<()> {
    // `End` is handled before packing; nothing here stops iteration
    match engine::run_step(line, ctx, step)? {
        Flow::Stop | Flow::Continue => Ok(()),
    }
}
