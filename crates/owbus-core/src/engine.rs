//! Transaction driver and single-step executor
//!
//! [`execute`] is the entry point: it takes the adapter's bus lock,
//! dispatches to bundled or sequential execution based on the
//! adapter's capabilities, and releases the lock on every exit path.
//! [`execute_nolock`] is the same dispatch for callers already inside
//! a locked sequence.

use std::time::Duration;

use log::{debug, trace};

use crate::adapter::{AdapterFeatures, BusMaster};
use crate::bundle;
use crate::checksum;
use crate::error::{Error, Result};
use crate::transaction::{Step, TxContext};

/// Outcome of a single step: keep walking the log or stop at the
/// sentinel. A distinct type, not an error code, so the driver's
/// translation of `End` into overall success is structural.
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Execute a transaction log, holding the adapter's bus lock for the
/// duration. Empty logs succeed without touching the bus.
pub fn execute<B: BusMaster>(ctx: &TxContext<'_, B>, log: &mut [Step<'_>]) -> Result<()> {
    if log.is_empty() {
        return Ok(());
    }
    let mut line = ctx.adapter.lock();
    execute_nolock(&mut *line, ctx, log)
}

/// Execute a transaction log on an already-locked bus, for callers
/// composing a transaction inside a larger locked sequence.
pub fn execute_nolock<B: BusMaster>(
    line: &mut B,
    ctx: &TxContext<'_, B>,
    log: &mut [Step<'_>],
) -> Result<()> {
    if log.is_empty() {
        return Ok(());
    }
    if line.features().contains(AdapterFeatures::BUNDLING) && line.max_bundle_len() > 0 {
        debug!("transaction: {} steps, bundled", log.len());
        bundle::run_bundled(line, ctx, log)
    } else {
        debug!("transaction: {} steps, sequential", log.len());
        run_sequential(line, ctx, log)
    }
}

/// Baseline path: steps strictly in order, first failure wins, the
/// `End` sentinel stops iteration as success.
pub(crate) fn run_sequential<B: BusMaster>(
    line: &mut B,
    ctx: &TxContext<'_, B>,
    log: &mut [Step<'_>],
) -> Result<()> {
    for step in log.iter_mut() {
        match run_step(line, ctx, step)? {
            Flow::Stop => return Ok(()),
            Flow::Continue => {}
        }
    }
    Ok(())
}

/// Execute one step against the bus.
pub(crate) fn run_step<B: BusMaster>(
    line: &mut B,
    ctx: &TxContext<'_, B>,
    step: &mut Step<'_>,
) -> Result<Flow> {
    trace!("transaction step {}", step.name());
    match step {
        Step::Select => line.select(ctx.device.as_ref())?,
        Step::Compare { expected, actual } => compare_bytes(expected, actual)?,
        Step::Match { out } => {
            if !out.is_empty() {
                line.send(out)?;
            }
        }
        Step::Read { input } => {
            if !input.is_empty() {
                line.receive(input)?;
            }
        }
        Step::Modify { out, input } => {
            if out.len() != input.len() {
                return Err(Error::StepShape);
            }
            input.copy_from_slice(out);
            line.sendback(input)?;
        }
        Step::Blind { out } => {
            // echo is discarded through a bounded stack scratch
            let mut scratch = [0u8; 64];
            for chunk in out.chunks(scratch.len()) {
                let slot = &mut scratch[..chunk.len()];
                slot.copy_from_slice(chunk);
                line.sendback(slot)?;
            }
        }
        Step::Power { out, input, hold } => {
            let mut resp = 0u8;
            line.power_byte(*out, &mut resp, *hold)?;
            **input = resp;
        }
        Step::Program { hold } => {
            line.program_pulse()?;
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
        Step::Reset => line.reset()?,
        Step::End => return Ok(Flow::Stop),
        Step::Verify => {
            let device = ctx.device.as_ref().ok_or(Error::NoDevice)?;
            // fresh lookup through a scratch context with the
            // selection cleared
            let scratch = ctx.deselected();
            line.select(scratch.device.as_ref())?;
            line.verify(device)?;
        }
        Step::Crc8 { data } => check_residue(checksum::crc8(data) == 0)?,
        Step::Crc8Seeded { data, seed } => check_residue(checksum::crc8_seeded(data, *seed) == 0)?,
        Step::Crc16 { data } => check_residue(checksum::crc16(data) == 0)?,
        Step::Crc16Seeded { data, seed } => {
            check_residue(checksum::crc16_seeded(data, *seed) == 0)?
        }
        Step::Nop => {}
    }
    Ok(Flow::Continue)
}

pub(crate) fn compare_bytes(expected: &[u8], actual: &[u8]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(Error::StepShape);
    }
    if expected != actual {
        return Err(Error::CompareMismatch);
    }
    Ok(())
}

pub(crate) fn check_residue(ok: bool) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::CrcMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;
    use crate::checksum;
    use crate::device::DeviceId;

    /// Minimal loopback bus: reads return 0xAB, combined cycles echo
    /// the written bytes unchanged.
    struct Loopback {
        fail_reset: bool,
        resets: usize,
        sends: usize,
    }

    impl Loopback {
        fn new() -> Self {
            Self {
                fail_reset: false,
                resets: 0,
                sends: 0,
            }
        }
    }

    impl BusMaster for Loopback {
        fn features(&self) -> AdapterFeatures {
            AdapterFeatures::empty()
        }

        fn reset(&mut self) -> Result<()> {
            self.resets += 1;
            if self.fail_reset {
                Err(Error::ResetFailed)
            } else {
                Ok(())
            }
        }

        fn select(&mut self, _device: Option<&DeviceId>) -> Result<()> {
            Ok(())
        }

        fn send(&mut self, _data: &[u8]) -> Result<()> {
            self.sends += 1;
            Ok(())
        }

        fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
            buf.fill(0xAB);
            Ok(())
        }

        fn sendback(&mut self, _buf: &mut [u8]) -> Result<()> {
            Ok(())
        }

        fn verify(&mut self, _device: &DeviceId) -> Result<()> {
            Ok(())
        }

        fn wait(&mut self, _d: Duration) {}
    }

    fn ctx_and_adapter() -> Adapter<Loopback> {
        Adapter::new(Loopback::new())
    }

    #[test]
    fn empty_log_succeeds_without_bus_activity() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        assert_eq!(execute(&ctx, &mut []), Ok(()));
    }

    #[test]
    fn end_sentinel_stops_iteration() {
        let adapter = ctx_and_adapter();
        {
            adapter.lock().fail_reset = true;
        }
        let ctx = TxContext::new(&adapter, None);
        // reset after End must never run
        let mut log = [Step::Nop, Step::End, Step::Reset];
        assert_eq!(execute(&ctx, &mut log), Ok(()));
        assert_eq!(adapter.lock().resets, 0);
    }

    #[test]
    fn first_failure_is_returned() {
        let adapter = ctx_and_adapter();
        {
            adapter.lock().fail_reset = true;
        }
        let ctx = TxContext::new(&adapter, None);
        let mut log = [Step::Reset, Step::Nop, Step::End];
        assert_eq!(execute(&ctx, &mut log), Err(Error::ResetFailed));
    }

    #[test]
    fn reset_success_continues() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut log = [Step::Reset, Step::Match { out: &[0xCC] }, Step::End];
        assert_eq!(execute(&ctx, &mut log), Ok(()));
        let line = adapter.lock();
        assert_eq!(line.resets, 1);
        assert_eq!(line.sends, 1);
    }

    #[test]
    fn compare_equal_succeeds() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut log = [
            Step::Compare {
                expected: &[1, 2, 3],
                actual: &[1, 2, 3],
            },
            Step::End,
        ];
        assert_eq!(execute(&ctx, &mut log), Ok(()));
    }

    #[test]
    fn compare_mismatch_is_integrity_failure() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut log = [
            Step::Compare {
                expected: &[1, 2, 3],
                actual: &[1, 2, 4],
            },
            Step::End,
        ];
        assert_eq!(execute(&ctx, &mut log), Err(Error::CompareMismatch));
    }

    #[test]
    fn compare_length_mismatch_is_shape_error() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut log = [
            Step::Compare {
                expected: &[1, 2],
                actual: &[1, 2, 3],
            },
            Step::End,
        ];
        assert_eq!(execute(&ctx, &mut log), Err(Error::StepShape));
    }

    #[test]
    fn modify_length_mismatch_is_shape_error() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut input = [0u8; 3];
        let mut log = [
            Step::Modify {
                out: &[0x55, 0xAA],
                input: &mut input,
            },
            Step::End,
        ];
        assert_eq!(execute(&ctx, &mut log), Err(Error::StepShape));
    }

    #[test]
    fn read_fills_caller_buffer() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut input = [0u8; 4];
        let mut log = [Step::Read { input: &mut input }, Step::End];
        assert_eq!(execute(&ctx, &mut log), Ok(()));
        assert_eq!(input, [0xAB; 4]);
    }

    #[test]
    fn zero_size_match_and_read_are_noops() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut log = [
            Step::Match { out: &[] },
            Step::Read { input: &mut [] },
            Step::End,
        ];
        assert_eq!(execute(&ctx, &mut log), Ok(()));
        assert_eq!(adapter.lock().sends, 0);
    }

    #[test]
    fn crc_steps_validate_residue() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);

        let mut buf = [0x28, 0xA2, 0xD4, 0x1C, 0x00, 0x00, 0x00, 0x00];
        buf[7] = checksum::crc8(&buf[..7]);
        let mut log = [Step::Crc8 { data: &buf }, Step::End];
        assert_eq!(execute(&ctx, &mut log), Ok(()));

        let mut corrupted = buf;
        corrupted[2] ^= 0x08;
        let mut log = [Step::Crc8 { data: &corrupted }, Step::End];
        assert_eq!(execute(&ctx, &mut log), Err(Error::CrcMismatch));
    }

    #[test]
    fn verify_without_device_is_usage_error() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut log = [Step::Verify, Step::End];
        assert_eq!(execute(&ctx, &mut log), Err(Error::NoDevice));
    }

    #[test]
    fn program_without_capability_fails() {
        let adapter = ctx_and_adapter();
        let ctx = TxContext::new(&adapter, None);
        let mut log = [
            Step::Program {
                hold: Duration::from_micros(480),
            },
            Step::End,
        ];
        assert_eq!(execute(&ctx, &mut log), Err(Error::PulseFailed));
    }
}
