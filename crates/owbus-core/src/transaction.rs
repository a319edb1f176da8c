//! Transaction log data model
//!
//! A transaction log is an ordered slice of [`Step`]s terminated by
//! [`Step::End`]; the engine never reads past the sentinel. Output
//! slices are borrowed from the caller; input slices are caller-owned
//! storage the engine writes through.

use std::time::Duration;

use crate::adapter::Adapter;
use crate::device::DeviceId;

/// One step of a transaction log.
///
/// Each variant corresponds to one bus instruction. Buffer shapes the
/// type system cannot rule out (length mismatches) are reported as
/// [`Error::StepShape`](crate::Error::StepShape) at execution time.
#[derive(Debug)]
pub enum Step<'a> {
    /// Address the context's resolved device. Required before most
    /// per-device steps.
    Select,
    /// Pure in-memory equality check of `expected` against `actual`;
    /// no wire activity.
    Compare {
        /// Reference bytes.
        expected: &'a [u8],
        /// Bytes captured by an earlier step.
        actual: &'a [u8],
    },
    /// Transmit bytes onto the bus. Zero-length payloads are skipped.
    Match {
        /// Bytes to transmit.
        out: &'a [u8],
    },
    /// Receive bytes from the bus into `input`.
    Read {
        /// Caller-owned landing area.
        input: &'a mut [u8],
    },
    /// Transmit `out` while capturing the line echo into `input`; one
    /// combined write/read cycle. Lengths must match.
    Modify {
        /// Bytes to transmit.
        out: &'a [u8],
        /// Echo landing area, same length as `out`.
        input: &'a mut [u8],
    },
    /// Transmit `out`, discarding the echo.
    Blind {
        /// Bytes to transmit.
        out: &'a [u8],
    },
    /// Send one byte, capture the response byte, then hold strong
    /// pull-up power for `hold` to energize the device.
    Power {
        /// Command byte to transmit.
        out: u8,
        /// Response byte landing area.
        input: &'a mut u8,
        /// Power hold duration after the byte.
        hold: Duration,
    },
    /// Programming voltage pulse, then settle for `hold`.
    Program {
        /// Settle delay after the pulse.
        hold: Duration,
    },
    /// Millisecond-scale wait; no wire activity.
    Delay {
        /// Wait length; zero is a no-op.
        millis: u32,
    },
    /// Microsecond-scale wait; no wire activity.
    MicroDelay {
        /// Wait length; zero is a no-op.
        micros: u32,
    },
    /// Reset pulse. Failure aborts the whole log immediately.
    Reset,
    /// Sentinel terminating the log; reported as overall success.
    End,
    /// Re-select from a scratch context with the device selection
    /// cleared, then confirm the originally resolved device is still
    /// the one answering.
    Verify,
    /// CRC8 residue check over `data` (trailing checksum included).
    Crc8 {
        /// Self-checking buffer.
        data: &'a [u8],
    },
    /// CRC8 residue check continuing from an explicit seed.
    Crc8Seeded {
        /// Self-checking buffer.
        data: &'a [u8],
        /// Seed captured from the device.
        seed: u32,
    },
    /// CRC16 residue check over `data`.
    Crc16 {
        /// Self-checking buffer.
        data: &'a [u8],
    },
    /// CRC16 residue check continuing from an explicit seed.
    Crc16Seeded {
        /// Self-checking buffer.
        data: &'a [u8],
        /// Seed captured from the device.
        seed: u32,
    },
    /// No effect, always succeeds.
    Nop,
}

impl Step<'_> {
    /// Step kind name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Select => "select",
            Step::Compare { .. } => "compare",
            Step::Match { .. } => "match",
            Step::Read { .. } => "read",
            Step::Modify { .. } => "modify",
            Step::Blind { .. } => "blind",
            Step::Power { .. } => "power",
            Step::Program { .. } => "program",
            Step::Delay { .. } => "delay",
            Step::MicroDelay { .. } => "udelay",
            Step::Reset => "reset",
            Step::End => "end",
            Step::Verify => "verify",
            Step::Crc8 { .. } => "crc8",
            Step::Crc8Seeded { .. } => "crc8seeded",
            Step::Crc16 { .. } => "crc16",
            Step::Crc16Seeded { .. } => "crc16seeded",
            Step::Nop => "nop",
        }
    }
}

/// Resolved execution context for one transaction: which adapter to
/// drive and which device, if any, the namespace layer picked.
pub struct TxContext<'a, B> {
    /// Adapter whose bus lock serializes this transaction.
    pub adapter: &'a Adapter<B>,
    /// Device resolved by the namespace layer.
    pub device: Option<DeviceId>,
}

impl<'a, B> TxContext<'a, B> {
    /// Context for a transaction against `device` on `adapter`.
    pub fn new(adapter: &'a Adapter<B>, device: Option<DeviceId>) -> Self {
        Self { adapter, device }
    }

    /// Scratch copy sharing the addressing context but with no device
    /// selected, so a re-selection performs a fresh lookup instead of
    /// trusting cached selection state.
    pub fn deselected(&self) -> TxContext<'a, B> {
        TxContext {
            adapter: self.adapter,
            device: None,
        }
    }
}
