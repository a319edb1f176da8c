//! Error types for owbus-core
//!
//! One crate-wide error enum covering caller-usage defects, data
//! integrity failures, capacity and resource failures, and bus-level
//! failures propagated from the adapter.

use thiserror::Error;

/// Core error type - Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    // Caller-usage defects
    /// A step's buffers violate the contract for its kind
    #[error("step buffers violate the contract for this step kind")]
    StepShape,
    /// The transaction context has no resolved device
    #[error("no device resolved in the transaction context")]
    NoDevice,

    // Data integrity
    /// In-memory comparison or echoed bus data did not match
    #[error("compare failed: data mismatch")]
    CompareMismatch,
    /// Checksum residue over the buffer is non-zero
    #[error("checksum residue is non-zero")]
    CrcMismatch,
    /// Device identity could not be confirmed on the bus
    #[error("device identity could not be confirmed")]
    VerifyFailed,

    // Capacity / resources
    /// A step's payload exceeds the adapter's maximum bundle size
    /// even on its own
    #[error("step payload exceeds the adapter's maximum bundle size")]
    StepTooLarge,
    /// Scratch buffer allocation failed
    #[error("scratch buffer allocation failed")]
    OutOfMemory,

    // Bus / hardware
    /// Reset pulse failed (line shorted or held low)
    #[error("bus reset failed")]
    ResetFailed,
    /// Device selection failed
    #[error("device selection failed")]
    SelectFailed,
    /// Raw byte transfer failed
    #[error("byte transfer failed")]
    TransferFailed,
    /// Strong pull-up or programming pulse failed
    #[error("power or programming pulse failed")]
    PulseFailed,
    /// Adapter is not ready or disconnected
    #[error("adapter not ready")]
    AdapterError,
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
