//! owbus-core - 1-Wire bus transaction engine
//!
//! This crate turns a declarative transaction log - an ordered
//! sequence of bus steps such as select, send, read, checksum, power
//! and delay - into correctly ordered and timed wire activity against
//! a 1-Wire adapter, with integrity checking and partial-failure
//! semantics. Adapters that advertise bundling get consecutive
//! compatible steps packed into one combined send/receive cycle.
//!
//! A bus lock serializes transactions per physical adapter; distinct
//! adapters run concurrently.
//!
//! # Example
//!
//! ```ignore
//! use owbus_core::{execute, Adapter, Step, TxContext};
//!
//! let adapter = Adapter::new(my_bus_master);
//! let ctx = TxContext::new(&adapter, Some(thermometer_id));
//!
//! let mut scratchpad = [0u8; 9];
//! let mut log = [
//!     Step::Select,
//!     Step::Match { out: &[0xBE] },
//!     Step::Read { input: &mut scratchpad },
//!     Step::End,
//! ];
//! execute(&ctx, &mut log)?;
//! let mut check = [Step::Crc8 { data: &scratchpad }, Step::End];
//! execute(&ctx, &mut check)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod adapter;
mod bundle;
pub mod checksum;
pub mod device;
pub mod engine;
pub mod error;
pub mod transaction;
pub mod wirebuf;

pub use adapter::{Adapter, AdapterFeatures, BusMaster};
pub use device::DeviceId;
pub use engine::{execute, execute_nolock};
pub use error::{Error, Result};
pub use transaction::{Step, TxContext};
