//! 1-Wire device identity

use core::fmt;

use crate::checksum;

/// 64-bit ROM id: family code, 48-bit serial number, trailing CRC8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId([u8; 8]);

impl DeviceId {
    /// Wrap raw ROM bytes as read off the bus.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Build an id from family code and serial, computing the
    /// trailing CRC8.
    pub fn from_parts(family: u8, serial: [u8; 6]) -> Self {
        let mut bytes = [0u8; 8];
        bytes[0] = family;
        bytes[1..7].copy_from_slice(&serial);
        bytes[7] = checksum::crc8(&bytes[..7]);
        Self(bytes)
    }

    /// Device family code.
    pub fn family(&self) -> u8 {
        self.0[0]
    }

    /// 48-bit serial number.
    pub fn serial(&self) -> &[u8] {
        &self.0[1..7]
    }

    /// Trailing checksum byte.
    pub fn crc(&self) -> u8 {
        self.0[7]
    }

    /// Raw ROM bytes, wire order.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// The id is self-checking: CRC8 residue over all 8 bytes is zero.
    pub fn is_valid(&self) -> bool {
        checksum::crc8(&self.0) == 0
    }
}

impl fmt::Display for DeviceId {
    /// Dotted hex form, family first: `28.A2D41C000000`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}.", self.0[0])?;
        for byte in &self.0[1..7] {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}
