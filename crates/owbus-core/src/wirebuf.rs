//! Growable staging buffer for bundled wire cycles

use crate::error::{Error, Result};

/// Capacity growth quantum. Small appends dominate packing, so the
/// buffer grows in fixed chunks instead of per append.
const GROW_INCREMENT: usize = 64;

/// Append-only byte buffer with fallible, chunked capacity growth.
///
/// Backs a bundle's staging area. The buffer is two-phase: bytes
/// appended during packing form the outbound payload, and after the
/// wire cycle the same region holds the received bytes (the cycle
/// overwrites the payload in place, same length).
#[derive(Debug, Default)]
pub struct WireBuf {
    data: Vec<u8>,
}

impl WireBuf {
    /// Empty buffer, no capacity reserved yet.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Used length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing has been appended since the last clear.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append outbound bytes.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.grow_for(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Append `count` copies of `value` (read-slot filler).
    pub fn fill(&mut self, value: u8, count: usize) -> Result<()> {
        self.grow_for(count)?;
        let new_len = self.data.len() + count;
        self.data.resize(new_len, value);
        Ok(())
    }

    /// Drop the contents, keeping capacity for the next bundle.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Contents after the read phase.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// In-place view for the combined send/receive cycle.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn grow_for(&mut self, extra: usize) -> Result<()> {
        let needed = self.data.len() + extra;
        if needed > self.data.capacity() {
            let target = needed.div_ceil(GROW_INCREMENT) * GROW_INCREMENT;
            self.data
                .try_reserve_exact(target - self.data.len())
                .map_err(|_| Error::OutOfMemory)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_in_fixed_increments() {
        let mut buf = WireBuf::new();
        buf.append(&[0x44]).unwrap();
        assert_eq!(buf.len(), 1);
        assert!(buf.as_slice().len() <= buf.data.capacity());
        assert!(buf.data.capacity() >= GROW_INCREMENT);

        buf.fill(0xFF, GROW_INCREMENT).unwrap();
        assert_eq!(buf.len(), GROW_INCREMENT + 1);
        assert!(buf.data.capacity() >= 2 * GROW_INCREMENT);
    }

    #[test]
    fn append_then_fill_layout() {
        let mut buf = WireBuf::new();
        buf.append(&[0xBE, 0x00]).unwrap();
        buf.fill(0xFF, 3).unwrap();
        assert_eq!(buf.as_slice(), &[0xBE, 0x00, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn clear_resets_length_not_capacity() {
        let mut buf = WireBuf::new();
        buf.fill(0xAA, 10).unwrap();
        let cap = buf.data.capacity();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.data.capacity(), cap);
    }
}
