//! CRC8/CRC16 checksum primitives
//!
//! The Dallas/Maxim 1-Wire checksums: CRC8 with the reflected
//! polynomial 0x8C and CRC16 with the reflected polynomial 0xA001.
//! Both follow the self-checking convention: running the checksum
//! over a buffer that includes its own trailing checksum bytes
//! yields a zero residue.

const CRC8_POLY: u8 = 0x8C;
const CRC16_POLY: u16 = 0xA001;

/// CRC8 over `data`, seed 0.
pub fn crc8(data: &[u8]) -> u8 {
    crc8_seeded(data, 0)
}

/// CRC8 over `data` continuing from an explicit seed.
///
/// Only the low byte of the seed participates; the wide parameter
/// matches the seed captured from a device register.
pub fn crc8_seeded(data: &[u8], seed: u32) -> u8 {
    let mut crc = seed as u8;
    for &byte in data {
        let mut bits = byte;
        for _ in 0..8 {
            let mix = (crc ^ bits) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= CRC8_POLY;
            }
            bits >>= 1;
        }
    }
    crc
}

/// CRC16 over `data`, seed 0.
pub fn crc16(data: &[u8]) -> u16 {
    crc16_seeded(data, 0)
}

/// CRC16 over `data` continuing from an explicit seed.
pub fn crc16_seeded(data: &[u8], seed: u32) -> u16 {
    let mut crc = seed as u16;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    // ROM id example from Maxim application note 27
    const AN27_ROM: [u8; 7] = [0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00];

    #[test]
    fn crc8_known_vector() {
        assert_eq!(crc8(&AN27_ROM), 0xA2);
    }

    #[test]
    fn crc8_residue_zero_with_trailing_checksum() {
        let mut buf = [0u8; 8];
        buf[..7].copy_from_slice(&AN27_ROM);
        buf[7] = crc8(&AN27_ROM);
        assert_eq!(crc8(&buf), 0);
    }

    #[test]
    fn crc8_detects_single_bit_flip() {
        let mut buf = [0u8; 8];
        buf[..7].copy_from_slice(&AN27_ROM);
        buf[7] = crc8(&AN27_ROM);
        for i in 0..buf.len() {
            for bit in 0..8 {
                let mut corrupted = buf;
                corrupted[i] ^= 1 << bit;
                assert_ne!(crc8(&corrupted), 0, "flip at byte {} bit {}", i, bit);
            }
        }
    }

    #[test]
    fn crc8_seed_continuation() {
        let data = [0x28, 0xA2, 0xD4, 0x1C, 0x00, 0x17, 0x99];
        let (head, tail) = data.split_at(3);
        let rolled = crc8_seeded(tail, u32::from(crc8(head)));
        assert_eq!(rolled, crc8(&data));
    }

    #[test]
    fn crc16_check_value() {
        // standard CRC-16/ARC check value
        assert_eq!(crc16(b"123456789"), 0xBB3D);
    }

    #[test]
    fn crc16_residue_zero_with_trailing_checksum() {
        let data = [0xF0, 0x00, 0x55, 0xAA, 0x12, 0x34];
        let crc = crc16(&data).to_le_bytes();
        let mut buf = Vec::from(data);
        buf.extend_from_slice(&crc);
        assert_eq!(crc16(&buf), 0);
    }

    #[test]
    fn crc16_detects_single_bit_flip() {
        let data = [0xF0, 0x00, 0x55, 0xAA, 0x12, 0x34];
        let crc = crc16(&data).to_le_bytes();
        let mut buf = Vec::from(data);
        buf.extend_from_slice(&crc);
        for i in 0..buf.len() {
            let mut corrupted = buf.clone();
            corrupted[i] ^= 0x40;
            assert_ne!(crc16(&corrupted), 0, "flip in byte {}", i);
        }
    }

    #[test]
    fn crc16_seed_continuation() {
        let data = [0x0F, 0x00, 0x10, 0xDE, 0xAD, 0xBE, 0xEF];
        let (head, tail) = data.split_at(4);
        let rolled = crc16_seeded(tail, u32::from(crc16(head)));
        assert_eq!(rolled, crc16(&data));
    }
}
