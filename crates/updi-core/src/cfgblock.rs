//! Configuration block: a variable-length record of fixed-size elements,
//! each describing one configurable firmware feature by a signature
//! range, paired with an [`crate::infoblock::InfoBlock`] via its
//! [`crate::infoblock::ConfigDescriptor`].
//!
//! Layout (little-endian):
//!
//! | offset            | len | field                              |
//! |-------------------|-----|-------------------------------------|
//! | 0                 | 2   | version tag, `"c1"`                 |
//! | 2                 | 2   | block size                          |
//! | 4                 | 8*n | `n` [`ConfigElement`] records        |
//! | 4 + 8*n           | 3   | CRC-24 over bytes `0..4+8*n`          |
//! | 4 + 8*n + 3       | 1   | reserved, written as zero            |
//!
//! Unlike the information block's CRC-8 self-check, the configuration
//! block's CRC-24 is a direct equality check against a recomputed value:
//! there is no "whole block including trailing bytes checks to zero"
//! shortcut for a 24-bit CRC laid out this way.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::crc;
use crate::error::{Error, Result};

/// Header size: version tag (2 bytes) + block size (2 bytes).
pub const HEADER_LEN: usize = 4;
/// Tail size: CRC-24 (3 bytes) + one reserved byte.
pub const TAIL_LEN: usize = 4;
/// Encoded size of one [`ConfigElement`].
pub const ELEMENT_LEN: usize = 8;

/// The version tag this crate writes and reads (`"c1"`).
pub const VERSION_TAG: [u8; 2] = [b'c', b'1'];

/// One configurable feature: how many instances exist, the signature
/// range that selects it, and the address range it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigElement {
    /// Number of instances of this feature.
    pub count: u16,
    /// Low bound of the feature's signature range.
    pub sig_lo: u16,
    /// High bound of the feature's signature range.
    pub sig_hi: u16,
    /// Address range (length) this feature occupies.
    pub range: u16,
}

impl ConfigElement {
    fn encode_into(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&self.count.to_le_bytes());
        buf[2..4].copy_from_slice(&self.sig_lo.to_le_bytes());
        buf[4..6].copy_from_slice(&self.sig_hi.to_le_bytes());
        buf[6..8].copy_from_slice(&self.range.to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        ConfigElement {
            count: u16::from_le_bytes([buf[0], buf[1]]),
            sig_lo: u16::from_le_bytes([buf[2], buf[3]]),
            sig_hi: u16::from_le_bytes([buf[4], buf[5]]),
            range: u16::from_le_bytes([buf[6], buf[7]]),
        }
    }
}

/// A parsed configuration block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg(feature = "alloc")]
pub struct ConfigBlock {
    /// The elements this block describes, in encoded order.
    pub elements: Vec<ConfigElement>,
}

#[cfg(feature = "alloc")]
impl ConfigBlock {
    /// Construct a block from its elements.
    pub fn new(elements: Vec<ConfigElement>) -> Self {
        ConfigBlock { elements }
    }

    /// Encoded size in bytes: header, one record per element, and tail.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + ELEMENT_LEN * self.elements.len() + TAIL_LEN
    }

    /// Encode this block, appending a CRC-24 computed over the header and
    /// element records.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = alloc::vec![0u8; self.encoded_len()];
        buf[0] = VERSION_TAG[0];
        buf[1] = VERSION_TAG[1];
        let size = self.encoded_len() as u16;
        buf[2..4].copy_from_slice(&size.to_le_bytes());
        for (i, element) in self.elements.iter().enumerate() {
            let start = HEADER_LEN + i * ELEMENT_LEN;
            element.encode_into(&mut buf[start..start + ELEMENT_LEN]);
        }
        let body_end = HEADER_LEN + ELEMENT_LEN * self.elements.len();
        let crc24 = crc::crc24(&buf[0..body_end]).to_le_bytes();
        buf[body_end..body_end + 3].copy_from_slice(&crc24[0..3]);
        buf[body_end + 3] = 0;
        buf
    }

    /// Decode and CRC-check a block. Returns [`Error::CrcMismatch`] if the
    /// recomputed CRC-24 does not match the trailing stored value.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN + TAIL_LEN {
            return Err(Error::InvalidArgument);
        }
        let remainder = bytes.len() - HEADER_LEN - TAIL_LEN;
        if remainder % ELEMENT_LEN != 0 {
            return Err(Error::InvalidArgument);
        }
        let element_count = remainder / ELEMENT_LEN;
        let body_end = HEADER_LEN + ELEMENT_LEN * element_count;

        let stored_crc =
            u32::from_le_bytes([bytes[body_end], bytes[body_end + 1], bytes[body_end + 2], 0]);
        let computed_crc = crc::crc24(&bytes[0..body_end]);
        if stored_crc != computed_crc {
            return Err(Error::CrcMismatch {
                expected: computed_crc,
                got: stored_crc,
            });
        }

        let mut elements = Vec::with_capacity(element_count);
        for i in 0..element_count {
            let start = HEADER_LEN + i * ELEMENT_LEN;
            elements.push(ConfigElement::decode_from(&bytes[start..start + ELEMENT_LEN]));
        }
        Ok(ConfigBlock { elements })
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;

    fn sample() -> ConfigBlock {
        ConfigBlock::new(alloc::vec![
            ConfigElement {
                count: 1,
                sig_lo: 0x10,
                sig_hi: 0x1F,
                range: 8,
            },
            ConfigElement {
                count: 2,
                sig_lo: 0x20,
                sig_hi: 0x2F,
                range: 16,
            },
        ])
    }

    #[test]
    fn encode_decode_round_trips() {
        let block = sample();
        let encoded = block.encode();
        let decoded = ConfigBlock::decode(&encoded).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn corrupted_body_fails_crc_check() {
        let block = sample();
        let mut encoded = block.encode();
        encoded[5] ^= 0xFF;
        let err = ConfigBlock::decode(&encoded).unwrap_err();
        assert!(matches!(err, Error::CrcMismatch { .. }));
    }

    #[test]
    fn empty_block_round_trips() {
        let block = ConfigBlock::new(Vec::new());
        let encoded = block.encode();
        assert_eq!(encoded.len(), HEADER_LEN + TAIL_LEN);
        let decoded = ConfigBlock::decode(&encoded).unwrap();
        assert!(decoded.elements.is_empty());
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let err = ConfigBlock::decode(&[0u8; 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument));
    }
}
