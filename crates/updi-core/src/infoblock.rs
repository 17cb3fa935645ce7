//! Information block: a 32-byte self-describing record written alongside a
//! programmed image so a later session can identify the firmware and check
//! it wasn't corrupted in transit.
//!
//! Layout (all multi-byte integers little-endian):
//!
//! | offset | len | field                                    |
//! |--------|-----|-------------------------------------------|
//! | 0      | 2   | version tag, `"s3"`                        |
//! | 2      | 2   | block size (32)                            |
//! | 4      | 3   | firmware version, 3 ASCII characters       |
//! | 7      | 1   | build nibbles (major high, minor low)      |
//! | 8      | 4   | firmware size in bytes                     |
//! | 12     | 2   | signal pointer                             |
//! | 14     | 2   | reference pointer                          |
//! | 16     | 2   | acquisition pointer                        |
//! | 18     | 2   | node pointer                               |
//! | 20     | 4   | config descriptor (tag, size)              |
//! | 24     | 4   | fuse descriptor (tag, size, crc)            |
//! | 28     | 3   | firmware CRC-24                            |
//! | 31     | 1   | block CRC-8                                |
//!
//! The block CRC-8 is computed over bytes 0..31 such that the CRC-8 of all
//! 32 bytes, trailing byte included, evaluates to zero (see [`crate::crc`]).

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::crc;

/// Total encoded size of an information block.
pub const INFO_BLOCK_LEN: usize = 32;

/// The version tag this crate writes and reads (`"s3"`).
pub const VERSION_TAG: [u8; 2] = [b's', b'3'];

/// Descriptor for the paired configuration block: its version tag and
/// encoded size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigDescriptor {
    /// Configuration block version tag, e.g. `"c1"`.
    pub version_tag: [u8; 2],
    /// Encoded size of the configuration block, in bytes.
    pub size: u16,
}

/// Descriptor for the fuse programming record embedded elsewhere in the
/// image: its version tag, encoded size, and a standalone CRC-8 checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseDescriptor {
    /// Fuse record version tag, e.g. `"f1"`.
    pub version_tag: [u8; 2],
    /// Encoded size of the fuse record, in bytes.
    pub size: u8,
    /// CRC-8 of the fuse record.
    pub crc: u8,
}

/// A parsed information block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoBlock {
    /// Firmware version, 3 ASCII characters (e.g. `b"1.2"`-style digits).
    pub firmware_version: [u8; 3],
    /// High nibble of the build-number byte.
    pub build_major: u8,
    /// Low nibble of the build-number byte.
    pub build_minor: u8,
    /// Size in bytes of the firmware image this block describes.
    pub firmware_size: u32,
    /// Address of the signal descriptor consumed by the running firmware.
    pub signal_ptr: u16,
    /// Address of the reference descriptor.
    pub reference_ptr: u16,
    /// Address of the acquisition descriptor.
    pub acq_ptr: u16,
    /// Address of the node descriptor.
    pub node_ptr: u16,
    /// Paired configuration block descriptor.
    pub config: ConfigDescriptor,
    /// Paired fuse record descriptor.
    pub fuses: FuseDescriptor,
    /// CRC-24 of the firmware image named by `firmware_size`.
    pub firmware_crc24: u32,
}

impl InfoBlock {
    /// Encode this block, computing the build byte and trailing CRC-8 so
    /// that `crc::crc8` over the full 32 bytes is zero.
    pub fn encode(&self) -> [u8; INFO_BLOCK_LEN] {
        let mut buf = [0u8; INFO_BLOCK_LEN];
        buf[0] = VERSION_TAG[0];
        buf[1] = VERSION_TAG[1];
        buf[2..4].copy_from_slice(&(INFO_BLOCK_LEN as u16).to_le_bytes());
        buf[4..7].copy_from_slice(&self.firmware_version);
        buf[7] = (self.build_major << 4) | (self.build_minor & 0x0F);
        buf[8..12].copy_from_slice(&self.firmware_size.to_le_bytes());
        buf[12..14].copy_from_slice(&self.signal_ptr.to_le_bytes());
        buf[14..16].copy_from_slice(&self.reference_ptr.to_le_bytes());
        buf[16..18].copy_from_slice(&self.acq_ptr.to_le_bytes());
        buf[18..20].copy_from_slice(&self.node_ptr.to_le_bytes());
        buf[20] = self.config.version_tag[0];
        buf[21] = self.config.version_tag[1];
        buf[22..24].copy_from_slice(&self.config.size.to_le_bytes());
        buf[24] = self.fuses.version_tag[0];
        buf[25] = self.fuses.version_tag[1];
        buf[26] = self.fuses.size;
        buf[27] = self.fuses.crc;
        let crc24 = self.firmware_crc24.to_le_bytes();
        buf[28..31].copy_from_slice(&crc24[0..3]);
        buf[31] = crc::crc8(&buf[0..31]);
        buf
    }

    /// Parse a block's fields without checking its CRC-8; callers that care
    /// about integrity should check [`block_crc8_ok`] first.
    pub fn decode(bytes: &[u8; INFO_BLOCK_LEN]) -> Self {
        let firmware_version = [bytes[4], bytes[5], bytes[6]];
        let build_major = bytes[7] >> 4;
        let build_minor = bytes[7] & 0x0F;
        let firmware_size = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let signal_ptr = u16::from_le_bytes([bytes[12], bytes[13]]);
        let reference_ptr = u16::from_le_bytes([bytes[14], bytes[15]]);
        let acq_ptr = u16::from_le_bytes([bytes[16], bytes[17]]);
        let node_ptr = u16::from_le_bytes([bytes[18], bytes[19]]);
        let config = ConfigDescriptor {
            version_tag: [bytes[20], bytes[21]],
            size: u16::from_le_bytes([bytes[22], bytes[23]]),
        };
        let fuses = FuseDescriptor {
            version_tag: [bytes[24], bytes[25]],
            size: bytes[26],
            crc: bytes[27],
        };
        let firmware_crc24 = u32::from_le_bytes([bytes[28], bytes[29], bytes[30], 0]);
        InfoBlock {
            firmware_version,
            build_major,
            build_minor,
            firmware_size,
            signal_ptr,
            reference_ptr,
            acq_ptr,
            node_ptr,
            config,
            fuses,
            firmware_crc24,
        }
    }

    /// `true` if this block still carries its own `"s3"` version tag.
    pub fn has_current_version_tag(bytes: &[u8; INFO_BLOCK_LEN]) -> bool {
        bytes[0] == VERSION_TAG[0] && bytes[1] == VERSION_TAG[1]
    }
}

/// `true` if the block's self-check CRC-8 (bytes 0..32 inclusive of the
/// trailing CRC byte) evaluates to zero.
pub fn block_crc8_ok(bytes: &[u8; INFO_BLOCK_LEN]) -> bool {
    crc::crc8(bytes) == 0
}

#[cfg(feature = "alloc")]
/// Encode into a freshly allocated `Vec`, for callers that want an owned
/// buffer rather than a fixed-size array.
pub fn encode_to_vec(block: &InfoBlock) -> Vec<u8> {
    block.encode().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InfoBlock {
        InfoBlock {
            firmware_version: *b"1.0",
            build_major: 1,
            build_minor: 2,
            firmware_size: 4096,
            signal_ptr: 0x0010,
            reference_ptr: 0x0020,
            acq_ptr: 0x0030,
            node_ptr: 0x0040,
            config: ConfigDescriptor {
                version_tag: [b'c', b'1'],
                size: 16,
            },
            fuses: FuseDescriptor {
                version_tag: [b'f', b'1'],
                size: 9,
                crc: 0xAB,
            },
            firmware_crc24: 0x00_ABCDEF & 0x00FF_FFFF,
        }
    }

    #[test]
    fn encoded_block_self_checks_to_zero() {
        let block = sample();
        let encoded = block.encode();
        assert!(block_crc8_ok(&encoded));
    }

    #[test]
    fn decode_round_trips_fields() {
        let block = sample();
        let encoded = block.encode();
        let decoded = InfoBlock::decode(&encoded);
        assert_eq!(decoded, block);
        assert!(InfoBlock::has_current_version_tag(&encoded));
    }

    #[test]
    fn corrupted_block_fails_self_check() {
        let block = sample();
        let mut encoded = block.encode();
        encoded[10] ^= 0xFF;
        assert!(!block_crc8_ok(&encoded));
    }
}
