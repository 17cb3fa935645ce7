//! `--update`: rebuild the information block from the just-programmed image
//! and write it to EEPROM, then immediately read it back and check both of
//! its CRCs.
//!
//! The distilled spec's information-block inputs (variable-address map,
//! config/fuse descriptors) are ordinarily resolved from a map file, which
//! is out of scope here (see `updi_core::image`'s stated non-goal on
//! HEX/map parsing). Lacking a map file, this fills those fields with inert
//! placeholders and derives `firmware_size` from the programmed image
//! itself, so the block's self-check and firmware CRC-24 still hold.

use updi_core::chip::RegionKind;
use updi_core::image::ImageSegment;
use updi_core::infoblock::{ConfigDescriptor, FuseDescriptor};
use updi_core::nvm::Nvm;
use updi_core::operation::{self, InfoBlockInputs};
use updi_core::transport::Transport;

use crate::error::CliError;

/// EEPROM offset the information block is written to and read back from.
const INFO_BLOCK_OFFSET: u32 = 0;

pub fn run_update<T: Transport>(nvm: &mut Nvm<T>, segments: &[ImageSegment]) -> Result<(), CliError> {
    let firmware_size = segments
        .iter()
        .map(|s| s.absolute_base() + s.bytes.len() as u32)
        .max()
        .ok_or_else(|| CliError::InvalidArgument("--update requires --file".into()))?;

    let inputs = InfoBlockInputs {
        firmware_version_addr: 0,
        firmware_size,
        build_major: 0,
        build_minor: 0,
        signal_ptr: 0,
        reference_ptr: 0,
        acq_ptr: 0,
        node_ptr: 0,
        config: ConfigDescriptor {
            version_tag: [b'c', b'0'],
            size: 0,
        },
        fuses: FuseDescriptor {
            version_tag: [b'f', b'1'],
            size: 0,
            crc: 0,
        },
    };

    let block = operation::write_info_block(nvm, RegionKind::Eeprom, INFO_BLOCK_OFFSET, inputs)?;
    println!(
        "Wrote information block: firmware size {} byte(s), CRC-24 0x{:06X}",
        block.firmware_size, block.firmware_crc24
    );

    let verified = operation::verify_info_block(nvm, RegionKind::Eeprom, INFO_BLOCK_OFFSET)?;
    println!(
        "Verified information block: firmware CRC-24 0x{:06X} matches flash contents",
        verified.firmware_crc24
    );
    Ok(())
}
