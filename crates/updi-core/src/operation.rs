//! Operation driver: the thin composition of PHY/LINK/APP/NVM calls that a
//! front end (CLI, GUI, test harness) actually wants to call — connect,
//! erase, program an image, dump an image, write/verify an information
//! block, and the simpler one-shot read/write/fuse/reset operations.
//!
//! Nothing here talks to a transport directly; it only sequences the calls
//! [`crate::nvm::Nvm`] and [`crate::app::App`] already expose. Exit-code
//! mapping stays a front-end concern — this module only ever returns
//! [`crate::error::Error`].

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::app::{App, AppConfig};
use crate::chip::{DeviceDescriptor, RegionKind};
use crate::error::{Error, Result};
use crate::link::Link;
use crate::nvm::{self, Nvm};
use crate::phy::Phy;
use crate::transport::Transport;

#[cfg(feature = "alloc")]
use crate::cfgblock::ConfigBlock;
#[cfg(feature = "alloc")]
use crate::image::ImageSegment;
use crate::infoblock::{ConfigDescriptor, FuseDescriptor, InfoBlock};

/// Bring a fresh transport up through PHY/LINK/APP and hand back a ready
/// [`Nvm`] session for `device`.
///
/// Issues a double BREAK to force the target to resynchronize before
/// negotiating the LINK layer, since a session may be opening against a
/// target left in an unknown state by a previous run.
pub fn connect<T: Transport>(
    transport: T,
    baud: u32,
    guard: u32,
    device: DeviceDescriptor,
) -> Result<Nvm<T>> {
    let mut phy = Phy::new(transport, baud)?;
    phy.send_double_break()?;
    let mut link = Link::new(phy);
    link.initialize(baud, guard)?;

    let app_config = AppConfig {
        syscfg_address: device.syscfg_address,
        nvmctrl_address: device.nvmctrl_address,
        sigrow_address: device.sigrow_address,
        nvm_version: device.nvm_version,
    };
    let app = App::new(link, app_config);
    Ok(Nvm::new(app, device))
}

/// Run `f` against `nvm`, then always attempt `leave_progmode` as a cleanup
/// step regardless of whether `f` succeeded — a failed NVM operation should
/// not leave the target stuck in programming mode. `f`'s result takes
/// priority; the cleanup's own error is discarded.
pub fn run_session<T, F, R>(nvm: &mut Nvm<T>, f: F) -> Result<R>
where
    T: Transport,
    F: FnOnce(&mut Nvm<T>) -> Result<R>,
{
    let result = f(nvm);
    let _ = nvm.leave_progmode();
    result
}

/// Unlock a locked device via the chip-erase key sequence.
pub fn unlock<T: Transport>(nvm: &mut Nvm<T>) -> Result<()> {
    nvm.unlock_device()
}

/// Enter programming mode and issue a whole-chip erase.
pub fn erase<T: Transport>(nvm: &mut Nvm<T>) -> Result<()> {
    nvm.enter_progmode()?;
    nvm.chip_erase()
}

/// Reset the target and, if it was previously in programming mode,
/// re-enter it.
pub fn reset<T: Transport>(nvm: &mut Nvm<T>) -> Result<()> {
    nvm.reset(nvm::RESET_DELAY_DEFAULT_MS)
}

/// Read `len` bytes from a named region at `offset`.
#[cfg(feature = "alloc")]
pub fn read_memory<T: Transport>(
    nvm: &mut Nvm<T>,
    region: RegionKind,
    offset: u32,
    len: usize,
) -> Result<Vec<u8>> {
    nvm.read_region(region, offset, len)
}

/// Write `bytes` to a named region at `offset`, dispatching to the region's
/// write discipline (paged NVM write, fuse byte-skip, or direct SRAM).
pub fn write_memory<T: Transport>(
    nvm: &mut Nvm<T>,
    region: RegionKind,
    offset: u32,
    bytes: &[u8],
) -> Result<()> {
    match region {
        RegionKind::Flash => nvm.write_flash(offset, bytes),
        RegionKind::Eeprom => nvm.write_eeprom(offset, bytes),
        RegionKind::UserRow => nvm.write_userrow(offset, bytes),
        RegionKind::Fuses => nvm.write_fuses(offset, bytes),
        RegionKind::Sram => nvm.write_sram(offset, bytes),
    }
}

/// Write a set of individual fuse bytes, given as `(address, value)` pairs.
pub fn write_fuses<T: Transport>(nvm: &mut Nvm<T>, pairs: &[(u32, u8)]) -> Result<()> {
    nvm.enter_progmode()?;
    for &(addr, value) in pairs {
        nvm.write_fuses(addr, core::slice::from_ref(&value))?;
    }
    Ok(())
}

/// Program an image: enter programming mode, erase the whole chip, then
/// write each segment to whichever region its absolute address falls in.
/// Empty segments are skipped.
#[cfg(feature = "alloc")]
pub fn program_image<T: Transport>(nvm: &mut Nvm<T>, segments: &[ImageSegment]) -> Result<()> {
    nvm.enter_progmode()?;
    nvm.chip_erase()?;
    for segment in segments {
        if segment.bytes.is_empty() {
            continue;
        }
        nvm.write_auto(segment.absolute_base(), &segment.bytes)?;
    }
    Ok(())
}

/// Read back every populated region (flash, EEPROM, user row, fuses) as one
/// segment each, for a full-image dump.
#[cfg(feature = "alloc")]
pub fn dump_image<T: Transport>(nvm: &mut Nvm<T>) -> Result<Vec<ImageSegment>> {
    let mut segments = Vec::new();
    for kind in [
        RegionKind::Flash,
        RegionKind::Eeprom,
        RegionKind::UserRow,
        RegionKind::Fuses,
    ] {
        let region = *nvm.get_region(kind);
        if region.size == 0 {
            continue;
        }
        let bytes = nvm.read_region(kind, region.start, region.size as usize)?;
        segments.push(ImageSegment {
            segment_id: 0,
            addr_from: region.start,
            addr_to: region.start + region.size - 1,
            bytes,
        });
    }
    Ok(segments)
}

/// Inputs that aren't derivable from reading the target itself, needed to
/// build a new information block.
#[derive(Debug, Clone, Copy)]
pub struct InfoBlockInputs {
    /// Flash-relative address of the 3-byte ASCII firmware version string.
    pub firmware_version_addr: u32,
    /// Number of bytes of flash the firmware occupies, used both to locate
    /// the version string and to compute the firmware CRC-24.
    pub firmware_size: u32,
    /// High nibble of the build-number byte.
    pub build_major: u8,
    /// Low nibble of the build-number byte.
    pub build_minor: u8,
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
}

/// Build an information block from freshly-read target state and write it
/// to `target` (EEPROM or user row only) at `offset`.
#[cfg(feature = "alloc")]
pub fn write_info_block<T: Transport>(
    nvm: &mut Nvm<T>,
    target: RegionKind,
    offset: u32,
    inputs: InfoBlockInputs,
) -> Result<InfoBlock> {
    if !matches!(target, RegionKind::Eeprom | RegionKind::UserRow) {
        return Err(Error::InvalidArgument);
    }
    nvm.enter_progmode()?;

    let firmware = nvm.read_region(RegionKind::Flash, 0, inputs.firmware_size as usize)?;
    let firmware_crc24 = crate::crc::crc24(&firmware);

    let mut firmware_version = [0u8; 3];
    nvm.read_region_into(
        RegionKind::Flash,
        inputs.firmware_version_addr,
        &mut firmware_version,
    )?;

    let block = InfoBlock {
        firmware_version,
        build_major: inputs.build_major,
        build_minor: inputs.build_minor,
        firmware_size: inputs.firmware_size,
        signal_ptr: inputs.signal_ptr,
        reference_ptr: inputs.reference_ptr,
        acq_ptr: inputs.acq_ptr,
        node_ptr: inputs.node_ptr,
        config: inputs.config,
        fuses: inputs.fuses,
        firmware_crc24,
    };
    let encoded = block.encode();

    match target {
        RegionKind::Eeprom => nvm.write_eeprom(offset, &encoded)?,
        RegionKind::UserRow => nvm.write_userrow(offset, &encoded)?,
        _ => unreachable!("checked above"),
    }
    Ok(block)
}

/// Read an information block back from `target` at `offset`, check its
/// self-contained CRC-8, then check its firmware CRC-24 against a fresh
/// read of flash. Issues no writes.
#[cfg(feature = "alloc")]
pub fn verify_info_block<T: Transport>(
    nvm: &mut Nvm<T>,
    target: RegionKind,
    offset: u32,
) -> Result<InfoBlock> {
    if !matches!(target, RegionKind::Eeprom | RegionKind::UserRow) {
        return Err(Error::InvalidArgument);
    }
    let mut raw = [0u8; crate::infoblock::INFO_BLOCK_LEN];
    nvm.read_region_into(target, offset, &mut raw)?;

    if !crate::infoblock::block_crc8_ok(&raw) {
        return Err(Error::CrcMismatch {
            expected: 0,
            got: crate::crc::crc8(&raw) as u32,
        });
    }
    let block = InfoBlock::decode(&raw);

    let firmware = nvm.read_region(RegionKind::Flash, 0, block.firmware_size as usize)?;
    let recomputed = crate::crc::crc24(&firmware);
    if recomputed != block.firmware_crc24 {
        return Err(Error::CrcMismatch {
            expected: block.firmware_crc24,
            got: recomputed,
        });
    }
    Ok(block)
}

/// Read a configuration block back from `target` at `offset`, checking its
/// CRC-24 against the trailing stored value.
#[cfg(feature = "alloc")]
pub fn read_config_block<T: Transport>(
    nvm: &mut Nvm<T>,
    target: RegionKind,
    offset: u32,
    len: usize,
) -> Result<ConfigBlock> {
    let raw = nvm.read_region(target, offset, len)?;
    ConfigBlock::decode(&raw)
}

/// Write a configuration block to `target` at `offset`.
#[cfg(feature = "alloc")]
pub fn write_config_block<T: Transport>(
    nvm: &mut Nvm<T>,
    target: RegionKind,
    offset: u32,
    block: &ConfigBlock,
) -> Result<()> {
    nvm.enter_progmode()?;
    let encoded = block.encode();
    match target {
        RegionKind::Eeprom => nvm.write_eeprom(offset, &encoded),
        RegionKind::UserRow => nvm.write_userrow(offset, &encoded),
        _ => Err(Error::InvalidArgument),
    }
}
