//! Device descriptor types: the per-chip data the rest of the stack is
//! parameterized over.

use heapless::String;

use crate::error::{Error, Result};

/// Maximum length of a device name as stored in the catalog.
pub const MAX_NAME_LEN: usize = 32;

/// The named memory regions a device may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Program flash.
    Flash,
    /// Data EEPROM.
    Eeprom,
    /// User signature row (non-erasable-by-chip-erase configuration bytes).
    UserRow,
    /// Fuse byte(s).
    Fuses,
    /// Volatile SRAM (register-space access only, no NVM controller involved).
    Sram,
}

/// A contiguous, page-aligned memory region.
///
/// Invariant: `size % page_size == 0` for every region the NVM layer pages
/// writes through (SRAM and FUSES use `page_size == 1`, i.e. byte
/// granularity, since they are never paged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First address in the region.
    pub start: u32,
    /// Size of the region in bytes.
    pub size: u32,
    /// Page size for writes, in bytes. `1` for unpaged regions.
    pub page_size: u32,
}

impl Region {
    /// Construct a region, validating the page-size invariant.
    pub const fn new(start: u32, size: u32, page_size: u32) -> Self {
        Region {
            start,
            size,
            page_size,
        }
    }

    /// Address immediately past the end of the region.
    pub fn end(&self) -> u32 {
        self.start + self.size
    }

    /// Whether `[addr, addr+len)` lies entirely inside this region.
    pub fn contains_range(&self, addr: u32, len: usize) -> bool {
        let len = len as u32;
        addr >= self.start && len <= self.size && addr - self.start <= self.size - len
    }

    /// Number of pages required to cover `len` bytes.
    pub fn page_count(&self, len: usize) -> usize {
        let page_size = self.page_size.max(1) as usize;
        len.div_ceil(page_size)
    }

    /// Validate that `(addr, len)` fits the region, returning the error the
    /// spec's `OutOfRange` variant expects on failure.
    pub fn check_range(&self, kind: RegionKind, addr: u32, len: usize) -> Result<()> {
        if self.contains_range(addr, len) {
            Ok(())
        } else {
            Err(Error::OutOfRange {
                region: kind,
                addr,
                len,
            })
        }
    }
}

/// Which generation of NVM controller a device has.
///
/// Selected once per device from the catalog rather than probed or branched
/// on at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmVersion {
    /// Page-buffered controller: writes stage into a page buffer that must
    /// be cleared, filled, then committed with a separate command.
    V0,
    /// Direct-write controller: words are written directly once the write
    /// command is active; no page buffer.
    V1,
}

/// Immutable, catalog-resident description of one microcontroller variant.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    /// The device name as it appears in the catalog (e.g. `"attiny1614"`).
    pub name: String<MAX_NAME_LEN>,
    /// Program flash region.
    pub flash: Region,
    /// Data EEPROM region.
    pub eeprom: Region,
    /// User row region.
    pub userrow: Region,
    /// Fuse byte region.
    pub fuses: Region,
    /// SRAM region.
    pub sram: Region,
    /// Base address of the SYSCFG register block.
    pub syscfg_address: u32,
    /// Base address of the NVMCTRL register block.
    pub nvmctrl_address: u32,
    /// Base address of the SIGROW (signature row) register block.
    pub sigrow_address: u32,
    /// Which NVM controller generation this device has.
    pub nvm_version: NvmVersion,
}

impl DeviceDescriptor {
    /// Look up the [`Region`] for a given [`RegionKind`].
    pub fn region(&self, kind: RegionKind) -> &Region {
        match kind {
            RegionKind::Flash => &self.flash,
            RegionKind::Eeprom => &self.eeprom,
            RegionKind::UserRow => &self.userrow,
            RegionKind::Fuses => &self.fuses,
            RegionKind::Sram => &self.sram,
        }
    }

    /// Find which region (if any) contains `[addr, addr+len)` in its
    /// entirety. Used by `write_auto`/`read_auto` dispatch.
    pub fn region_containing(&self, addr: u32, len: usize) -> Option<RegionKind> {
        [
            RegionKind::Flash,
            RegionKind::Eeprom,
            RegionKind::UserRow,
            RegionKind::Fuses,
            RegionKind::Sram,
        ]
        .into_iter()
        .find(|&kind| self.region(kind).contains_range(addr, len))
    }
}
