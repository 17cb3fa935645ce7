//! NVM layer: named-region I/O built on top of [`crate::app`].
//!
//! This is the layer most callers touch directly: it knows about FLASH,
//! EEPROM, USERROW, FUSES, and SRAM as named, bounds-checked regions rather
//! than raw addresses, and owns the page-wise write loops and
//! erase-before-write discipline each region needs.

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use crate::app::App;
use crate::chip::{DeviceDescriptor, NvmVersion, Region, RegionKind};
use crate::error::Error;
use crate::link::opcodes::nvmctrl;
use crate::transport::Transport;
use crate::Result;

/// Default guard delay, in milliseconds, held through a reset before
/// checking whether programming mode needs to be re-entered.
pub const RESET_DELAY_DEFAULT_MS: u32 = 1;

/// Region-aware NVM driver, generic over the APP layer's underlying
/// [`Transport`].
pub struct Nvm<T: Transport> {
    app: App<T>,
    device: DeviceDescriptor,
    progmode: bool,
}

impl<T: Transport> Nvm<T> {
    /// Wrap an APP handle with a device's region map. Starts with
    /// `progmode` false; callers must `enter_progmode()` before any write.
    pub fn new(app: App<T>, device: DeviceDescriptor) -> Self {
        Nvm {
            app,
            device,
            progmode: false,
        }
    }

    /// Borrow the underlying APP layer, e.g. for `device_info`.
    pub fn app_mut(&mut self) -> &mut App<T> {
        &mut self.app
    }

    /// The device descriptor this driver was constructed with.
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Look up the [`Region`] for a named memory kind.
    pub fn get_region(&self, kind: RegionKind) -> &Region {
        self.device.region(kind)
    }

    fn require_progmode(&self) -> Result<()> {
        if self.progmode {
            Ok(())
        } else {
            Err(Error::Locked)
        }
    }

    /// Enter NVM programming mode.
    pub fn enter_progmode(&mut self) -> Result<()> {
        self.app.enter_progmode()?;
        self.progmode = true;
        Ok(())
    }

    /// Leave NVM programming mode, resuming the target's application.
    pub fn leave_progmode(&mut self) -> Result<()> {
        self.app.leave_progmode()?;
        self.progmode = false;
        Ok(())
    }

    /// Send the chip-erase key and wait for the lock to clear. Used on
    /// already-locked parts that have never been in programming mode.
    pub fn unlock_device(&mut self) -> Result<()> {
        self.app.unlock()
    }

    /// Erase the whole chip. Requires `progmode`.
    pub fn chip_erase(&mut self) -> Result<()> {
        self.require_progmode()?;
        self.app.chip_erase()
    }

    /// Toggle reset, hold the guard delay, and if the chip was previously
    /// in `NVMPROG` re-enter programming mode. Updates the internal
    /// `progmode` flag to match whatever state results.
    pub fn reset(&mut self, delay_ms: u32) -> Result<()> {
        self.app.reset_and_reenter(delay_ms)?;
        self.progmode = self.app.in_prog_mode()?;
        Ok(())
    }

    /// Read `len` bytes from a named region at `offset`. An `offset` below
    /// the region's start is treated as region-relative and the region
    /// start is added; an `offset` already inside the region is used as an
    /// absolute address. Does not require `progmode` (reads proceed even
    /// while locked, mirroring the reference firmware, though a locked
    /// target will simply fail the underlying LINK transaction).
    #[cfg(feature = "alloc")]
    pub fn read_region(&mut self, kind: RegionKind, offset: u32, len: usize) -> Result<Vec<u8>> {
        let region = *self.get_region(kind);
        let addr = if offset < region.start {
            region.start + offset
        } else {
            offset
        };
        region.check_range(kind, addr, len)?;

        let mut buf = alloc::vec![0u8; len];
        self.app.read_data(addr, &mut buf)?;
        Ok(buf)
    }

    /// Read `buf.len()` bytes from a named region at `offset` into a
    /// caller-supplied buffer. The `alloc`-free counterpart of
    /// [`Nvm::read_region`].
    pub fn read_region_into(&mut self, kind: RegionKind, offset: u32, buf: &mut [u8]) -> Result<()> {
        let region = *self.get_region(kind);
        let addr = if offset < region.start {
            region.start + offset
        } else {
            offset
        };
        region.check_range(kind, addr, buf.len())?;
        self.app.read_data(addr, buf)
    }

    fn write_page_command(&self, kind: RegionKind) -> u8 {
        match (kind, self.device.nvm_version) {
            (RegionKind::Flash, NvmVersion::V0) => nvmctrl::v0::WRITE_PAGE,
            (RegionKind::Flash, NvmVersion::V1) => nvmctrl::v1::FLASH_WRITE,
            (_, NvmVersion::V0) => nvmctrl::v0::ERASE_WRITE_PAGE,
            (_, NvmVersion::V1) => nvmctrl::v1::EEPROM_ERASE_WRITE,
        }
    }

    /// Write flash at `offset`, page by page. `bytes.len()` must already be
    /// a multiple of the flash region's page size — callers pad the final
    /// page with `0xFF`.
    pub fn write_flash(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        self.write_paged(RegionKind::Flash, offset, bytes, true)
    }

    /// Write EEPROM at `offset`, page by page (erase-write command, byte
    /// mode).
    pub fn write_eeprom(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        self.write_paged(RegionKind::Eeprom, offset, bytes, false)
    }

    /// Write the user row at `offset`, page by page (erase-write command,
    /// byte mode).
    pub fn write_userrow(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        self.write_paged(RegionKind::UserRow, offset, bytes, false)
    }

    fn write_paged(&mut self, kind: RegionKind, offset: u32, bytes: &[u8], word_mode: bool) -> Result<()> {
        self.require_progmode()?;
        let region = *self.get_region(kind);
        let addr = if offset < region.start {
            region.start + offset
        } else {
            offset
        };
        region.check_range(kind, addr, bytes.len())?;

        let command = self.write_page_command(kind);
        let page_size = region.page_size.max(1) as usize;
        for (page_index, page) in bytes.chunks(page_size).enumerate() {
            let page_addr = addr + (page_index * page_size) as u32;
            self.app.write_nvm(page_addr, page, command, word_mode)?;
        }
        Ok(())
    }

    /// Write fuse bytes starting at `offset`, one byte per fuse address.
    /// Each byte is read back first and skipped if unchanged: an unchanged
    /// fuse write is still a destructive NVM operation, so this avoids
    /// wearing out fuses that don't need rewriting.
    pub fn write_fuses(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        self.require_progmode()?;
        let region = *self.get_region(RegionKind::Fuses);
        let addr = if offset < region.start {
            region.start + offset
        } else {
            offset
        };
        region.check_range(RegionKind::Fuses, addr, bytes.len())?;

        for (i, &value) in bytes.iter().enumerate() {
            let fuse_addr = addr + i as u32;
            let mut current = [0u8; 1];
            self.read_region_into(RegionKind::Fuses, fuse_addr, &mut current)?;
            if current[0] != value {
                self.app.write_fuse(fuse_addr, value)?;
            }
        }
        Ok(())
    }

    /// Write to SRAM at `offset`. SRAM is volatile register-space access:
    /// no erase/page-buffer discipline applies, so this goes straight
    /// through `app.write_data` rather than `app.write_nvm`.
    pub fn write_sram(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        self.require_progmode()?;
        let region = *self.get_region(RegionKind::Sram);
        let addr = if offset < region.start {
            region.start + offset
        } else {
            offset
        };
        region.check_range(RegionKind::Sram, addr, bytes.len())?;
        self.app.write_data(addr, bytes, false)
    }

    /// Look up which region `addr` falls in and dispatch to the matching
    /// writer. SRAM bypasses the NVM controller entirely (see
    /// [`Nvm::write_sram`]); every other region goes through its
    /// erase/page-buffer discipline.
    pub fn write_auto(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        let kind = self
            .device
            .region_containing(addr, bytes.len())
            .ok_or(Error::OutOfRange {
                region: RegionKind::Flash,
                addr,
                len: bytes.len(),
            })?;

        match kind {
            RegionKind::Flash => self.write_flash(addr, bytes),
            RegionKind::Eeprom => self.write_eeprom(addr, bytes),
            RegionKind::UserRow => self.write_userrow(addr, bytes),
            RegionKind::Fuses => self.write_fuses(addr, bytes),
            RegionKind::Sram => self.write_sram(addr, bytes),
        }
    }

    /// Look up which region `addr` falls in and read `len` bytes from it.
    /// The read counterpart of [`Nvm::write_auto`].
    #[cfg(feature = "alloc")]
    pub fn read_auto(&mut self, addr: u32, len: usize) -> Result<Vec<u8>> {
        let kind = self
            .device
            .region_containing(addr, len)
            .ok_or(Error::OutOfRange {
                region: RegionKind::Flash,
                addr,
                len,
            })?;
        self.read_region(kind, addr, len)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::app::AppConfig;
    use crate::chip::Region;
    use crate::link::Link;
    use crate::transport::{SerialConfig, Transport};
    use heapless::String;

    struct ScriptedTransport {
        replies: std::collections::VecDeque<u8>,
        pending_echo: std::collections::VecDeque<u8>,
    }

    impl ScriptedTransport {
        fn new(replies: &[u8]) -> Self {
            ScriptedTransport {
                replies: replies.iter().copied().collect(),
                pending_echo: std::collections::VecDeque::new(),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn reconfigure(&mut self, _config: SerialConfig) -> Result<()> {
            Ok(())
        }
        fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
            self.pending_echo.extend(bytes.iter().copied());
            Ok(())
        }
        fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
            for slot in buf.iter_mut() {
                if let Some(echo) = self.pending_echo.pop_front() {
                    *slot = echo;
                } else if let Some(reply) = self.replies.pop_front() {
                    *slot = reply;
                } else {
                    return Err(Error::Io);
                }
            }
            Ok(())
        }
        fn flush_input(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn test_device() -> DeviceDescriptor {
        let mut name = String::new();
        name.push_str("test-part").unwrap();
        DeviceDescriptor {
            name,
            flash: Region::new(0x8000, 1024, 64),
            eeprom: Region::new(0x1400, 128, 32),
            userrow: Region::new(0x1300, 32, 32),
            fuses: Region::new(0x1280, 10, 1),
            sram: Region::new(0x3800, 2048, 1),
            syscfg_address: 0x0F00,
            nvmctrl_address: 0x1000,
            sigrow_address: 0x1100,
            nvm_version: NvmVersion::V0,
        }
    }

    fn test_nvm(replies: &[u8]) -> Nvm<ScriptedTransport> {
        let transport = ScriptedTransport::new(replies);
        let phy = crate::phy::Phy::new(transport, 115_200).unwrap();
        let link = Link::new(phy);
        let config = AppConfig {
            syscfg_address: 0x0F00,
            nvmctrl_address: 0x1000,
            sigrow_address: 0x1100,
            nvm_version: NvmVersion::V0,
        };
        let app = App::new(link, config);
        Nvm::new(app, test_device())
    }

    #[test]
    fn write_without_progmode_is_locked() {
        let mut nvm = test_nvm(&[]);
        let err = nvm.write_flash(0x8000, &[0xAA; 64]).unwrap_err();
        assert!(matches!(err, Error::Locked));
    }

    #[test]
    fn relative_offset_is_added_to_region_start() {
        let region = Region::new(0x1400, 128, 32);
        assert_eq!(
            if 4 < region.start { region.start + 4 } else { 4 },
            0x1404
        );
    }

    #[test]
    fn write_auto_rejects_addresses_outside_every_region() {
        let mut nvm = test_nvm(&[]);
        nvm.progmode = true;
        let err = nvm.write_auto(0x9000_0000, &[0x00]).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
    }

    #[test]
    fn get_region_returns_catalog_region() {
        let nvm = test_nvm(&[]);
        assert_eq!(nvm.get_region(RegionKind::Flash).start, 0x8000);
    }
}
