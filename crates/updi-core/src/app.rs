//! APP layer: chip-state orchestration built on top of [`crate::link`].
//!
//! Where LINK moves bytes through named opcodes, APP understands what those
//! bytes mean to the chip: the locked/key-accepted/unlocked/NVMPROG state
//! machine, the NVM controller's busy/error status, and the System
//! Information Block that identifies the part on the other end of the wire.

use crate::chip::NvmVersion;
use crate::error::{Error, NakStage, TimeoutKind};
use crate::link::opcodes::{self as op, nvm_status_bit, nvmctrl};
use crate::link::{AddressWidth, Link};
use crate::transport::Transport;
use crate::Result;

/// Register base addresses and NVM controller generation for one device,
/// the slice of a [`crate::chip::DeviceDescriptor`] that APP needs.
#[derive(Debug, Clone, Copy)]
pub struct AppConfig {
    /// Base address of the SYSCFG register block.
    pub syscfg_address: u32,
    /// Base address of the NVMCTRL register block.
    pub nvmctrl_address: u32,
    /// Base address of the SIGROW (signature row) register block.
    pub sigrow_address: u32,
    /// Which NVM controller generation this device has.
    pub nvm_version: NvmVersion,
}

/// Maximum bytes moved by one `ld_ptr_inc`/`st_ptr_inc` burst in byte mode.
pub const MAX_REPEAT_BYTE_SIZE: usize = 255;
/// Maximum words moved by one `ld_ptr_inc16`/`st_ptr_inc16` burst in word
/// mode. Kept as its own constant rather than derived from
/// [`MAX_REPEAT_BYTE_SIZE`]: the two bounds come from independent hardware
/// limits (a one-byte repeat counter vs. the target's transaction buffer).
pub const MAX_REPEAT_WORD_SIZE: usize = 126;

const WAIT_UNLOCKED_DEFAULT_MS: u32 = 100;
const WAIT_FLASH_READY_DEFAULT_MS: u32 = 1000;

/// Identity and (if unlocked) silicon information read from a target.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    /// 7-byte ASCII family identifier from the SIB.
    pub family_id: [u8; 7],
    /// 3-byte ASCII NVM controller revision, e.g. `"P:2"`.
    pub nvm_revision: [u8; 3],
    /// 3-byte ASCII on-chip debug revision.
    pub ocd_revision: [u8; 3],
    /// PDI oscillator selector nibble.
    pub pdi_oscillator: u8,
    /// Device id and serial read from SIGROW, and REVID from SYSCFG+1 — only
    /// populated when the read happened while the target was in `NVMPROG`.
    pub silicon: Option<SiliconInfo>,
}

/// Device id, serial number, and silicon revision, only obtainable in
/// `NVMPROG` (the signature row is itself flash-mapped).
#[derive(Debug, Clone, Copy)]
pub struct SiliconInfo {
    /// 3-byte device id.
    pub device_id: [u8; 3],
    /// 10-byte factory-programmed serial number.
    pub device_serial: [u8; 10],
    /// Silicon revision byte.
    pub revid: u8,
}

/// APP-layer chip driver, generic over the LINK's underlying [`Transport`].
pub struct App<T: Transport> {
    link: Link<T>,
    config: AppConfig,
}

impl<T: Transport> App<T> {
    /// Wrap an initialised [`Link`] with a device's register layout.
    pub fn new(link: Link<T>, config: AppConfig) -> Self {
        App { link, config }
    }

    /// Borrow the underlying LINK, e.g. to drive a double-break reset.
    pub fn link_mut(&mut self) -> &mut Link<T> {
        &mut self.link
    }

    fn sleep_ms(_ms: u32) {
        #[cfg(feature = "std")]
        std::thread::sleep(std::time::Duration::from_millis(_ms as u64));
    }

    /// Read the SIB and, if in `NVMPROG`, SIGROW + REVID. Switches the
    /// LINK's address width to 24 bits when the NVM revision is `"P:2"` or
    /// later.
    pub fn device_info(&mut self) -> Result<DeviceInfo> {
        let mut sib = [0u8; 16];
        self.link.read_sib(&mut sib)?;

        let mut family_id = [0u8; 7];
        family_id.copy_from_slice(&sib[0..7]);
        let mut nvm_revision = [0u8; 3];
        nvm_revision.copy_from_slice(&sib[8..11]);
        let mut ocd_revision = [0u8; 3];
        ocd_revision.copy_from_slice(&sib[11..14]);
        let pdi_oscillator = sib[15] & 0x0F;

        if &nvm_revision == b"P:2" {
            self.link.set_address_width(AddressWidth::Bits24);
        }

        let silicon = if self.in_prog_mode()? {
            let mut sigrow = [0u8; 14];
            self.read_data(self.config.sigrow_address, &mut sigrow)?;
            let mut device_id = [0u8; 3];
            device_id.copy_from_slice(&sigrow[0..3]);
            let mut device_serial = [0u8; 10];
            device_serial.copy_from_slice(&sigrow[3..13]);

            let revid = self
                .link
                .lds8_width(self.config.syscfg_address + 1, AddressWidth::Bits16)?;

            Some(SiliconInfo {
                device_id,
                device_serial,
                revid,
            })
        } else {
            None
        };

        Ok(DeviceInfo {
            family_id,
            nvm_revision,
            ocd_revision,
            pdi_oscillator,
            silicon,
        })
    }

    fn asi_sys_status(&mut self) -> Result<u8> {
        self.link.ldcs(op::cs::ASI_SYS_STATUS)
    }

    /// Whether `ASI_SYS_STATUS.NVMPROG` is set.
    pub fn in_prog_mode(&mut self) -> Result<bool> {
        let status = self.asi_sys_status()?;
        Ok(status & (1 << op::sys_status_bit::NVMPROG) != 0)
    }

    /// Poll `ASI_SYS_STATUS.LOCKSTATUS` every millisecond until it clears or
    /// `timeout_ms` elapses.
    pub fn wait_unlocked(&mut self, timeout_ms: u32) -> Result<()> {
        let mut remaining = timeout_ms;
        loop {
            let status = self.asi_sys_status()?;
            if status & (1 << op::sys_status_bit::LOCKSTATUS) == 0 {
                return Ok(());
            }
            if remaining == 0 {
                return Err(Error::Timeout {
                    what: TimeoutKind::WaitUnlocked,
                });
            }
            Self::sleep_ms(1);
            remaining -= 1;
        }
    }

    /// Assert or release the UPDI reset request.
    pub fn reset(&mut self, apply: bool) -> Result<()> {
        let value = if apply { op::RESET_REQ_VALUE } else { 0 };
        self.link.stcs(op::cs::ASI_RESET_REQ, value)
    }

    /// Assert reset, hold it for the 1ms guard delay, then optionally
    /// release it.
    pub fn toggle_reset(&mut self, release: bool) -> Result<()> {
        self.reset(true)?;
        Self::sleep_ms(1);
        if release {
            self.reset(false)?;
        }
        Ok(())
    }

    /// Send the chip-erase key, verify it was accepted, then toggle reset
    /// and wait for the lock to clear.
    pub fn unlock(&mut self) -> Result<()> {
        self.link.key(op::CHIP_ERASE_KEY)?;
        let status = self.link.ldcs(op::cs::ASI_KEY_STATUS)?;
        if status & (1 << op::key_status_bit::CHIPERASE) == 0 {
            return Err(Error::ProtocolNak {
                stage: NakStage::KeyStatus,
            });
        }
        self.toggle_reset(true)?;
        self.wait_unlocked(WAIT_UNLOCKED_DEFAULT_MS)
    }

    /// Enter NVM programming mode. No-op success if already there.
    pub fn enter_progmode(&mut self) -> Result<()> {
        if self.in_prog_mode()? {
            return Ok(());
        }
        self.link.key(op::NVM_KEY)?;
        let status = self.link.ldcs(op::cs::ASI_KEY_STATUS)?;
        if status & (1 << op::key_status_bit::NVMPROG) == 0 {
            return Err(Error::ProtocolNak {
                stage: NakStage::KeyStatus,
            });
        }
        self.toggle_reset(true)?;
        self.wait_unlocked(WAIT_UNLOCKED_DEFAULT_MS)?;
        if !self.in_prog_mode()? {
            return Err(Error::Locked);
        }
        Ok(())
    }

    /// Toggle reset, then disable UPDI (`CTRLB.UPDIDIS|CCDETDIS`) so the
    /// target resumes running its application.
    pub fn leave_progmode(&mut self) -> Result<()> {
        self.toggle_reset(true)?;
        let bits = (1 << op::ctrlb_bit::UPDIDIS) | (1 << op::ctrlb_bit::CCDETDIS);
        self.link.stcs(op::cs::CTRLB, bits)
    }

    /// Poll `NVMCTRL.STATUS` until neither `FLASH_BUSY` nor `EEPROM_BUSY`
    /// is set. Fails immediately on `WRITE_ERROR`.
    pub fn wait_flash_ready(&mut self, timeout_ms: u32) -> Result<()> {
        let addr = self.config.nvmctrl_address + nvmctrl::STATUS;
        let mut remaining = timeout_ms;
        loop {
            let status = self.link.lds8_width(addr, AddressWidth::Bits16)?;
            if status & (1 << nvm_status_bit::WRITE_ERROR) != 0 {
                return Err(Error::DeviceError { status });
            }
            let busy_mask = (1 << nvm_status_bit::FLASH_BUSY) | (1 << nvm_status_bit::EEPROM_BUSY);
            if status & busy_mask == 0 {
                return Ok(());
            }
            if remaining == 0 {
                return Err(Error::Timeout {
                    what: TimeoutKind::WaitFlashReady,
                });
            }
            Self::sleep_ms(1);
            remaining -= 1;
        }
    }

    fn wait_flash_ready_default(&mut self) -> Result<()> {
        self.wait_flash_ready(WAIT_FLASH_READY_DEFAULT_MS)
    }

    /// Write `NVMCTRL.CTRLA` with a command byte. Register space is always
    /// 16-bit addressed, even on parts whose flash address width has
    /// switched to 24 bits.
    pub fn execute_nvm_command(&mut self, command: u8) -> Result<()> {
        let addr = self.config.nvmctrl_address + nvmctrl::CTRLA;
        self.link.sts8_width(addr, command, AddressWidth::Bits16)
    }

    fn chip_erase_command(&self) -> u8 {
        match self.config.nvm_version {
            NvmVersion::V0 => nvmctrl::v0::CHIP_ERASE,
            NvmVersion::V1 => nvmctrl::v1::CHIP_ERASE,
        }
    }

    /// Erase the whole chip: wait ready, issue the chip-erase command, wait
    /// ready again.
    pub fn chip_erase(&mut self) -> Result<()> {
        self.wait_flash_ready_default()?;
        let command = self.chip_erase_command();
        self.execute_nvm_command(command)?;
        self.wait_flash_ready_default()
    }

    /// Read `buf.len()` bytes starting at `addr`, word mode iff the length
    /// is even, chunked at the repeat-burst limit.
    pub fn read_data(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        if buf.len() % 2 == 0 && !buf.is_empty() {
            self.read_data_words(addr, buf)
        } else {
            self.read_data_bytes(addr, buf)
        }
    }

    fn read_data_bytes(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < buf.len() {
            let chunk = (buf.len() - offset).min(MAX_REPEAT_BYTE_SIZE);
            self.link.st_ptr(addr + offset as u32)?;
            if chunk > 1 {
                self.link.repeat(chunk as u16)?;
            }
            self.link.ld_ptr_inc(&mut buf[offset..offset + chunk])?;
            offset += chunk;
        }
        Ok(())
    }

    fn read_data_words(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let total_words = buf.len() / 2;
        let mut word_offset = 0usize;
        while word_offset < total_words {
            let words = (total_words - word_offset).min(MAX_REPEAT_WORD_SIZE);
            let byte_offset = word_offset * 2;
            self.link.st_ptr(addr + byte_offset as u32)?;
            if words > 1 {
                self.link.repeat(words as u16)?;
            }
            self.link
                .ld_ptr_inc16(&mut buf[byte_offset..byte_offset + words * 2])?;
            word_offset += words;
        }
        Ok(())
    }

    /// Write `bytes` starting at `addr`, word mode iff `word_mode` is set
    /// and the length is even, chunked at the repeat-burst limit.
    pub fn write_data(&mut self, addr: u32, bytes: &[u8], word_mode: bool) -> Result<()> {
        if word_mode && bytes.len() % 2 == 0 && !bytes.is_empty() {
            self.write_data_words(addr, bytes)
        } else {
            self.write_data_bytes(addr, bytes)
        }
    }

    fn write_data_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            let chunk = (bytes.len() - offset).min(MAX_REPEAT_BYTE_SIZE);
            self.link.st_ptr(addr + offset as u32)?;
            if chunk > 1 {
                self.link.repeat(chunk as u16)?;
            }
            self.link.st_ptr_inc(&bytes[offset..offset + chunk])?;
            offset += chunk;
        }
        Ok(())
    }

    fn write_data_words(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        let total_words = bytes.len() / 2;
        let mut word_offset = 0usize;
        while word_offset < total_words {
            let words = (total_words - word_offset).min(MAX_REPEAT_WORD_SIZE);
            let byte_offset = word_offset * 2;
            self.link.st_ptr(addr + byte_offset as u32)?;
            if words > 1 {
                self.link.repeat(words as u16)?;
            }
            self.link
                .st_ptr_inc16(&bytes[byte_offset..byte_offset + words * 2])?;
            word_offset += words;
        }
        Ok(())
    }

    /// Write through the NVM controller with the write discipline matching
    /// this device's controller generation: v0 clears the page buffer
    /// before filling it and commits with a separate command; v1 starts
    /// the command first and writes directly, then clears it.
    pub fn write_nvm(&mut self, addr: u32, bytes: &[u8], command: u8, word_mode: bool) -> Result<()> {
        match self.config.nvm_version {
            NvmVersion::V0 => {
                self.wait_flash_ready_default()?;
                self.execute_nvm_command(nvmctrl::v0::PAGE_BUFFER_CLR)?;
                self.wait_flash_ready_default()?;
                self.write_data(addr, bytes, word_mode)?;
                self.execute_nvm_command(command)?;
                self.wait_flash_ready_default()
            }
            NvmVersion::V1 => {
                self.wait_flash_ready_default()?;
                self.execute_nvm_command(command)?;
                self.write_data(addr, bytes, word_mode)?;
                self.wait_flash_ready_default()?;
                self.execute_nvm_command(nvmctrl::v1::NOCMD)
            }
        }
    }

    /// Write one fuse byte. v0 stages the address/value into
    /// `NVMCTRL.ADDR`/`DATA` then issues `WRITE_FUSE`; v1 has no distinct
    /// fuse-write command and instead routes through an EEPROM
    /// erase-write at the fuse's address.
    pub fn write_fuse(&mut self, addr: u32, value: u8) -> Result<()> {
        match self.config.nvm_version {
            NvmVersion::V0 => {
                self.wait_flash_ready_default()?;
                let addr_reg = self.config.nvmctrl_address + nvmctrl::ADDRL;
                self.link
                    .sts16_width(addr_reg, addr as u16, AddressWidth::Bits16)?;
                let data_reg = self.config.nvmctrl_address + nvmctrl::DATAL;
                self.link.sts8_width(data_reg, value, AddressWidth::Bits16)?;
                self.execute_nvm_command(nvmctrl::v0::WRITE_FUSE)
            }
            NvmVersion::V1 => self.write_nvm(addr, &[value], nvmctrl::v1::EEPROM_ERASE_WRITE, false),
        }
    }

    /// Erase one flash page.
    pub fn erase_flash_page(&mut self, addr: u32) -> Result<()> {
        let command = match self.config.nvm_version {
            NvmVersion::V0 => nvmctrl::v0::ERASE_PAGE,
            NvmVersion::V1 => nvmctrl::v1::FLASH_PAGE_ERASE,
        };
        self.write_nvm(addr, &[0xFF], command, false)
    }

    /// Erase an EEPROM/user-row range. v1 walks the region in 32-byte
    /// strides (its erase command only ever clears one such stride at a
    /// time); v0 erases the whole range with one command.
    pub fn erase_eeprom(&mut self, addr: u32, size: u32) -> Result<()> {
        match self.config.nvm_version {
            NvmVersion::V0 => self.write_nvm(addr, &[0xFF], nvmctrl::v0::ERASE_EEPROM, false),
            NvmVersion::V1 => {
                let mut offset = 0u32;
                while offset < size {
                    self.write_nvm(addr + offset, &[0xFF], nvmctrl::v1::EEPROM_BYTE32_ERASE, false)?;
                    offset += 32;
                }
                Ok(())
            }
        }
    }

    /// Toggle reset, hold it for `delay_ms`, and if the chip was in
    /// `NVMPROG` before the reset, re-enter programming mode afterwards.
    /// The multi-step composite itself is exposed to callers at the NVM
    /// layer (see `Nvm::reset`); this is its mechanics.
    pub fn reset_and_reenter(&mut self, delay_ms: u32) -> Result<()> {
        let was_in_prog = self.in_prog_mode()?;
        self.reset(true)?;
        Self::sleep_ms(delay_ms);
        self.reset(false)?;
        if was_in_prog {
            self.enter_progmode()?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::transport::{SerialConfig, Transport};

    /// A scripted transport: replies queued up front, echo of every write
    /// synthesized automatically.
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

    fn test_config() -> AppConfig {
        AppConfig {
            syscfg_address: 0x0F00,
            nvmctrl_address: 0x1000,
            sigrow_address: 0x1100,
            nvm_version: NvmVersion::V0,
        }
    }

    fn test_app(replies: &[u8]) -> App<ScriptedTransport> {
        let transport = ScriptedTransport::new(replies);
        let phy = crate::phy::Phy::new(transport, 115_200).unwrap();
        let link = Link::new(phy);
        App::new(link, test_config())
    }

    #[test]
    fn in_prog_mode_reads_nvmprog_bit() {
        let mut app = test_app(&[1 << op::sys_status_bit::NVMPROG]);
        assert!(app.in_prog_mode().unwrap());
    }

    #[test]
    fn in_prog_mode_false_when_bit_clear() {
        let mut app = test_app(&[0x00]);
        assert!(!app.in_prog_mode().unwrap());
    }

    #[test]
    fn wait_unlocked_returns_once_lockstatus_clears() {
        let mut app = test_app(&[0x01, 0x00]);
        app.wait_unlocked(10).unwrap();
    }

    #[test]
    fn wait_flash_ready_errors_on_write_error_bit() {
        let mut app = test_app(&[1 << nvm_status_bit::WRITE_ERROR]);
        let err = app.wait_flash_ready(10).unwrap_err();
        assert!(matches!(err, Error::DeviceError { .. }));
    }
}
