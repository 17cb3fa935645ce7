//! In-memory UPDI target emulator for tests and `--comport dummy`.
//!
//! Unlike a simple opcode-dispatch mock, this has to speak the actual wire
//! protocol: every byte the host writes is echoed back before any reply is
//! produced, direct-addressed stores are two-phase (address phase ACKed,
//! then a separate data-phase call with no `SYNC` prefix), and
//! pointer-indirect stores stay ACK-protected across as many follow-up
//! calls as the host's `repeat` burst asked for. [`DummyTransport`] decodes
//! that stream live against an internal [`DummyTarget`] register/memory
//! model instead of replaying a canned script.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::collections::{BTreeMap, VecDeque};
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use updi_core::chip::{DeviceDescriptor, NvmVersion, RegionKind};
use updi_core::error::{Error, Result};
use updi_core::link::opcodes as op;
use updi_core::transport::{SerialConfig, Transport};

/// Data width of a load/store, decoded from the low bits of an instruction
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataWidth {
    Byte,
    Word,
}

impl DataWidth {
    fn byte_len(self) -> usize {
        match self {
            DataWidth::Byte => 1,
            DataWidth::Word => 2,
        }
    }
}

/// Which key a completed `KEY` transfer turned out to match, pending
/// application at the next reset release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingKeyKind {
    ChipErase,
    NvmProg,
}

/// State carried across multiple `write_all` calls that belong to the same
/// logical instruction.
#[cfg(feature = "alloc")]
enum Pending {
    /// Waiting for the data phase of a direct-addressed store.
    StsData { addr: u32, width: DataWidth },
    /// Waiting for the next pointer-indirect store element; `remaining`
    /// counts further elements after this one (from the burst's repeat
    /// count).
    StPtrInc { width: DataWidth, remaining: u32 },
    /// Collecting the 8 key bytes sent one at a time after a `KEY`
    /// instruction.
    KeyBytes { collected: Vec<u8> },
}

/// An in-memory stand-in for a UPDI target: a register file for control/
/// status space, a sparse byte map for everything else (NVM regions,
/// NVMCTRL/SYSCFG/SIGROW registers, SRAM), and the handful of bits of
/// session state (pointer, repeat count, reset/key latching) the wire
/// protocol depends on.
#[cfg(feature = "alloc")]
pub struct DummyTarget {
    device: DeviceDescriptor,
    mem: BTreeMap<u32, u8>,
    cs: [u8; 16],
    sib: [u8; 16],
    pointer: u32,
    repeat_count: u32,
    reset_asserted: bool,
    pending_key: Option<PendingKeyKind>,
    pending: Option<Pending>,
}

#[cfg(feature = "alloc")]
impl DummyTarget {
    /// Build a fresh, locked target for `device`. The System Information
    /// Block reports an NVM revision of `"P:2"` for [`NvmVersion::V1`]
    /// devices (triggering the 24-bit address switch in `App::device_info`)
    /// and `"P:0"` for [`NvmVersion::V0`] ones.
    pub fn new(device: DeviceDescriptor) -> Self {
        let mut sib = [0u8; 16];
        sib[0..7].copy_from_slice(b"AVR_UPD");
        let nvm_revision: &[u8; 3] = match device.nvm_version {
            NvmVersion::V0 => b"P:0",
            NvmVersion::V1 => b"P:2",
        };
        sib[8..11].copy_from_slice(nvm_revision);
        sib[11..14].copy_from_slice(b"O:0");
        sib[15] = 0x04;

        let mut cs = [0u8; 16];
        cs[op::cs::ASI_SYS_STATUS as usize] = 1 << op::sys_status_bit::LOCKSTATUS;

        DummyTarget {
            device,
            mem: BTreeMap::new(),
            cs,
            sib,
            pointer: 0,
            repeat_count: 1,
            reset_asserted: false,
            pending_key: None,
            pending: None,
        }
    }

    fn default_byte(&self, addr: u32) -> u8 {
        for region in [
            self.device.flash,
            self.device.eeprom,
            self.device.userrow,
        ] {
            if region.contains_range(addr, 1) {
                return 0xFF;
            }
        }
        0x00
    }

    fn read_mem(&self, addr: u32) -> u8 {
        self.mem.get(&addr).copied().unwrap_or_else(|| self.default_byte(addr))
    }

    fn write_mem(&mut self, addr: u32, value: u8) {
        self.mem.insert(addr, value);
    }

    fn read_mem_range(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len as u32).map(|i| self.read_mem(addr + i)).collect()
    }

    fn erase_range(&mut self, start: u32, size: u32) {
        for addr in start..start + size {
            self.mem.remove(&addr);
        }
    }

    fn chip_erase(&mut self) {
        self.erase_range(self.device.flash.start, self.device.flash.size);
        self.erase_range(self.device.eeprom.start, self.device.eeprom.size);
    }

    fn read_cs(&self, reg: u8) -> u8 {
        self.cs[(reg & 0x0F) as usize]
    }

    fn write_cs(&mut self, reg: u8, value: u8) {
        let reg = reg & 0x0F;
        match reg {
            _ if reg == op::cs::ASI_RESET_REQ => {
                if value == op::RESET_REQ_VALUE {
                    self.reset_asserted = true;
                } else if value == 0 && self.reset_asserted {
                    self.reset_asserted = false;
                    match self.pending_key.take() {
                        Some(PendingKeyKind::ChipErase) => {
                            self.chip_erase();
                            self.cs[op::cs::ASI_SYS_STATUS as usize] &=
                                !(1 << op::sys_status_bit::LOCKSTATUS);
                        }
                        Some(PendingKeyKind::NvmProg) => {
                            self.cs[op::cs::ASI_SYS_STATUS as usize] |=
                                1 << op::sys_status_bit::NVMPROG;
                        }
                        None => {}
                    }
                }
                self.cs[reg as usize] = value;
            }
            _ => self.cs[reg as usize] = value,
        }
    }

    fn execute_nvm_command(&mut self, command: u8) {
        match self.device.nvm_version {
            NvmVersion::V0 => {
                if command == op::nvmctrl::v0::CHIP_ERASE {
                    self.chip_erase();
                } else if command == op::nvmctrl::v0::WRITE_FUSE {
                    let addr_reg = self.device.nvmctrl_address + op::nvmctrl::ADDRL;
                    let data_reg = self.device.nvmctrl_address + op::nvmctrl::DATAL;
                    let addr = u16::from_le_bytes([
                        self.read_mem(addr_reg),
                        self.read_mem(addr_reg + 1),
                    ]) as u32;
                    let value = self.read_mem(data_reg);
                    self.write_mem(self.device.fuses.start + addr, value);
                }
            }
            NvmVersion::V1 => {
                if command == op::nvmctrl::v1::CHIP_ERASE {
                    self.chip_erase();
                }
            }
        }
    }

    /// Decode one complete `write_all` payload: either the continuation of
    /// a pending multi-call instruction, or a fresh `SYNC`-prefixed one.
    /// Returns the reply bytes (if any) the instruction produces, which
    /// the caller appends to the echo stream in wire order.
    fn handle_written(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
        if let Some(pending) = self.pending.take() {
            return self.continue_pending(pending, bytes);
        }
        let Some((&sync, rest)) = bytes.split_first() else {
            return Ok(Vec::new());
        };
        if sync != op::SYNC {
            return Err(Error::Io);
        }
        let Some((&inst, operands)) = rest.split_first() else {
            return Err(Error::Io);
        };
        self.decode_instruction(inst, operands)
    }

    fn continue_pending(&mut self, pending: Pending, bytes: &[u8]) -> Result<Vec<u8>> {
        match pending {
            Pending::StsData { addr, width } => {
                if bytes.len() != width.byte_len() {
                    return Err(Error::Io);
                }
                self.write_mem(addr, bytes[0]);
                if width == DataWidth::Word {
                    self.write_mem(addr + 1, bytes[1]);
                }
                self.on_post_write(addr);
                Ok(alloc::vec![op::ACK])
            }
            Pending::StPtrInc { width, remaining } => {
                if bytes.len() != width.byte_len() {
                    return Err(Error::Io);
                }
                self.write_mem(self.pointer, bytes[0]);
                if width == DataWidth::Word {
                    self.write_mem(self.pointer + 1, bytes[1]);
                }
                self.pointer += width.byte_len() as u32;
                if remaining > 0 {
                    self.pending = Some(Pending::StPtrInc {
                        width,
                        remaining: remaining - 1,
                    });
                }
                Ok(alloc::vec![op::ACK])
            }
            Pending::KeyBytes { mut collected } => {
                if bytes.len() != 1 {
                    return Err(Error::Io);
                }
                collected.push(bytes[0]);
                if collected.len() < 8 {
                    self.pending = Some(Pending::KeyBytes { collected });
                    return Ok(Vec::new());
                }
                collected.reverse();
                if collected == op::NVM_KEY {
                    self.pending_key = Some(PendingKeyKind::NvmProg);
                    self.cs[op::cs::ASI_KEY_STATUS as usize] |= 1 << op::key_status_bit::NVMPROG;
                } else if collected == op::CHIP_ERASE_KEY {
                    self.pending_key = Some(PendingKeyKind::ChipErase);
                    self.cs[op::cs::ASI_KEY_STATUS as usize] |= 1 << op::key_status_bit::CHIPERASE;
                }
                Ok(Vec::new())
            }
        }
    }

    fn read_address(operands: &[u8], addr_bytes: usize) -> (u32, &[u8]) {
        let mut addr = 0u32;
        for (i, &b) in operands[..addr_bytes].iter().enumerate() {
            addr |= (b as u32) << (8 * i);
        }
        (addr, &operands[addr_bytes..])
    }

    fn decode_instruction(&mut self, inst: u8, operands: &[u8]) -> Result<Vec<u8>> {
        let family = inst & 0xE0;
        match family {
            op::LDCS => {
                let reg = inst & 0x0F;
                Ok(alloc::vec![self.read_cs(reg)])
            }
            op::STCS => {
                let reg = inst & 0x0F;
                let value = *operands.first().ok_or(Error::Io)?;
                self.write_cs(reg, value);
                Ok(Vec::new())
            }
            op::LDS => {
                let addr_bytes = if inst & op::ADDRESS_24 != 0 { 3 } else { 2 };
                let width = if inst & 0x03 == op::DATA_16 {
                    DataWidth::Word
                } else {
                    DataWidth::Byte
                };
                let (addr, _) = Self::read_address(operands, addr_bytes);
                let mut reply = alloc::vec![self.read_mem(addr)];
                if width == DataWidth::Word {
                    reply.push(self.read_mem(addr + 1));
                }
                Ok(reply)
            }
            op::STS => {
                let addr_bytes = if inst & op::ADDRESS_24 != 0 { 3 } else { 2 };
                let width = if inst & 0x03 == op::DATA_16 {
                    DataWidth::Word
                } else {
                    DataWidth::Byte
                };
                let (addr, _) = Self::read_address(operands, addr_bytes);
                self.pending = Some(Pending::StsData { addr, width });
                Ok(alloc::vec![op::ACK])
            }
            op::LD => {
                let width = if inst & 0x03 == op::DATA_16 {
                    DataWidth::Word
                } else {
                    DataWidth::Byte
                };
                let elements = self.repeat_count;
                self.repeat_count = 1;
                let total = elements as usize * width.byte_len();
                let bytes = self.read_mem_range(self.pointer, total);
                self.pointer += total as u32;
                Ok(bytes)
            }
            op::ST => {
                let ptr_address = inst & op::PTR_ADDRESS != 0;
                let ptr_inc = inst & op::PTR_INC != 0;
                if ptr_address {
                    let addr_bytes = if ptr_inc { 2 } else { 3 };
                    let (addr, _) = Self::read_address(operands, addr_bytes);
                    self.pointer = addr;
                    Ok(alloc::vec![op::ACK])
                } else {
                    let width = if inst & 0x03 == op::DATA_16 {
                        DataWidth::Word
                    } else {
                        DataWidth::Byte
                    };
                    let first = &operands[..width.byte_len()];
                    self.write_mem(self.pointer, first[0]);
                    if width == DataWidth::Word {
                        self.write_mem(self.pointer + 1, first[1]);
                    }
                    self.pointer += width.byte_len() as u32;
                    let elements = self.repeat_count;
                    self.repeat_count = 1;
                    if elements > 1 {
                        self.pending = Some(Pending::StPtrInc {
                            width,
                            remaining: elements - 2,
                        });
                    }
                    Ok(alloc::vec![op::ACK])
                }
            }
            op::REPEAT => {
                let n = *operands.first().ok_or(Error::Io)?;
                if inst & 0x01 == op::REPEAT_WORD {
                    let hi = *operands.get(1).ok_or(Error::Io)?;
                    self.repeat_count = u16::from_le_bytes([n, hi]) as u32 + 1;
                } else {
                    self.repeat_count = n as u32 + 1;
                }
                Ok(Vec::new())
            }
            op::KEY => {
                if inst & op::KEY_SIB != 0 {
                    Ok(self.sib.to_vec())
                } else {
                    self.pending = Some(Pending::KeyBytes {
                        collected: Vec::with_capacity(8),
                    });
                    Ok(Vec::new())
                }
            }
            _ => Err(Error::Io),
        }
    }

    fn on_post_write(&mut self, addr: u32) {
        let ctrla = self.device.nvmctrl_address + op::nvmctrl::CTRLA;
        if addr == ctrla {
            let command = self.read_mem(ctrla);
            self.execute_nvm_command(command);
        }
    }
}

/// A [`Transport`] backed by a [`DummyTarget`], usable wherever a real
/// [`updi_core::phy::Phy`] would take a serial port.
#[cfg(feature = "alloc")]
pub struct DummyTransport {
    target: DummyTarget,
    fifo: VecDeque<u8>,
}

#[cfg(feature = "alloc")]
impl DummyTransport {
    /// Wrap a fresh target built from `device`.
    pub fn new(device: DeviceDescriptor) -> Self {
        DummyTransport {
            target: DummyTarget::new(device),
            fifo: VecDeque::new(),
        }
    }

    /// Borrow the underlying target, e.g. to inspect memory directly in a
    /// test without going through the wire protocol.
    pub fn target(&self) -> &DummyTarget {
        &self.target
    }

    /// Read `len` bytes directly from the target's memory model, bypassing
    /// the wire protocol. Test/inspection helper only.
    pub fn peek(&self, addr: u32, len: usize) -> Vec<u8> {
        self.target.read_mem_range(addr, len)
    }
}

#[cfg(feature = "alloc")]
impl Transport for DummyTransport {
    fn reconfigure(&mut self, config: SerialConfig) -> Result<()> {
        if config.baud == SerialConfig::DOUBLE_BREAK.baud {
            self.target.pending = None;
            self.fifo.clear();
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.fifo.extend(bytes.iter().copied());
        let reply = self.target.handle_written(bytes)?;
        self.fifo.extend(reply);
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.fifo.pop_front().ok_or(Error::Io)?;
        }
        Ok(())
    }

    fn flush_input(&mut self) -> Result<()> {
        self.fifo.clear();
        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use updi_core::app::{App, AppConfig};
    use updi_core::chip::Region;
    use updi_core::link::Link;
    use updi_core::nvm::Nvm;
    use updi_core::phy::Phy;
    use heapless::String;

    fn test_device() -> DeviceDescriptor {
        DeviceDescriptor {
            name: String::try_from("dummy0").unwrap(),
            flash: Region::new(0x8000, 2048, 64),
            eeprom: Region::new(0x1400, 128, 32),
            userrow: Region::new(0x1300, 32, 32),
            fuses: Region::new(0x1280, 16, 1),
            sram: Region::new(0x3800, 1024, 1),
            syscfg_address: 0x0F00,
            nvmctrl_address: 0x1000,
            sigrow_address: 0x1100,
            nvm_version: NvmVersion::V0,
        }
    }

    fn connect() -> Nvm<DummyTransport> {
        let device = test_device();
        let transport = DummyTransport::new(device.clone());
        let mut phy = Phy::new(transport, 225_000).unwrap();
        phy.send_double_break().unwrap();
        let mut link = Link::new(phy);
        link.initialize(225_000, 0).unwrap();
        let config = AppConfig {
            syscfg_address: device.syscfg_address,
            nvmctrl_address: device.nvmctrl_address,
            sigrow_address: device.sigrow_address,
            nvm_version: device.nvm_version,
        };
        let app = App::new(link, config);
        Nvm::new(app, device)
    }

    #[test]
    fn link_initialize_succeeds_against_dummy() {
        let _nvm = connect();
    }

    #[test]
    fn unlock_clears_lockstatus_and_enter_progmode_sets_nvmprog() {
        let mut nvm = connect();
        nvm.unlock_device().unwrap();
        nvm.enter_progmode().unwrap();
    }

    #[test]
    fn write_then_read_back_flash_round_trips() {
        let mut nvm = connect();
        nvm.enter_progmode().unwrap();
        let page = [0xAAu8; 64];
        nvm.write_flash(0, &page).unwrap();
        let read_back = nvm.read_region(RegionKind::Flash, 0, 64).unwrap();
        assert_eq!(read_back, page);
    }

    #[test]
    fn chip_erase_resets_flash_to_erased_state() {
        let mut nvm = connect();
        nvm.enter_progmode().unwrap();
        nvm.write_flash(0, &[0x11u8; 64]).unwrap();
        nvm.chip_erase().unwrap();
        let read_back = nvm.read_region(RegionKind::Flash, 0, 64).unwrap();
        assert_eq!(read_back, alloc::vec![0xFFu8; 64]);
    }
}
