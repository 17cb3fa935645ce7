//! LINK layer: the proprietary opcode codec built on top of [`crate::phy`].
//!
//! Every instruction is SYNC-prefixed and keyed off a family selector in
//! the top three bits (see [`opcodes`]). Direct-addressed stores are a
//! two-phase transaction: the target ACKs the address phase before the
//! data phase is even sent.

pub mod opcodes;

use crate::error::{Error, NakStage, Result};
use crate::phy::Phy;
use crate::transport::Transport;
use opcodes as op;

/// Whether addresses on the wire are 16-bit or 24-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressWidth {
    /// 16-bit address field (earlier NVM revisions).
    Bits16,
    /// 24-bit address field (NVM revision `P:2` and later).
    Bits24,
}

impl AddressWidth {
    fn field(self) -> u8 {
        match self {
            AddressWidth::Bits16 => op::ADDRESS_16,
            AddressWidth::Bits24 => op::ADDRESS_24,
        }
    }

    /// Number of address bytes this width puts on the wire.
    pub fn byte_len(self) -> usize {
        match self {
            AddressWidth::Bits16 => 2,
            AddressWidth::Bits24 => 3,
        }
    }
}

/// Data-width selector shared by the direct and indirect families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// 8-bit transfers.
    Byte,
    /// 16-bit transfers.
    Word,
}

impl Width {
    fn data_field(self) -> u8 {
        match self {
            Width::Byte => op::DATA_8,
            Width::Word => op::DATA_16,
        }
    }
}

fn push_address(cmd: &mut [u8], at: usize, address: u32, width: AddressWidth) -> usize {
    cmd[at] = (address & 0xFF) as u8;
    cmd[at + 1] = ((address >> 8) & 0xFF) as u8;
    if width == AddressWidth::Bits24 {
        cmd[at + 2] = ((address >> 16) & 0xFF) as u8;
        at + 3
    } else {
        at + 2
    }
}

/// LINK-layer codec, generic over the PHY's underlying [`Transport`].
pub struct Link<T: Transport> {
    phy: Phy<T>,
    address_width: AddressWidth,
}

impl<T: Transport> Link<T> {
    /// Wrap an already-opened PHY. Starts in 16-bit address mode; callers
    /// switch to 24-bit after `device_info` identifies an `NVM revision
    /// P:2` or later part.
    pub fn new(phy: Phy<T>) -> Self {
        Link {
            phy,
            address_width: AddressWidth::Bits16,
        }
    }

    /// Current address width.
    pub fn address_width(&self) -> AddressWidth {
        self.address_width
    }

    /// Switch address width. Called once by APP after reading the SIB.
    pub fn set_address_width(&mut self, width: AddressWidth) {
        self.address_width = width;
    }

    /// Borrow the underlying PHY, for break/double-break and baud control.
    pub fn phy_mut(&mut self) -> &mut Phy<T> {
        &mut self.phy
    }

    /// Load an 8-bit value from control/status space.
    pub fn ldcs(&mut self, reg: u8) -> Result<u8> {
        let cmd = [op::SYNC, op::LDCS | (reg & 0x0F)];
        let mut resp = [0u8];
        self.phy.transfer(&cmd, &mut resp)?;
        Ok(resp[0])
    }

    /// Store an 8-bit value to control/status space. Not ACK-protected.
    pub fn stcs(&mut self, reg: u8, value: u8) -> Result<()> {
        let cmd = [op::SYNC, op::STCS | (reg & 0x0F), value];
        self.phy.send(&cmd)
    }

    /// Direct-addressed byte load.
    pub fn lds8(&mut self, address: u32) -> Result<u8> {
        self.lds8_width(address, self.address_width)
    }

    /// Direct-addressed word load.
    pub fn lds16(&mut self, address: u32) -> Result<u16> {
        self.lds16_width(address, self.address_width)
    }

    /// Direct-addressed byte store. Two-phase transaction: ACKs the
    /// address phase, then the data phase.
    pub fn sts8(&mut self, address: u32, value: u8) -> Result<()> {
        self.sts8_width(address, value, self.address_width)
    }

    /// Direct-addressed word store. Two-phase transaction.
    pub fn sts16(&mut self, address: u32, value: u16) -> Result<()> {
        self.sts16_width(address, value, self.address_width)
    }

    /// Byte load at an explicit address width. Register space (SYSCFG,
    /// NVMCTRL, SIGROW) always sits below 0x10000 and is addressed with
    /// 16 bits even on parts whose flash addressing has switched to 24
    /// bits, so APP uses this directly rather than [`Link::lds8`].
    pub fn lds8_width(&mut self, address: u32, width: AddressWidth) -> Result<u8> {
        let mut cmd = [0u8; 6];
        cmd[0] = op::SYNC;
        cmd[1] = op::LDS | width.field() | Width::Byte.data_field();
        let len = push_address(&mut cmd, 2, address, width);
        let mut resp = [0u8];
        self.phy.transfer(&cmd[..len], &mut resp)?;
        Ok(resp[0])
    }

    /// Word load at an explicit address width; see [`Link::lds8_width`].
    pub fn lds16_width(&mut self, address: u32, width: AddressWidth) -> Result<u16> {
        let mut cmd = [0u8; 6];
        cmd[0] = op::SYNC;
        cmd[1] = op::LDS | width.field() | Width::Word.data_field();
        let len = push_address(&mut cmd, 2, address, width);
        let mut resp = [0u8; 2];
        self.phy.transfer(&cmd[..len], &mut resp)?;
        Ok(u16::from_le_bytes(resp))
    }

    /// Byte store at an explicit address width; see [`Link::lds8_width`].
    pub fn sts8_width(&mut self, address: u32, value: u8, width: AddressWidth) -> Result<()> {
        let mut cmd = [0u8; 6];
        cmd[0] = op::SYNC;
        cmd[1] = op::STS | width.field() | Width::Byte.data_field();
        let len = push_address(&mut cmd, 2, address, width);
        self.expect_ack(&cmd[..len], NakStage::Address)?;
        self.expect_ack(&[value], NakStage::Data)
    }

    /// Word store at an explicit address width; see [`Link::lds8_width`].
    pub fn sts16_width(&mut self, address: u32, value: u16, width: AddressWidth) -> Result<()> {
        let mut cmd = [0u8; 6];
        cmd[0] = op::SYNC;
        cmd[1] = op::STS | width.field() | Width::Word.data_field();
        let len = push_address(&mut cmd, 2, address, width);
        self.expect_ack(&cmd[..len], NakStage::Address)?;
        self.expect_ack(&value.to_le_bytes(), NakStage::Data)
    }

    /// Set the indirect pointer used by `ld_ptr_inc`/`st_ptr_inc`.
    pub fn st_ptr(&mut self, address: u32) -> Result<()> {
        let mut cmd = [0u8; 6];
        cmd[0] = op::SYNC;
        cmd[1] = op::ST | op::PTR_ADDRESS | self.address_width.field();
        let len = push_address(&mut cmd, 2, address, self.address_width);
        self.expect_ack(&cmd[..len], NakStage::Address)
    }

    /// Read `buf.len()` bytes through the pointer with post-increment,
    /// byte mode. The caller must have already issued a matching
    /// `repeat` if more than one element is expected.
    pub fn ld_ptr_inc(&mut self, buf: &mut [u8]) -> Result<()> {
        let cmd = [op::SYNC, op::LD | op::PTR_INC | Width::Byte.data_field()];
        self.phy.transfer(&cmd, buf)
    }

    /// Read `buf.len()` bytes through the pointer with post-increment,
    /// word mode (`buf.len()` must be even).
    pub fn ld_ptr_inc16(&mut self, buf: &mut [u8]) -> Result<()> {
        let cmd = [op::SYNC, op::LD | op::PTR_INC | Width::Word.data_field()];
        self.phy.transfer(&cmd, buf)
    }

    /// Write `data` through the pointer with post-increment, byte mode.
    /// ACK-protected per byte.
    pub fn st_ptr_inc(&mut self, data: &[u8]) -> Result<()> {
        let Some((&first, rest)) = data.split_first() else {
            return Ok(());
        };
        let cmd = [
            op::SYNC,
            op::ST | op::PTR_INC | Width::Byte.data_field(),
            first,
        ];
        self.expect_ack(&cmd, NakStage::Data)?;
        for &byte in rest {
            self.expect_ack(&[byte], NakStage::Data)?;
        }
        Ok(())
    }

    /// Write `data` through the pointer with post-increment, word mode
    /// (`data.len()` must be even). ACK-protected per word.
    pub fn st_ptr_inc16(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < 2 {
            return Ok(());
        }
        let cmd = [
            op::SYNC,
            op::ST | op::PTR_INC | Width::Word.data_field(),
            data[0],
            data[1],
        ];
        self.expect_ack(&cmd, NakStage::Data)?;
        for pair in data[2..].chunks(2) {
            self.expect_ack(pair, NakStage::Data)?;
        }
        Ok(())
    }

    /// Set the repeat counter so the next LD/ST executes `count` times.
    /// `count` must be in `1..=256`.
    pub fn repeat(&mut self, count: u16) -> Result<()> {
        debug_assert!((1..=256).contains(&count));
        let cmd = [op::SYNC, op::REPEAT | op::REPEAT_BYTE, (count - 1) as u8];
        self.phy.send(&cmd)
    }

    /// Set the 16-bit repeat counter so the next LD/ST executes `count`
    /// times. `count` must be in `1..=65536`.
    pub fn repeat16(&mut self, count: u32) -> Result<()> {
        debug_assert!((1..=65536).contains(&count));
        let n = (count - 1) as u16;
        let cmd = [
            op::SYNC,
            op::REPEAT | op::REPEAT_WORD,
            (n & 0xFF) as u8,
            ((n >> 8) & 0xFF) as u8,
        ];
        self.phy.send(&cmd)
    }

    /// Read up to 16 bytes of the System Information Block.
    pub fn read_sib(&mut self, buf: &mut [u8]) -> Result<()> {
        let len = buf.len().min(16);
        let cmd = [op::SYNC, op::KEY | op::KEY_SIB | op::SIB_16BYTES];
        self.phy.transfer(&cmd, &mut buf[..len])
    }

    /// Write an 8-byte key, transmitted least-significant-byte-first (the
    /// wire order is the reverse of `key`).
    pub fn key(&mut self, key: &[u8; 8]) -> Result<()> {
        let cmd = [op::SYNC, op::KEY | op::KEY_KEY | op::KEY_SIZE_8BYTES];
        self.phy.send(&cmd)?;
        for &byte in key.iter().rev() {
            self.phy.send_byte(byte)?;
        }
        Ok(())
    }

    /// Negotiate the operating baud rate: disable collision detection,
    /// program the guard-time and oscillator-select fields, then switch
    /// the PHY to the requested baud.
    fn negotiate(&mut self, baud: u32, guard: u32) -> Result<()> {
        let first_baud = if baud > op::BAUDRATE_IN_CLK_4M_MAX {
            op::BAUDRATE_DEFAULT
        } else {
            baud
        };
        self.phy.set_baud_rate(first_baud)?;

        self.stcs(op::cs::CTRLB, 1 << op::ctrlb_bit::CCDETDIS)?;

        let mut gtval = 0u8;
        for i in 0..8u32 {
            if guard >= (1 << (8 - i)) {
                gtval = i as u8;
                break;
            }
        }
        let clksel = if baud <= op::BAUDRATE_IN_CLK_4M_MAX {
            op::ASI_CTRLA_CLKSEL_4M
        } else if baud <= op::BAUDRATE_IN_CLK_8M_MAX {
            op::ASI_CTRLA_CLKSEL_8M
        } else if baud <= op::BAUDRATE_IN_CLK_16M_MAX {
            gtval |= 1 << op::CTRLA_IBDLY_BIT;
            op::ASI_CTRLA_CLKSEL_16M
        } else {
            return Err(Error::InvalidArgument);
        };
        self.stcs(op::cs::CTRLA, gtval)?;

        let current = self.ldcs(op::cs::ASI_CTRLA)?;
        if current != clksel {
            self.stcs(op::cs::ASI_CTRLA, clksel)?;
        }

        self.phy.set_baud_rate(baud)
    }

    /// Verify the target answered the handshake: `STATUSB` must read zero
    /// (no framing/parity/contention error) and `STATUSA` must be
    /// non-zero.
    fn check(&mut self) -> Result<()> {
        let status_b = self.ldcs(op::cs::STATUSB)?;
        if status_b != 0 {
            return Err(Error::DeviceError { status: status_b });
        }
        let status_a = self.ldcs(op::cs::STATUSA)?;
        if status_a == 0 {
            return Err(Error::Timeout {
                what: crate::error::TimeoutKind::WaitUnlocked,
            });
        }
        Ok(())
    }

    /// Bring the LINK layer up at `baud`, retrying with a double-break up
    /// to three times. Called once right after the PHY is opened.
    pub fn initialize(&mut self, baud: u32, guard: u32) -> Result<()> {
        let mut last_err = None;
        for _ in 0..4 {
            match self.negotiate(baud, guard).and_then(|()| self.check()) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_err = Some(e);
                    self.phy.send_double_break()?;
                }
            }
        }
        Err(last_err.unwrap_or(Error::Io))
    }

    fn expect_ack(&mut self, out: &[u8], stage: NakStage) -> Result<()> {
        let mut resp = [0u8];
        self.phy.transfer(out, &mut resp)?;
        if resp[0] != op::ACK {
            return Err(Error::ProtocolNak { stage });
        }
        Ok(())
    }
}
