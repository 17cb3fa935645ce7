//! Raw instruction-byte encoding for the UPDI wire protocol.
//!
//! Every frame starts with [`SYNC`]. The instruction byte's top three bits
//! select an opcode family; the remaining bits select address width, data
//! width, or pointer mode depending on the family.

/// Synchronization byte prefixing every instruction.
pub const SYNC: u8 = 0x55;

/// Acknowledgement byte returned after ST/STS/ST_PTR phases.
pub const ACK: u8 = 0x40;

pub const LDS: u8 = 0x00;
pub const LD: u8 = 0x20;
pub const STS: u8 = 0x40;
pub const ST: u8 = 0x60;
pub const LDCS: u8 = 0x80;
pub const REPEAT: u8 = 0xA0;
pub const STCS: u8 = 0xC0;
pub const KEY: u8 = 0xE0;

/// Address-width field for LDS/STS/ST_PTR instructions.
pub const ADDRESS_16: u8 = 0x04;
pub const ADDRESS_24: u8 = 0x08;

/// Data-width field, shared by the direct and indirect families.
pub const DATA_8: u8 = 0x00;
pub const DATA_16: u8 = 0x01;
pub const DATA_24: u8 = 0x02;

/// Pointer-mode field for LD/ST instructions.
pub const PTR_INC: u8 = 0x04;
pub const PTR_ADDRESS: u8 = 0x08;

/// Repeat-counter width selector.
pub const REPEAT_BYTE: u8 = 0x00;
pub const REPEAT_WORD: u8 = 0x01;

/// KEY-instruction sub-selectors.
pub const KEY_KEY: u8 = 0x00;
pub const KEY_SIB: u8 = 0x04;
pub const SIB_16BYTES: u8 = 0x00;

/// Control/status register addresses (low nibble of an LDCS/STCS
/// instruction).
pub mod cs {
    /// Liveness/status register polled by `link_check`. Non-zero means the
    /// target responded to the initialisation sequence.
    pub const STATUSA: u8 = 0x0B;
    /// Error-status register; non-zero means a framing/parity/contention
    /// error occurred on the previous transaction.
    pub const STATUSB: u8 = 0x01;
    pub const CTRLA: u8 = 0x02;
    pub const CTRLB: u8 = 0x03;
    pub const ASI_KEY_STATUS: u8 = 0x07;
    pub const ASI_RESET_REQ: u8 = 0x08;
    pub const ASI_CTRLA: u8 = 0x09;
    pub const ASI_SYS_CTRLA: u8 = 0x0A;
    pub const ASI_SYS_STATUS: u8 = 0x0B;
    pub const ASI_CRC_STATUS: u8 = 0x0C;
}

/// Bit positions within [`cs::ASI_SYS_STATUS`].
pub mod sys_status_bit {
    pub const LOCKSTATUS: u8 = 0;
    pub const UROWPROG: u8 = 2;
    pub const NVMPROG: u8 = 3;
    pub const RSTSYS: u8 = 5;
}

/// Bit positions within [`cs::ASI_KEY_STATUS`].
pub mod key_status_bit {
    pub const CHIPERASE: u8 = 3;
    pub const NVMPROG: u8 = 4;
}

/// Bit positions within [`cs::CTRLB`].
pub mod ctrlb_bit {
    pub const CCDETDIS: u8 = 2;
    pub const UPDIDIS: u8 = 3;
}

/// Bit position within [`cs::CTRLA`] enabling the inter-byte delay.
pub const CTRLA_IBDLY_BIT: u8 = 7;

/// `ASI_RESET_REQ` value that asserts a reset; writing `0` releases it.
pub const RESET_REQ_VALUE: u8 = 0x59;

/// NVM programming key, ASCII, sent least-significant-byte-first (i.e. the
/// wire order is the reverse of this array).
pub const NVM_KEY: &[u8; 8] = b"NVMProg ";

/// Chip-erase key, ASCII, sent least-significant-byte-first.
pub const CHIP_ERASE_KEY: &[u8; 8] = b"NVMErase";

/// `size_k` value for an 8-byte key (`(2^size_k) * 8 == 8`).
pub const KEY_SIZE_8BYTES: u8 = 0;

/// Upper baud-rate bound reachable from each internal oscillator selection,
/// all roughly `clock / 18`; UPDI cannot exceed ~0.9 MHz regardless.
pub const BAUDRATE_IN_CLK_4M_MAX: u32 = 225_000;
pub const BAUDRATE_IN_CLK_8M_MAX: u32 = 450_000;
pub const BAUDRATE_IN_CLK_16M_MAX: u32 = 900_000;

/// Oscillator-select field values for `ASI_CTRLA`.
pub const ASI_CTRLA_CLKSEL_4M: u8 = 0x00;
pub const ASI_CTRLA_CLKSEL_8M: u8 = 0x01;
pub const ASI_CTRLA_CLKSEL_16M: u8 = 0x02;

/// Default baud rate used for the first handshake attempt before the
/// requested baud is negotiated.
pub const BAUDRATE_DEFAULT: u32 = 115_200;

/// Register offsets within a device's `nvmctrl_address` block, and the
/// command bytes written to `CTRLA` to drive the NVM controller. Both NVM
/// controller generations share the same register layout; only the command
/// encoding and write discipline (page-buffered vs. direct) differ.
pub mod nvmctrl {
    pub const CTRLA: u32 = 0x00;
    pub const STATUS: u32 = 0x02;
    pub const DATAL: u32 = 0x06;
    pub const ADDRL: u32 = 0x08;

    /// V0 (page-buffered) controller commands.
    pub mod v0 {
        pub const NOCMD: u8 = 0x00;
        pub const WRITE_PAGE: u8 = 0x01;
        pub const ERASE_PAGE: u8 = 0x02;
        pub const ERASE_WRITE_PAGE: u8 = 0x03;
        pub const PAGE_BUFFER_CLR: u8 = 0x04;
        pub const CHIP_ERASE: u8 = 0x05;
        pub const ERASE_EEPROM: u8 = 0x06;
        pub const WRITE_FUSE: u8 = 0x07;
    }

    /// V1 (direct-write) controller commands.
    pub mod v1 {
        pub const NOCMD: u8 = 0x00;
        pub const FLASH_WRITE: u8 = 0x02;
        pub const FLASH_PAGE_ERASE: u8 = 0x08;
        pub const EEPROM_BYTE_ERASE: u8 = 0x14;
        pub const EEPROM_ERASE_WRITE: u8 = 0x13;
        pub const EEPROM_BYTE32_ERASE: u8 = 0x18;
        pub const CHIP_ERASE: u8 = 0x20;
    }
}

/// Bit positions within `nvmctrl::STATUS`.
pub mod nvm_status_bit {
    pub const FLASH_BUSY: u8 = 0;
    pub const EEPROM_BUSY: u8 = 1;
    pub const WRITE_ERROR: u8 = 2;
}
