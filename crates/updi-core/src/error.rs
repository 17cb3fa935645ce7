//! Error types for the UPDI protocol stack.
//!
//! `no_std` compatible: every variant is `Copy` and carries no heap data,
//! mirroring how the rest of this crate avoids allocation in its hot paths.

use core::fmt;

use crate::chip::RegionKind;

/// Which polling operation timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// `wait_unlocked` exceeded its deadline.
    WaitUnlocked,
    /// `wait_flash_ready` exceeded its deadline.
    WaitFlashReady,
}

/// Which LINK stage failed to see the expected ACK byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NakStage {
    /// Address phase of an STS/ST_PTR transaction.
    Address,
    /// Data phase of an STS/ST_PTR_INC transaction.
    Data,
    /// Key-status verification after a KEY opcode.
    KeyStatus,
}

/// The error taxonomy shared by every layer of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Missing required CLI flag or an unknown device name.
    InvalidArgument,
    /// Serial port open/read/write failed.
    Io,
    /// A transmitted byte was not echoed back identically.
    EchoMismatch {
        /// Byte offset within the transfer where the mismatch occurred.
        offset: usize,
        /// The byte that was sent.
        expected: u8,
        /// The byte that was echoed back.
        got: u8,
    },
    /// An expected ACK (`0x40`) byte was not observed.
    ProtocolNak {
        /// Which phase of the transaction failed to ACK.
        stage: NakStage,
    },
    /// `wait_unlocked` or `wait_flash_ready` exceeded its deadline.
    Timeout {
        /// Which poll loop timed out.
        what: TimeoutKind,
    },
    /// A privileged operation was attempted while not in NVMPROG.
    Locked,
    /// A write straddled or exceeded a named region.
    OutOfRange {
        /// The region the address was checked against.
        region: RegionKind,
        /// The address that was out of range.
        addr: u32,
        /// The length of the attempted access.
        len: usize,
    },
    /// An info-block or firmware CRC check failed.
    CrcMismatch {
        /// The CRC value recorded in the block.
        expected: u32,
        /// The CRC recomputed from the current contents.
        got: u32,
    },
    /// The NVM controller status register reported a write error.
    DeviceError {
        /// The raw status byte observed.
        status: u8,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::Io => write!(f, "I/O error"),
            Self::EchoMismatch {
                offset,
                expected,
                got,
            } => write!(
                f,
                "echo mismatch at offset {offset}: expected 0x{expected:02X}, got 0x{got:02X}"
            ),
            Self::ProtocolNak { stage } => write!(f, "protocol NAK during {stage:?}"),
            Self::Timeout { what } => write!(f, "timeout waiting for {what:?}"),
            Self::Locked => write!(f, "device is locked (not in NVM programming mode)"),
            Self::OutOfRange { region, addr, len } => write!(
                f,
                "access of {len} byte(s) at 0x{addr:06X} is out of range for {region:?}"
            ),
            Self::CrcMismatch { expected, got } => write!(
                f,
                "CRC mismatch: expected 0x{expected:06X}, got 0x{got:06X}"
            ),
            Self::DeviceError { status } => write!(f, "device reported error status 0x{status:02X}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;
