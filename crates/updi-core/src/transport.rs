//! The byte-level transport a [`crate::phy::Phy`] drives.
//!
//! UPDI needs more from a serial port than plain read/write: the double
//! break handshake requires dropping to 300 baud with one stop bit and then
//! restoring the operating configuration, so the trait exposes a
//! `reconfigure` hook alongside the usual byte shovelling.

use crate::error::{Error, Result};

/// Serial parity. UPDI always runs even parity; this exists so
/// implementations have a real type to hand the underlying driver rather
/// than a magic constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// Even parity. The only mode UPDI ever uses.
    Even,
}

/// Serial stop-bit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit, used only during the double-break handshake.
    One,
    /// Two stop bits, the normal operating configuration.
    Two,
}

/// A serial line configuration: baud rate, stop bits, always-even parity,
/// always 8 data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Baud rate in bits per second.
    pub baud: u32,
    /// Stop bit count.
    pub stop_bits: StopBits,
}

impl SerialConfig {
    /// The configuration used during the double-break handshake: 300 baud,
    /// one stop bit. The line pulls low for ~30ms at this rate, just above
    /// the chip's minimum break duration.
    pub const DOUBLE_BREAK: SerialConfig = SerialConfig {
        baud: 300,
        stop_bits: StopBits::One,
    };

    /// The normal operating configuration at a given baud rate: two stop
    /// bits.
    pub const fn operating(baud: u32) -> SerialConfig {
        SerialConfig {
            baud,
            stop_bits: StopBits::Two,
        }
    }
}

/// A half-duplex serial transport.
///
/// Implementations own the actual port (a real UART, a loopback pair, an
/// in-memory queue for tests) and are responsible for timing out reads
/// rather than blocking forever.
pub trait Transport {
    /// Apply a line configuration, discarding any buffered data.
    fn reconfigure(&mut self, config: SerialConfig) -> Result<()>;

    /// Write every byte, returning once all have been accepted by the
    /// driver (not necessarily transmitted on the wire).
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read until `buf` is full or the implementation's read timeout
    /// elapses, in which case it returns [`Error::Io`].
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Discard anything sitting in the input buffer.
    fn flush_input(&mut self) -> Result<()>;
}

/// Convenience conversion used by implementations translating a driver's
/// native I/O error into the stack's error type.
pub fn io_err<E>(_source: E) -> Error {
    Error::Io
}
