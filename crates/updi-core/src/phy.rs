//! PHY layer: single-wire serial framing with echo consumption.
//!
//! UPDI's physical wire is half-duplex: the host's own transmitted bytes
//! loop back on the single data line, so every send must read back and
//! verify its own echo before the reply (if any) follows. Resynchronizing
//! the line is a "double break": a deliberately slow two-byte zero frame
//! sent at 300 baud with one stop bit, which pulls the line low for longer
//! than any valid UPDI frame and forces the target back to a known state.

use crate::error::{Error, Result};
use crate::transport::{SerialConfig, Transport};

const UPDI_BREAK: u8 = 0x00;

/// Maximum single transfer this layer will echo-check in one shot. Bounds a
/// stack buffer so `send` needs no heap allocation.
const MAX_ECHO_CHUNK: usize = 64;

/// Single-wire PHY driver, generic over the underlying [`Transport`].
pub struct Phy<T: Transport> {
    transport: T,
    operating: SerialConfig,
}

impl<T: Transport> Phy<T> {
    /// Open the PHY at a given baud rate. Applies the two-stop-bit
    /// operating configuration immediately; callers still need to send a
    /// double break before the target will respond (see
    /// [`Phy::send_double_break`]).
    pub fn new(mut transport: T, baud: u32) -> Result<Self> {
        let operating = SerialConfig::operating(baud);
        transport.reconfigure(operating)?;
        Ok(Phy {
            transport,
            operating,
        })
    }

    /// Switch the operating baud rate without touching stop bits.
    pub fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.operating = SerialConfig::operating(baud);
        self.transport.reconfigure(self.operating)
    }

    /// Send a single break byte at the current operating baud rate.
    pub fn send_break(&mut self) -> Result<()> {
        self.send(&[UPDI_BREAK])
    }

    /// Send a double break: drop to 300 baud / one stop bit, send two zero
    /// bytes (each echo-checked as usual), then restore the operating
    /// configuration. Guaranteed to push the target's UPDI state machine
    /// into a known state regardless of what it was doing before.
    pub fn send_double_break(&mut self) -> Result<()> {
        self.transport.reconfigure(SerialConfig::DOUBLE_BREAK)?;
        let result = self.send(&[UPDI_BREAK, UPDI_BREAK]);
        self.transport.reconfigure(self.operating)?;
        result
    }

    /// Send `bytes`, reading back and verifying an identical echo for each
    /// one. The single-wire line loops the host's own transmission back to
    /// it, so this is how every send doubles as a liveness check.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport.flush_input()?;
        for (chunk_start, chunk) in bytes.chunks(MAX_ECHO_CHUNK).enumerate().map(|(i, c)| (i * MAX_ECHO_CHUNK, c)) {
            self.transport.write_all(chunk)?;
            let mut echo = [0u8; MAX_ECHO_CHUNK];
            let echo = &mut echo[..chunk.len()];
            self.transport.read_exact(echo)?;
            for (offset, (&expected, &got)) in chunk.iter().zip(echo.iter()).enumerate() {
                if expected != got {
                    return Err(Error::EchoMismatch {
                        offset: chunk_start + offset,
                        expected,
                        got,
                    });
                }
            }
        }
        Ok(())
    }

    /// Send a single byte; see [`Phy::send`].
    pub fn send_byte(&mut self, byte: u8) -> Result<()> {
        self.send(&[byte])
    }

    /// Receive exactly `buf.len()` bytes. No echo is expected or consumed:
    /// these are genuine replies from the target.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        self.transport.read_exact(buf)
    }

    /// Receive a single reply byte.
    pub fn receive_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8];
        self.receive(&mut buf)?;
        Ok(buf[0])
    }

    /// Send `out`, then receive `reply.len()` bytes into `reply`. The
    /// common shape of every LINK-layer request/response exchange.
    pub fn transfer(&mut self, out: &[u8], reply: &mut [u8]) -> Result<()> {
        self.send(out)?;
        self.receive(reply)
    }
}
