//! Serial-port [`Transport`] backing updi-core's PHY layer, built on top of
//! the `serialport` crate.
//!
//! UPDI drives the line at even parity, 8 data bits, and switches stop-bit
//! count depending on whether it is mid double-break handshake or at
//! normal operating baud; [`SerialTransport::reconfigure`] translates
//! [`updi_core::transport::SerialConfig`] into the matching `serialport`
//! builder calls on every switch.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use fs2::FileExt;
use serialport::{DataBits, Parity as SpParity, SerialPort, StopBits as SpStopBits};

use updi_core::error::{Error, Result};
use updi_core::transport::{SerialConfig, StopBits, Transport};

/// Read/write timeout applied to every serial operation. UPDI transactions
/// are small (at most a handful of bytes); anything slower than this
/// indicates a wedged or absent target.
const IO_TIMEOUT: Duration = Duration::from_millis(500);

/// A `serialport`-backed [`Transport`].
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    // Held for the lifetime of the transport; dropping it releases the
    // advisory lock. Never read after `open`.
    _lock: File,
}

impl SerialTransport {
    /// Open `device` at the operating baud rate (two stop bits, even
    /// parity, 8 data bits).
    ///
    /// Takes an advisory exclusive lock on `device` first, so a second
    /// invocation against the same port fails with [`Error::Io`] instead of
    /// interleaving wire traffic with the first.
    pub fn open(device: &str, baud: u32) -> Result<Self> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|_| Error::Io)?;
        lock_file.try_lock_exclusive().map_err(|_| Error::Io)?;

        let port = serialport::new(device, baud)
            .data_bits(DataBits::Eight)
            .parity(SpParity::Even)
            .stop_bits(SpStopBits::Two)
            .timeout(IO_TIMEOUT)
            .open()
            .map_err(|_| Error::Io)?;
        Ok(SerialTransport {
            port,
            _lock: lock_file,
        })
    }
}

impl Transport for SerialTransport {
    fn reconfigure(&mut self, config: SerialConfig) -> Result<()> {
        self.port.set_baud_rate(config.baud).map_err(|_| Error::Io)?;
        let stop_bits = match config.stop_bits {
            StopBits::One => SpStopBits::One,
            StopBits::Two => SpStopBits::Two,
        };
        self.port.set_stop_bits(stop_bits).map_err(|_| Error::Io)?;
        self.flush_input()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes).map_err(|_| Error::Io)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.port.read_exact(buf) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(Error::Io),
            Err(_) => Err(Error::Io),
        }
    }

    fn flush_input(&mut self) -> Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|_| Error::Io)
    }
}

/// List device paths serialport can currently see, for CLI discovery help
/// when `--comport` is omitted or wrong.
pub fn available_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}
