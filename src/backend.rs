//! Transport backend selection: a real serial port, or the in-memory dummy
//! target for `--comport dummy`.
//!
//! The donor CLI dispatched across a whole registry of SPI programmers
//! through a boxed trait object; UPDI only ever talks to one of two
//! transports, so a small enum stands in for that registry instead.

use updi_core::chip::DeviceDescriptor;
use updi_core::error::Result;
use updi_core::transport::{SerialConfig, Transport};
use updi_dummy::DummyTransport;
use updi_serial::SerialTransport;

/// The literal `--comport` value that selects the in-memory mock target.
pub const DUMMY_COMPORT: &str = "dummy";

/// Either backend, behind a single [`Transport`] impl.
pub enum AnyTransport {
    Serial(SerialTransport),
    Dummy(DummyTransport),
}

/// Open the transport named by `comport`: [`DUMMY_COMPORT`] for the mock
/// target, anything else as a real serial device path.
pub fn open(comport: &str, baud: u32, device: DeviceDescriptor) -> Result<AnyTransport> {
    if comport == DUMMY_COMPORT {
        log::info!("using in-memory dummy target for {}", device.name);
        Ok(AnyTransport::Dummy(DummyTransport::new(device)))
    } else {
        log::info!("opening {comport} at {baud} baud");
        Ok(AnyTransport::Serial(SerialTransport::open(comport, baud)?))
    }
}

impl Transport for AnyTransport {
    fn reconfigure(&mut self, config: SerialConfig) -> Result<()> {
        match self {
            AnyTransport::Serial(t) => t.reconfigure(config),
            AnyTransport::Dummy(t) => t.reconfigure(config),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            AnyTransport::Serial(t) => t.write_all(bytes),
            AnyTransport::Dummy(t) => t.write_all(bytes),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self {
            AnyTransport::Serial(t) => t.read_exact(buf),
            AnyTransport::Dummy(t) => t.read_exact(buf),
        }
    }

    fn flush_input(&mut self) -> Result<()> {
        match self {
            AnyTransport::Serial(t) => t.flush_input(),
            AnyTransport::Dummy(t) => t.flush_input(),
        }
    }
}
