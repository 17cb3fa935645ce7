//! Top-level CLI error type and exit-code mapping.
//!
//! Library crates never call `process::exit`; this is the one place that
//! translates a failure into the small negative integer the shell sees.

use std::fmt;

use updi_core::error::Error as CoreError;

/// Everything that can go wrong at the CLI boundary, on top of the protocol
/// stack's own [`CoreError`].
#[derive(Debug)]
pub enum CliError {
    /// Bad flag combination, missing required argument, or unknown device.
    InvalidArgument(String),
    /// Device catalog failed to load or parse.
    Catalog(updi_core::chip::CatalogError),
    /// A HEX/bin file failed to load, parse, or save.
    Image(String),
    /// Plain filesystem I/O outside the protocol stack (e.g. `--save`).
    Io(std::io::Error),
    /// A protocol stack error, already carrying its own exit-code class.
    Core(CoreError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "{msg}"),
            Self::Catalog(e) => write!(f, "device catalog: {e}"),
            Self::Image(msg) => write!(f, "{msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Core(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<CoreError> for CliError {
    fn from(e: CoreError) -> Self {
        CliError::Core(e)
    }
}

impl From<updi_core::chip::CatalogError> for CliError {
    fn from(e: updi_core::chip::CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

/// Map a failure to the small negative exit code the shell sees. Distinct
/// stages stay distinct codes so a calling script can tell which layer
/// failed without scraping stderr.
pub fn exit_code(err: &CliError) -> i32 {
    match err {
        CliError::InvalidArgument(_) | CliError::Catalog(_) | CliError::Image(_) => -1,
        CliError::Io(_) => -2,
        CliError::Core(core) => match core {
            CoreError::InvalidArgument => -1,
            CoreError::Io | CoreError::Locked => -2,
            CoreError::EchoMismatch { .. } | CoreError::ProtocolNak { .. } | CoreError::Timeout { .. } => -3,
            CoreError::OutOfRange { .. } => -4,
            CoreError::CrcMismatch { .. } => -5,
            CoreError::DeviceError { .. } => -6,
            _ => -6,
        },
    }
}
