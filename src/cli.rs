//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "updi")]
#[command(author, version, about = "Programmer for single-wire UPDI-class microcontrollers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every device in the loaded catalog
    ListDevices,
}

/// Everything needed to open and drive a session against one device.
#[derive(clap::Args, Debug, Default)]
pub struct SessionArgs {
    /// Target device name, as it appears in the device catalog
    #[arg(short, long)]
    pub device: Option<String>,

    /// Com port to use (`/dev/ttyUSB0`, `COM3`, ...), or the literal `dummy`
    /// for the in-memory mock target
    #[arg(short, long)]
    pub comport: Option<String>,

    /// Baud rate
    #[arg(short, long, default_value_t = 115_200)]
    pub baudrate: u32,

    /// Intel HEX or raw binary file to program or compare against
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Perform a chip unlock (chip-erase key sequence)
    #[arg(short, long)]
    pub unlock: bool,

    /// Perform a whole-chip erase
    #[arg(short, long)]
    pub erase: bool,

    /// Program the given file to flash
    #[arg(short, long)]
    pub program: bool,

    /// Program an information-block update to EEPROM or the user row
    #[arg(long)]
    pub update: bool,

    /// Compare the given file against flash contents
    #[arg(short = 'k', long)]
    pub check: bool,

    /// Print information-block details read back from the target
    #[arg(short, long)]
    pub info: bool,

    /// Read flash, EEPROM, user row and fuses back to this path (Intel HEX)
    #[arg(short, long)]
    pub save: Option<PathBuf>,

    /// Set fuse bytes: `[addr]:[val0];[val1];...|[addr1]:...` (hex)
    #[arg(long)]
    pub fuses: Option<String>,

    /// Direct memory read: `[addr]:[count]|[addr2]:[count2]...` (hex)
    #[arg(short, long)]
    pub read: Option<String>,

    /// Direct memory write: `[addr]:[val0];[val1];...|[addr1]:...` (hex)
    #[arg(short, long)]
    pub write: Option<String>,

    /// Reset the target
    #[arg(long)]
    pub reset: bool,

    /// Verbosity, 0 (silent) through 6 (per-byte wire trace)
    #[arg(short, long, default_value_t = 0)]
    pub verbose: u8,

    /// Directory or single file to load the device catalog from (defaults
    /// to `./devices`, then `/usr/share/updi/devices`, then
    /// `/usr/local/share/updi/devices`)
    #[arg(long)]
    pub device_catalog: Option<PathBuf>,
}
