//! `--fuses`: set individual fuse bytes.

use updi_core::nvm::Nvm;
use updi_core::operation;
use updi_core::transport::Transport;

use crate::error::CliError;

/// Write each `(address, value)` pair as a single fuse byte.
pub fn run_fuses<T: Transport>(nvm: &mut Nvm<T>, pairs: &[(u32, u8)]) -> Result<(), CliError> {
    operation::write_fuses(nvm, pairs)?;
    for &(addr, value) in pairs {
        println!("Fuse 0x{addr:04X} = 0x{value:02X}");
    }
    Ok(())
}
