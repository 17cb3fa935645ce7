//! `--reset`: toggle the UPDI reset line via the SYS register.

use updi_core::nvm::Nvm;
use updi_core::operation;
use updi_core::transport::Transport;

use crate::error::CliError;

pub fn run_reset<T: Transport>(nvm: &mut Nvm<T>) -> Result<(), CliError> {
    operation::reset(nvm)?;
    println!("Target reset");
    Ok(())
}
