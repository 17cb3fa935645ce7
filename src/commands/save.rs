//! `--save`: dump every populated region of the target to an Intel HEX file.

use std::path::Path;

use updi_core::nvm::Nvm;
use updi_core::operation;
use updi_core::transport::Transport;

use crate::error::CliError;
use crate::hexfile;

pub fn run_save<T: Transport>(nvm: &mut Nvm<T>, path: &Path) -> Result<(), CliError> {
    let segments = operation::dump_image(nvm)?;
    let total: usize = segments.iter().map(|s| s.bytes.len()).sum();
    hexfile::save_image(path, &segments).map_err(CliError::Image)?;
    println!("Saved {total} byte(s) to {}", path.display());
    Ok(())
}
