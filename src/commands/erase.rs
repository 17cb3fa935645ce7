//! `--erase`: whole-chip erase.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use updi_core::operation;
use updi_core::transport::Transport;

use crate::error::CliError;

/// Enter programming mode and erase the whole chip.
pub fn run_erase<T: Transport>(nvm: &mut updi_core::nvm::Nvm<T>) -> Result<(), CliError> {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    pb.set_style(style);
    pb.set_message("Erasing chip...");
    pb.enable_steady_tick(Duration::from_millis(100));

    operation::erase(nvm)?;

    pb.finish_with_message("Chip erase complete");
    Ok(())
}
