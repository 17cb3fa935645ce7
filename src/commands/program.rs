//! `--program`: write an image file to flash.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use updi_core::image::ImageSegment;
use updi_core::nvm::Nvm;
use updi_core::operation;
use updi_core::transport::Transport;

use crate::error::CliError;

/// Enter programming mode, erase the chip, then write every segment.
pub fn run_program<T: Transport>(
    nvm: &mut Nvm<T>,
    segments: &[ImageSegment],
) -> Result<(), CliError> {
    let total_bytes: usize = segments.iter().map(|s| s.bytes.len()).sum();
    log::info!(
        "programming {} segment(s), {} byte(s) total",
        segments.len(),
        total_bytes
    );

    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    pb.set_style(style);
    pb.set_message(format!("Programming {total_bytes} byte(s)..."));
    pb.enable_steady_tick(Duration::from_millis(100));

    operation::program_image(nvm, segments)?;

    pb.finish_with_message(format!("Programmed {total_bytes} byte(s)"));
    Ok(())
}
