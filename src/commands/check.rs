//! `--check`: compare an image file against the target's current contents.

use updi_core::chip::RegionKind;
use updi_core::image::ImageSegment;
use updi_core::nvm::Nvm;
use updi_core::transport::Transport;

use crate::error::CliError;

/// Read back every segment's address range and compare byte for byte.
/// Returns `Ok(())` if everything matches, `Err` describing the first
/// mismatch otherwise.
pub fn run_check<T: Transport>(nvm: &mut Nvm<T>, segments: &[ImageSegment]) -> Result<(), CliError> {
    let mut mismatches = 0usize;
    let mut first: Option<(u32, u8, u8)> = None;

    for segment in segments {
        let base = segment.absolute_base();
        let kind = nvm
            .device()
            .region_containing(base, segment.bytes.len())
            .unwrap_or(RegionKind::Flash);
        let actual = nvm.read_region(kind, base, segment.bytes.len())?;
        for (i, (&expected, &got)) in segment.bytes.iter().zip(actual.iter()).enumerate() {
            if expected != got {
                mismatches += 1;
                if first.is_none() {
                    first = Some((base + i as u32, expected, got));
                }
            }
        }
    }

    match first {
        None => {
            println!("Check passed: contents match");
            Ok(())
        }
        Some((addr, expected, got)) => Err(CliError::InvalidArgument(format!(
            "check failed: {mismatches} byte(s) differ, first at 0x{addr:06X} (expected 0x{expected:02X}, got 0x{got:02X})"
        ))),
    }
}
