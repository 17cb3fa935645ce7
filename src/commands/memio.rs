//! `--read`/`--write`: direct, region-dispatched memory access.

use updi_core::chip::RegionKind;
use updi_core::nvm::Nvm;
use updi_core::operation;
use updi_core::transport::Transport;

use crate::addrlist::{ReadSpec, WriteSpec};
use crate::error::CliError;

/// Run every `--read` entry, printing each as a hex dump.
pub fn run_read<T: Transport>(nvm: &mut Nvm<T>, specs: &[ReadSpec]) -> Result<(), CliError> {
    for spec in specs {
        let kind = nvm
            .device()
            .region_containing(spec.addr, spec.len)
            .ok_or_else(|| {
                CliError::InvalidArgument(format!(
                    "0x{:06X}..+{} is not inside any region of {}",
                    spec.addr,
                    spec.len,
                    nvm.device().name.as_str()
                ))
            })?;
        let bytes = operation::read_memory(nvm, kind, spec.addr, spec.len)?;
        print_hex_dump(spec.addr, &bytes);
    }
    Ok(())
}

/// Run every `--write` entry, dispatching each to its region's write
/// discipline.
pub fn run_write<T: Transport>(nvm: &mut Nvm<T>, specs: &[WriteSpec]) -> Result<(), CliError> {
    nvm.enter_progmode()?;
    for spec in specs {
        let kind = nvm
            .device()
            .region_containing(spec.addr, spec.bytes.len())
            .unwrap_or(RegionKind::Sram);
        operation::write_memory(nvm, kind, spec.addr, &spec.bytes)?;
        println!(
            "Wrote {} byte(s) to 0x{:06X} ({:?})",
            spec.bytes.len(),
            spec.addr,
            kind
        );
    }
    Ok(())
}

fn print_hex_dump(base: u32, bytes: &[u8]) {
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let addr = base + (row * 16) as u32;
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("{addr:06X}: {}", hex.join(" "));
    }
}
