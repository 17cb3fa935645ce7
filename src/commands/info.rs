//! `--info`: print identity/silicon info read from the target, and (if a
//! previously-written one exists) the information block.

use updi_core::chip::RegionKind;
use updi_core::nvm::Nvm;
use updi_core::operation;
use updi_core::transport::Transport;

use crate::error::CliError;

/// Print the SIB-derived identity, silicon info (if unlocked), and attempt
/// to verify an information block in EEPROM. A missing or invalid info
/// block is reported but not treated as a failure of `--info` itself.
pub fn run_info<T: Transport>(nvm: &mut Nvm<T>) -> Result<(), CliError> {
    let info = nvm.app_mut().device_info()?;

    println!("Device:   {}", nvm.device().name.as_str());
    println!("Family:   {}", String::from_utf8_lossy(&info.family_id));
    println!("NVM rev:  {}", String::from_utf8_lossy(&info.nvm_revision));
    println!("OCD rev:  {}", String::from_utf8_lossy(&info.ocd_revision));
    println!("PDI osc:  {}", info.pdi_oscillator);

    match info.silicon {
        Some(silicon) => {
            println!("Device id:     {:02X?}", silicon.device_id);
            println!("Device serial: {:02X?}", silicon.device_serial);
            println!("Revision:      0x{:02X}", silicon.revid);
        }
        None => println!("(silicon info unavailable outside NVMPROG)"),
    }

    match operation::verify_info_block(nvm, RegionKind::Eeprom, 0) {
        Ok(block) => {
            println!();
            println!("Information block:");
            println!(
                "  firmware version: {}",
                String::from_utf8_lossy(&block.firmware_version)
            );
            println!("  firmware size:    {} bytes", block.firmware_size);
            println!("  firmware CRC-24:  0x{:06X}", block.firmware_crc24);
        }
        Err(e) => println!("(no valid information block in EEPROM: {e})"),
    }

    Ok(())
}
