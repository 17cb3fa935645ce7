//! `updi list-devices`

use updi_core::chip::DeviceCatalog;

/// Print every device in the catalog, one line each.
pub fn list_devices(catalog: &DeviceCatalog) {
    println!("Device catalog ({} device(s)):", catalog.len());
    println!();
    println!(
        "{:<14} {:>10} {:>8} {:>8} {:>8} {:>7}",
        "Name", "Flash", "EEPROM", "UserRow", "Fuses", "NVM"
    );
    println!("{}", "-".repeat(60));

    for device in catalog.iter() {
        println!(
            "{:<14} {:>10} {:>8} {:>8} {:>8} {:>7?}",
            device.name.as_str(),
            device.flash.size,
            device.eeprom.size,
            device.userrow.size,
            device.fuses.size,
            device.nvm_version,
        );
    }
}
