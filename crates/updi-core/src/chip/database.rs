//! Device catalog: runtime loading and lookup of [`DeviceDescriptor`]s from
//! RON files, the same format and loading shape as the donor workspace's
//! own flash-chip database.

use alloc::string::String as AllocString;
use alloc::vec::Vec;
use std::fs;
use std::io;
use std::path::Path;

use super::types::{DeviceDescriptor, NvmVersion, Region};

/// Error type for device catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// I/O error reading catalog files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error.
    #[error("parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// A device entry failed validation (e.g. name too long).
    #[error("validation error: {0}")]
    Validation(AllocString),
}

/// Region definition in RON format (start/size/page_size in raw bytes).
#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct RegionDef {
    start: u32,
    size: u32,
    page_size: u32,
}

impl From<RegionDef> for Region {
    fn from(def: RegionDef) -> Self {
        Region::new(def.start, def.size, def.page_size)
    }
}

/// NVM controller generation in RON format.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
enum NvmVersionDef {
    V0,
    V1,
}

impl From<NvmVersionDef> for NvmVersion {
    fn from(def: NvmVersionDef) -> Self {
        match def {
            NvmVersionDef::V0 => NvmVersion::V0,
            NvmVersionDef::V1 => NvmVersion::V1,
        }
    }
}

/// A single device entry in RON format.
#[derive(Debug, Clone, serde::Deserialize)]
struct DeviceDef {
    name: AllocString,
    flash: RegionDef,
    eeprom: RegionDef,
    userrow: RegionDef,
    fuses: RegionDef,
    sram: RegionDef,
    syscfg_address: u32,
    nvmctrl_address: u32,
    sigrow_address: u32,
    nvm_version: NvmVersionDef,
}

/// A catalog file in RON format: a flat list of device entries.
#[derive(Debug, Clone, serde::Deserialize)]
struct CatalogDef {
    devices: Vec<DeviceDef>,
}

/// Runtime device catalog.
///
/// Holds a collection of [`DeviceDescriptor`]s loaded from RON files, the
/// same incremental `load_file`/`load_dir` shape the donor workspace uses
/// for its own chip database.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Load device definitions from a single RON file.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, CatalogError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load device definitions from a RON string.
    pub fn load_ron(&mut self, content: &str) -> Result<usize, CatalogError> {
        let catalog_def: CatalogDef = ron::from_str(content)?;
        let count = catalog_def.devices.len();

        for def in catalog_def.devices {
            let mut name = heapless::String::new();
            name.push_str(&def.name).map_err(|_| {
                CatalogError::Validation(alloc::format!(
                    "device name '{}' exceeds {} characters",
                    def.name,
                    super::types::MAX_NAME_LEN
                ))
            })?;

            self.devices.push(DeviceDescriptor {
                name,
                flash: def.flash.into(),
                eeprom: def.eeprom.into(),
                userrow: def.userrow.into(),
                fuses: def.fuses.into(),
                sram: def.sram.into(),
                syscfg_address: def.syscfg_address,
                nvmctrl_address: def.nvmctrl_address,
                sigrow_address: def.sigrow_address,
                nvm_version: def.nvm_version.into(),
            });
        }

        Ok(count)
    }

    /// Load every `.ron` file in a directory.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, CatalogError> {
        let mut total = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }
        Ok(total)
    }

    /// All devices currently in the catalog.
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Number of devices in the catalog.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Find a device by exact (case-insensitive) name match.
    pub fn find_by_name(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.devices
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Iterate over every device in the catalog.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.devices.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_ron_round_trips_device_fields() {
        let ron = r#"
        (
            devices: [
                (
                    name: "attiny1614",
                    flash: (start: 0x8000, size: 16384, page_size: 64),
                    eeprom: (start: 0x1400, size: 256, page_size: 32),
                    userrow: (start: 0x1300, size: 32, page_size: 32),
                    fuses: (start: 0x1280, size: 10, page_size: 1),
                    sram: (start: 0x3800, size: 2048, page_size: 1),
                    syscfg_address: 0x0F00,
                    nvmctrl_address: 0x1000,
                    sigrow_address: 0x1100,
                    nvm_version: V0,
                ),
            ],
        )
        "#;

        let mut catalog = DeviceCatalog::new();
        let count = catalog.load_ron(ron).unwrap();
        assert_eq!(count, 1);
        assert_eq!(catalog.len(), 1);

        let device = catalog.find_by_name("ATtiny1614").unwrap();
        assert_eq!(device.name.as_str(), "attiny1614");
        assert_eq!(device.flash.start, 0x8000);
        assert_eq!(device.flash.size, 16384);
        assert_eq!(device.flash.page_size, 64);
        assert_eq!(device.nvm_version, super::super::types::NvmVersion::V0);
    }

    #[test]
    fn unknown_device_name_is_not_found() {
        let catalog = DeviceCatalog::new();
        assert!(catalog.find_by_name("nonexistent").is_none());
    }
}
