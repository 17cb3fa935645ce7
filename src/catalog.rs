//! Device catalog loading: the same incremental, fallback-search-path
//! loading shape the donor CLI used for its own chip database, adapted to
//! the RON-backed [`DeviceCatalog`].

use std::path::{Path, PathBuf};

use updi_core::chip::{CatalogError, DeviceCatalog};

/// Load the device catalog from an explicit path, or try the default
/// search locations in order if none was given.
pub fn load(path: Option<&Path>) -> Result<DeviceCatalog, CatalogError> {
    let mut catalog = DeviceCatalog::new();

    if let Some(path) = path {
        if path.is_dir() {
            catalog.load_dir(path)?;
        } else {
            catalog.load_file(path)?;
        }
        return Ok(catalog);
    }

    let default_paths = [
        PathBuf::from("devices"),
        PathBuf::from("/usr/share/updi/devices"),
        PathBuf::from("/usr/local/share/updi/devices"),
    ];

    let mut loaded = false;
    for dir in &default_paths {
        if dir.is_dir() {
            match catalog.load_dir(dir) {
                Ok(count) => {
                    log::debug!("loaded {} device(s) from {}", count, dir.display());
                    loaded = true;
                }
                Err(e) => log::warn!("failed to load devices from {}: {}", dir.display(), e),
            }
        }
    }

    if !loaded {
        log::warn!("no device catalog found in default locations");
    }

    Ok(catalog)
}
