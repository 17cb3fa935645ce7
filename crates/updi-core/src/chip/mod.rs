//! Device descriptors and the RON-backed catalog that loads them.

mod types;
pub use types::{DeviceDescriptor, NvmVersion, Region, RegionKind, MAX_NAME_LEN};

#[cfg(feature = "std")]
mod database;
#[cfg(feature = "std")]
pub use database::{CatalogError, DeviceCatalog};
