// Licensed under the Apache-2.0 license

//! OTA packaging support for the combined bootloader image: splits
//! `RADIO/bootloader.img` into its IFWI and droidboot blobs and emits the
//! install steps for full and incremental packages.

mod archive;
mod config;
pub mod image;
mod install;
mod ota;
mod script;

pub use archive::{ArchiveEntry, ArchiveError, EntryRead, OtaPackage, OutputArchive, TargetFiles};
pub use config::{
    ConfigError, InstallConfig, BOOTLOADER_ENTRY, DROIDBOOT_DEVICE, DROIDBOOT_NAME,
    DROIDBOOT_PARTITION, FLASH_IFWI_FUNCTION, IFWI_NAME, IFWI_STAGING_PATH,
};
pub use install::{IncrementalDecision, InstallOutcome, InstallPlan, InstallPlanner, SkipReason};
pub use ota::{full_ota_install_end, incremental_ota_install_end};
pub use script::{Directive, ScriptError, ScriptSink, UpdaterScript};
