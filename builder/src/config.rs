// Licensed under the Apache-2.0 license

use crate::script::UpdaterScript;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

pub const BOOTLOADER_ENTRY: &str = "RADIO/bootloader.img";
pub const IFWI_NAME: &str = "ifwi.bin";
pub const DROIDBOOT_NAME: &str = "droidboot.img";
pub const IFWI_STAGING_PATH: &str = "/tmp/ifwi.bin";
pub const FLASH_IFWI_FUNCTION: &str = "fugu.flash_ifwi";
pub const DROIDBOOT_PARTITION: &str = "/fastboot";
pub const DROIDBOOT_DEVICE: &str = "/dev/block/by-name/fastboot";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Install recipe for the bootloader. Every field has a default, so a config
/// file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    /// Entry holding the combined image in target-files and source-files.
    pub bootloader_entry: String,
    pub firmware_interface_entry: String,
    pub loader_entry: String,
    /// Where the IFWI blob is extracted on the device before flashing.
    pub staging_path: String,
    pub flash_function: String,
    /// Mount point of the partition that receives the loader blob.
    pub loader_partition: String,
    /// Mount point to block device.
    pub partitions: BTreeMap<String, String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            bootloader_entry: BOOTLOADER_ENTRY.to_string(),
            firmware_interface_entry: IFWI_NAME.to_string(),
            loader_entry: DROIDBOOT_NAME.to_string(),
            staging_path: IFWI_STAGING_PATH.to_string(),
            flash_function: FLASH_IFWI_FUNCTION.to_string(),
            loader_partition: DROIDBOOT_PARTITION.to_string(),
            partitions: BTreeMap::from([(
                DROIDBOOT_PARTITION.to_string(),
                DROIDBOOT_DEVICE.to_string(),
            )]),
        }
    }
}

impl InstallConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn updater_script(&self) -> UpdaterScript {
        UpdaterScript::new(self.partitions.clone())
    }
}
