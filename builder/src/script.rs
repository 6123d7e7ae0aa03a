// Licensed under the Apache-2.0 license

use std::collections::BTreeMap;
use std::fmt;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("no partition is mounted at {0}")]
    UnknownPartition(String),
}

/// Sink for install-script commands. Command text is opaque to this crate.
pub trait ScriptSink {
    fn emit_directive(&mut self, text: &str);

    /// Writes the archived image `archive_path` over the whole partition
    /// mounted at `mount_point`.
    fn write_raw_image(
        &mut self,
        mount_point: &str,
        archive_path: &str,
    ) -> Result<(), ScriptError>;

    /// Fails when `write_raw_image` would reject `mount_point`, without
    /// writing anything.
    fn check_raw_image(&self, _mount_point: &str) -> Result<(), ScriptError> {
        Ok(())
    }
}

/// One platform install step, in the order it must run on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    ExtractFile {
        archive_path: String,
        device_path: String,
    },
    FlashFirmwareInterface {
        function: String,
        staging_path: String,
    },
    WriteRawImage {
        mount_point: String,
        archive_path: String,
    },
}

impl Directive {
    pub fn check(&self, script: &impl ScriptSink) -> Result<(), ScriptError> {
        match self {
            Directive::WriteRawImage { mount_point, .. } => script.check_raw_image(mount_point),
            _ => Ok(()),
        }
    }

    pub fn emit(&self, script: &mut impl ScriptSink) -> Result<(), ScriptError> {
        match self {
            Directive::WriteRawImage {
                mount_point,
                archive_path,
            } => script.write_raw_image(mount_point, archive_path),
            other => {
                script.emit_directive(&other.to_string());
                Ok(())
            }
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::ExtractFile {
                archive_path,
                device_path,
            } => write!(
                f,
                "package_extract_file(\"{}\", \"{}\");",
                archive_path, device_path
            ),
            Directive::FlashFirmwareInterface {
                function,
                staging_path,
            } => write!(f, "{}(\"{}\");", function, staging_path),
            Directive::WriteRawImage {
                mount_point,
                archive_path,
            } => write!(f, "write_raw_image({} -> {})", archive_path, mount_point),
        }
    }
}

/// Updater script text. Raw image writes are resolved to block devices
/// through the partition table given at construction.
#[derive(Debug, Default, Clone)]
pub struct UpdaterScript {
    partitions: BTreeMap<String, String>,
    lines: Vec<String>,
}

impl UpdaterScript {
    pub fn new(partitions: BTreeMap<String, String>) -> Self {
        Self {
            partitions,
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn text(&self) -> String {
        self.lines.iter().map(|line| format!("{line}\n")).collect()
    }

    fn device(&self, mount_point: &str) -> Result<&str, ScriptError> {
        self.partitions
            .get(mount_point)
            .map(String::as_str)
            .ok_or_else(|| ScriptError::UnknownPartition(mount_point.to_string()))
    }
}

impl ScriptSink for UpdaterScript {
    fn emit_directive(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn write_raw_image(
        &mut self,
        mount_point: &str,
        archive_path: &str,
    ) -> Result<(), ScriptError> {
        let device = self.device(mount_point)?;
        let line = format!("package_extract_file(\"{}\", \"{}\");", archive_path, device);
        self.lines.push(line);
        Ok(())
    }

    fn check_raw_image(&self, mount_point: &str) -> Result<(), ScriptError> {
        self.device(mount_point).map(|_| ())
    }
}
