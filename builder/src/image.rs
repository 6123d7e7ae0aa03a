// Licensed under the Apache-2.0 license

use crate::config::{DROIDBOOT_NAME, IFWI_NAME};
use anyhow::{anyhow, Context, Result};
use bootloader_image::BootloaderHeader;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub header: BootloaderHeader,
    pub firmware_interface_len: usize,
    pub loader_len: usize,
    pub loader_size_matches: bool,
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "magic:                   {}",
            String::from_utf8_lossy(&self.header.magic)
        )?;
        writeln!(f, "revision:                0x{:04x}", self.header.revision())?;
        writeln!(f, "reserved:                0x{:04x}", self.header.reserved())?;
        writeln!(
            f,
            "firmware interface size: {}",
            self.header.firmware_interface_size()
        )?;
        writeln!(f, "loader size (declared):  {}", self.header.loader_size())?;
        write!(f, "loader size (actual):    {}", self.loader_len)?;
        if !self.loader_size_matches {
            write!(f, " (mismatch)")?;
        }
        Ok(())
    }
}

fn load_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| anyhow!("Cannot read file '{}': {}", path.display(), e))
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data).map_err(|e| anyhow!("Unable to write file {}: {}", path.display(), e))
}

/// Packs an IFWI blob and a droidboot blob into a bootloader container.
pub fn bootloader_image_create(
    ifwi_path: &Path,
    droidboot_path: &Path,
    revision: u16,
    output_path: &Path,
) -> Result<()> {
    let ifwi = load_file(ifwi_path)?;
    let droidboot = load_file(droidboot_path)?;
    let image = bootloader_image::assemble(revision, &ifwi, &droidboot)?;
    write_file(output_path, &image)
}

/// Splits a bootloader container into `ifwi.bin` and `droidboot.img` inside
/// `out_dir`, returning both paths.
pub fn bootloader_image_unpack(image_path: &Path, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let image = load_file(image_path)?;
    let parts = bootloader_image::split(&image)
        .with_context(|| format!("invalid bootloader image {}", image_path.display()))?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Unable to create directory {}", out_dir.display()))?;
    let ifwi_path = out_dir.join(IFWI_NAME);
    let droidboot_path = out_dir.join(DROIDBOOT_NAME);
    write_file(&ifwi_path, parts.firmware_interface)?;
    write_file(&droidboot_path, parts.loader)?;
    Ok((ifwi_path, droidboot_path))
}

pub fn bootloader_image_info(image_path: &Path) -> Result<ImageInfo> {
    let image = load_file(image_path)?;
    let parts = bootloader_image::split(&image)
        .with_context(|| format!("invalid bootloader image {}", image_path.display()))?;
    Ok(ImageInfo {
        header: parts.header,
        firmware_interface_len: parts.firmware_interface.len(),
        loader_len: parts.loader.len(),
        loader_size_matches: parts.loader_size_matches(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootloader_image::FormatError;
    use tempfile::TempDir;

    #[test]
    fn test_create_then_unpack() {
        let dir = TempDir::new().unwrap();
        let ifwi = dir.path().join("in-ifwi.bin");
        let droidboot = dir.path().join("in-droidboot.img");
        let image = dir.path().join("bootloader.img");
        fs::write(&ifwi, b"Firmware Interface Data - ABCDEFGH").unwrap();
        fs::write(&droidboot, b"Droidboot Data - QWERTYUI").unwrap();

        bootloader_image_create(&ifwi, &droidboot, 0x0102, &image).unwrap();

        let info = bootloader_image_info(&image).unwrap();
        assert_eq!(info.header.revision(), 0x0102);
        assert_eq!(info.firmware_interface_len, 34);
        assert_eq!(info.loader_len, 25);
        assert!(info.loader_size_matches);

        let out = dir.path().join("out");
        let (ifwi_out, droidboot_out) = bootloader_image_unpack(&image, &out).unwrap();
        assert_eq!(ifwi_out, out.join("ifwi.bin"));
        assert_eq!(fs::read(&ifwi_out).unwrap(), fs::read(&ifwi).unwrap());
        assert_eq!(fs::read(&droidboot_out).unwrap(), fs::read(&droidboot).unwrap());
    }

    #[test]
    fn test_info_reports_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bootloader.img");
        let mut image = bootloader_image::assemble(1, b"AAAA", b"BBB").unwrap();
        image.extend_from_slice(b"extra");
        fs::write(&path, &image).unwrap();

        let info = bootloader_image_info(&path).unwrap();
        assert_eq!(info.loader_len, 8);
        assert!(!info.loader_size_matches);
        assert!(info.to_string().ends_with("loader size (actual):    8 (mismatch)"));
    }

    #[test]
    fn test_unpack_corrupted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bootloader.img");
        let mut image = bootloader_image::assemble(1, b"AAAA", b"BBB").unwrap();
        image[..8].copy_from_slice(b"Corrupt!");
        fs::write(&path, &image).unwrap();

        let err = bootloader_image_unpack(&path, &dir.path().join("out")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<FormatError>(),
            Some(&FormatError::BadMagic)
        );
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        assert!(bootloader_image_info(&dir.path().join("missing.img")).is_err());
    }
}
