// Licensed under the Apache-2.0 license

use log::debug;
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, Write};
use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

/// Result of looking up an entry in a package. A missing entry is a normal
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRead {
    Found(Vec<u8>),
    NotFound,
}

impl EntryRead {
    pub fn into_option(self) -> Option<Vec<u8>> {
        match self {
            EntryRead::Found(data) => Some(data),
            EntryRead::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            data: data.to_vec(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("zip error on {path}: {source}")]
    Zip { path: String, source: ZipError },
    #[error("I/O error on {path}: {source}")]
    Io { path: String, source: io::Error },
}

/// Read side of an input package (target-files or source-files).
pub trait TargetFiles {
    fn read_entry(&mut self, path: &str) -> Result<EntryRead, ArchiveError>;
}

/// Write side of the OTA package being built.
pub trait OutputArchive {
    fn write_entry(&mut self, path: &str, data: &[u8]) -> Result<(), ArchiveError>;
}

impl<R: Read + Seek> TargetFiles for ZipArchive<R> {
    fn read_entry(&mut self, path: &str) -> Result<EntryRead, ArchiveError> {
        let mut file = match self.by_name(path) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(EntryRead::NotFound),
            Err(source) => {
                return Err(ArchiveError::Zip {
                    path: path.to_string(),
                    source,
                })
            }
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|source| ArchiveError::Io {
                path: path.to_string(),
                source,
            })?;
        Ok(EntryRead::Found(data))
    }
}

impl TargetFiles for BTreeMap<String, Vec<u8>> {
    fn read_entry(&mut self, path: &str) -> Result<EntryRead, ArchiveError> {
        Ok(self
            .get(path)
            .map_or(EntryRead::NotFound, |data| EntryRead::Found(data.clone())))
    }
}

impl OutputArchive for Vec<ArchiveEntry> {
    fn write_entry(&mut self, path: &str, data: &[u8]) -> Result<(), ArchiveError> {
        self.push(ArchiveEntry::new(path, data));
        Ok(())
    }
}

/// Zip-backed OTA package. Entries get a fixed timestamp so the same inputs
/// always produce the same archive bytes.
pub struct OtaPackage<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
}

impl<W: Write + Seek> OtaPackage<W> {
    pub fn new(writer: W) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644)
            .last_modified_time(zip::DateTime::default());
        Self {
            zip: ZipWriter::new(writer),
            options,
        }
    }

    pub fn finish(self) -> Result<W, ArchiveError> {
        self.zip.finish().map_err(|source| ArchiveError::Zip {
            path: "<central directory>".to_string(),
            source,
        })
    }
}

impl<W: Write + Seek> OutputArchive for OtaPackage<W> {
    fn write_entry(&mut self, path: &str, data: &[u8]) -> Result<(), ArchiveError> {
        debug!("Adding {}: {} bytes", path, data.len());
        self.zip
            .start_file(path, self.options)
            .map_err(|source| ArchiveError::Zip {
                path: path.to_string(),
                source,
            })?;
        self.zip
            .write_all(data)
            .map_err(|source| ArchiveError::Io {
                path: path.to_string(),
                source,
            })
    }
}
