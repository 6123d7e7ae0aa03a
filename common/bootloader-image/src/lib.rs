// Licensed under the Apache-2.0 license

//! Container format for the combined bootloader image.
//!
//! A container is a 20 byte little-endian header followed by the firmware
//! interface (IFWI) blob and the second-stage loader (droidboot) blob:
//!
//! ```text
//! +----------+----------+----------+-----------+-------------+------+-----------+
//! | magic[8] | rev[2]   | rsvd[2]  | ifwi_sz[4]| loader_sz[4]| IFWI | loader... |
//! +----------+----------+----------+-----------+-------------+------+-----------+
//! ```
//!
//! The loader blob is every byte after the IFWI blob. `loader_size` is decoded
//! and carried but does not bound the loader slice.

use zerocopy::{
    byteorder::{LittleEndian, U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

pub const BOOTLOADER_MAGIC: [u8; 8] = *b"BOOTLDR!";
pub const HEADER_SIZE: usize = core::mem::size_of::<BootloaderHeader>();

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("bad magic")]
    BadMagic,
    #[error("truncated image: need {required} bytes, have {actual}")]
    Truncated { required: usize, actual: usize },
    #[error("blob of {len} bytes does not fit in a 32-bit size field")]
    TooLarge { len: usize },
}

#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct BootloaderHeader {
    pub magic: [u8; 8],
    pub revision: U16<LittleEndian>,
    pub reserved: U16<LittleEndian>,
    pub firmware_interface_size: U32<LittleEndian>,
    pub loader_size: U32<LittleEndian>,
}

impl BootloaderHeader {
    pub fn new(revision: u16, firmware_interface_size: u32, loader_size: u32) -> Self {
        Self {
            magic: BOOTLOADER_MAGIC,
            revision: revision.into(),
            reserved: U16::new(0),
            firmware_interface_size: firmware_interface_size.into(),
            loader_size: loader_size.into(),
        }
    }

    /// Decodes the header from the start of `buffer`.
    ///
    /// Only the magic is validated; revision, reserved and both sizes are
    /// accepted as-is.
    pub fn decode(buffer: &[u8]) -> Result<Self, FormatError> {
        let (header, _) =
            Self::read_from_prefix(buffer).map_err(|_| FormatError::Truncated {
                required: HEADER_SIZE,
                actual: buffer.len(),
            })?;
        if header.magic != BOOTLOADER_MAGIC {
            return Err(FormatError::BadMagic);
        }
        Ok(header)
    }

    pub fn revision(&self) -> u16 {
        self.revision.get()
    }

    pub fn reserved(&self) -> u16 {
        self.reserved.get()
    }

    pub fn firmware_interface_size(&self) -> u32 {
        self.firmware_interface_size.get()
    }

    pub fn loader_size(&self) -> u32 {
        self.loader_size.get()
    }
}

/// A container sliced into its two blobs. Both slices borrow from the
/// original buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootloaderImage<'a> {
    pub header: BootloaderHeader,
    pub firmware_interface: &'a [u8],
    pub loader: &'a [u8],
}

impl BootloaderImage<'_> {
    /// Whether the header's declared `loader_size` agrees with the number of
    /// bytes that actually follow the IFWI blob.
    pub fn loader_size_matches(&self) -> bool {
        usize::try_from(self.header.loader_size()).is_ok_and(|size| size == self.loader.len())
    }
}

pub fn decode(buffer: &[u8]) -> Result<BootloaderHeader, FormatError> {
    BootloaderHeader::decode(buffer)
}

pub fn split(buffer: &[u8]) -> Result<BootloaderImage<'_>, FormatError> {
    let header = BootloaderHeader::decode(buffer)?;
    let ifwi_end = usize::try_from(header.firmware_interface_size())
        .ok()
        .and_then(|size| HEADER_SIZE.checked_add(size));
    let Some(ifwi_end) = ifwi_end.filter(|&end| end <= buffer.len()) else {
        return Err(FormatError::Truncated {
            required: HEADER_SIZE.saturating_add(header.firmware_interface_size() as usize),
            actual: buffer.len(),
        });
    };

    Ok(BootloaderImage {
        header,
        firmware_interface: &buffer[HEADER_SIZE..ifwi_end],
        loader: &buffer[ifwi_end..],
    })
}

/// Builds a container from its two blobs, recording both sizes in the header.
pub fn assemble(
    revision: u16,
    firmware_interface: &[u8],
    loader: &[u8],
) -> Result<Vec<u8>, FormatError> {
    let size_of = |blob: &[u8]| {
        u32::try_from(blob.len()).map_err(|_| FormatError::TooLarge { len: blob.len() })
    };
    let header = BootloaderHeader::new(revision, size_of(firmware_interface)?, size_of(loader)?);

    let mut image = Vec::with_capacity(HEADER_SIZE + firmware_interface.len() + loader.len());
    image.extend_from_slice(header.as_bytes());
    image.extend_from_slice(firmware_interface);
    image.extend_from_slice(loader);
    Ok(image)
}
