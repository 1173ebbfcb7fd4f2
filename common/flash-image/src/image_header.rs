// Licensed under the Apache-2.0 license

use platform_hil::{FlashDrvError, FlashStorage, PartitionPos};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const IMAGE_HEADER_MAGIC: u8 = 0xE9;
pub const MAX_SEGMENTS: u8 = 16;

/// Header at the start of the loader and of every application image.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct FirmwareImageHeader {
    pub magic: u8,
    pub segment_count: u8,
    pub spi_mode: u8,
    pub spi_speed_size: u8,
    pub entry_addr: U32<LittleEndian>,
    pub reserved: [u8; 16],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct SegmentHeader {
    pub load_addr: U32<LittleEndian>,
    pub data_len: U32<LittleEndian>,
}

impl FirmwareImageHeader {
    pub fn new(segment_count: u8, entry_addr: u32) -> Self {
        FirmwareImageHeader {
            magic: IMAGE_HEADER_MAGIC,
            segment_count,
            spi_mode: 0,
            spi_speed_size: 0,
            entry_addr: U32::new(entry_addr),
            reserved: [0; 16],
        }
    }

    pub fn read_from_flash(
        flash: &dyn FlashStorage,
        address: usize,
    ) -> Result<Self, FlashDrvError> {
        let mut bytes = [0u8; core::mem::size_of::<FirmwareImageHeader>()];
        flash.read(&mut bytes, address)?;
        Self::read_from_bytes(&bytes).map_err(|_| FlashDrvError::FAIL)
    }

    pub fn verify(&self) -> bool {
        if self.magic != IMAGE_HEADER_MAGIC {
            return false;
        }
        self.segment_count != 0 && self.segment_count <= MAX_SEGMENTS
    }
}

/// Checks the structure of a firmware image staged in flash.
///
/// The image layout is platform-defined and it is up to the implementer to parse it
/// and enforce any required policies.
///
/// Parameters:
///   flash:  Device holding the image
///   region:  Partition the image was written to
///   len:  Number of bytes of the image that were written
///
/// Returns:
///   true if every required check passes.
///   false on any structural or policy failure, including flash read errors.
pub trait ImageVerifier {
    fn verify_image(&self, flash: &dyn FlashStorage, region: PartitionPos, len: usize) -> bool;
}

/// Walks the segment list and checks that every segment lies within the staged bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SegmentImageVerifier;

impl ImageVerifier for SegmentImageVerifier {
    fn verify_image(&self, flash: &dyn FlashStorage, region: PartitionPos, len: usize) -> bool {
        if len > region.len() {
            return false;
        }
        let header = match FirmwareImageHeader::read_from_flash(flash, region.offset()) {
            Ok(header) => header,
            Err(_) => return false,
        };
        if !header.verify() {
            log::warn!("Image at 0x{:08x} has an invalid header", region.offset);
            return false;
        }

        let mut cursor = core::mem::size_of::<FirmwareImageHeader>();
        for index in 0..header.segment_count {
            let Some(seg_end) = cursor
                .checked_add(core::mem::size_of::<SegmentHeader>())
                .filter(|end| *end <= len)
            else {
                return false;
            };
            let mut bytes = [0u8; core::mem::size_of::<SegmentHeader>()];
            if flash.read(&mut bytes, region.offset() + cursor).is_err() {
                return false;
            }
            let Ok(segment) = SegmentHeader::read_from_bytes(&bytes) else {
                return false;
            };
            let data_end = usize::try_from(segment.data_len.get())
                .ok()
                .and_then(|data_len| seg_end.checked_add(data_len))
                .filter(|end| *end <= len);
            let Some(data_end) = data_end else {
                log::warn!(
                    "Segment {index} (0x{:08x}, {} bytes) runs past the image end",
                    segment.load_addr.get(),
                    segment.data_len.get()
                );
                return false;
            };
            cursor = data_end;
        }
        true
    }
}
