// Licensed under the Apache-2.0 license

use core::mem::offset_of;

use boot_config::boot::{BootRecord, ImageSlot, ImageStatus, SafeBootFlags, SIGNATURE_LEN};
use boot_config::FlashLayout;
use boot_error::BootError;
use platform_hil::{FlashPartition, FlashStorage, PartitionPos};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const BOOT_RECORD_SIZE: usize = core::mem::size_of::<RawBootRecord>();

/// The boot record as stored in flash.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RawBootRecord {
    pub active_image: U32<LittleEndian>,
    pub status: U32<LittleEndian>,
    pub previous_image: U32<LittleEndian>,
    pub size: U32<LittleEndian>,
    pub safeboot: U32<LittleEndian>,
    pub signature: [u8; SIGNATURE_LEN],
    pub crc: U32<LittleEndian>,
}

impl RawBootRecord {
    pub fn encode(record: &BootRecord) -> Self {
        let mut raw = RawBootRecord {
            active_image: U32::new(record.active_image as u32),
            status: U32::new(record.status as u32),
            previous_image: U32::new(record.previous_image as u32),
            size: U32::new(record.size),
            safeboot: U32::new(record.safeboot.bits()),
            signature: record.signature,
            crc: U32::new(0),
        };
        raw.crc = U32::new(raw.compute_crc());
        raw
    }

    /// CRC-32 over every field before `crc`, seeded with all ones.
    pub fn compute_crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new_with_initial(u32::MAX);
        hasher.update(&self.as_bytes()[..offset_of!(RawBootRecord, crc)]);
        hasher.finalize()
    }

    /// Returns the decoded record, or `None` when the record is invalid.
    pub fn decode(&self) -> Option<BootRecord> {
        if self.status.get() == ImageStatus::ERASED || self.crc.get() != self.compute_crc() {
            return None;
        }
        Some(BootRecord {
            active_image: ImageSlot::try_from(self.active_image.get()).ok()?,
            previous_image: ImageSlot::try_from(self.previous_image.get()).ok()?,
            status: ImageStatus::try_from(self.status.get()).ok()?,
            size: self.size.get(),
            safeboot: SafeBootFlags::from_bits(self.safeboot.get())?,
            signature: self.signature,
        })
    }
}

/// Reads and writes the single boot record kept in the update-state partition.
pub struct BootRecordStore<'a> {
    partition: FlashPartition<'a>,
    record_offset: usize,
    sector_offset: usize,
    sector_size: usize,
}

impl<'a> BootRecordStore<'a> {
    pub fn new(
        flash: &'a dyn FlashStorage,
        region: PartitionPos,
        layout: &FlashLayout,
    ) -> Result<Self, BootError> {
        let partition = FlashPartition::from_pos(flash, "otadata", region)
            .map_err(|_| BootError::BOOT_RECORD_REGION_TOO_SMALL)?;
        let record_offset = layout.record_offset_in_partition as usize;
        let sector_offset = layout.sector_base(record_offset);
        let sector_size = layout.sector_size();

        // The record must not straddle a sector, and the sector must be inside the region.
        if record_offset + BOOT_RECORD_SIZE > sector_offset + sector_size
            || sector_offset + sector_size > partition.len()
        {
            return Err(BootError::BOOT_RECORD_REGION_TOO_SMALL);
        }
        Ok(BootRecordStore {
            partition,
            record_offset,
            sector_offset,
            sector_size,
        })
    }

    pub fn read_raw(&self) -> Result<RawBootRecord, BootError> {
        let mut bytes = [0u8; BOOT_RECORD_SIZE];
        self.partition
            .read(self.record_offset, &mut bytes)
            .map_err(|_| BootError::BOOT_RECORD_READ_FAILED)?;
        RawBootRecord::read_from_bytes(&bytes).map_err(|_| BootError::BOOT_RECORD_READ_FAILED)
    }

    /// Reads the record. `Ok(None)` means the stored record is invalid or erased.
    pub fn read(&self) -> Result<Option<BootRecord>, BootError> {
        Ok(self.read_raw()?.decode())
    }

    /// Erases the record sector and writes `record` with a fresh CRC.
    pub fn write(&self, record: &BootRecord) -> Result<(), BootError> {
        let raw = RawBootRecord::encode(record);
        self.partition
            .erase(self.sector_offset, self.sector_size)
            .map_err(|_| BootError::BOOT_RECORD_ERASE_FAILED)?;
        self.partition
            .write(self.record_offset, raw.as_bytes())
            .map_err(|_| BootError::BOOT_RECORD_WRITE_FAILED)?;
        Ok(())
    }

    /// Reads the record, replacing an invalid one with the first-boot record.
    pub fn read_or_init(&self) -> Result<BootRecord, BootError> {
        if let Some(record) = self.read()? {
            return Ok(record);
        }
        log::info!("Boot record invalid, initializing");
        let record = BootRecord::first_boot();
        self.write(&record)?;
        Ok(record)
    }

    /// Absolute flash address of the record.
    pub fn address(&self) -> usize {
        self.partition.base_offset() + self.record_offset
    }
}
