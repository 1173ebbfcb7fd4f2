// Licensed under the Apache-2.0 license

use boot_config::boot::ImageSlot;
use boot_config::FlashLayout;
use boot_error::BootError;
use platform_hil::{FlashStorage, PartitionPos};
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub const PARTITION_MAGIC: u16 = 0x50AA;
/// Marks the entry carrying the MD5 of all preceding entries.
pub const PARTITION_MD5_MAGIC: u16 = 0xEBEB;
pub const PARTITION_END_MAGIC: u16 = 0xFFFF;
pub const PARTITION_ENTRY_SIZE: usize = 32;

const MD5_OFFSET: usize = 16;

pub const TYPE_APP: u8 = 0x00;
pub const TYPE_DATA: u8 = 0x01;

pub const SUBTYPE_FACTORY: u8 = 0x00;
pub const SUBTYPE_OTA_FLAG: u8 = 0x10;
pub const SUBTYPE_OTA_MASK: u8 = 0x0f;
pub const SUBTYPE_TEST: u8 = 0x20;

pub const SUBTYPE_DATA_OTA: u8 = 0x00;
pub const SUBTYPE_DATA_RF: u8 = 0x01;
pub const SUBTYPE_DATA_WIFI: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionUsage {
    Factory,
    OtaSlot(u8),
    Test,
    /// Holds the boot record.
    UpdateState,
    RfCalibration,
    WifiConfig,
    Unknown,
}

impl PartitionUsage {
    fn classify(partition_type: u8, subtype: u8) -> Self {
        match (partition_type, subtype) {
            (TYPE_APP, SUBTYPE_FACTORY) => PartitionUsage::Factory,
            (TYPE_APP, SUBTYPE_TEST) => PartitionUsage::Test,
            (TYPE_APP, st) if st & !SUBTYPE_OTA_MASK == SUBTYPE_OTA_FLAG => {
                PartitionUsage::OtaSlot(st & SUBTYPE_OTA_MASK)
            }
            (TYPE_DATA, SUBTYPE_DATA_OTA) => PartitionUsage::UpdateState,
            (TYPE_DATA, SUBTYPE_DATA_RF) => PartitionUsage::RfCalibration,
            (TYPE_DATA, SUBTYPE_DATA_WIFI) => PartitionUsage::WifiConfig,
            _ => PartitionUsage::Unknown,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PartitionUsage::Factory => "factory app",
            PartitionUsage::OtaSlot(_) => "OTA app",
            PartitionUsage::Test => "test app",
            PartitionUsage::UpdateState => "OTA data",
            PartitionUsage::RfCalibration => "RF data",
            PartitionUsage::WifiConfig => "WiFi data",
            PartitionUsage::Unknown => "unknown",
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct PartitionEntry {
    pub magic: U16<LittleEndian>,
    pub partition_type: u8,
    pub subtype: u8,
    pub offset: U32<LittleEndian>,
    pub size: U32<LittleEndian>,
    pub label: [u8; 16],
    pub flags: U32<LittleEndian>,
}

impl PartitionEntry {
    pub fn new(partition_type: u8, subtype: u8, pos: PartitionPos, label: &str) -> Self {
        let mut raw_label = [0u8; 16];
        let len = label.len().min(raw_label.len());
        raw_label[..len].copy_from_slice(&label.as_bytes()[..len]);
        PartitionEntry {
            magic: PARTITION_MAGIC.into(),
            partition_type,
            subtype,
            offset: pos.offset.into(),
            size: pos.size.into(),
            label: raw_label,
            flags: U32::new(0),
        }
    }

    /// Builds the raw checksum entry closing a table whose entries hash to `digest`.
    pub fn checksum_entry(digest: [u8; 16]) -> [u8; PARTITION_ENTRY_SIZE] {
        let mut raw = [0xffu8; PARTITION_ENTRY_SIZE];
        raw[..2].copy_from_slice(&PARTITION_MD5_MAGIC.to_le_bytes());
        raw[MD5_OFFSET..].copy_from_slice(&digest);
        raw
    }

    pub fn pos(&self) -> PartitionPos {
        PartitionPos::new(self.offset.get(), self.size.get())
    }

    pub fn usage(&self) -> PartitionUsage {
        PartitionUsage::classify(self.partition_type, self.subtype)
    }

    pub fn label(&self) -> &str {
        let end = self
            .label
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.label.len());
        core::str::from_utf8(&self.label[..end]).unwrap_or("?")
    }
}

/// Flash geometry derived from the partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartitionDirectory {
    update_state: Option<PartitionPos>,
    images: [Option<PartitionPos>; 3],
}

impl PartitionDirectory {
    /// Reads and validates the table at `layout.partition_table_offset`.
    ///
    /// The table must contain at least one entry and a matching MD5 entry. An
    /// unknown entry magic aborts the scan.
    pub fn load(flash: &dyn FlashStorage, layout: &FlashLayout) -> Result<Self, BootError> {
        let base = layout.partition_table_offset as usize;
        let max_entries = layout.partition_table_size as usize / PARTITION_ENTRY_SIZE;

        let mut dir = PartitionDirectory::default();
        let mut hasher = md5::Context::new();
        let mut entries = 0;
        let mut checksum_matched = false;

        log::info!("Partition table:");
        log::info!("## Label            Usage          Type ST Offset   Length");

        for index in 0..max_entries {
            let mut raw = [0u8; PARTITION_ENTRY_SIZE];
            flash
                .read(&mut raw, base + index * PARTITION_ENTRY_SIZE)
                .map_err(|_| BootError::PARTITION_TABLE_READ_FAILED)?;
            let entry = PartitionEntry::read_from_bytes(&raw)
                .map_err(|_| BootError::PARTITION_TABLE_INVALID)?;

            match entry.magic.get() {
                PARTITION_MAGIC => {
                    hasher.consume(raw);
                    dir.add(index, &entry);
                    entries += 1;
                }
                PARTITION_MD5_MAGIC => {
                    let digest = hasher.compute();
                    if raw[MD5_OFFSET..] != digest.0[..] {
                        log::error!("Partition table MD5 mismatch");
                        return Err(BootError::PARTITION_TABLE_INVALID);
                    }
                    checksum_matched = true;
                    break;
                }
                PARTITION_END_MAGIC => break,
                magic => {
                    log::error!("Partition table entry {index} has bad magic 0x{magic:04x}");
                    return Err(BootError::PARTITION_TABLE_INVALID);
                }
            }
        }
        log::info!("End of partition table");

        if entries == 0 || !checksum_matched {
            log::error!("Partition table failed verification");
            return Err(BootError::PARTITION_TABLE_INVALID);
        }
        Ok(dir)
    }

    fn add(&mut self, index: usize, entry: &PartitionEntry) {
        let pos = entry.pos();
        let usage = entry.usage();
        log::info!(
            "{:2} {:16} {:14} {:02x}   {:02x} {:08x} {:08x}",
            index,
            entry.label(),
            usage.name(),
            entry.partition_type,
            entry.subtype,
            pos.offset,
            pos.size
        );

        match usage {
            PartitionUsage::Factory => {
                if self.images[ImageSlot::Factory.index()].is_none() {
                    self.images[ImageSlot::Factory.index()] = Some(pos);
                }
            }
            PartitionUsage::OtaSlot(_) => {
                match self.images[1..].iter_mut().find(|slot| slot.is_none()) {
                    Some(slot) => *slot = Some(pos),
                    None => log::warn!("Ignoring extra OTA partition {}", entry.label()),
                }
            }
            PartitionUsage::UpdateState => self.update_state = Some(pos),
            _ => {}
        }
    }

    pub fn update_state(&self) -> Option<PartitionPos> {
        self.update_state
    }

    pub fn image(&self, slot: ImageSlot) -> Option<PartitionPos> {
        self.images[slot.index()]
    }

    /// Number of bootable images found, factory included.
    pub fn image_count(&self) -> usize {
        self.images.iter().flatten().count()
    }
}
